//! Named collaborator interfaces (spec §6). Deliberately out of scope for
//! this crate: GeoJSON/CSV parsing, map projection, and rendering are
//! described here as typed contracts only, with no implementation shipped.

use crate::geom::{GeoDiv, Point};
use std::collections::HashMap;

/// Per-GeoDiv target areas, keyed by `GeoDiv::id`. A missing entry and a
/// `target_area_is_missing` entry are both valid ways to mark "no target";
/// see [`crate::InsetState`] for how the engine treats each.
pub type TargetAreas = HashMap<String, f64>;

/// Produces the initial GeoDivs and their target areas. Left unimplemented:
/// a GeoJSON/CSV reader is a separate concern from the flow engine.
pub trait Reader {
    type Error: std::error::Error;

    fn read(&self) -> Result<(Vec<GeoDiv>, TargetAreas), Self::Error>;
}

/// Applies an equal-area map projection (Albers, Smyth, ...) to coordinates
/// before the engine ever sees them. The engine operates purely on the
/// `[0, lx] × [0, ly]` rescaled plane and has no notion of a CRS.
pub trait Projector {
    fn project(&self, points: &mut [Point]);
}

/// Consumes the final GeoDivs and, optionally, the cumulative projection
/// grid for rendering a graticule overlay.
pub trait Renderer {
    type Error: std::error::Error;

    fn render(&self, geo_divs: &[GeoDiv], cum_proj: Option<&ndarray::Array2<Point>>) -> Result<(), Self::Error>;
}
