#![doc = "Density-equalizing flow engine for contiguous-area cartograms"]

mod collab;
mod config;
mod error;
mod geom;

mod advect;
mod blur;
mod densify;
mod density;
mod driver;
mod flow;
mod inset;
mod lattice;
mod triangulate;

#[doc(inline)]
pub use collab::{Projector, Reader, Renderer, TargetAreas};

#[doc(inline)]
pub use config::EngineConfig;

#[doc(inline)]
pub use error::{EngineError, EngineResult};

#[doc(inline)]
pub use geom::{approx_eq, is_ccw, signed_area_open, GeoDiv, Point, Pwh, PwhList, Ring, DEFAULT_EPS};

#[doc(inline)]
pub use inset::InsetState;

#[doc(inline)]
pub use triangulate::{Graticule, GraticuleDiagonal};

#[doc(inline)]
pub use driver::{run, DriverOutcome};
