//! `Ring` and `PolygonWithHoles` (spec §3).
//!
//! Spec §3 models a `Ring` as an *open* point sequence (first vertex not
//! repeated) and a `PolygonWithHoles` as one outer ring plus zero or more
//! hole rings, with the outer ring counterclockwise and holes clockwise.
//! Internally we store rings as `geo::LineString`, which `geo`'s area/
//! bounding-box/boolean-op traits expect to be *closed* (first == last).
//! `ensure_open`/`ensure_closed` are the seam between the two conventions.

use geo::{Coord, LineString, Polygon};

use super::point::Point;

/// Closed internal storage for a ring; `geo`'s trait ecosystem (`Area`,
/// `BoundingRect`, ...) operates on this form directly.
pub type Ring = LineString<f64>;

/// An outer ring plus zero or more hole rings (spec §3's PWH).
pub type Pwh = Polygon<f64>;

/// Build a closed `Ring` from an open point sequence (first != last),
/// appending the closing vertex if the caller omitted it.
pub fn ring_from_open(mut points: Vec<Point>) -> Ring {
    if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
        if !(first.x == last.x && first.y == last.y) {
            points.push(first);
        }
    }
    LineString(points)
}

/// The open-form point sequence (first != last) of a closed `Ring`, per the
/// invariant spec §3 places on `Ring` and `PolygonWithHoles`.
pub fn ensure_open(ring: &Ring) -> Vec<Point> {
    let coords = ring.0.as_slice();
    match coords {
        [] => Vec::new(),
        _ if coords.len() > 1 && coords[0] == coords[coords.len() - 1] => {
            coords[..coords.len() - 1].to_vec()
        }
        _ => coords.to_vec(),
    }
}

/// Signed area of an open point sequence via the shoelace formula (positive
/// ⇒ counterclockwise). Used directly on densified/advected point lists
/// before they are wrapped back into a `Ring`.
pub fn signed_area_open(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let a: Coord<f64> = points[i];
        let b: Coord<f64> = points[(i + 1) % n];
        area += a.x * b.y - b.x * a.y;
    }
    area / 2.0
}

pub fn is_ccw(ring: &Ring) -> bool {
    signed_area_open(&ensure_open(ring)) > 0.0
}
