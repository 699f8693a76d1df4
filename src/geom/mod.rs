mod geo_div;
mod point;
mod ring;

pub use geo_div::{GeoDiv, PwhList};
pub use point::{approx_eq, make_point, Point, PointKey, DEFAULT_EPS};
pub use ring::{ensure_open, is_ccw, ring_from_open, signed_area_open, Pwh, Ring};
