//! `Point` and approximate-equality helpers (spec §3, DESIGN NOTES §9).

use geo::Coord;

/// A 2D coordinate. Built on `geo::Coord` so the rest of the engine can use
/// `geo`'s bounding-box, area, and boolean-op traits directly.
pub type Point = Coord<f64>;

#[inline]
pub fn make_point(x: f64, y: f64) -> Point {
    Coord { x, y }
}

/// Default absolute tolerance for point comparisons across the engine.
pub const DEFAULT_EPS: f64 = 1e-9;

/// Approximate equality, per DESIGN NOTES §9: point equality is routed
/// through a named function rather than overriding `PartialEq` globally,
/// since the "right" tolerance is context-dependent (a lattice-cell
/// fraction during densification, a tighter bound in topology checks).
#[inline]
pub fn approx_eq(a: Point, b: Point, eps: f64) -> bool {
    (a.x - b.x).abs() <= eps && (a.y - b.y).abs() <= eps
}

/// A canonicalized, hashable snapshot of a point, used wherever point
/// equality must double as a hash key (densification dedup). Points are
/// snapped to `cell_frac` of a lattice cell before hashing, the same
/// quantize-then-hash trick used for rook-adjacency edge keys elsewhere in
/// this codebase's lineage (snap coordinates to an integer grid, hash the
/// pair).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PointKey {
    x: i64,
    y: i64,
}

impl PointKey {
    pub fn new(p: Point, cell_frac: f64) -> Self {
        Self {
            x: (p.x / cell_frac).round() as i64,
            y: (p.y / cell_frac).round() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_eq_within_tolerance() {
        let a = make_point(1.0, 2.0);
        let b = make_point(1.0 + 1e-10, 2.0 - 1e-10);
        assert!(approx_eq(a, b, DEFAULT_EPS));
    }

    #[test]
    fn approx_eq_rejects_beyond_tolerance() {
        let a = make_point(1.0, 2.0);
        let b = make_point(1.01, 2.0);
        assert!(!approx_eq(a, b, DEFAULT_EPS));
    }

    #[test]
    fn point_key_snaps_nearby_points_together() {
        let a = PointKey::new(make_point(3.0000001, 4.0), 1e-6);
        let b = PointKey::new(make_point(3.0000002, 4.0), 1e-6);
        assert_eq!(a, b);
    }

    #[test]
    fn point_key_distinguishes_distinct_points() {
        let a = PointKey::new(make_point(3.0, 4.0), 1e-6);
        let b = PointKey::new(make_point(3.1, 4.0), 1e-6);
        assert_ne!(a, b);
    }
}
