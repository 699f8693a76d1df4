//! Segment densification (spec §4.6, C6): insert vertices at every grid-line
//! and cell-diagonal crossing a segment makes, so no segment spans more
//! than one cell without an intermediate vertex.
//!
//! Grounded on `densification_points`/`add_diag_inter` from the original
//! implementation's `densify.cpp`, translated from CGAL segment-line
//! intersection to a direct parametric solve. The original's dead
//! `x == 0.0` half-step special case (unreachable since the loop only ever
//! visits half-integer `x`) is dropped; spec §4.6 names only the `k + 0.5`
//! grid lines and the diagonal families, which this keeps faithfully.

use ahash::AHashSet;
use geo::Polygon;

use crate::geom::{ensure_open, make_point, ring_from_open, GeoDiv, Point, PointKey, Pwh};

const DEDUP_CELL_FRAC: f64 = 1e-6;

/// Solve `coef_x * x + coef_y * y + coef_const = 0` against segment `(a, b)`,
/// returning the point of intersection if the line crosses the segment
/// (endpoints inclusive) and is not parallel to it.
fn calc_intersection(a: Point, b: Point, coef_x: f64, coef_y: f64, coef_const: f64) -> Option<Point> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let denom = coef_x * dx + coef_y * dy;
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = -(coef_x * a.x + coef_y * a.y + coef_const) / denom;
    if !(-1e-9..=1.0 + 1e-9).contains(&t) {
        return None;
    }
    let t = t.clamp(0.0, 1.0);
    Some(make_point(a.x + t * dx, a.y + t * dy))
}

/// Intersections of segment `(a, b)` with the diagonal family `y = slope*x + d`,
/// `d` ranging from the segment's lowest intercept up to its highest in
/// steps of `step`, kept only when they fall within the graticule extent
/// appropriate to that diagonal family (spec §4.6: steep/antisteep near
/// `x=0,lx`; gentle/antigentle near `y=0,ly`).
fn add_diag_inter(out: &mut Vec<Point>, a: Point, b: Point, slope: f64, base_intercept: f64, step: f64, lx: usize, ly: usize) {
    let intercept_a = a.y - slope * a.x;
    let intercept_b = b.y - slope * b.x;
    let intercept_start = intercept_a.min(intercept_b).floor() + base_intercept;
    let intercept_end = intercept_a.max(intercept_b);

    let lx = lx as f64;
    let ly = ly as f64;
    let mut d = intercept_start;
    while d <= intercept_end + 1e-9 {
        if let Some(p) = calc_intersection(a, b, slope, -1.0, d) {
            let in_range = if slope.abs() == 2.0 {
                p.x < 0.5 || p.x > lx - 0.5
            } else if slope.abs() == 0.5 {
                p.y < 0.5 || p.y > ly - 0.5
            } else {
                p.x >= 0.5 && p.x <= lx - 0.5 && p.y >= 0.5 && p.y <= ly - 0.5
            };
            if in_range {
                out.push(p);
            }
        }
        d += step;
    }
}

fn point_less_than(a: &Point, b: &Point) -> std::cmp::Ordering {
    a.x.partial_cmp(&b.x)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
}

/// All grid-line and diagonal crossings of segment `(pt1, pt2)`, ordered
/// from `pt1` to `pt2` inclusive (spec §4.6).
pub fn densification_points(pt1: Point, pt2: Point, lx: usize, ly: usize) -> Vec<Point> {
    if pt1.x == pt2.x && pt1.y == pt2.y {
        return vec![pt1, pt2];
    }

    let reversed = (pt1.x > pt2.x) || (pt1.x == pt2.x && pt1.y > pt2.y);
    let (a, b) = if reversed { (pt2, pt1) } else { (pt1, pt2) };

    let mut candidates = vec![a, b];

    // Vertical grid lines x = k + 0.5.
    let x_start = (a.x + 0.5).floor() + 0.5;
    let x_end = b.x;
    let mut x = x_start;
    while x <= x_end + 1e-9 {
        if let Some(p) = calc_intersection(a, b, 1.0, 0.0, -x) {
            candidates.push(p);
        }
        x += 1.0;
    }

    // Horizontal grid lines y = k + 0.5.
    let y_start = (a.y.min(b.y) + 0.5).floor() + 0.5;
    let y_end = a.y.max(b.y);
    let mut y = y_start;
    while y <= y_end + 1e-9 {
        if let Some(p) = calc_intersection(a, b, 0.0, 1.0, -y) {
            candidates.push(p);
        }
        y += 1.0;
    }

    // Bottom-left-to-top-right and top-left-to-bottom-right cell diagonals.
    add_diag_inter(&mut candidates, a, b, 1.0, 0.0, 1.0, lx, ly);
    add_diag_inter(&mut candidates, a, b, -1.0, 0.0, 1.0, lx, ly);

    // Edge diagonals (slope ±2) near the x=0 / x=lx border.
    if a.x < 0.5 || b.x < 0.5 || a.x > lx as f64 - 0.5 || b.x > lx as f64 - 0.5 {
        add_diag_inter(&mut candidates, a, b, 2.0, 0.5, 1.0, lx, ly);
        add_diag_inter(&mut candidates, a, b, -2.0, 0.5, 1.0, lx, ly);
    }
    // Edge diagonals (slope ±0.5) near the y=0 / y=ly border.
    if a.y < 0.5 || b.y < 0.5 || a.y > ly as f64 - 0.5 || b.y > ly as f64 - 0.5 {
        add_diag_inter(&mut candidates, a, b, 0.5, 0.25, 0.5, lx, ly);
        add_diag_inter(&mut candidates, a, b, -0.5, 0.25, 0.5, lx, ly);
    }

    candidates.sort_by(point_less_than);
    let mut seen: AHashSet<PointKey> = AHashSet::default();
    let mut deduped = Vec::with_capacity(candidates.len());
    for p in candidates {
        if seen.insert(PointKey::new(p, DEDUP_CELL_FRAC)) {
            deduped.push(p);
        }
    }

    if reversed {
        deduped.reverse();
    }
    deduped
}

/// Densify a closed ring (open point sequence) by inserting every grid and
/// diagonal crossing along each edge, dropping the duplicated endpoint each
/// segment's result shares with the next.
pub fn densify_ring(points: &[Point], lx: usize, ly: usize) -> Vec<Point> {
    let n = points.len();
    if n < 2 {
        return points.to_vec();
    }
    let mut out = Vec::new();
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let segment = densification_points(a, b, lx, ly);
        out.extend_from_slice(&segment[..segment.len() - 1]);
    }
    out
}

fn densify_pwh(pwh: &Pwh, lx: usize, ly: usize) -> Pwh {
    let outer = densify_ring(&ensure_open(pwh.exterior()), lx, ly);
    let holes: Vec<_> = pwh
        .interiors()
        .iter()
        .map(|h| ring_from_open(densify_ring(&ensure_open(h), lx, ly)))
        .collect();
    Polygon::new(ring_from_open(outer), holes)
}

/// Densify every polygon of every GeoDiv in place (spec §4.6, driven by C8
/// before triangulated advection).
pub fn densify_geo_divs(geo_divs: &mut [GeoDiv], lx: usize, ly: usize) {
    for gd in geo_divs.iter_mut() {
        for pwh in gd.pwhs_mut().iter_mut() {
            *pwh = densify_pwh(pwh, lx, ly);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::make_point;

    #[test]
    fn identical_points_return_as_is() {
        let p = make_point(3.0, 4.0);
        assert_eq!(densification_points(p, p, 16, 16), vec![p, p]);
    }

    #[test]
    fn long_horizontal_segment_gains_grid_crossings() {
        let a = make_point(0.2, 4.0);
        let b = make_point(6.8, 4.0);
        let pts = densification_points(a, b, 16, 16);
        assert!(pts.len() > 2);
        assert_eq!(*pts.first().unwrap(), a);
        assert_eq!(*pts.last().unwrap(), b);
        // every inserted point lies on the segment's line y = 4.0
        for p in &pts {
            assert!((p.y - 4.0).abs() < 1e-6);
        }
    }

    #[test]
    fn densify_ring_preserves_endpoints_and_increases_vertex_count() {
        let square = vec![
            make_point(1.0, 1.0),
            make_point(9.0, 1.0),
            make_point(9.0, 9.0),
            make_point(1.0, 9.0),
        ];
        let dense = densify_ring(&square, 16, 16);
        assert!(dense.len() > square.len());
        assert!(dense.contains(&make_point(1.0, 1.0)));
    }
}
