//! Triangulation picker (spec §4.7, C7): for each graticule cell, choose
//! which diagonal splits it into two triangles whose images remain simple
//! even if the projected cell has gone concave.
//!
//! Grounded on `project.cpp`'s `chosen_diag`/`fill_graticule_diagonals`: try
//! the main diagonal first, fall back to the anti-diagonal, and treat
//! neither working as a fatal topology failure.

use geo::{Contains, Polygon};
use ndarray::Array2;

use crate::error::{EngineError, EngineResult};
use crate::geom::{make_point, ring_from_open, Point};

/// Per spec DESIGN NOTES §9: a tiny tagged variant, never a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraticuleDiagonal {
    Unset,
    /// `(v0, v2)`: bottom-left to top-right.
    Main,
    /// `(v1, v3)`: bottom-right to top-left.
    Anti,
}

/// The chosen diagonal per cell, plus a count of cells whose image required
/// the anti-diagonal — a proxy for how many graticule cells went concave
/// this step, surfaced for driver-level diagnostics (spec §9 + original
/// `chosen_diag`'s bookkeeping).
#[derive(Debug)]
pub struct Graticule {
    diagonals: Array2<GraticuleDiagonal>,
    n_concave: usize,
}

impl Graticule {
    #[inline] pub fn diagonals(&self) -> &Array2<GraticuleDiagonal> { &self.diagonals }
    #[inline] pub fn n_concave(&self) -> usize { self.n_concave }
}

fn midpoint(a: Point, b: Point) -> Point {
    make_point((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Choose a diagonal for every cell of the `(lx-1) x (ly-1)` graticule
/// implied by `proj` (spec §4.7). `proj` is `lx x ly`, one point per
/// lattice node.
pub fn pick_diagonals(proj: &Array2<Point>) -> EngineResult<Graticule> {
    let (lx, ly) = proj.dim();
    if lx < 2 || ly < 2 {
        return Ok(Graticule { diagonals: Array2::from_elem((0, 0), GraticuleDiagonal::Unset), n_concave: 0 });
    }

    let mut diagonals = Array2::from_elem((lx - 1, ly - 1), GraticuleDiagonal::Unset);
    let mut n_concave = 0;

    for i in 0..lx - 1 {
        for j in 0..ly - 1 {
            let v0 = proj[[i, j]];
            let v1 = proj[[i + 1, j]];
            let v2 = proj[[i + 1, j + 1]];
            let v3 = proj[[i, j + 1]];
            let quad = Polygon::new(ring_from_open(vec![v0, v1, v2, v3]), vec![]);

            let mid_main = midpoint(v0, v2);
            if quad.contains(&geo::Point::from(mid_main)) {
                diagonals[[i, j]] = GraticuleDiagonal::Main;
                continue;
            }

            let mid_anti = midpoint(v1, v3);
            if quad.contains(&geo::Point::from(mid_anti)) {
                diagonals[[i, j]] = GraticuleDiagonal::Anti;
                n_concave += 1;
                continue;
            }

            return Err(EngineError::InvalidGraticule {
                cell: (i, j),
                detail: "neither diagonal's midpoint lies inside the projected cell".to_string(),
            });
        }
    }

    Ok(Graticule { diagonals, n_concave })
}

/// The triangle `(a, b, c)` a diagonal choice splits a cell's corners into,
/// for the vertex containing `(x, y)` relative to the cell's own corners
/// `(v0, v1, v2, v3)` (CCW from bottom-left).
pub fn triangle_for_point(x: f64, y: f64, i: usize, j: usize, diag: GraticuleDiagonal) -> (usize, usize, usize) {
    // Local corner indices within the cell: 0=bl, 1=br, 2=tr, 3=tl. Origin at
    // the cell's own bottom-left node center (i+0.5, j+0.5), matching the
    // node-centered pre-image corners used by `triangulated_advect`.
    let (fx, fy) = (x - (i as f64 + 0.5), y - (j as f64 + 0.5));
    match diag {
        GraticuleDiagonal::Main | GraticuleDiagonal::Unset => {
            // Diagonal (v0, v2); below it is (v0, v1, v2), above is (v0, v2, v3).
            if fy <= fx {
                (0, 1, 2)
            } else {
                (0, 2, 3)
            }
        }
        GraticuleDiagonal::Anti => {
            // Diagonal (v1, v3); below-right is (v0, v1, v3), above-left is (v1, v2, v3).
            if fx + fy <= 1.0 {
                (0, 1, 3)
            } else {
                (1, 2, 3)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_grid(lx: usize, ly: usize) -> Array2<Point> {
        Array2::from_shape_fn((lx, ly), |(i, j)| make_point(i as f64 + 0.5, j as f64 + 0.5))
    }

    #[test]
    fn identity_projection_always_picks_main_diagonal() {
        let proj = identity_grid(4, 4);
        let g = pick_diagonals(&proj).unwrap();
        assert_eq!(g.n_concave(), 0);
        for row in g.diagonals().rows() {
            for d in row {
                assert_eq!(*d, GraticuleDiagonal::Main);
            }
        }
    }

    #[test]
    fn degenerate_collapsed_cell_is_fatal() {
        let mut proj = identity_grid(3, 3);
        // Collapse one cell's two opposite corners onto one point so
        // neither diagonal's midpoint can lie strictly inside.
        proj[[1, 1]] = proj[[0, 0]];
        proj[[1, 0]] = proj[[0, 0]];
        let err = pick_diagonals(&proj).unwrap_err();
        assert!(matches!(err, EngineError::InvalidGraticule { .. }));
    }
}
