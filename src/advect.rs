//! Vertex advection (spec §4.5, C5): move every polygon vertex (and every
//! `cum_proj` node) through the per-step projection grid, either by
//! bilinear interpolation of the displacement field or, when triangulation
//! is enabled, by the affine map of the triangle the vertex falls in.
//!
//! Grounded on `project.cpp`'s `projected_point`/`affine_trans` pair.

use ndarray::Array2;

use crate::geom::{make_point, GeoDiv, Point};
use crate::triangulate::{triangle_for_point, GraticuleDiagonal, Graticule};

/// Bilinear interpolation of `proj - identity` (the displacement field)
/// over the cell containing `(x, y)`, clamped to the lattice's range (spec
/// §4.5, "Bilinear").
pub fn bilinear_advect(proj: &Array2<Point>, x: f64, y: f64) -> Point {
    let (lx, ly) = proj.dim();
    let fx = (x - 0.5).clamp(0.0, lx as f64 - 1.0);
    let fy = (y - 0.5).clamp(0.0, ly as f64 - 1.0);
    let i0 = fx.floor() as usize;
    let j0 = fy.floor() as usize;
    let i1 = (i0 + 1).min(lx - 1);
    let j1 = (j0 + 1).min(ly - 1);
    let tx = fx - i0 as f64;
    let ty = fy - j0 as f64;

    let disp = |i: usize, j: usize| {
        let p = proj[[i, j]];
        make_point(p.x - (i as f64 + 0.5), p.y - (j as f64 + 0.5))
    };
    let d00 = disp(i0, j0);
    let d10 = disp(i1, j0);
    let d01 = disp(i0, j1);
    let d11 = disp(i1, j1);

    let dx = d00.x * (1.0 - tx) * (1.0 - ty) + d10.x * tx * (1.0 - ty) + d01.x * (1.0 - tx) * ty + d11.x * tx * ty;
    let dy = d00.y * (1.0 - tx) * (1.0 - ty) + d10.y * tx * (1.0 - ty) + d01.y * (1.0 - tx) * ty + d11.y * tx * ty;
    make_point(x + dx, y + dy)
}

/// Unique affine map `T` with `T(a)=p, T(b)=q, T(c)=r`, applied to `x`.
fn affine_trans(a: Point, b: Point, c: Point, p: Point, q: Point, r: Point, x: Point) -> Point {
    // Barycentric coordinates of x in (a, b, c); the same weights apply to
    // the image triangle since T is affine.
    let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    let l1 = ((b.y - c.y) * (x.x - c.x) + (c.x - b.x) * (x.y - c.y)) / det;
    let l2 = ((c.y - a.y) * (x.x - c.x) + (a.x - c.x) * (x.y - c.y)) / det;
    let l3 = 1.0 - l1 - l2;
    make_point(l1 * p.x + l2 * q.x + l3 * r.x, l1 * p.y + l2 * q.y + l3 * r.y)
}

fn cell_corners(grid: &Array2<Point>, i: usize, j: usize) -> [Point; 4] {
    [grid[[i, j]], grid[[i + 1, j]], grid[[i + 1, j + 1]], grid[[i, j + 1]]]
}

/// Triangulated-affine advection of `(x, y)`, using the *original* cell
/// (identity corners) to locate the containing triangle and `proj`'s
/// corresponding corners as its image (spec §4.5, "Triangulated affine").
pub fn triangulated_advect(proj: &Array2<Point>, graticule: &Graticule, x: f64, y: f64) -> Point {
    let (lx, ly) = proj.dim();
    let i = (x - 0.5).clamp(0.0, lx as f64 - 2.0).floor() as usize;
    let j = (y - 0.5).clamp(0.0, ly as f64 - 2.0).floor() as usize;

    let diag = graticule.diagonals().get((i, j)).copied().unwrap_or(GraticuleDiagonal::Unset);
    // Pre-image corners at node centers (i+0.5, j+0.5), matching proj's own
    // node placement (bilinear_advect's disp and integrate_flow's seeding).
    let identity = [
        make_point(i as f64 + 0.5, j as f64 + 0.5),
        make_point(i as f64 + 1.5, j as f64 + 0.5),
        make_point(i as f64 + 1.5, j as f64 + 1.5),
        make_point(i as f64 + 0.5, j as f64 + 1.5),
    ];
    let image = cell_corners(proj, i, j);

    let (ia, ib, ic) = triangle_for_point(x, y, i, j, diag);
    affine_trans(
        identity[ia], identity[ib], identity[ic],
        image[ia], image[ib], image[ic],
        make_point(x, y),
    )
}

/// Advect every vertex of every GeoDiv through `proj`, using bilinear
/// interpolation unless `graticule` names a triangulated pass.
pub fn advect_geo_divs(geo_divs: &mut [GeoDiv], proj: &Array2<Point>, graticule: Option<&Graticule>) {
    for gd in geo_divs.iter_mut() {
        for pwh in gd.pwhs_mut().iter_mut() {
            advect_pwh(pwh, proj, graticule);
        }
    }
}

fn advect_pwh(pwh: &mut crate::geom::Pwh, proj: &Array2<Point>, graticule: Option<&Graticule>) {
    use crate::geom::{ensure_open, ring_from_open};

    let advect_ring = |ring: &crate::geom::Ring| {
        let points: Vec<Point> = ensure_open(ring)
            .into_iter()
            .map(|p| match graticule {
                Some(g) => triangulated_advect(proj, g, p.x, p.y),
                None => bilinear_advect(proj, p.x, p.y),
            })
            .collect();
        ring_from_open(points)
    };

    let new_exterior = advect_ring(pwh.exterior());
    let new_interiors: Vec<_> = pwh.interiors().iter().map(advect_ring).collect();
    *pwh = geo::Polygon::new(new_exterior, new_interiors);
}

/// Advance `cum_proj` by the same rule used for polygon vertices, composing
/// this step's projection with every prior one (spec §4.5's closing
/// paragraph; ordering resolved per DESIGN NOTES §9 as "after" advection).
pub fn advance_cum_proj(cum_proj: &mut Array2<Point>, proj: &Array2<Point>, graticule: Option<&Graticule>) {
    let (lx, ly) = cum_proj.dim();
    for i in 0..lx {
        for j in 0..ly {
            let p = cum_proj[[i, j]];
            cum_proj[[i, j]] = match graticule {
                Some(g) => triangulated_advect(proj, g, p.x, p.y),
                None => bilinear_advect(proj, p.x, p.y),
            };
        }
    }
}
