//! Density rasterizer (spec §4.2, C2): horizontal scanline fill at
//! half-cell rays.

use std::collections::HashMap;

use geo::{BoundingRect, Rect};
use rstar::{RTree, RTreeObject, AABB};

use crate::collab::TargetAreas;
use crate::error::{EngineError, EngineResult};
use crate::geom::{ensure_open, GeoDiv, Point};
use crate::lattice::Lattice;

/// Sub-lattice offset added to every scanline ray so that a ray grazing a
/// vertex is resolved consistently rather than double- or zero-counted
/// (spec §4.2 step 4).
const RAY_EPSILON: f64 = 1e-6;

/// Bounding box of one GeoDiv, for pruning which regions a scanline row
/// needs to visit. Mirrors the `BoundingBox` + `RTree` pattern used
/// elsewhere in this codebase's lineage for spatial pre-filtering.
struct GeoDivBox {
    idx: usize,
    bbox: Rect<f64>,
}

impl RTreeObject for GeoDivBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

fn geo_div_bbox(gd: &GeoDiv) -> Option<Rect<f64>> {
    gd.pwhs()
        .iter()
        .filter_map(|pwh| pwh.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                geo::Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                geo::Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )
        })
}

/// Whether a target area is present: spec §3 encodes "missing" as any
/// value `≤ 0`. A key that is simply absent from the map is also missing.
pub fn target_is_missing(target_areas: &TargetAreas, id: &str) -> bool {
    !matches!(target_areas.get(id), Some(v) if *v > 0.0)
}

/// Per-GeoDiv target density `d(g) = t(g)/area(g) - ρ_mean` (spec §4.2 step 2),
/// plus `ρ_mean` itself: the flow integrator (C4) needs it to recover the
/// absolute (non-negative) density from the zero-mean field rasterized here.
fn target_densities(geo_divs: &[GeoDiv], target_areas: &TargetAreas) -> EngineResult<(HashMap<String, f64>, f64)> {
    let mut total_area = 0.0;
    let mut total_target = 0.0;
    for gd in geo_divs {
        if !target_is_missing(target_areas, gd.id()) {
            total_area += gd.area();
            total_target += target_areas[gd.id()];
        }
    }
    if total_target <= 0.0 {
        return Err(EngineError::ZeroTargetSum);
    }
    let rho_mean = total_target / total_area;

    let mut densities = HashMap::with_capacity(geo_divs.len());
    for gd in geo_divs {
        let d = if target_is_missing(target_areas, gd.id()) {
            0.0
        } else {
            target_areas[gd.id()] / gd.area() - rho_mean
        };
        densities.insert(gd.id().to_string(), d);
    }
    Ok((densities, rho_mean))
}

/// X-coordinates where a horizontal ray `y = ray` crosses every edge of
/// `points`. Edges exactly parallel to the ray never cross it.
fn add_ring_crossings(out: &mut Vec<f64>, points: &[Point], ray: f64) {
    let n = points.len();
    if n < 2 {
        return;
    }
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        if a.y == b.y {
            continue;
        }
        // Strict sign test: exactly one endpoint is above the ray. The
        // epsilon added to `ray` by the caller resolves the case where an
        // original (un-offset) ray would have grazed a vertex exactly.
        if (a.y - ray) * (b.y - ray) < 0.0 {
            let t = (ray - a.y) / (b.y - a.y);
            out.push(a.x + t * (b.x - a.x));
        }
    }
}

/// Fill `lattice.rho_init` from `geo_divs` and `target_areas` (spec §4.2).
/// Returns `ρ_mean`, the average target density, needed downstream by C4.
pub fn rasterize(lattice: &mut Lattice, geo_divs: &[GeoDiv], target_areas: &TargetAreas) -> EngineResult<f64> {
    let (densities, rho_mean) = target_densities(geo_divs, target_areas)?;
    lattice.rho_init_mut().fill(0.0);

    let lx = lattice.lx();
    let ly = lattice.ly();

    let boxes: Vec<GeoDivBox> = geo_divs
        .iter()
        .enumerate()
        .filter_map(|(idx, gd)| geo_div_bbox(gd).map(|bbox| GeoDivBox { idx, bbox }))
        .collect();
    let rtree = RTree::bulk_load(boxes);

    for j in 0..ly {
        let ray = j as f64 + 0.5 + RAY_EPSILON;
        let query = AABB::from_corners([0.0, j as f64], [lx as f64, (j + 1) as f64]);

        // Each GeoDiv's own crossings are paired among themselves (exterior
        // plus holes combined, even-odd), never merged with another
        // GeoDiv's crossings before pairing. A global merge-then-pair would
        // tie-break ambiguously wherever two GeoDivs share a border exactly
        // on a ray, silently handing one geodiv's density to the other's
        // interval.
        for candidate in rtree.locate_in_envelope_intersecting(&query) {
            let gd = &geo_divs[candidate.idx];
            let density = densities[gd.id()];

            let mut xs = Vec::new();
            for pwh in gd.pwhs() {
                add_ring_crossings(&mut xs, &ensure_open(pwh.exterior()), ray);
                for hole in pwh.interiors() {
                    add_ring_crossings(&mut xs, &ensure_open(hole), ray);
                }
            }

            if xs.len() % 2 != 0 {
                return Err(EngineError::InvalidTopology {
                    geo_div_id: gd.id().to_string(),
                    detail: format!("row {j}: odd intersection count ({}) on ray y={ray}", xs.len()),
                });
            }

            xs.sort_by(|a, b| a.partial_cmp(b).expect("ray coordinates are finite"));

            for pair in xs.chunks_exact(2) {
                let (x_l, x_r) = (pair[0], pair[1]);
                // Cells whose center (i + 0.5) falls strictly inside [x_l, x_r).
                let i_start = (x_l - 0.5).ceil().max(0.0) as usize;
                let i_end_f = (x_r - 0.5).floor();
                if i_end_f < i_start as f64 {
                    continue;
                }
                let i_end = (i_end_f as usize).min(lx.saturating_sub(1));
                for i in i_start..=i_end {
                    lattice.rho_init_mut()[[i, j]] += density;
                }
            }
        }
    }

    Ok(rho_mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{make_point, ring_from_open};
    use geo::Polygon;
    use approx::assert_abs_diff_eq;

    fn square_gd(id: &str, x0: f64, y0: f64, side: f64) -> GeoDiv {
        let ring = ring_from_open(vec![
            make_point(x0, y0),
            make_point(x0 + side, y0),
            make_point(x0 + side, y0 + side),
            make_point(x0, y0 + side),
        ]);
        GeoDiv::new(id, vec![Polygon::new(ring, vec![])])
    }

    #[test]
    fn uniform_target_yields_zero_density() {
        let gds = vec![square_gd("A", 1.0, 1.0, 8.0)];
        let mut targets = TargetAreas::new();
        targets.insert("A".into(), 64.0);

        let mut lattice = Lattice::new(16, 16);
        let rho_mean = rasterize(&mut lattice, &gds, &targets).unwrap();
        assert_abs_diff_eq!(rho_mean, 1.0, epsilon = 1e-9);

        for i in 0..16 {
            for j in 0..16 {
                assert_abs_diff_eq!(lattice.rho_init()[[i, j]], 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn missing_target_contributes_zero_density() {
        let gds = vec![square_gd("A", 1.0, 1.0, 8.0)];
        let targets = TargetAreas::new();
        let mut lattice = Lattice::new(16, 16);
        let err = rasterize(&mut lattice, &gds, &targets).unwrap_err();
        assert_eq!(err, EngineError::ZeroTargetSum);
    }

    #[test]
    fn nonzero_target_skews_density_away_from_mean() {
        let gds = vec![square_gd("A", 0.0, 0.0, 8.0), square_gd("B", 8.0, 0.0, 8.0)];
        let mut targets = TargetAreas::new();
        targets.insert("A".into(), 16.0);
        targets.insert("B".into(), 48.0);

        let mut lattice = Lattice::new(16, 16);
        rasterize(&mut lattice, &gds, &targets).unwrap();

        // A is under-target (density below mean) and B is over-target.
        assert!(lattice.rho_init()[[2, 2]] < 0.0);
        assert!(lattice.rho_init()[[10, 2]] > 0.0);
    }

    #[test]
    fn shared_border_assigns_correct_density_to_each_side() {
        // A and B share the vertical border at x=8 exactly, so their
        // scanline crossings coincide there on every row. Cells flanking
        // the border (i=7 in A, i=8 in B) must still get their own
        // GeoDiv's density rather than whichever crossing happened to
        // sort first at the tie.
        let gds = vec![square_gd("A", 0.0, 0.0, 8.0), square_gd("B", 8.0, 0.0, 8.0)];
        let mut targets = TargetAreas::new();
        targets.insert("A".into(), 16.0);
        targets.insert("B".into(), 48.0);

        let mut lattice = Lattice::new(16, 16);
        rasterize(&mut lattice, &gds, &targets).unwrap();

        for j in 0..16 {
            assert!(lattice.rho_init()[[7, j]] < 0.0);
            assert!(lattice.rho_init()[[8, j]] > 0.0);
        }
    }
}
