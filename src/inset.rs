//! `InsetState` (spec §3, §6, C9): the unit of work for the engine, bundling
//! one connected cluster's lattice, density, projection grids and polygons.
//!
//! Grounded on `inset_state.h`/`inset_state.cpp`'s field layout and its
//! `set_area_errors`/`max_area_error` pair.

use std::collections::HashMap;

use ndarray::Array2;

use crate::collab::TargetAreas;
use crate::density;
use crate::error::EngineResult;
use crate::geom::{make_point, GeoDiv, Point};
use crate::lattice::Lattice;
use crate::triangulate::Graticule;

/// One inset's full mutable state across the integration loop.
pub struct InsetState {
    geo_divs: Vec<GeoDiv>,
    target_areas: TargetAreas,
    lattice: Lattice,
    proj: Array2<Point>,
    cum_proj: Array2<Point>,
    graticule: Option<Graticule>,
    area_error: HashMap<String, f64>,
    n_finished_integrations: u32,
}

fn identity_grid(lx: usize, ly: usize) -> Array2<Point> {
    Array2::from_shape_fn((lx, ly), |(i, j)| make_point(i as f64 + 0.5, j as f64 + 0.5))
}

impl InsetState {
    /// `geo_divs` must already be rescaled into `[0, lx] x [0, ly]` (a
    /// collaborator responsibility per spec §6).
    pub fn new(geo_divs: Vec<GeoDiv>, target_areas: TargetAreas, lx: usize, ly: usize) -> Self {
        Self {
            geo_divs,
            target_areas,
            lattice: Lattice::new(lx, ly),
            proj: identity_grid(lx, ly),
            cum_proj: identity_grid(lx, ly),
            graticule: None,
            area_error: HashMap::new(),
            n_finished_integrations: 0,
        }
    }

    /// As [`InsetState::new`], taking the lattice dimensions from
    /// `config.lx`/`config.ly`. `lx`/`ly` are consumed here, at
    /// construction; the driver loop reads them back from the lattice this
    /// builds rather than from `config` again.
    pub fn from_config(geo_divs: Vec<GeoDiv>, target_areas: TargetAreas, config: &crate::config::EngineConfig) -> Self {
        Self::new(geo_divs, target_areas, config.lx, config.ly)
    }

    #[inline] pub fn geo_divs(&self) -> &[GeoDiv] { &self.geo_divs }
    #[inline] pub(crate) fn geo_divs_mut(&mut self) -> &mut Vec<GeoDiv> { &mut self.geo_divs }
    #[inline] pub fn target_areas(&self) -> &TargetAreas { &self.target_areas }
    #[inline] pub fn proj(&self) -> &Array2<Point> { &self.proj }
    #[inline] pub fn cum_proj(&self) -> &Array2<Point> { &self.cum_proj }
    #[inline] pub(crate) fn cum_proj_mut(&mut self) -> &mut Array2<Point> { &mut self.cum_proj }
    #[inline] pub fn graticule(&self) -> Option<&Graticule> { self.graticule.as_ref() }
    #[inline] pub(crate) fn set_graticule(&mut self, g: Option<Graticule>) { self.graticule = g; }
    #[inline] pub fn area_error(&self) -> &HashMap<String, f64> { &self.area_error }
    #[inline] pub fn n_finished_integrations(&self) -> u32 { self.n_finished_integrations }
    #[inline] pub(crate) fn bump_integrations(&mut self) { self.n_finished_integrations += 1; }

    pub fn lx(&self) -> usize { self.lattice.lx() }
    pub fn ly(&self) -> usize { self.lattice.ly() }

    /// Whether `id`'s target area is the missing-sentinel (spec §3).
    pub fn target_missing(&self, id: &str) -> bool {
        density::target_is_missing(&self.target_areas, id)
    }

    /// C2: fill `self.lattice`'s density field from `self.geo_divs` and
    /// `self.target_areas`, returning `ρ_mean` for C4. A plain method
    /// rather than a driver-side multi-field borrow, since `&mut
    /// self.lattice` alongside `&self.geo_divs`/`&self.target_areas` are
    /// disjoint fields of the same struct.
    pub(crate) fn rasterize_density(&mut self) -> EngineResult<f64> {
        density::rasterize(&mut self.lattice, &self.geo_divs, &self.target_areas)
    }

    pub(crate) fn forward_transform(&mut self) {
        self.lattice.forward();
    }

    pub(crate) fn blur(&mut self, sigma: f64) {
        crate::blur::blur(&mut self.lattice, sigma);
    }

    /// C4: integrate the flow induced by the (already blurred) density and
    /// write the result into `self.proj`.
    pub(crate) fn integrate_flow(&mut self, rho_mean: f64, eps_abs: f64, max_density_halvings: u32) -> EngineResult<()> {
        let field = crate::flow::FlowField::new(&self.lattice, rho_mean);
        self.proj = crate::flow::integrate_flow(&field, self.lattice.lx(), self.lattice.ly(), eps_abs, max_density_halvings)?;
        Ok(())
    }

    /// C7: pick a diagonal for every graticule cell implied by `self.proj`.
    pub(crate) fn pick_diagonals(&mut self) -> EngineResult<()> {
        self.graticule = Some(crate::triangulate::pick_diagonals(&self.proj)?);
        Ok(())
    }

    /// C6: densify every polygon against the original lattice.
    pub(crate) fn densify(&mut self) {
        crate::densify::densify_geo_divs(&mut self.geo_divs, self.lattice.lx(), self.lattice.ly());
    }

    /// C5: advect every polygon vertex through `self.proj`.
    pub(crate) fn advect(&mut self) {
        let graticule = self.graticule.as_ref();
        crate::advect::advect_geo_divs(&mut self.geo_divs, &self.proj, graticule);
    }

    /// Compose this step's projection into `cum_proj` (spec §4.5's closing
    /// paragraph; resolved as "after" advection per DESIGN NOTES §9).
    pub(crate) fn advance_cum_proj(&mut self) {
        let graticule = self.graticule.as_ref();
        crate::advect::advance_cum_proj(&mut self.cum_proj, &self.proj, graticule);
    }

    /// `max_g area_error(g)`, or `0.0` if no GeoDiv has a target yet.
    pub fn max_area_error(&self) -> f64 {
        self.area_error.values().cloned().fold(0.0, f64::max)
    }

    /// `area_error(g) = |area(g)/target*(g) - 1|`, where
    /// `target*(g) = target(g) · (Σarea / Σtarget)` over GeoDivs with a
    /// non-missing target (spec §4.8).
    pub(crate) fn recompute_area_errors(&mut self) {
        let mut sum_area = 0.0;
        let mut sum_target = 0.0;
        for gd in &self.geo_divs {
            if !self.target_missing(gd.id()) {
                sum_area += gd.area();
                sum_target += self.target_areas[gd.id()];
            }
        }
        let scale = if sum_target > 0.0 { sum_area / sum_target } else { 1.0 };

        let mut errors = HashMap::with_capacity(self.geo_divs.len());
        for gd in &self.geo_divs {
            if self.target_missing(gd.id()) {
                continue;
            }
            let target_star = self.target_areas[gd.id()] * scale;
            let err = if target_star != 0.0 { (gd.area() / target_star - 1.0).abs() } else { 0.0 };
            errors.insert(gd.id().to_string(), err);
        }
        self.area_error = errors;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{make_point as mp, ring_from_open};
    use geo::Polygon;

    fn square_gd(id: &str, x0: f64, side: f64) -> GeoDiv {
        let ring = ring_from_open(vec![
            mp(x0, 0.0),
            mp(x0 + side, 0.0),
            mp(x0 + side, side),
            mp(x0, side),
        ]);
        GeoDiv::new(id, vec![Polygon::new(ring, vec![])])
    }

    #[test]
    fn identity_grid_has_half_cell_offsets() {
        let inset = InsetState::new(vec![], TargetAreas::new(), 4, 4);
        assert_eq!(inset.cum_proj()[[0, 0]], mp(0.5, 0.5));
        assert_eq!(inset.cum_proj()[[3, 3]], mp(3.5, 3.5));
    }

    #[test]
    fn area_error_is_zero_for_perfectly_matched_geo_div() {
        let mut inset = InsetState::new(vec![square_gd("A", 0.0, 4.0)], TargetAreas::new(), 16, 16);
        inset.target_areas.insert("A".to_string(), 16.0);
        inset.recompute_area_errors();
        assert!(inset.area_error()["A"] < 1e-9);
        assert_eq!(inset.max_area_error(), inset.area_error()["A"]);
    }

    #[test]
    fn missing_target_geo_div_has_no_area_error_entry() {
        let mut inset = InsetState::new(vec![square_gd("A", 0.0, 4.0)], TargetAreas::new(), 16, 16);
        inset.recompute_area_errors();
        assert!(!inset.area_error().contains_key("A"));
        assert_eq!(inset.max_area_error(), 0.0);
    }
}
