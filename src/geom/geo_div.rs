//! `GeoDiv` (spec §3): one administrative region, possibly multi-part.

use std::collections::HashSet;

use geo::Area;
use smallvec::SmallVec;

use super::ring::Pwh;

/// Most GeoDivs are a single polygon; a handful (islands, exclaves) carry a
/// few more. `SmallVec` avoids a heap allocation for the common case, the
/// same tradeoff the teacher makes for its per-edge polygon-id lists.
pub type PwhList = SmallVec<[Pwh; 1]>;

/// One administrative region. `area()` is the sum of signed ring areas
/// across every `PolygonWithHoles`, per spec §3 — `geo::Polygon::signed_area`
/// already nets out holes (ccw exterior positive, cw holes negative), so
/// summing it across `pwhs` is exactly that sum.
#[derive(Debug, Clone)]
pub struct GeoDiv {
    id: String,
    pwhs: PwhList,
    adjacent_ids: HashSet<String>,
}

impl GeoDiv {
    pub fn new(id: impl Into<String>, pwhs: impl IntoIterator<Item = Pwh>) -> Self {
        Self { id: id.into(), pwhs: pwhs.into_iter().collect(), adjacent_ids: HashSet::new() }
    }

    #[inline] pub fn id(&self) -> &str { &self.id }
    #[inline] pub fn pwhs(&self) -> &[Pwh] { &self.pwhs }
    #[inline] pub fn pwhs_mut(&mut self) -> &mut PwhList { &mut self.pwhs }
    #[inline] pub fn adjacent_ids(&self) -> &HashSet<String> { &self.adjacent_ids }

    pub fn set_adjacent_ids(&mut self, adjacent_ids: HashSet<String>) {
        self.adjacent_ids = adjacent_ids;
    }

    pub fn add_adjacency(&mut self, other_id: impl Into<String>) {
        self.adjacent_ids.insert(other_id.into());
    }

    /// Sum of signed ring areas across every polygon-with-holes.
    pub fn area(&self) -> f64 {
        self.pwhs.iter().map(|pwh| pwh.signed_area()).sum()
    }

    /// Total vertex count across every ring (outer + holes) of every PWH.
    pub fn n_points(&self) -> usize {
        self.pwhs
            .iter()
            .map(|pwh| pwh.exterior().0.len().saturating_sub(1)
                + pwh.interiors().iter().map(|h| h.0.len().saturating_sub(1)).sum::<usize>())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{make_point, ring_from_open};
    use geo::Polygon;

    fn square(side: f64) -> Pwh {
        Polygon::new(
            ring_from_open(vec![
                make_point(0.0, 0.0),
                make_point(side, 0.0),
                make_point(side, side),
                make_point(0.0, side),
            ]),
            vec![],
        )
    }

    #[test]
    fn area_matches_square_side_length() {
        let gd = GeoDiv::new("A", vec![square(4.0)]);
        assert_eq!(gd.area(), 16.0);
    }

    #[test]
    fn area_nets_out_a_hole() {
        let hole = ring_from_open(vec![
            make_point(1.0, 1.0),
            make_point(1.0, 2.0),
            make_point(2.0, 2.0),
            make_point(2.0, 1.0),
        ]);
        let pwh = Polygon::new(square(4.0).exterior().clone(), vec![hole]);
        let gd = GeoDiv::new("A", vec![pwh]);
        assert_eq!(gd.area(), 15.0);
    }

    #[test]
    fn n_points_counts_open_form_vertices() {
        let gd = GeoDiv::new("A", vec![square(4.0)]);
        assert_eq!(gd.n_points(), 4);
    }

    #[test]
    fn adjacency_is_a_plain_string_graph() {
        let mut gd = GeoDiv::new("A", vec![square(1.0)]);
        gd.add_adjacency("B");
        gd.add_adjacency("C");
        assert_eq!(gd.adjacent_ids().len(), 2);
        assert!(gd.adjacent_ids().contains("B"));
    }
}
