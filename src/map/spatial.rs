use std::collections::HashMap;

use crate::geo::DataBounds;
use crate::map::geometry::FeatureStore;

/// Number of cells along the longer side of the indexed range.
const CELLS_PER_SIDE: f64 = 32.0;

/// Spatial index for features in data units using conservative approximation.
/// Each feature's bounding box is indexed into every cell it overlaps,
/// guaranteeing no false negatives while allowing false positives
/// (eliminated by the polygon test in `hit`).
#[derive(Debug, Clone, Default)]
pub struct FeatureGrid {
    cells: HashMap<(i32, i32), Vec<usize>>,
    /// Feature ids in draw order, parents before children.
    ids: Vec<String>,
    cell_size: f64,
}

impl FeatureGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            ids: Vec::new(),
            cell_size: if cell_size > 0.0 && cell_size.is_finite() { cell_size } else { 1.0 },
        }
    }

    #[inline(always)]
    fn to_cell(&self, x: f64, y: f64) -> (i32, i32) {
        ((x / self.cell_size).floor() as i32, (y / self.cell_size).floor() as i32)
    }

    /// Index every identified feature of `store` by its projected bounds.
    pub fn build(store: &FeatureStore) -> Self {
        let range = store.bounds();
        let side = range.width().max(range.height());
        let mut grid = Self::new(if range.is_empty() { 1.0 } else { side / CELLS_PER_SIDE });

        for feature in store.iter_all() {
            let Some(id) = &feature.id else { continue };
            let bounds = feature.projected_bounds();
            if bounds.is_empty() {
                continue;
            }
            let idx = grid.ids.len();
            grid.ids.push(id.clone());
            grid.insert(idx, &bounds);
        }
        grid
    }

    fn insert(&mut self, idx: usize, bounds: &DataBounds) {
        let min_cell = self.to_cell(bounds.min_x, bounds.min_y);
        let max_cell = self.to_cell(bounds.max_x, bounds.max_y);
        for y in min_cell.1..=max_cell.1 {
            for x in min_cell.0..=max_cell.0 {
                self.cells.entry((x, y)).or_default().push(idx);
            }
        }
    }

    /// Append feature indices for the given bounds into results vec.
    /// May contain duplicates; caller should dedup after all queries.
    pub fn query_into(&self, bounds: &DataBounds, results: &mut Vec<usize>) {
        if bounds.is_empty() {
            return;
        }
        let min_cell = self.to_cell(bounds.min_x, bounds.min_y);
        let max_cell = self.to_cell(bounds.max_x, bounds.max_y);
        for y in min_cell.1..=max_cell.1 {
            for x in min_cell.0..=max_cell.0 {
                if let Some(indices) = self.cells.get(&(x, y)) {
                    results.extend_from_slice(indices);
                }
            }
        }
    }

    /// Ids of features whose bounds may touch `bounds`, in draw order.
    pub fn candidates(&self, bounds: &DataBounds) -> Vec<&str> {
        let mut indices = Vec::new();
        self.query_into(bounds, &mut indices);
        indices.sort_unstable();
        indices.dedup();
        indices.into_iter().map(|i| self.ids[i].as_str()).collect()
    }

    /// Topmost feature whose projected geometry contains a data-unit point.
    pub fn hit<'a>(&self, store: &'a FeatureStore, x: f64, y: f64) -> Option<&'a str> {
        let probe = DataBounds::new(x, y, x, y);
        self.candidates(&probe).into_iter().rev().find_map(|id| {
            let feature = store.get(id)?;
            let hit = feature.projected_bounds().contains(x, y) && feature.projected.contains(x, y);
            hit.then(|| feature.id.as_deref()).flatten()
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::geometry::{GeoFeature, Geometry};
    use serde_json::Map;

    fn square(id: &str, x: f64, y: f64, size: f64) -> GeoFeature {
        let mut feature = GeoFeature::new(
            Some(id.to_string()),
            Map::new(),
            Geometry::polygon(vec![x, y, x + size, y, x + size, y + size, x, y + size]),
        );
        feature.projected = feature.geometry.clone();
        feature
    }

    #[test]
    fn test_hit_prefers_later_features() {
        let store = FeatureStore::new(vec![square("big", 0.0, 0.0, 100.0), square("small", 10.0, 10.0, 5.0)]);
        let grid = FeatureGrid::build(&store);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.hit(&store, 12.0, 12.0), Some("small"));
        assert_eq!(grid.hit(&store, 50.0, 50.0), Some("big"));
        assert_eq!(grid.hit(&store, 150.0, 50.0), None);
    }

    #[test]
    fn test_candidates_are_deduplicated() {
        let store = FeatureStore::new(vec![square("a", 0.0, 0.0, 100.0)]);
        let grid = FeatureGrid::build(&store);
        let found = grid.candidates(&DataBounds::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(found, vec!["a"]);
    }
}
