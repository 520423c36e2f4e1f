use std::collections::HashMap;

use rayon::prelude::*;
use serde_json::{Map, Value};

use crate::geo::DataBounds;
use crate::map::graphics::ElementId;
use crate::map::tx::TransformMap;

/// One polygon: a closed outer ring and any number of closed holes.
/// Rings are flat `[x0, y0, x1, y1, ...]` arrays.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygone {
    pub outer_path: Vec<f64>,
    pub holes: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// One or more points, flat.
    Point { coordinates: Vec<f64> },
    Line { paths: Vec<Vec<f64>> },
    Polygon { polygones: Vec<Polygone> },
    Collection(Vec<Geometry>),
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry::Collection(Vec::new())
    }
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Self {
        Geometry::Point { coordinates: vec![x, y] }
    }

    /// Single polygon without holes. The ring is closed if needed.
    pub fn polygon(mut outer_path: Vec<f64>) -> Self {
        close_ring(&mut outer_path);
        Geometry::Polygon {
            polygones: vec![Polygone { outer_path, holes: Vec::new() }],
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point { coordinates } => coordinates.len() < 2,
            Geometry::Line { paths } => paths.iter().all(|p| p.len() < 2),
            Geometry::Polygon { polygones } => polygones.iter().all(|p| p.outer_path.len() < 2),
            Geometry::Collection(items) => items.iter().all(Geometry::is_empty),
        }
    }

    /// Visit every `(x, y)` pair.
    pub fn for_each_coord(&self, f: &mut impl FnMut(f64, f64)) {
        self.for_each_path(&mut |path, _| {
            for pair in path.chunks_exact(2) {
                f(pair[0], pair[1]);
            }
        });
    }

    /// Visit every flat coordinate array with its kind.
    pub fn for_each_path(&self, f: &mut impl FnMut(&[f64], PathKind)) {
        match self {
            Geometry::Point { coordinates } => f(coordinates, PathKind::Points),
            Geometry::Line { paths } => paths.iter().for_each(|p| f(p, PathKind::Open)),
            Geometry::Polygon { polygones } => {
                for polygon in polygones {
                    f(&polygon.outer_path, PathKind::Ring);
                    polygon.holes.iter().for_each(|h| f(h, PathKind::Ring));
                }
            }
            Geometry::Collection(items) => items.iter().for_each(|g| g.for_each_path(f)),
        }
    }

    /// Copy of this geometry with every coordinate passed through `f`.
    pub fn map_coords(&self, f: &impl Fn(f64, f64) -> (f64, f64)) -> Geometry {
        let map_flat = |flat: &Vec<f64>| -> Vec<f64> {
            let mut out = Vec::with_capacity(flat.len());
            for pair in flat.chunks_exact(2) {
                let (x, y) = f(pair[0], pair[1]);
                out.push(x);
                out.push(y);
            }
            out
        };
        match self {
            Geometry::Point { coordinates } => Geometry::Point { coordinates: map_flat(coordinates) },
            Geometry::Line { paths } => Geometry::Line { paths: paths.iter().map(map_flat).collect() },
            Geometry::Polygon { polygones } => Geometry::Polygon {
                polygones: polygones
                    .iter()
                    .map(|p| Polygone {
                        outer_path: map_flat(&p.outer_path),
                        holes: p.holes.iter().map(map_flat).collect(),
                    })
                    .collect(),
            },
            Geometry::Collection(items) => Geometry::Collection(items.iter().map(|g| g.map_coords(f)).collect()),
        }
    }

    /// Bounds of the raw coordinates.
    pub fn bounds(&self) -> DataBounds {
        let mut bounds = DataBounds::empty();
        self.for_each_coord(&mut |x, y| bounds.extend(x, y));
        bounds
    }

    /// Bounds after passing each coordinate through `f`, without allocating.
    pub fn projected_bounds(&self, f: impl Fn(f64, f64) -> (f64, f64)) -> DataBounds {
        let mut bounds = DataBounds::empty();
        self.for_each_coord(&mut |x, y| {
            let (px, py) = f(x, y);
            bounds.extend(px, py);
        });
        bounds
    }

    /// Even-odd point-in-polygon over every ring. Points and lines never
    /// contain anything.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        self.for_each_path(&mut |path, kind| {
            if kind == PathKind::Ring && ring_contains(path, x, y) {
                inside = !inside;
            }
        });
        inside
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Points,
    Open,
    Ring,
}

/// Append the first point when the ring is not closed.
pub fn close_ring(ring: &mut Vec<f64>) {
    let n = ring.len();
    if n >= 4 && (ring[0] != ring[n - 2] || ring[1] != ring[n - 1]) {
        let (x, y) = (ring[0], ring[1]);
        ring.push(x);
        ring.push(y);
    }
}

fn ring_contains(ring: &[f64], x: f64, y: f64) -> bool {
    let n = ring.len() / 2;
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (ring[2 * i], ring[2 * i + 1]);
        let (xj, yj) = (ring[2 * j], ring[2 * j + 1]);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// A renderable map entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoFeature {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    /// Source geometry in longitude/latitude.
    pub geometry: Geometry,
    /// Geometry in data units under the governing transform record.
    pub projected: Geometry,
    /// Nested features of a group.
    pub children: Vec<GeoFeature>,
    /// Retained element drawn for this feature, owned by the map layer.
    pub element: Option<ElementId>,
}

impl GeoFeature {
    pub fn new(id: Option<String>, properties: Map<String, Value>, geometry: Geometry) -> Self {
        Self {
            id,
            properties,
            geometry,
            ..Default::default()
        }
    }

    pub fn group(id: Option<String>, properties: Map<String, Value>, children: Vec<GeoFeature>) -> Self {
        Self {
            id,
            properties,
            children,
            ..Default::default()
        }
    }

    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn name(&self) -> Option<&str> {
        self.property("name").and_then(Value::as_str)
    }

    /// Recompute `projected` (and the children's) from the source geometry.
    pub fn reproject(&mut self, tx: &TransformMap) {
        let id = self.id.as_deref();
        self.projected = self.geometry.map_coords(&|lon, lat| tx.project_for(id, lon, lat));
        for child in &mut self.children {
            child.reproject(tx);
        }
    }

    /// Data-unit bounds of this feature and its children.
    pub fn projected_bounds(&self) -> DataBounds {
        self.children
            .iter()
            .fold(self.projected.bounds(), |acc, child| acc.union(&child.projected_bounds()))
    }

    /// Lon/lat bounds of this feature and its children.
    pub fn source_bounds(&self) -> DataBounds {
        self.children
            .iter()
            .fold(self.geometry.bounds(), |acc, child| acc.union(&child.source_bounds()))
    }

    /// Source geometry including children, for transform lookups.
    pub fn flattened_geometry(&self) -> Geometry {
        if self.children.is_empty() {
            return self.geometry.clone();
        }
        let mut items = vec![self.geometry.clone()];
        items.extend(self.children.iter().map(GeoFeature::flattened_geometry));
        Geometry::Collection(items)
    }
}

/// Arena of features addressed by id. Groups are indexed recursively so
/// nested features resolve too.
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    features: Vec<GeoFeature>,
    index: HashMap<String, Vec<usize>>,
}

impl FeatureStore {
    pub fn new(features: Vec<GeoFeature>) -> Self {
        let mut store = Self {
            features,
            index: HashMap::new(),
        };
        store.rebuild_index();
        store
    }

    fn rebuild_index(&mut self) {
        fn walk(features: &[GeoFeature], prefix: &mut Vec<usize>, index: &mut HashMap<String, Vec<usize>>) {
            for (i, feature) in features.iter().enumerate() {
                prefix.push(i);
                if let Some(id) = &feature.id {
                    index.entry(id.clone()).or_insert_with(|| prefix.clone());
                }
                walk(&feature.children, prefix, index);
                prefix.pop();
            }
        }
        self.index.clear();
        walk(&self.features, &mut Vec::new(), &mut self.index);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Top-level features.
    pub fn iter(&self) -> impl Iterator<Item = &GeoFeature> {
        self.features.iter()
    }

    /// Every feature, depth first, groups before their children.
    pub fn iter_all(&self) -> Vec<&GeoFeature> {
        fn walk<'a>(features: &'a [GeoFeature], out: &mut Vec<&'a GeoFeature>) {
            for feature in features {
                out.push(feature);
                walk(&feature.children, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.features, &mut out);
        out
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&GeoFeature> {
        let path = self.index.get(id)?;
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.features.get(*first)?, |feature, &i| feature.children.get(i))
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut GeoFeature> {
        let path = self.index.get(id)?;
        let (first, rest) = path.split_first()?;
        let mut feature = self.features.get_mut(*first)?;
        for &i in rest {
            feature = feature.children.get_mut(i)?;
        }
        Some(feature)
    }

    /// Reproject every feature in parallel and return the combined bounds.
    pub fn reproject_all(&mut self, tx: &TransformMap) -> DataBounds {
        self.features
            .par_iter_mut()
            .map(|feature| {
                feature.reproject(tx);
                feature.projected_bounds()
            })
            .reduce(DataBounds::empty, |a, b| a.union(&b))
    }

    /// Reproject one feature. `None` when the id is unknown.
    pub fn reproject(&mut self, id: &str, tx: &TransformMap) -> Option<DataBounds> {
        let feature = self.get_mut(id)?;
        feature.reproject(tx);
        Some(feature.projected_bounds())
    }

    /// Combined data-unit bounds of all features.
    pub fn bounds(&self) -> DataBounds {
        self.features
            .iter()
            .fold(DataBounds::empty(), |acc, f| acc.union(&f.projected_bounds()))
    }

    /// Innermost feature whose projected polygons contain a data-unit point.
    pub fn feature_at(&self, x: f64, y: f64) -> Option<&GeoFeature> {
        fn find<'a>(features: &'a [GeoFeature], x: f64, y: f64) -> Option<&'a GeoFeature> {
            features.iter().rev().find_map(|feature| {
                find(&feature.children, x, y).or_else(|| {
                    let hit = feature.projected_bounds().contains(x, y) && feature.projected.contains(x, y);
                    hit.then_some(feature)
                })
            })
        }
        find(&self.features, x, y)
    }

    /// Detach every feature's element handle, used when the map layer is rebuilt.
    pub fn clear_elements(&mut self) {
        fn walk(features: &mut [GeoFeature]) {
            for feature in features {
                feature.element = None;
                walk(&mut feature.children);
            }
        }
        walk(&mut self.features);
    }

    pub fn set_element(&mut self, id: &str, element: ElementId) {
        if let Some(feature) = self.get_mut(id) {
            feature.element = Some(element);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::tx::TransformRecord;
    use crate::map::projection::Crs;

    fn feature(id: &str, ring: Vec<f64>) -> GeoFeature {
        GeoFeature::new(Some(id.to_string()), Map::new(), Geometry::polygon(ring))
    }

    #[test]
    fn test_polygon_ring_is_closed() {
        let geom = Geometry::polygon(vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0]);
        let Geometry::Polygon { polygones } = geom else { panic!("not a polygon") };
        assert_eq!(polygones[0].outer_path, vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_contains_respects_holes() {
        let geom = Geometry::Polygon {
            polygones: vec![Polygone {
                outer_path: vec![0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0, 0.0, 0.0],
                holes: vec![vec![4.0, 4.0, 6.0, 4.0, 6.0, 6.0, 4.0, 6.0, 4.0, 4.0]],
            }],
        };
        assert!(geom.contains(1.0, 1.0));
        assert!(!geom.contains(5.0, 5.0));
        assert!(!geom.contains(11.0, 5.0));
    }

    #[test]
    fn test_nested_features_are_indexed() {
        let child = feature("child", vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0]);
        let group = GeoFeature::group(Some("group".into()), Map::new(), vec![child]);
        let store = FeatureStore::new(vec![group, feature("solo", vec![5.0, 5.0, 6.0, 5.0, 6.0, 6.0])]);

        assert!(store.get("child").is_some());
        assert!(store.get("group").is_some_and(GeoFeature::is_group));
        assert_eq!(store.iter_all().len(), 3);
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_reproject_all_uses_transform_map() {
        let mut store = FeatureStore::new(vec![
            feature("a", vec![0.0, 0.0, 10.0, 0.0, 10.0, 10.0]),
            feature("b", vec![20.0, 20.0, 30.0, 20.0, 30.0, 30.0]),
        ]);
        let tx = TransformMap::new(TransformRecord::new(Crs::Wsg84).with_scale(2.0));
        let bounds = store.reproject_all(&tx);
        assert_eq!(bounds, DataBounds::new(0.0, 0.0, 60.0, 60.0));

        // The source geometry is untouched.
        assert_eq!(store.get("a").map(|f| f.geometry.bounds()), Some(DataBounds::new(0.0, 0.0, 10.0, 10.0)));
        assert_eq!(store.feature_at(50.0, 45.0).and_then(|f| f.id.as_deref()), Some("b"));
    }
}
