//! Map series: data points bound to features or coordinates.
//!
//! The chart owns series through a [`SeriesCoordinator`] and talks to them only
//! through the [`Series`] trait.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::geo::Rect;
use crate::map::geometry::FeatureStore;
use crate::map::labels::OverlapMode;
use crate::map::scale::GeoScale;
use crate::map::state::ConsistencyState;

/// Size of one text cell in screen pixels.
pub const CHAR_WIDTH: f64 = 2.0;
pub const CHAR_HEIGHT: f64 = 4.0;

/// Number of fill buckets used by choropleth colouring.
pub const COLOR_BUCKETS: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeriesType {
    Choropleth,
    Bubble,
    Marker,
}

impl SeriesType {
    pub fn name(self) -> &'static str {
        match self {
            SeriesType::Choropleth => "choropleth",
            SeriesType::Bubble => "bubble",
            SeriesType::Marker => "marker",
        }
    }

    /// Point shapes keep their pixel size while the map layer zooms, so they
    /// are redrawn on every animation frame.
    pub fn redraws_on_zoom(self) -> bool {
        !matches!(self, SeriesType::Choropleth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointState {
    Normal,
    Hovered,
    Selected,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap_mode: Option<OverlapMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labelrank: Option<f64>,
}

impl DataPoint {
    pub fn region(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: Some(id.into()),
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn at(long: f64, lat: f64, value: f64) -> Self {
        Self {
            long: Some(long),
            lat: Some(lat),
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesConfig {
    #[serde(rename = "seriesType")]
    pub series_type: SeriesType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub labels: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap_mode: Option<OverlapMode>,
    #[serde(default)]
    pub data: Vec<DataPoint>,
}

impl SeriesConfig {
    pub fn new(series_type: SeriesType, data: Vec<DataPoint>) -> Self {
        Self {
            series_type,
            name: None,
            enabled: true,
            labels: true,
            overlap_mode: None,
            data,
        }
    }
}

/// What a series reads from the chart while calculating and drawing.
pub struct SeriesContext<'a> {
    pub scale: &'a GeoScale,
    pub features: &'a FeatureStore,
    /// Map layer transform: screen = local * zoom + offset.
    pub zoom: f64,
    pub offset: (f64, f64),
}

impl SeriesContext<'_> {
    fn to_screen(&self, (x, y): (f64, f64)) -> (f64, f64) {
        (x * self.zoom + self.offset.0, y * self.zoom + self.offset.1)
    }
}

/// A label laid out on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelGlyph {
    pub index: usize,
    pub text: String,
    pub bounds: Rect,
}

/// A drawn point shape in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeriesStatistics {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub average: f64,
    pub points_count: usize,
}

/// Interface the chart uses to drive a series.
pub trait Series {
    fn index(&self) -> usize;
    fn set_index(&mut self, index: usize);
    fn series_type(&self) -> SeriesType;
    fn name(&self) -> &str;
    fn enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);
    fn overlap_mode(&self) -> Option<OverlapMode>;
    fn labels_enabled(&self) -> bool;

    /// Bind points to the installed features.
    fn set_geo_data(&mut self, features: &FeatureStore);
    fn points(&self) -> std::slice::Iter<'_, DataPoint>;

    /// Resolve point anchors in map-layer pixels.
    fn calculate(&mut self, ctx: &SeriesContext<'_>);
    /// Lay out markers and labels on screen.
    fn draw(&mut self, ctx: &SeriesContext<'_>);
    fn invalidate(&mut self, states: ConsistencyState);
    fn is_consistent(&self) -> bool;

    /// Screen bounds of the label of point `index`, `None` when it has none.
    fn label_bounds(&self, index: usize, state: PointState) -> Option<Rect>;
    /// Visibility decided by the overlap resolver, `(point, visible)`.
    fn set_labels_drawing_map(&mut self, states: Vec<(usize, bool)>);
    fn redraw_on_zoom_frame(&self) -> bool;

    /// Visible labels after overlap resolution.
    fn labels(&self) -> Vec<LabelGlyph>;
    fn markers(&self) -> &[Marker];
    /// Map-layer pixel anchor of point `index`.
    fn anchor(&self, index: usize) -> Option<(f64, f64)>;
    /// Fill bucket for the feature `id`, choropleth only.
    fn fill_bucket(&self, id: &str) -> Option<u8>;

    fn select(&mut self, indexes: &[usize]);
    fn selected(&self) -> Vec<usize>;

    fn statistics(&self) -> SeriesStatistics;
    fn config(&self) -> SeriesConfig;
}

/// Bucket of `value` within `[min, max]`, `0..buckets`.
pub fn color_bucket(value: f64, min: f64, max: f64, buckets: u8) -> u8 {
    if buckets == 0 || !value.is_finite() {
        return 0;
    }
    let span = max - min;
    if !(span > 0.0) {
        return buckets / 2;
    }
    let t = ((value - min) / span).clamp(0.0, 1.0);
    ((t * buckets as f64).floor() as u8).min(buckets - 1)
}

/// The stock series implementation for choropleth, bubble and marker data.
#[derive(Debug, Clone)]
pub struct MapSeries {
    index: usize,
    config: SeriesConfig,
    /// Feature id each point resolved to, when it has one.
    bound: Vec<Option<String>>,
    anchors: Vec<Option<(f64, f64)>>,
    label_text: Vec<Option<String>>,
    label_rects: Vec<Option<Rect>>,
    label_visible: Vec<bool>,
    markers: Vec<Marker>,
    selected: BTreeSet<usize>,
    stats: SeriesStatistics,
    dirty: ConsistencyState,
}

impl MapSeries {
    pub fn new(config: SeriesConfig) -> Self {
        let n = config.data.len();
        let mut series = Self {
            index: 0,
            config,
            bound: vec![None; n],
            anchors: vec![None; n],
            label_text: vec![None; n],
            label_rects: vec![None; n],
            label_visible: vec![true; n],
            markers: Vec::new(),
            selected: BTreeSet::new(),
            stats: SeriesStatistics::default(),
            dirty: ConsistencyState::SERIES | ConsistencyState::LABELS,
        };
        series.stats = series.compute_statistics();
        series
    }

    pub fn choropleth(data: Vec<DataPoint>) -> Self {
        Self::new(SeriesConfig::new(SeriesType::Choropleth, data))
    }

    pub fn bubble(data: Vec<DataPoint>) -> Self {
        Self::new(SeriesConfig::new(SeriesType::Bubble, data))
    }

    pub fn marker(data: Vec<DataPoint>) -> Self {
        Self::new(SeriesConfig::new(SeriesType::Marker, data))
    }

    pub fn with_overlap_mode(mut self, mode: OverlapMode) -> Self {
        self.config.overlap_mode = Some(mode);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    fn compute_statistics(&self) -> SeriesStatistics {
        let values: Vec<f64> = self
            .config
            .data
            .iter()
            .filter_map(|p| p.value)
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            return SeriesStatistics::default();
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = values.iter().sum();
        SeriesStatistics {
            min,
            max,
            sum,
            average: sum / values.len() as f64,
            points_count: values.len(),
        }
    }

    fn bubble_radius(&self, point: &DataPoint) -> f64 {
        if let Some(size) = point.size {
            return size.max(1.0);
        }
        match self.config.series_type {
            SeriesType::Bubble => {
                let value = point.value.unwrap_or(0.0).abs();
                let max = self.stats.max.abs().max(self.stats.min.abs());
                if max > 0.0 {
                    1.0 + 3.0 * (value / max).sqrt()
                } else {
                    1.0
                }
            }
            _ => 1.0,
        }
    }
}

impl Series for MapSeries {
    fn index(&self) -> usize {
        self.index
    }

    fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    fn series_type(&self) -> SeriesType {
        self.config.series_type
    }

    fn name(&self) -> &str {
        self.config.name.as_deref().unwrap_or(self.config.series_type.name())
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        if self.config.enabled != enabled {
            self.config.enabled = enabled;
            self.dirty |= ConsistencyState::SERIES | ConsistencyState::LABELS;
        }
    }

    fn overlap_mode(&self) -> Option<OverlapMode> {
        self.config.overlap_mode
    }

    fn labels_enabled(&self) -> bool {
        self.config.labels
    }

    fn set_geo_data(&mut self, features: &FeatureStore) {
        self.bound = self
            .config
            .data
            .iter()
            .map(|p| p.id.clone().filter(|id| features.contains(id)))
            .collect();
        self.label_text = self
            .config
            .data
            .iter()
            .zip(&self.bound)
            .map(|(point, bound)| {
                point.name.clone().or_else(|| {
                    let feature = bound.as_deref().and_then(|id| features.get(id))?;
                    feature.name().map(str::to_string).or_else(|| feature.id.clone())
                })
            })
            .collect();
        self.dirty |= ConsistencyState::SERIES | ConsistencyState::LABELS;
    }

    fn points(&self) -> std::slice::Iter<'_, DataPoint> {
        self.config.data.iter()
    }

    fn calculate(&mut self, ctx: &SeriesContext<'_>) {
        self.anchors = self
            .config
            .data
            .iter()
            .zip(&self.bound)
            .map(|(point, bound)| {
                let data = match (point.long, point.lat, bound) {
                    (Some(lon), Some(lat), _) if self.config.series_type != SeriesType::Choropleth => {
                        Some(ctx.scale.tx().pick_tx(lon, lat).project(lon, lat))
                    }
                    (_, _, Some(id)) => ctx.features.get(id).map(|f| f.projected_bounds().center()),
                    _ => None,
                }?;
                let px = ctx.scale.scale_to_px(data.0, data.1);
                (px.0.is_finite() && px.1.is_finite()).then_some(px)
            })
            .collect();
        self.stats = self.compute_statistics();
    }

    fn draw(&mut self, ctx: &SeriesContext<'_>) {
        let n = self.config.data.len();
        self.markers.clear();
        self.label_rects = vec![None; n];
        if self.label_visible.len() != n {
            self.label_visible = vec![true; n];
        }
        if !self.config.enabled {
            self.dirty.remove(ConsistencyState::SERIES);
            return;
        }

        for (index, point) in self.config.data.iter().enumerate() {
            let Some(anchor) = self.anchors.get(index).copied().flatten() else { continue };
            let (sx, sy) = ctx.to_screen(anchor);

            let radius = if self.config.series_type == SeriesType::Choropleth {
                0.0
            } else {
                let radius = self.bubble_radius(point);
                self.markers.push(Marker {
                    index,
                    x: sx,
                    y: sy,
                    radius,
                    selected: self.selected.contains(&index),
                });
                radius
            };

            if !self.config.labels {
                continue;
            }
            if let Some(text) = self.label_text.get(index).cloned().flatten() {
                let width = text.chars().count() as f64 * CHAR_WIDTH;
                let rect = if radius > 0.0 {
                    Rect::new(sx + radius + CHAR_WIDTH, sy - CHAR_HEIGHT / 2.0, width, CHAR_HEIGHT)
                } else {
                    Rect::new(sx - width / 2.0, sy - CHAR_HEIGHT / 2.0, width, CHAR_HEIGHT)
                };
                self.label_rects[index] = Some(rect);
            }
        }
        self.dirty.remove(ConsistencyState::SERIES);
    }

    fn invalidate(&mut self, states: ConsistencyState) {
        self.dirty |= states;
    }

    fn is_consistent(&self) -> bool {
        self.dirty.is_empty()
    }

    fn label_bounds(&self, index: usize, state: PointState) -> Option<Rect> {
        let rect = self.label_rects.get(index).copied().flatten()?;
        match state {
            // Highlighted labels are padded by one cell.
            PointState::Hovered | PointState::Selected => Some(rect.inset(-CHAR_WIDTH, 0.0, -CHAR_WIDTH, 0.0)),
            PointState::Normal => Some(rect),
        }
    }

    fn set_labels_drawing_map(&mut self, states: Vec<(usize, bool)>) {
        self.label_visible = vec![true; self.config.data.len()];
        for (index, visible) in states {
            if let Some(slot) = self.label_visible.get_mut(index) {
                *slot = visible;
            }
        }
        self.dirty.remove(ConsistencyState::LABELS);
    }

    fn redraw_on_zoom_frame(&self) -> bool {
        self.config.series_type.redraws_on_zoom()
    }

    fn labels(&self) -> Vec<LabelGlyph> {
        if !self.config.enabled {
            return Vec::new();
        }
        self.label_rects
            .iter()
            .enumerate()
            .filter(|(i, _)| self.label_visible.get(*i).copied().unwrap_or(true))
            .filter_map(|(index, rect)| {
                let bounds = (*rect)?;
                let text = self.label_text.get(index).cloned().flatten()?;
                Some(LabelGlyph { index, text, bounds })
            })
            .collect()
    }

    fn markers(&self) -> &[Marker] {
        &self.markers
    }

    fn anchor(&self, index: usize) -> Option<(f64, f64)> {
        self.anchors.get(index).copied().flatten()
    }

    fn fill_bucket(&self, id: &str) -> Option<u8> {
        if self.config.series_type != SeriesType::Choropleth || !self.config.enabled {
            return None;
        }
        let value = self
            .config
            .data
            .iter()
            .find(|p| p.id.as_deref() == Some(id))?
            .value?;
        Some(color_bucket(value, self.stats.min, self.stats.max, COLOR_BUCKETS))
    }

    fn select(&mut self, indexes: &[usize]) {
        self.selected = indexes.iter().copied().filter(|&i| i < self.config.data.len()).collect();
        self.dirty |= ConsistencyState::SERIES;
    }

    fn selected(&self) -> Vec<usize> {
        self.selected.iter().copied().collect()
    }

    fn statistics(&self) -> SeriesStatistics {
        self.stats
    }

    fn config(&self) -> SeriesConfig {
        self.config.clone()
    }
}

impl From<SeriesConfig> for MapSeries {
    fn from(config: SeriesConfig) -> Self {
        MapSeries::new(config)
    }
}

/// Owns the chart's series and keeps their indexes in insertion order.
#[derive(Default)]
pub struct SeriesCoordinator {
    series: Vec<Box<dyn Series>>,
}

impl SeriesCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut series: Box<dyn Series>) -> usize {
        let index = self.series.len();
        series.set_index(index);
        self.series.push(series);
        index
    }

    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Series>> {
        if index >= self.series.len() {
            return None;
        }
        let removed = self.series.remove(index);
        for (i, series) in self.series.iter_mut().enumerate() {
            series.set_index(i);
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn Series> {
        self.series.get(index).map(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn Series + 'static)> {
        self.series.get_mut(index).map(|s| s.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Series> {
        self.series.iter().map(|s| s.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Series>> {
        self.series.iter_mut()
    }

    pub fn set_geo_data(&mut self, features: &FeatureStore) {
        self.series.iter_mut().for_each(|s| s.set_geo_data(features));
    }

    pub fn invalidate_all(&mut self, states: ConsistencyState) {
        self.series.iter_mut().for_each(|s| s.invalidate(states));
    }

    /// Last enabled choropleth series, the one the color range follows.
    pub fn last_choropleth(&self) -> Option<&dyn Series> {
        self.iter()
            .filter(|s| s.enabled() && s.series_type() == SeriesType::Choropleth)
            .last()
    }

    /// Fill bucket for a feature from the topmost choropleth series that has it.
    pub fn fill_bucket(&self, id: &str) -> Option<u8> {
        self.series.iter().rev().find_map(|s| s.fill_bucket(id))
    }

    pub fn configs(&self) -> Vec<SeriesConfig> {
        self.series.iter().map(|s| s.config()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::DataBounds;
    use crate::map::geometry::{GeoFeature, Geometry};
    use serde_json::{json, Map};

    fn store() -> FeatureStore {
        let mut props = Map::new();
        props.insert("name".into(), json!("France"));
        let mut fr = GeoFeature::new(
            Some("FR".into()),
            props,
            Geometry::polygon(vec![0.0, 40.0, 10.0, 40.0, 10.0, 50.0, 0.0, 50.0]),
        );
        fr.projected = fr.geometry.clone();
        FeatureStore::new(vec![fr])
    }

    fn scale() -> GeoScale {
        let mut scale = GeoScale::new();
        scale.set_bounds(Rect::new(0.0, 0.0, 100.0, 100.0));
        scale.start_auto_calc(true);
        scale.extend_data_bounds(&DataBounds::new(0.0, 0.0, 100.0, 100.0));
        scale.finish_auto_calc();
        scale
    }

    #[test]
    fn test_color_bucket_edges() {
        assert_eq!(color_bucket(0.0, 0.0, 10.0, 5), 0);
        assert_eq!(color_bucket(10.0, 0.0, 10.0, 5), 4);
        assert_eq!(color_bucket(5.0, 0.0, 10.0, 5), 2);
        assert_eq!(color_bucket(3.0, 3.0, 3.0, 5), 2);
    }

    #[test]
    fn test_choropleth_label_uses_feature_name() {
        let features = store();
        let scale = scale();
        let mut series = MapSeries::choropleth(vec![DataPoint::region("FR", 3.0), DataPoint::region("XX", 1.0)]);
        series.set_geo_data(&features);
        let ctx = SeriesContext { scale: &scale, features: &features, zoom: 1.0, offset: (0.0, 0.0) };
        series.calculate(&ctx);
        series.draw(&ctx);

        let labels = series.labels();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].text, "France");
        // Centered on the feature: data (5, 45) -> px (5, 55)
        let (cx, cy) = labels[0].bounds.center();
        assert!((cx - 5.0).abs() < 1e-9 && (cy - 55.0).abs() < 1e-9);
        assert!(series.label_bounds(1, PointState::Normal).is_none());
    }

    #[test]
    fn test_bubble_markers_follow_zoom() {
        let features = store();
        let scale = scale();
        let mut series = MapSeries::bubble(vec![DataPoint::at(20.0, 30.0, 4.0).named("A")]);
        series.set_geo_data(&features);
        let ctx = SeriesContext { scale: &scale, features: &features, zoom: 2.0, offset: (10.0, 0.0) };
        series.calculate(&ctx);
        series.draw(&ctx);

        let marker = series.markers()[0];
        assert_eq!((marker.x, marker.y), (50.0, 140.0));
        assert_eq!(marker.radius, 4.0);
        assert!(series.redraw_on_zoom_frame());
    }

    #[test]
    fn test_drawing_map_hides_labels() {
        let features = store();
        let scale = scale();
        let mut series = MapSeries::marker(vec![
            DataPoint::at(1.0, 1.0, 1.0).named("a"),
            DataPoint::at(2.0, 2.0, 1.0).named("b"),
        ]);
        series.set_geo_data(&features);
        let ctx = SeriesContext { scale: &scale, features: &features, zoom: 1.0, offset: (0.0, 0.0) };
        series.calculate(&ctx);
        series.draw(&ctx);
        series.set_labels_drawing_map(vec![(0, false), (1, true)]);

        let labels = series.labels();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].text, "b");
    }

    #[test]
    fn test_statistics() {
        let series = MapSeries::choropleth(vec![
            DataPoint::region("a", 1.0),
            DataPoint::region("b", 5.0),
            DataPoint::region("c", 3.0),
        ]);
        let stats = series.statistics();
        assert_eq!((stats.min, stats.max, stats.sum, stats.points_count), (1.0, 5.0, 9.0, 3));
        assert_eq!(stats.average, 3.0);
    }

    #[test]
    fn test_coordinator_reindexes_on_remove() {
        let mut coordinator = SeriesCoordinator::new();
        coordinator.add(Box::new(MapSeries::choropleth(Vec::new())));
        coordinator.add(Box::new(MapSeries::bubble(Vec::new())));
        coordinator.add(Box::new(MapSeries::choropleth(Vec::new()).with_name("last")));
        coordinator.remove(0);

        let indexes: Vec<usize> = coordinator.iter().map(|s| s.index()).collect();
        assert_eq!(indexes, vec![0, 1]);
        assert_eq!(coordinator.last_choropleth().map(|s| s.name()), Some("last"));
    }

    #[test]
    fn test_config_serde_names() {
        let config: SeriesConfig = serde_json::from_value(json!({
            "seriesType": "bubble",
            "overlapMode": "allow-overlap",
            "data": [{"long": 1.5, "lat": 2.0, "value": 3, "labelrank": 2}]
        }))
        .unwrap();
        assert_eq!(config.series_type, SeriesType::Bubble);
        assert_eq!(config.overlap_mode, Some(OverlapMode::AllowOverlap));
        assert_eq!(config.data[0].labelrank, Some(2.0));
        assert!(config.enabled && config.labels);
    }
}
