//! Decorations computed through the geo scale: axes, graticule grids,
//! crosshair read-out, color range and callouts.

use serde::{Deserialize, Serialize};

use crate::geo::Rect;
use crate::map::scale::{GeoPoint, GeoScale};
use crate::map::series::{color_bucket, SeriesCoordinator, SeriesStatistics, COLOR_BUCKETS};

/// Samples per graticule line.
const GRID_SAMPLES: usize = 48;

/// What to do with regions no choropleth point refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnboundRegions {
    /// Outline only.
    #[default]
    AsIs,
    Hide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AxisOrientation {
    Top,
    #[default]
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisTick {
    pub orientation: AxisOrientation,
    /// Longitude for horizontal axes, latitude for vertical ones.
    pub value: f64,
    /// Screen position of the tick on the viewport edge.
    pub x: f64,
    pub y: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxesSettings {
    pub enabled: bool,
    /// Tick interval in degrees.
    pub interval: f64,
}

impl Default for AxesSettings {
    fn default() -> Self {
        Self { enabled: false, interval: 30.0 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Axes {
    pub settings: AxesSettings,
    ticks: Vec<AxisTick>,
}

impl Axes {
    pub fn ticks(&self) -> &[AxisTick] {
        &self.ticks
    }

    /// Place ticks where meridians and parallels cross the viewport edges.
    pub fn calculate(&mut self, scale: &GeoScale) {
        self.ticks.clear();
        let Some(bounds) = scale.bounds() else { return };
        if !self.settings.enabled || !(self.settings.interval > 0.0) {
            return;
        }
        let step = self.settings.interval;

        let mut lon = -180.0;
        while lon <= 180.0 {
            let (x, _) = scale.transform(lon, 0.0);
            if x.is_finite() && x >= bounds.left && x <= bounds.right() {
                for (orientation, y) in [(AxisOrientation::Top, bounds.top), (AxisOrientation::Bottom, bounds.bottom())] {
                    self.ticks.push(AxisTick { orientation, value: lon, x, y, label: format_degrees(lon, 'E', 'W') });
                }
            }
            lon += step;
        }

        let mut lat = -90.0;
        while lat <= 90.0 {
            let (_, y) = scale.transform(0.0, lat);
            if y.is_finite() && y >= bounds.top && y <= bounds.bottom() {
                for (orientation, x) in [(AxisOrientation::Left, bounds.left), (AxisOrientation::Right, bounds.right())] {
                    self.ticks.push(AxisTick { orientation, value: lat, x, y, label: format_degrees(lat, 'N', 'S') });
                }
            }
            lat += step;
        }
    }
}

fn format_degrees(value: f64, positive: char, negative: char) -> String {
    if value == 0.0 {
        "0°".to_string()
    } else if value > 0.0 {
        format!("{}°{positive}", value.abs())
    } else {
        format!("{}°{negative}", value.abs())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSettings {
    pub enabled: bool,
    /// Graticule spacing in degrees.
    pub interval: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self { enabled: false, interval: 30.0 }
    }
}

/// Graticule lines in screen pixels. NaN samples split a line.
#[derive(Debug, Clone, Default)]
pub struct Grids {
    pub settings: GridSettings,
    lines: Vec<Vec<(f64, f64)>>,
}

impl Grids {
    pub fn lines(&self) -> &[Vec<(f64, f64)>] {
        &self.lines
    }

    pub fn calculate(&mut self, scale: &GeoScale) {
        self.lines.clear();
        if !self.settings.enabled || !(self.settings.interval > 0.0) || scale.bounds().is_none() {
            return;
        }
        let step = self.settings.interval;
        let sample = |i: usize, from: f64, to: f64| from + (to - from) * i as f64 / GRID_SAMPLES as f64;

        let mut lon = -180.0;
        while lon <= 180.0 {
            self.lines.push(
                (0..=GRID_SAMPLES)
                    .map(|i| scale.transform(lon, sample(i, -90.0, 90.0)))
                    .collect(),
            );
            lon += step;
        }
        let mut lat = -90.0 + step;
        while lat < 90.0 {
            self.lines.push(
                (0..=GRID_SAMPLES)
                    .map(|i| scale.transform(sample(i, -180.0, 180.0), lat))
                    .collect(),
            );
            lat += step;
        }
    }
}

/// Pointer read-out in lon/lat.
#[derive(Debug, Clone, Default)]
pub struct Crosshair {
    pub enabled: bool,
    pointer: Option<(f64, f64)>,
    readout: Option<GeoPoint>,
}

impl Crosshair {
    pub fn set_pointer(&mut self, pointer: Option<(f64, f64)>) {
        self.pointer = pointer;
    }

    pub fn pointer(&self) -> Option<(f64, f64)> {
        self.pointer
    }

    pub fn readout(&self) -> Option<GeoPoint> {
        self.readout
    }

    pub fn calculate(&mut self, scale: &GeoScale) {
        self.readout = match (self.enabled, self.pointer, scale.bounds()) {
            (true, Some((x, y)), Some(bounds)) if bounds.contains(x, y) => {
                let point = scale.inverse_transform(x, y);
                (point.long.is_finite() && point.lat.is_finite()).then_some(point)
            }
            _ => None,
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorRangeSettings {
    pub enabled: bool,
}

impl Default for ColorRangeSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Legend strip bound to the last enabled choropleth series.
#[derive(Debug, Clone, Default)]
pub struct ColorRange {
    pub settings: ColorRangeSettings,
    series: Option<usize>,
    stats: SeriesStatistics,
}

impl ColorRange {
    pub fn calculate(&mut self, series: &SeriesCoordinator) {
        match series.last_choropleth() {
            Some(bound) if self.settings.enabled => {
                self.series = Some(bound.index());
                self.stats = bound.statistics();
            }
            _ => {
                self.series = None;
                self.stats = SeriesStatistics::default();
            }
        }
    }

    pub fn series(&self) -> Option<usize> {
        self.series
    }

    pub fn is_bound(&self) -> bool {
        self.series.is_some()
    }

    /// `(lower, upper)` value range of each fill bucket.
    pub fn buckets(&self) -> Vec<(f64, f64)> {
        if self.series.is_none() {
            return Vec::new();
        }
        let n = COLOR_BUCKETS as f64;
        let span = self.stats.max - self.stats.min;
        (0..COLOR_BUCKETS)
            .map(|i| {
                let lo = self.stats.min + span * i as f64 / n;
                (lo, lo + span / n)
            })
            .collect()
    }

    pub fn bucket_of(&self, value: f64) -> Option<u8> {
        self.series?;
        Some(color_bucket(value, self.stats.min, self.stats.max, COLOR_BUCKETS))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalloutConfig {
    #[serde(default)]
    pub orientation: AxisOrientation,
    /// Ids of the points shown in the callout.
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalloutEntry {
    pub id: String,
    pub series: usize,
    pub index: usize,
    pub name: String,
    pub value: Option<f64>,
}

/// A box along one viewport edge listing chosen points.
#[derive(Debug, Clone, PartialEq)]
pub struct Callout {
    pub config: CalloutConfig,
    entries: Vec<CalloutEntry>,
    bounds: Option<Rect>,
}

impl Callout {
    pub fn new(config: CalloutConfig) -> Self {
        Self { config, entries: Vec::new(), bounds: None }
    }

    pub fn entries(&self) -> &[CalloutEntry] {
        &self.entries
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    /// Resolve item ids against series points and lay the box out along its edge.
    pub fn calculate(&mut self, series: &SeriesCoordinator, viewport: Option<Rect>) {
        self.entries = self
            .config
            .items
            .iter()
            .filter_map(|id| {
                series.iter().find_map(|s| {
                    let (index, point) = s.points().enumerate().find(|(_, p)| p.id.as_deref() == Some(id))?;
                    Some(CalloutEntry {
                        id: id.clone(),
                        series: s.index(),
                        index,
                        name: point.name.clone().unwrap_or_else(|| id.clone()),
                        value: point.value,
                    })
                })
            })
            .collect();

        self.bounds = viewport.filter(|_| !self.entries.is_empty()).map(|v| {
            let rows = self.entries.len() as f64 * 4.0;
            match self.config.orientation {
                AxisOrientation::Top => Rect::new(v.left, v.top, v.width, rows.min(v.height)),
                AxisOrientation::Bottom => Rect::new(v.left, v.bottom() - rows.min(v.height), v.width, rows.min(v.height)),
                AxisOrientation::Left => Rect::new(v.left, v.top, (v.width / 4.0).max(1.0), v.height),
                AxisOrientation::Right => {
                    let w = (v.width / 4.0).max(1.0);
                    Rect::new(v.right() - w, v.top, w, v.height)
                }
            }
        });
    }
}

/// All decorations of one chart.
#[derive(Debug, Clone, Default)]
pub struct ChartElements {
    pub axes: Axes,
    pub grids: Grids,
    pub crosshair: Crosshair,
    pub color_range: ColorRange,
    pub callouts: Vec<Callout>,
}
