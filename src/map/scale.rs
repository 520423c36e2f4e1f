//! Geo scale: maps data units (projected map space) into the pixel viewport.
//!
//! The data range is accumulated between `start_auto_calc` and
//! `finish_auto_calc`, optionally clamped by manual limits given in
//! longitude/latitude, then fitted into the viewport keeping the aspect ratio.
//! `scale_to_px`/`px_to_scale` work in map-layer pixels; zoom and focus offset
//! live in the map layer transform and are only applied by `transform` and
//! `inverse_transform`.

use serde::{Deserialize, Serialize};

use crate::geo::{DataBounds, Rect, EPSILON};
use crate::map::tx::{TransformMap, TransformRecord};

/// Number of samples along each edge when projecting a lon/lat limit box.
const LIMIT_SAMPLES: usize = 16;

/// Result of an inverse transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Data units.
    pub x: f64,
    pub y: f64,
    pub long: f64,
    pub lat: f64,
}

/// Manual overrides, `None` meaning "use the auto-computed value".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MapLimits {
    pub min_lon: Option<f64>,
    pub max_lon: Option<f64>,
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
}

impl MapLimits {
    /// NaN stands for "auto".
    pub fn from_nan(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        let opt = |v: f64| v.is_finite().then_some(v);
        Self {
            min_lon: opt(min_lon),
            max_lon: opt(max_lon),
            min_lat: opt(min_lat),
            max_lat: opt(max_lat),
        }
    }

    pub fn is_auto(&self) -> bool {
        *self == Self::default()
    }
}

/// Serialized scale settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleConfig {
    #[serde(rename = "type", default = "geo_type")]
    pub kind: String,
    #[serde(default)]
    pub inverted_x: bool,
    #[serde(default)]
    pub inverted_y: bool,
    #[serde(default)]
    pub minimum_x: Option<f64>,
    #[serde(default)]
    pub maximum_x: Option<f64>,
    #[serde(default)]
    pub minimum_y: Option<f64>,
    #[serde(default)]
    pub maximum_y: Option<f64>,
    #[serde(default)]
    pub gap: f64,
}

fn geo_type() -> String {
    "geo".to_string()
}

#[derive(Debug, Clone)]
pub struct GeoScale {
    bounds: Option<Rect>,
    tx: TransformMap,

    data_range: DataBounds,
    limits: MapLimits,
    gap: f64,
    inverted_x: bool,
    inverted_y: bool,

    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    ratio: f64,
    center_offset_x: f64,
    center_offset_y: f64,

    zoom: f64,
    dx: f64,
    dy: f64,

    auto_calc: bool,
}

impl Default for GeoScale {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoScale {
    pub fn new() -> Self {
        let mut scale = Self {
            bounds: None,
            tx: TransformMap::default(),
            data_range: DataBounds::empty(),
            limits: MapLimits::default(),
            gap: 0.0,
            inverted_x: false,
            inverted_y: false,
            min_x: 0.0,
            min_y: 0.0,
            max_x: 1.0,
            max_y: 1.0,
            ratio: 1.0,
            center_offset_x: 0.0,
            center_offset_y: 0.0,
            zoom: 1.0,
            dx: 0.0,
            dy: 0.0,
            auto_calc: false,
        };
        scale.recompute();
        scale
    }

    pub fn tx(&self) -> &TransformMap {
        &self.tx
    }

    pub fn tx_mut(&mut self) -> &mut TransformMap {
        &mut self.tx
    }

    pub fn set_tx(&mut self, tx: TransformMap) {
        self.tx = tx;
        self.recompute();
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    /// Output viewport in pixels.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = Some(bounds);
        self.recompute();
    }

    /// Open an accumulation pass. `reset` drops the previous range.
    pub fn start_auto_calc(&mut self, reset: bool) {
        debug_assert!(!self.auto_calc, "nested start_auto_calc");
        self.auto_calc = true;
        if reset {
            self.data_range = DataBounds::empty();
        }
    }

    pub fn is_auto_calc(&self) -> bool {
        self.auto_calc
    }

    /// Extend the accumulated range with flat `[x0, y0, x1, y1, ...]` data-unit pairs.
    pub fn extend_data_range(&mut self, coords: &[f64]) {
        for pair in coords.chunks_exact(2) {
            self.data_range.extend(pair[0], pair[1]);
        }
    }

    pub fn extend_data_bounds(&mut self, bounds: &DataBounds) {
        if !bounds.is_empty() {
            self.data_range = self.data_range.union(bounds);
        }
    }

    /// Close the accumulation pass. Returns whether the visible range changed.
    pub fn finish_auto_calc(&mut self) -> bool {
        debug_assert!(self.auto_calc, "finish_auto_calc without start_auto_calc");
        self.auto_calc = false;
        let before = self.visible_range();
        self.recompute();
        before != self.visible_range()
    }

    pub fn data_range(&self) -> DataBounds {
        self.data_range
    }

    /// Range actually fitted into the viewport, in data units.
    pub fn visible_range(&self) -> DataBounds {
        DataBounds::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Manual limits in longitude/latitude. NaN keeps a side automatic.
    pub fn set_map_limits(&mut self, min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) {
        self.set_limits(MapLimits::from_nan(min_lon, max_lon, min_lat, max_lat));
    }

    pub fn set_limits(&mut self, limits: MapLimits) {
        self.limits = limits;
        self.recompute();
    }

    pub fn limits(&self) -> MapLimits {
        self.limits
    }

    /// Extra space around the data range, as a share of the range.
    pub fn gap(&self) -> f64 {
        self.gap
    }

    pub fn set_gap(&mut self, gap: f64) {
        self.gap = if gap.is_finite() { gap.max(0.0) } else { 0.0 };
        self.recompute();
    }

    pub fn inverted(&self) -> (bool, bool) {
        (self.inverted_x, self.inverted_y)
    }

    pub fn set_inverted(&mut self, x: bool, y: bool) {
        self.inverted_x = x;
        self.inverted_y = y;
    }

    /// Pixels per data unit.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn offset(&self) -> (f64, f64) {
        (self.dx, self.dy)
    }

    /// Zoom factor of the map layer. Leaves the data range alone.
    pub fn set_map_zoom(&mut self, zoom: f64) {
        self.zoom = if zoom.is_finite() { zoom.max(EPSILON) } else { 1.0 };
    }

    /// Translation of the map layer in pixels.
    pub fn set_offset_focus_point(&mut self, dx: f64, dy: f64) {
        self.dx = if dx.is_finite() { dx } else { 0.0 };
        self.dy = if dy.is_finite() { dy } else { 0.0 };
    }

    /// Data units to map-layer pixels.
    pub fn scale_to_px(&self, x: f64, y: f64) -> (f64, f64) {
        let Some(bounds) = self.bounds else {
            return (f64::NAN, f64::NAN);
        };
        let tx = (x - self.min_x) * self.ratio;
        let ty = (self.max_y - y) * self.ratio;

        let px = if self.inverted_x {
            bounds.right() - self.center_offset_x - tx
        } else {
            bounds.left + self.center_offset_x + tx
        };
        let py = if self.inverted_y {
            bounds.bottom() - self.center_offset_y - ty
        } else {
            bounds.top + self.center_offset_y + ty
        };
        (px, py)
    }

    /// Map-layer pixels to data units.
    pub fn px_to_scale(&self, px: f64, py: f64) -> (f64, f64) {
        let Some(bounds) = self.bounds else {
            return (f64::NAN, f64::NAN);
        };
        let tx = if self.inverted_x {
            bounds.right() - self.center_offset_x - px
        } else {
            px - bounds.left - self.center_offset_x
        };
        let ty = if self.inverted_y {
            bounds.bottom() - self.center_offset_y - py
        } else {
            py - bounds.top - self.center_offset_y
        };
        (tx / self.ratio + self.min_x, self.max_y - ty / self.ratio)
    }

    /// Screen pixels of a lon/lat point, zoom and offset included.
    pub fn transform(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y) = self.tx.pick_tx(lon, lat).project(lon, lat);
        let (px, py) = self.scale_to_px(x, y);
        (px * self.zoom + self.dx, py * self.zoom + self.dy)
    }

    /// Screen pixels back to data units and lon/lat.
    pub fn inverse_transform(&self, sx: f64, sy: f64) -> GeoPoint {
        let px = (sx - self.dx) / self.zoom;
        let py = (sy - self.dy) / self.zoom;
        let (x, y) = self.px_to_scale(px, py);
        let (long, lat) = self.tx.pick_tx_projected(x, y).unproject(x, y);
        GeoPoint { x, y, long, lat }
    }

    /// Pixel rectangle covered by the fitted data range, before zoom.
    pub fn view_space(&self) -> Rect {
        let (x1, y1) = self.scale_to_px(self.min_x, self.max_y);
        let (x2, y2) = self.scale_to_px(self.max_x, self.min_y);
        Rect::from_corners(x1, y1, x2, y2)
    }

    pub fn config(&self) -> ScaleConfig {
        ScaleConfig {
            kind: geo_type(),
            inverted_x: self.inverted_x,
            inverted_y: self.inverted_y,
            minimum_x: self.limits.min_lon,
            maximum_x: self.limits.max_lon,
            minimum_y: self.limits.min_lat,
            maximum_y: self.limits.max_lat,
            gap: self.gap,
        }
    }

    pub fn apply_config(&mut self, config: &ScaleConfig) {
        self.inverted_x = config.inverted_x;
        self.inverted_y = config.inverted_y;
        self.gap = config.gap.max(0.0);
        self.limits = MapLimits {
            min_lon: config.minimum_x,
            max_lon: config.maximum_x,
            min_lat: config.minimum_y,
            max_lat: config.maximum_y,
        };
        self.recompute();
    }

    /// Refit after the data range, limits, gap or viewport changed.
    fn recompute(&mut self) {
        let mut range = self.data_range;
        if range.is_empty() || !range.min_x.is_finite() || !range.max_y.is_finite() {
            range = DataBounds::new(0.0, 0.0, 1.0, 1.0);
        }

        let auto = self.limits;
        if !auto.is_auto() {
            let manual = self.limit_bounds(&range, self.tx.default_record());
            if auto.min_lon.is_some() {
                range.min_x = manual.min_x;
            }
            if auto.max_lon.is_some() {
                range.max_x = manual.max_x;
            }
            if auto.min_lat.is_some() {
                range.min_y = manual.min_y;
            }
            if auto.max_lat.is_some() {
                range.max_y = manual.max_y;
            }
        }

        let gap_x = range.width() * self.gap;
        let gap_y = range.height() * self.gap;
        if auto.min_lon.is_none() {
            range.min_x -= gap_x;
        }
        if auto.max_lon.is_none() {
            range.max_x += gap_x;
        }
        if auto.min_lat.is_none() {
            range.min_y -= gap_y;
        }
        if auto.max_lat.is_none() {
            range.max_y += gap_y;
        }

        if range.width() < EPSILON {
            range.min_x -= 0.5;
            range.max_x += 0.5;
        }
        if range.height() < EPSILON {
            range.min_y -= 0.5;
            range.max_y += 0.5;
        }

        self.min_x = range.min_x;
        self.max_x = range.max_x;
        self.min_y = range.min_y;
        self.max_y = range.max_y;

        let (width, height) = self.bounds.map_or((1.0, 1.0), |b| (b.width, b.height));
        let range_x = range.width();
        let range_y = range.height();
        let ratio = (height / range_y).min(width / range_x);
        self.ratio = if ratio.is_finite() && ratio > EPSILON { ratio } else { EPSILON };
        self.center_offset_x = (width - range_x * self.ratio) / 2.0;
        self.center_offset_y = (height - range_y * self.ratio) / 2.0;
    }

    /// Data-unit bounds of the lon/lat limit box. Automatic sides come from
    /// the lon/lat extent of `range`.
    fn limit_bounds(&self, range: &DataBounds, record: &TransformRecord) -> DataBounds {
        let mut lonlat = DataBounds::empty();
        for (x, y) in [
            (range.min_x, range.min_y),
            (range.min_x, range.max_y),
            (range.max_x, range.min_y),
            (range.max_x, range.max_y),
        ] {
            let (lon, lat) = record.unproject(x, y);
            lonlat.extend(lon, lat);
        }
        if lonlat.is_empty() {
            lonlat = DataBounds::new(-180.0, -90.0, 180.0, 90.0);
        }

        let min_lon = self.limits.min_lon.unwrap_or(lonlat.min_x);
        let max_lon = self.limits.max_lon.unwrap_or(lonlat.max_x);
        let min_lat = self.limits.min_lat.unwrap_or(lonlat.min_y);
        let max_lat = self.limits.max_lat.unwrap_or(lonlat.max_y);

        let mut out = DataBounds::empty();
        for i in 0..=LIMIT_SAMPLES {
            let t = i as f64 / LIMIT_SAMPLES as f64;
            let lon = min_lon + (max_lon - min_lon) * t;
            let lat = min_lat + (max_lat - min_lat) * t;
            for (a, b) in [(lon, min_lat), (lon, max_lat), (min_lon, lat), (max_lon, lat)] {
                let (x, y) = record.project(a, b);
                out.extend(x, y);
            }
        }
        if out.is_empty() {
            *range
        } else {
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::roughly_equal;
    use crate::map::projection::Crs;

    fn world_scale() -> GeoScale {
        let mut scale = GeoScale::new();
        scale.set_bounds(Rect::new(10.0, 20.0, 400.0, 200.0));
        scale.start_auto_calc(true);
        scale.extend_data_range(&[-180.0, -90.0, 180.0, 90.0]);
        scale.finish_auto_calc();
        scale
    }

    #[test]
    fn test_round_trip_within_range() {
        let mut scale = world_scale();
        for inverted in [(false, false), (true, false), (false, true), (true, true)] {
            scale.set_inverted(inverted.0, inverted.1);
            for (x, y) in [(-180.0, -90.0), (0.0, 0.0), (123.4, -56.7), (180.0, 90.0)] {
                let (px, py) = scale.scale_to_px(x, y);
                let (x2, y2) = scale.px_to_scale(px, py);
                assert!(roughly_equal(x, x2, 1e-6) && roughly_equal(y, y2, 1e-6));
            }
        }
    }

    #[test]
    fn test_fit_keeps_aspect_and_centers() {
        let scale = world_scale();
        // 360x180 into 400x200: width limited, ratio 10/9
        assert!((scale.ratio() - 400.0 / 360.0).abs() < 1e-12);
        let (px, py) = scale.scale_to_px(-180.0, 90.0);
        assert!((px - 10.0).abs() < 1e-9 && (py - 20.0).abs() < 1e-9);
        let view = scale.view_space();
        assert!((view.width - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_range_is_widened() {
        let mut scale = GeoScale::new();
        scale.set_bounds(Rect::new(0.0, 0.0, 100.0, 100.0));
        scale.start_auto_calc(true);
        scale.extend_data_range(&[5.0, 5.0]);
        scale.finish_auto_calc();

        assert_eq!(scale.visible_range(), DataBounds::new(4.5, 4.5, 5.5, 5.5));
        assert!(scale.ratio().is_finite() && scale.ratio() > 0.0);
    }

    #[test]
    fn test_finish_reports_change() {
        let mut scale = world_scale();
        scale.start_auto_calc(false);
        scale.extend_data_range(&[0.0, 0.0]);
        assert!(!scale.finish_auto_calc());

        scale.start_auto_calc(false);
        scale.extend_data_range(&[200.0, 0.0]);
        assert!(scale.finish_auto_calc());
    }

    #[test]
    fn test_zoom_and_offset_do_not_change_range() {
        let mut scale = world_scale();
        let before = scale.visible_range();
        scale.set_map_zoom(3.0);
        scale.set_offset_focus_point(-50.0, 12.0);
        assert_eq!(scale.visible_range(), before);

        let (sx, sy) = scale.transform(10.0, 20.0);
        let back = scale.inverse_transform(sx, sy);
        assert!(roughly_equal(back.long, 10.0, 1e-9) && roughly_equal(back.lat, 20.0, 1e-9));
    }

    #[test]
    fn test_map_limits_override_single_sides() {
        let mut scale = world_scale();
        scale.set_map_limits(f64::NAN, f64::NAN, 0.0, f64::NAN);
        let range = scale.visible_range();
        assert!((range.min_y - 0.0).abs() < 1e-9);
        assert!((range.max_y - 90.0).abs() < 1e-9);
        assert!((range.min_x + 180.0).abs() < 1e-9);

        scale.set_map_limits(f64::NAN, f64::NAN, f64::NAN, f64::NAN);
        assert!((scale.visible_range().min_y + 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_gap_pads_auto_sides() {
        let mut scale = world_scale();
        scale.set_gap(0.1);
        assert!((scale.visible_range().min_x + 216.0).abs() < 1e-9);
        assert!((scale.visible_range().max_y - 108.0).abs() < 1e-9);
    }

    #[test]
    fn test_transform_goes_through_tx() {
        let mut scale = world_scale();
        scale.tx_mut().set_default_crs(Crs::Mercator);
        let (x, y) = scale.tx().pick_tx(30.0, 40.0).project(30.0, 40.0);
        let (px, py) = scale.scale_to_px(x, y);
        assert_eq!(scale.transform(30.0, 40.0), (px, py));
    }

    #[test]
    fn test_config_round_trip() {
        let mut scale = world_scale();
        scale.set_inverted(true, false);
        scale.set_gap(0.05);
        scale.set_map_limits(-10.0, f64::NAN, f64::NAN, 60.0);
        let json = serde_json::to_value(scale.config()).unwrap();
        assert_eq!(json["type"], "geo");
        assert_eq!(json["minimumX"], -10.0);
        assert!(json["maximumX"].is_null());

        let config: ScaleConfig = serde_json::from_value(json).unwrap();
        let mut other = world_scale();
        other.apply_config(&config);
        assert_eq!(other.config(), scale.config());
    }
}
