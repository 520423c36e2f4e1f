//! Transform Map: named transform records that turn lon/lat into data units.
//!
//! The `"default"` record always exists. Geo data may ship extra records with
//! a heat zone (a region drawn with its own projection/scale/offset, like an
//! inset), and per-feature overrides are created the first time a feature is
//! translated, scaled or re-projected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::geo::{DataBounds, EPSILON};
use crate::map::geometry::Geometry;
use crate::map::projection::{Crs, Projection};

pub const DEFAULT_TX: &str = "default";

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOrigin {
    /// Shipped with the geo data (`ac-tx`).
    GeoData,
    /// Created by a per-feature manipulation.
    Feature,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformRecord {
    pub crs: Crs,
    /// Crs the record used before its last re-projection.
    pub src_crs: Crs,
    pub current_projection: Projection,
    pub src_projection: Projection,
    pub scale: f64,
    pub xoffset: f64,
    pub yoffset: f64,
    pub heat_zone: Option<DataBounds>,
    pub origin: TxOrigin,
}

impl TransformRecord {
    pub fn new(crs: Crs) -> Self {
        Self {
            crs,
            src_crs: crs,
            current_projection: crs.projection(),
            src_projection: crs.projection(),
            scale: 1.0,
            xoffset: 0.0,
            yoffset: 0.0,
            heat_zone: None,
            origin: TxOrigin::GeoData,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.set_scale(scale);
        self
    }

    pub fn with_offset(mut self, xoffset: f64, yoffset: f64) -> Self {
        self.xoffset = xoffset;
        self.yoffset = yoffset;
        self
    }

    pub fn with_heat_zone(mut self, heat_zone: DataBounds) -> Self {
        self.heat_zone = Some(heat_zone);
        self
    }

    /// Non-positive or non-finite values fall back to 1.
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = if scale.is_finite() && scale > EPSILON { scale } else { 1.0 };
    }

    /// Switch to another crs, remembering the previous one.
    pub fn set_crs(&mut self, crs: Crs) {
        self.src_crs = self.crs;
        self.src_projection = self.current_projection;
        self.crs = crs;
        self.current_projection = crs.projection();
    }

    /// lon/lat to data units.
    #[inline]
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y) = self.current_projection.forward(lon, lat);
        (x * self.scale + self.xoffset, y * self.scale + self.yoffset)
    }

    /// Data units back to lon/lat.
    #[inline]
    pub fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        self.current_projection
            .invert((x - self.xoffset) / self.scale, (y - self.yoffset) / self.scale)
    }

    /// Whether the projected point falls inside this record's heat zone.
    fn heat_zone_contains(&self, x: f64, y: f64) -> bool {
        self.heat_zone.is_some_and(|zone| zone.contains(x, y))
    }
}

impl Default for TransformRecord {
    fn default() -> Self {
        Self::new(Crs::Wsg84)
    }
}

/// Table of transform records keyed by name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformMap {
    default: TransformRecord,
    records: BTreeMap<String, TransformRecord>,
}

impl TransformMap {
    pub fn new(default: TransformRecord) -> Self {
        Self {
            default,
            records: BTreeMap::new(),
        }
    }

    pub fn default_record(&self) -> &TransformRecord {
        &self.default
    }

    pub fn default_record_mut(&mut self) -> &mut TransformRecord {
        &mut self.default
    }

    pub fn get(&self, name: &str) -> Option<&TransformRecord> {
        if name == DEFAULT_TX {
            Some(&self.default)
        } else {
            self.records.get(name)
        }
    }

    /// Add or replace a named record. `"default"` replaces the default.
    pub fn insert(&mut self, name: impl Into<String>, record: TransformRecord) {
        let name = name.into();
        if name == DEFAULT_TX {
            self.default = record;
        } else {
            self.records.insert(name, record);
        }
    }

    pub fn has_override(&self, id: &str) -> bool {
        self.records
            .get(id)
            .is_some_and(|record| record.origin == TxOrigin::Feature)
    }

    /// Names of all non-default records, in key order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Change the default crs. Records that were sharing the old default crs
    /// follow it.
    pub fn set_default_crs(&mut self, crs: Crs) {
        let old = self.default.crs;
        self.default.set_crs(crs);
        for record in self.records.values_mut() {
            if record.crs == old {
                record.set_crs(crs);
            }
        }
    }

    /// Replace the projection of every record that settles on `crs`, used to
    /// install a blended projection while a crs animation plays.
    pub fn set_blend(&mut self, crs: Crs, projection: Projection) {
        if self.default.crs == crs {
            self.default.current_projection = projection;
        }
        for record in self.records.values_mut() {
            if record.crs == crs {
                record.current_projection = projection;
            }
        }
    }

    /// Record applying to a lon/lat point: the first non-default record (in
    /// key order) whose heat zone contains the projected point, otherwise the
    /// default.
    pub fn pick_tx(&self, lon: f64, lat: f64) -> &TransformRecord {
        self.pick_named(lon, lat, |_| true).1
    }

    /// Record whose heat zone contains a point already in data units.
    pub fn pick_tx_projected(&self, x: f64, y: f64) -> &TransformRecord {
        self.records
            .values()
            .find(|record| record.heat_zone_contains(x, y))
            .unwrap_or(&self.default)
    }

    fn pick_named(
        &self,
        lon: f64,
        lat: f64,
        accept: impl Fn(&TransformRecord) -> bool,
    ) -> (&str, &TransformRecord) {
        self.records
            .iter()
            .find(|(_, record)| {
                if record.heat_zone.is_none() || !accept(record) {
                    return false;
                }
                let (x, y) = record.project(lon, lat);
                record.heat_zone_contains(x, y)
            })
            .map(|(name, record)| (name.as_str(), record))
            .unwrap_or((DEFAULT_TX, &self.default))
    }

    /// Project a coordinate belonging to feature `id`. The feature's own
    /// override wins, then geo data heat zones, then the default.
    #[inline]
    pub fn project_for(&self, id: Option<&str>, lon: f64, lat: f64) -> (f64, f64) {
        if let Some(record) = id.and_then(|id| self.records.get(id)) {
            if record.origin == TxOrigin::Feature {
                return record.project(lon, lat);
            }
        }
        self.pick_named(lon, lat, |record| record.origin == TxOrigin::GeoData)
            .1
            .project(lon, lat)
    }

    /// Record currently governing feature `id` with lon/lat geometry `source`:
    /// its override if any, else the geo data record whose heat zone holds the
    /// feature center, else the default.
    pub fn governing(&self, id: &str, source: &Geometry) -> &TransformRecord {
        if let Some(record) = self.records.get(id) {
            if record.origin == TxOrigin::Feature {
                return record;
            }
        }
        let (lon, lat) = source.bounds().center();
        self.pick_named(lon, lat, |record| record.origin == TxOrigin::GeoData).1
    }

    /// Record feature geometry `source` would fall under without an override.
    pub fn inherited(&self, source: &Geometry) -> &TransformRecord {
        let (lon, lat) = source.bounds().center();
        self.pick_named(lon, lat, |record| record.origin == TxOrigin::GeoData).1
    }

    /// Make sure feature `id` has its own record, cloned from whichever record
    /// governs it now.
    pub fn materialize(&mut self, id: &str, source: &Geometry) -> &mut TransformRecord {
        if !self.has_override(id) {
            let mut record = self.governing(id, source).clone();
            record.origin = TxOrigin::Feature;
            self.records.insert(id.to_string(), record);
        }
        self.records
            .entry(id.to_string())
            .or_insert_with(|| TransformRecord { origin: TxOrigin::Feature, ..Default::default() })
    }

    /// Shift feature `id` by a delta in data units. Returns the new heat zone.
    pub fn translate_feature(&mut self, id: &str, source: &Geometry, dx: f64, dy: f64) -> DataBounds {
        let record = self.materialize(id, source);
        record.xoffset += dx;
        record.yoffset += dy;
        self.refresh_heat_zone(id, source)
    }

    /// Set the scale of feature `id`, keeping its center where it is.
    pub fn scale_feature(&mut self, id: &str, source: &Geometry, ratio: f64) -> DataBounds {
        let record = self.materialize(id, source);
        let raw_center = raw_bounds(source, &record.current_projection).center();
        let old_scale = record.scale;
        record.set_scale(ratio);
        let new_scale = record.scale;
        record.xoffset += raw_center.0 * (old_scale - new_scale);
        record.yoffset += raw_center.1 * (old_scale - new_scale);
        self.refresh_heat_zone(id, source)
    }

    /// Re-project feature `id` into `crs`, keeping its center where it is.
    pub fn reproject_feature(&mut self, id: &str, source: &Geometry, crs: Crs) -> DataBounds {
        let record = self.materialize(id, source);
        let old_center = raw_bounds(source, &record.current_projection).center();
        record.set_crs(crs);
        let new_center = raw_bounds(source, &record.current_projection).center();
        if old_center.0.is_finite() && new_center.0.is_finite() {
            record.xoffset += (old_center.0 - new_center.0) * record.scale;
            record.yoffset += (old_center.1 - new_center.1) * record.scale;
        }
        self.refresh_heat_zone(id, source)
    }

    fn refresh_heat_zone(&mut self, id: &str, source: &Geometry) -> DataBounds {
        let Some(record) = self.records.get_mut(id) else {
            return DataBounds::empty();
        };
        let zone = source.projected_bounds(|lon, lat| record.project(lon, lat));
        record.heat_zone = if zone.is_empty() { None } else { Some(zone) };
        zone
    }

    /// Read the `ac-tx` table of a geo data file.
    pub fn from_json(value: &Value) -> Result<Self> {
        let table: BTreeMap<String, TxJson> = serde_json::from_value(value.clone())?;
        let default_json = table.get(DEFAULT_TX).cloned().unwrap_or_default();
        let default = default_json.to_record(Crs::Wsg84, 1.0);

        let mut map = TransformMap::new(default.clone());
        for (name, json) in table {
            if name == DEFAULT_TX {
                continue;
            }
            map.records.insert(name, json.to_record(default.crs, default.scale));
        }
        Ok(map)
    }

    /// Write records back in the `ac-tx` layout. Feature overrides included.
    pub fn to_json(&self) -> Value {
        let mut table = serde_json::Map::new();
        table.insert(DEFAULT_TX.to_string(), TxJson::from_record(&self.default).into_value());
        for (name, record) in &self.records {
            table.insert(name.clone(), TxJson::from_record(record).into_value());
        }
        Value::Object(table)
    }
}

/// Bounds of `source` under a projection with unit scale and no offset.
fn raw_bounds(source: &Geometry, projection: &Projection) -> DataBounds {
    source.projected_bounds(|lon, lat| projection.forward(lon, lat))
}

/// Heat zone as stored in geo data: `top` is the upper edge in data units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct HeatZoneJson {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    crs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    xoffset: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    yoffset: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    heat_zone: Option<HeatZoneJson>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    feature: bool,
}

impl TxJson {
    fn to_record(&self, fallback_crs: Crs, fallback_scale: f64) -> TransformRecord {
        let crs = match self.crs.as_deref() {
            Some(name) => name.parse().unwrap_or_else(|_| {
                tracing::warn!(crs = name, "unknown projection in transform table, using wsg84");
                Crs::Wsg84
            }),
            None => fallback_crs,
        };
        let mut record = TransformRecord::new(crs)
            .with_scale(self.scale.unwrap_or(fallback_scale))
            .with_offset(self.xoffset.unwrap_or(0.0), self.yoffset.unwrap_or(0.0));
        record.heat_zone = self.heat_zone.map(|zone| {
            DataBounds::new(zone.left, zone.top - zone.height, zone.left + zone.width, zone.top)
        });
        if self.feature {
            record.origin = TxOrigin::Feature;
        }
        record
    }

    fn from_record(record: &TransformRecord) -> Self {
        Self {
            crs: Some(record.crs.to_string()),
            scale: Some(record.scale),
            xoffset: Some(record.xoffset),
            yoffset: Some(record.yoffset),
            heat_zone: record.heat_zone.map(|zone| HeatZoneJson {
                left: zone.min_x,
                top: zone.max_y,
                width: zone.width(),
                height: zone.height(),
            }),
            feature: record.origin == TxOrigin::Feature,
        }
    }

    fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Offsets show up both as numbers and as numeric strings in shipped maps.
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square(lon: f64, lat: f64, size: f64) -> Geometry {
        Geometry::polygon(vec![
            lon, lat, lon + size, lat, lon + size, lat + size, lon, lat + size, lon, lat,
        ])
    }

    #[test]
    fn test_pick_tx_falls_back_to_default() {
        let mut map = TransformMap::default();
        map.insert(
            "inset",
            TransformRecord::new(Crs::Wsg84)
                .with_offset(100.0, 0.0)
                .with_heat_zone(DataBounds::new(90.0, -10.0, 120.0, 10.0)),
        );

        assert_eq!(map.pick_tx(0.0, 0.0).xoffset, 100.0);
        assert_eq!(map.pick_tx(50.0, 50.0).xoffset, 0.0);
        assert_eq!(map.pick_tx_projected(95.0, 0.0).xoffset, 100.0);
    }

    #[test]
    fn test_scale_feature_keeps_other_records() {
        let mut map = TransformMap::default();
        let fr = square(0.0, 40.0, 10.0);
        let before = map.clone();

        map.scale_feature("FR", &fr, 2.0);

        assert_eq!(map.governing("FR", &fr).scale, 2.0);
        assert_eq!(map.governing("DE", &square(10.0, 45.0, 5.0)).scale, 1.0);
        assert_eq!(map.default_record(), before.default_record());
    }

    #[test]
    fn test_scale_feature_keeps_center() {
        let mut map = TransformMap::default();
        let geom = square(10.0, 10.0, 4.0);
        let zone = map.scale_feature("A", &geom, 3.0);

        let (cx, cy) = zone.center();
        assert!((cx - 12.0).abs() < 1e-9 && (cy - 12.0).abs() < 1e-9);
        assert!((zone.width() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_overrides_compose() {
        let mut map = TransformMap::default();
        let geom = square(0.0, 0.0, 2.0);
        map.translate_feature("A", &geom, 5.0, 0.0);
        map.translate_feature("A", &geom, 5.0, 1.0);

        let record = map.governing("A", &geom);
        assert_eq!((record.xoffset, record.yoffset), (10.0, 1.0));
        assert_eq!(record.heat_zone, Some(DataBounds::new(10.0, 1.0, 12.0, 3.0)));
    }

    #[test]
    fn test_override_cloned_from_heat_zone_record() {
        let mut map = TransformMap::default();
        map.insert(
            "inset",
            TransformRecord::new(Crs::Wsg84)
                .with_scale(0.5)
                .with_heat_zone(DataBounds::new(-10.0, -10.0, 10.0, 10.0)),
        );
        let geom = square(-2.0, -2.0, 4.0);
        map.translate_feature("X", &geom, 1.0, 0.0);
        assert_eq!(map.governing("X", &geom).scale, 0.5);
        assert_eq!(map.get("inset").map(|r| r.xoffset), Some(0.0));
    }

    #[test]
    fn test_reproject_feature_keeps_center() {
        let mut map = TransformMap::default();
        let geom = square(10.0, 20.0, 10.0);
        let before = map.governing("A", &geom).clone();
        let old_center = geom.projected_bounds(|lon, lat| before.project(lon, lat)).center();

        let zone = map.reproject_feature("A", &geom, Crs::Mercator);
        let record = map.governing("A", &geom);
        assert_eq!(record.crs, Crs::Mercator);
        assert_eq!(record.src_crs, Crs::Wsg84);
        assert!((zone.center().0 - old_center.0).abs() < 1e-9);
        assert!((zone.center().1 - old_center.1).abs() < 1e-9);
    }

    #[test]
    fn test_from_json_reads_ac_tx() {
        let value = json!({
            "default": {"crs": "mercator", "scale": 2},
            "ak": {"scale": 0.4, "xoffset": "-10.5", "yoffset": 3,
                   "heatZone": {"left": -20, "top": 10, "width": 10, "height": 5}}
        });
        let map = TransformMap::from_json(&value).unwrap();
        assert_eq!(map.default_record().crs, Crs::Mercator);
        let ak = map.get("ak").unwrap();
        assert_eq!(ak.crs, Crs::Mercator);
        assert_eq!(ak.xoffset, -10.5);
        assert_eq!(ak.heat_zone, Some(DataBounds::new(-20.0, 5.0, -10.0, 10.0)));

        let back = TransformMap::from_json(&map.to_json()).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_default_crs_change_carries_followers() {
        let mut map = TransformMap::default();
        map.insert("same", TransformRecord::new(Crs::Wsg84));
        map.insert("other", TransformRecord::new(Crs::Bonne));
        map.set_default_crs(Crs::Robinson);
        assert_eq!(map.get("same").map(|r| r.crs), Some(Crs::Robinson));
        assert_eq!(map.get("other").map(|r| r.crs), Some(Crs::Bonne));
    }
}
