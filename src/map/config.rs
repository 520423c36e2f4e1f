//! Chart settings and the JSON schema used by `serialize`/`setup_by_json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::map::animation::{AnimationSettings, Easing, DEFAULT_ZOOM_DURATION};
use crate::map::chart::MapChart;
use crate::map::drill::SceneId;
use crate::map::elements::{AxesSettings, Callout, CalloutConfig, ColorRangeSettings, GridSettings, UnboundRegions};
use crate::map::events::{Warning, WarningCode};
use crate::map::labels::OverlapMode;
use crate::map::projection::Crs;
use crate::map::scale::ScaleConfig;
use crate::map::series::{MapSeries, SeriesConfig};
use crate::map::state::{Consistency, ConsistencyState};
use crate::map::tx::TransformMap;

pub const DEFAULT_ZOOM_FACTOR: f64 = 1.3;
pub const DEFAULT_MIN_ZOOM_LEVEL: f64 = 1.0;
pub const DEFAULT_MAX_ZOOM_LEVEL: f64 = 10.0;
pub const DEFAULT_GEO_ID_FIELD: &str = "id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartSettings {
    pub zoom_factor: f64,
    pub unlimited_zoom: bool,
    pub min_zoom_level: f64,
    pub max_zoom_level: f64,
    pub geo_id_field: String,
    pub overlap_mode: OverlapMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<Crs>,
    pub zoom_animation: AnimationSettings,
    pub crs_animation: AnimationSettings,
    pub unbound_regions: UnboundRegions,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            zoom_factor: DEFAULT_ZOOM_FACTOR,
            unlimited_zoom: false,
            min_zoom_level: DEFAULT_MIN_ZOOM_LEVEL,
            max_zoom_level: DEFAULT_MAX_ZOOM_LEVEL,
            geo_id_field: DEFAULT_GEO_ID_FIELD.to_string(),
            overlap_mode: OverlapMode::NoOverlap,
            crs: None,
            zoom_animation: AnimationSettings {
                enabled: true,
                duration: DEFAULT_ZOOM_DURATION.as_millis() as u64,
                easing: Easing::Linear,
            },
            crs_animation: AnimationSettings {
                enabled: true,
                duration: 300,
                easing: Easing::EaseInOutCubic,
            },
            unbound_regions: UnboundRegions::AsIs,
        }
    }
}

impl ChartSettings {
    /// Settings with every animation turned off.
    pub fn without_animations() -> Self {
        let mut settings = Self::default();
        settings.zoom_animation.enabled = false;
        settings.crs_animation.enabled = false;
        settings
    }

    /// Clamp a zoom level to the configured range unless zoom is unlimited.
    pub fn clamp_zoom(&self, level: f64) -> f64 {
        if self.unlimited_zoom {
            level.max(crate::geo::EPSILON)
        } else {
            level.clamp(self.min_zoom_level, self.max_zoom_level.max(self.min_zoom_level))
        }
    }
}

/// Persisted chart state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapChartConfig {
    /// Name of the geo data the chart was built from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_data: Option<String>,
    #[serde(flatten)]
    pub settings: ChartSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleConfig>,
    pub series: Vec<SeriesConfig>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub drill_down_map: BTreeMap<String, MapChartConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub callouts: Vec<CalloutConfig>,
    pub axes: AxesSettings,
    pub grids: GridSettings,
    pub crosshair: bool,
    pub color_range: ColorRangeSettings,
    /// Transform table, feature overrides included, in the `ac-tx` layout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx: Option<Value>,
}

impl MapChart {
    /// Snapshot of the chart configuration, drill-down scenes included.
    pub fn config(&self) -> MapChartConfig {
        self.scene_config(SceneId::ROOT)
    }

    fn scene_config(&self, scene: SceneId) -> MapChartConfig {
        let Some(chart) = self.scene(scene) else {
            return MapChartConfig::default();
        };
        let mut config = chart.own_config();
        config.drill_down_map = self
            .drill
            .drill_map_of(scene)
            .map(|(id, child)| (id.to_string(), self.scene_config(child)))
            .collect();
        config
    }

    fn own_config(&self) -> MapChartConfig {
        let mut settings = self.settings.clone();
        settings.crs = Some(self.crs());
        MapChartConfig {
            geo_data: self.geo_data_name.clone(),
            settings,
            scale: Some(self.scale.config()),
            series: self.series.configs(),
            drill_down_map: BTreeMap::new(),
            callouts: self.elements.callouts.iter().map(|c| c.config.clone()).collect(),
            axes: self.elements.axes.settings.clone(),
            grids: self.elements.grids.settings.clone(),
            crosshair: self.elements.crosshair.enabled,
            color_range: self.elements.color_range.settings.clone(),
            tx: Some(self.scale.tx().to_json()),
        }
    }

    pub fn serialize(&self) -> Value {
        serde_json::to_value(self.config()).unwrap_or(Value::Null)
    }

    /// Restore a configuration produced by [`MapChart::serialize`].
    ///
    /// Structurally invalid json is an error. An unknown projection name or a
    /// broken transform table only produces a warning.
    pub fn setup_by_json(&mut self, value: &Value) -> Result<&mut Self> {
        let mut value = value.clone();
        let mut warnings = Vec::new();
        replace_unknown_names(&mut value, &mut warnings);
        for warning in warnings {
            self.events.warn(warning);
        }
        let config: MapChartConfig = serde_json::from_value(value)?;
        self.apply_config(&config);
        Ok(self)
    }

    pub fn apply_config(&mut self, config: &MapChartConfig) {
        self.settings = config.settings.clone();
        self.geo_data_name = config.geo_data.clone();

        if let Some(tx) = &config.tx {
            match TransformMap::from_json(tx) {
                Ok(map) => self.scale.set_tx(map),
                Err(err) => self.events.warn(Warning::new(WarningCode::InvalidConfig, err.to_string())),
            }
        }
        if let Some(crs) = self.settings.crs {
            self.scale.tx_mut().set_default_crs(crs);
        }
        if let Some(scale) = &config.scale {
            self.scale.apply_config(scale);
        }

        self.series.clear();
        for series in &config.series {
            self.add_series(Box::new(MapSeries::new(series.clone())));
        }

        self.elements.axes.settings = config.axes.clone();
        self.elements.grids.settings = config.grids.clone();
        self.elements.crosshair.enabled = config.crosshair;
        self.elements.color_range.settings = config.color_range.clone();
        self.elements.callouts = config.callouts.iter().cloned().map(Callout::new).collect();

        let drill_map: Vec<_> = config
            .drill_down_map
            .iter()
            .map(|(id, child)| {
                let mut chart = MapChart::new();
                chart.apply_config(child);
                (id.clone(), chart)
            })
            .collect();
        self.set_drill_down_map(drill_map);

        self.invalidate_state(ConsistencyState::all());
    }
}

/// Swap unknown projection and overlap mode names for the defaults, in the
/// chart, its series and points, and every drill-down scene.
fn replace_unknown_names(value: &mut Value, warnings: &mut Vec<Warning>) {
    let Some(object) = value.as_object_mut() else { return };
    if let Some(Value::String(name)) = object.get_mut("crs") {
        if name.parse::<Crs>().is_err() {
            warnings.push(Warning::new(
                WarningCode::UnknownProjection,
                format!("unknown projection `{name}`, using wsg84"),
            ));
            *name = Crs::Wsg84.name().to_string();
        }
    }
    replace_unknown_overlap_mode(object, warnings);
    if let Some(Value::Array(series)) = object.get_mut("series") {
        for series in series.iter_mut().filter_map(Value::as_object_mut) {
            replace_unknown_overlap_mode(series, warnings);
            if let Some(Value::Array(points)) = series.get_mut("data") {
                for point in points.iter_mut().filter_map(Value::as_object_mut) {
                    replace_unknown_overlap_mode(point, warnings);
                }
            }
        }
    }
    if let Some(Value::Object(scenes)) = object.get_mut("drillDownMap") {
        for scene in scenes.values_mut() {
            replace_unknown_names(scene, warnings);
        }
    }
}

fn replace_unknown_overlap_mode(object: &mut Map<String, Value>, warnings: &mut Vec<Warning>) {
    if let Some(Value::String(mode)) = object.get_mut("overlapMode") {
        if mode.parse::<OverlapMode>().is_err() {
            warnings.push(Warning::new(
                WarningCode::InvalidConfig,
                format!("unknown overlap mode `{mode}`, using no-overlap"),
            ));
            *mode = OverlapMode::NoOverlap.name().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::series::{DataPoint, SeriesType};
    use serde_json::json;

    #[test]
    fn test_settings_defaults_from_empty_json() {
        let config: MapChartConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.settings, ChartSettings::default());
        assert_eq!(config.settings.zoom_factor, 1.3);
        assert_eq!(config.settings.max_zoom_level, 10.0);
    }

    #[test]
    fn test_clamp_zoom() {
        let mut settings = ChartSettings::default();
        assert_eq!(settings.clamp_zoom(20.0), 10.0);
        assert_eq!(settings.clamp_zoom(0.2), 1.0);
        settings.unlimited_zoom = true;
        assert_eq!(settings.clamp_zoom(20.0), 20.0);
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut chart = MapChart::new();
        chart.settings.zoom_factor = 2.0;
        chart.settings.overlap_mode = OverlapMode::AllowOverlap;
        chart.set_crs(Crs::Robinson);
        chart.add_series(Box::new(MapSeries::choropleth(vec![DataPoint::region("FR", 1.0)])));
        chart.elements.axes.settings.enabled = true;

        let json = chart.serialize();
        assert_eq!(json["crs"], json!("robinson"));
        assert_eq!(json["overlapMode"], json!("allow-overlap"));

        let mut restored = MapChart::new();
        restored.setup_by_json(&json).unwrap();
        assert_eq!(restored.crs(), Crs::Robinson);
        assert_eq!(restored.series().len(), 1);
        assert_eq!(restored.series().get(0).map(|s| s.series_type()), Some(SeriesType::Choropleth));
        assert_eq!(restored.serialize(), json);
    }

    #[test]
    fn test_drill_down_map_round_trip() {
        let mut child = MapChart::new();
        child.set_crs(Crs::Mercator);
        let mut chart = MapChart::new();
        chart.set_drill_down_map([("FR".to_string(), child)]);

        let json = chart.serialize();
        assert_eq!(json["drillDownMap"]["FR"]["crs"], json!("mercator"));

        let mut restored = MapChart::new();
        restored.setup_by_json(&json).unwrap();
        assert_eq!(restored.drill.drill_map().count(), 1);
        assert_eq!(restored.serialize(), json);
    }

    #[test]
    fn test_unknown_crs_is_a_warning() {
        let mut chart = MapChart::new();
        chart.set_crs(Crs::Mercator);
        chart.setup_by_json(&json!({"crs": "no-such-projection"})).unwrap();
        let warnings = chart.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::UnknownProjection);
        assert_eq!(chart.crs(), Crs::Wsg84);
    }

    #[test]
    fn test_unknown_crs_in_a_drill_scene_is_a_warning() {
        let mut chart = MapChart::new();
        chart
            .setup_by_json(&json!({"drillDownMap": {"FR": {"crs": "flat-earth"}}}))
            .unwrap();
        let warnings = chart.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::UnknownProjection);

        let (id, scene) = chart.drill.drill_map().next().unwrap();
        assert_eq!(id, "FR");
        assert_eq!(chart.scene(scene).map(MapChart::crs), Some(Crs::Wsg84));
    }

    #[test]
    fn test_unknown_overlap_modes_fall_back_to_no_overlap() {
        let mut chart = MapChart::new();
        chart
            .setup_by_json(&json!({
                "overlapMode": "sometimes",
                "series": [{
                    "seriesType": "choropleth",
                    "overlapMode": "rarely",
                    "data": [{"id": "FR", "value": 1.0, "overlapMode": "never"}]
                }]
            }))
            .unwrap();

        let warnings = chart.take_warnings();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().all(|w| w.code == WarningCode::InvalidConfig));
        assert_eq!(chart.settings().overlap_mode, OverlapMode::NoOverlap);
        let series = chart.series().get(0).unwrap();
        assert_eq!(series.overlap_mode(), Some(OverlapMode::NoOverlap));
        assert_eq!(series.points().next().and_then(|p| p.overlap_mode), Some(OverlapMode::NoOverlap));
    }

    #[test]
    fn test_structural_errors_are_errors() {
        let mut chart = MapChart::new();
        assert!(chart.setup_by_json(&json!({"series": 12})).is_err());
    }
}
