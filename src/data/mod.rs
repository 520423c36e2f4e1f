//! Geo data loading: format detection and the GeoJSON/TopoJSON parsers.

mod demo;
pub mod topojson;

pub use demo::{demo_cities, demo_regions, demo_world};
pub use topojson::TopoJsonParser;

use std::fs;
use std::path::Path;

use geojson::{feature::Id, GeoJson};
use serde_json::{Map, Value};

use crate::error::{MapError, Result};
use crate::map::geometry::{close_ring, GeoFeature, Geometry, Polygone};
use crate::map::tx::TransformMap;

/// Key of the transform table shipped inside geo data files.
pub const TX_KEY: &str = "ac-tx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoDataKind {
    GeoJson,
    TopoJson,
    Svg,
}

impl GeoDataKind {
    /// Guess the format of a raw payload.
    pub fn detect(text: &str) -> Option<Self> {
        let trimmed = text.trim_start();
        if trimmed.starts_with('<') {
            return Some(GeoDataKind::Svg);
        }
        if !trimmed.starts_with('{') {
            return None;
        }
        // Cheap sniff before the full parse.
        if trimmed.contains("\"Topology\"") {
            Some(GeoDataKind::TopoJson)
        } else {
            Some(GeoDataKind::GeoJson)
        }
    }

    pub fn of_value(value: &Value) -> Self {
        match value.get("type").and_then(Value::as_str) {
            Some("Topology") => GeoDataKind::TopoJson,
            _ => GeoDataKind::GeoJson,
        }
    }
}

/// Parsed geo data ready to be handed to a chart.
#[derive(Debug, Clone)]
pub struct GeoData {
    pub kind: GeoDataKind,
    pub features: Vec<GeoFeature>,
    /// The `ac-tx` table, when the file carries one.
    pub tx: Option<TransformMap>,
    pub name: Option<String>,
}

impl GeoData {
    pub fn new(kind: GeoDataKind, features: Vec<GeoFeature>) -> Self {
        Self {
            kind,
            features,
            tx: None,
            name: None,
        }
    }

    pub fn with_tx(mut self, tx: TransformMap) -> Self {
        self.tx = Some(tx);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Converts one external format into features.
pub trait GeoParser {
    fn kind(&self) -> GeoDataKind;
    fn parse(&self, value: &Value) -> Result<Vec<GeoFeature>>;
}

pub struct GeoJsonParser {
    geo_id_field: String,
}

impl GeoJsonParser {
    pub fn new(geo_id_field: impl Into<String>) -> Self {
        Self {
            geo_id_field: geo_id_field.into(),
        }
    }

    fn feature(&self, feature: geojson::Feature) -> GeoFeature {
        let properties = feature.properties.unwrap_or_default();
        let id = feature_id(&properties, &self.geo_id_field).or_else(|| match feature.id {
            Some(Id::String(id)) if self.geo_id_field == "id" => Some(id),
            Some(Id::Number(id)) if self.geo_id_field == "id" => Some(id.to_string()),
            _ => None,
        });
        let geometry = feature.geometry.map(|g| convert_geometry(g.value)).unwrap_or_default();
        GeoFeature::new(id, properties, geometry)
    }
}

impl GeoParser for GeoJsonParser {
    fn kind(&self) -> GeoDataKind {
        GeoDataKind::GeoJson
    }

    fn parse(&self, value: &Value) -> Result<Vec<GeoFeature>> {
        let mut value = value.clone();
        if let Some(object) = value.as_object_mut() {
            object.remove(TX_KEY);
        }
        let features = match GeoJson::from_json_value(value)? {
            GeoJson::FeatureCollection(collection) => {
                collection.features.into_iter().map(|f| self.feature(f)).collect()
            }
            GeoJson::Feature(feature) => vec![self.feature(feature)],
            GeoJson::Geometry(geometry) => match geometry.value {
                // Bare collections expand to one feature per member.
                geojson::Value::GeometryCollection(members) => members
                    .into_iter()
                    .map(|g| GeoFeature::new(None, Map::new(), convert_geometry(g.value)))
                    .collect(),
                other => vec![GeoFeature::new(None, Map::new(), convert_geometry(other))],
            },
        };
        Ok(features)
    }
}

pub(crate) fn feature_id(properties: &Map<String, Value>, field: &str) -> Option<String> {
    match properties.get(field)? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn flatten(positions: &[Vec<f64>]) -> Vec<f64> {
    positions
        .iter()
        .filter(|p| p.len() >= 2)
        .flat_map(|p| [p[0], p[1]])
        .collect()
}

fn ring(positions: &[Vec<f64>]) -> Vec<f64> {
    let mut ring = flatten(positions);
    close_ring(&mut ring);
    ring
}

fn polygone(rings: &[Vec<Vec<f64>>]) -> Polygone {
    let mut rings = rings.iter();
    Polygone {
        outer_path: rings.next().map(|r| ring(r)).unwrap_or_default(),
        holes: rings.map(|r| ring(r)).collect(),
    }
}

/// Typed GeoJSON geometry to the flat internal form.
pub(crate) fn convert_geometry(value: geojson::Value) -> Geometry {
    match value {
        geojson::Value::Point(p) => Geometry::Point {
            coordinates: flatten(std::slice::from_ref(&p)),
        },
        geojson::Value::MultiPoint(points) => Geometry::Point {
            coordinates: flatten(&points),
        },
        geojson::Value::LineString(line) => Geometry::Line {
            paths: vec![flatten(&line)],
        },
        geojson::Value::MultiLineString(lines) => Geometry::Line {
            paths: lines.iter().map(|l| flatten(l)).collect(),
        },
        geojson::Value::Polygon(rings) => Geometry::Polygon {
            polygones: vec![polygone(&rings)],
        },
        geojson::Value::MultiPolygon(polygons) => Geometry::Polygon {
            polygones: polygons.iter().map(|p| polygone(p)).collect(),
        },
        geojson::Value::GeometryCollection(members) => {
            Geometry::Collection(members.into_iter().map(|g| convert_geometry(g.value)).collect())
        }
    }
}

/// Parse a JSON payload with simd-json into a `serde_json::Value`.
pub fn parse_json(text: &str) -> Result<Value> {
    let mut bytes = text.as_bytes().to_vec();
    Ok(simd_json::serde::from_slice(&mut bytes)?)
}

/// Parse an already decoded geo data object.
pub fn parse_value(value: &Value, geo_id_field: &str) -> Result<GeoData> {
    if !value.is_object() {
        return Err(MapError::InvalidGeoData("root must be an object".into()));
    }
    let kind = GeoDataKind::of_value(value);
    let features = match kind {
        GeoDataKind::TopoJson => TopoJsonParser::new(geo_id_field).parse(value)?,
        GeoDataKind::GeoJson => GeoJsonParser::new(geo_id_field).parse(value)?,
        GeoDataKind::Svg => return Err(MapError::UnsupportedSvg),
    };
    let tx = value.get(TX_KEY).map(TransformMap::from_json).transpose()?;
    tracing::debug!(?kind, features = features.len(), has_tx = tx.is_some(), "parsed geo data");
    Ok(GeoData {
        kind,
        features,
        tx,
        name: None,
    })
}

pub fn parse_str(text: &str, geo_id_field: &str) -> Result<GeoData> {
    match GeoDataKind::detect(text) {
        Some(GeoDataKind::Svg) => Err(MapError::UnsupportedSvg),
        Some(_) => parse_value(&parse_json(text)?, geo_id_field),
        None => Err(MapError::InvalidGeoData("expected a json object".into())),
    }
}

/// Load a geo data file, naming it after the file stem.
pub fn load_file(path: &Path, geo_id_field: &str) -> anyhow::Result<GeoData> {
    let content = fs::read_to_string(path)?;
    let mut data = parse_str(&content, geo_id_field)?;
    data.name = path.file_stem().map(|s| s.to_string_lossy().into_owned());
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"id": "FR", "name": "France"},
             "geometry": {"type": "Polygon", "coordinates": [
                [[0, 0], [10, 0], [10, 10], [0, 10]],
                [[2, 2], [4, 2], [4, 4], [2, 2]]
             ]}},
            {"type": "Feature", "id": 7, "properties": {"code": 12},
             "geometry": {"type": "MultiPoint", "coordinates": [[1, 2], [3, 4]]}}
        ]
    }"#;

    #[test]
    fn test_detect_kind() {
        assert_eq!(GeoDataKind::detect("  <svg></svg>"), Some(GeoDataKind::Svg));
        assert_eq!(GeoDataKind::detect(r#"{"type": "Topology"}"#), Some(GeoDataKind::TopoJson));
        assert_eq!(GeoDataKind::detect(COLLECTION), Some(GeoDataKind::GeoJson));
        assert_eq!(GeoDataKind::detect("[1, 2]"), None);
    }

    #[test]
    fn test_geojson_features() {
        let data = parse_str(COLLECTION, "id").unwrap();
        assert_eq!(data.kind, GeoDataKind::GeoJson);
        assert_eq!(data.features.len(), 2);

        let france = &data.features[0];
        assert_eq!(france.id.as_deref(), Some("FR"));
        match &france.geometry {
            Geometry::Polygon { polygones } => {
                assert_eq!(polygones[0].outer_path, vec![0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0, 0.0, 0.0]);
                assert_eq!(polygones[0].holes.len(), 1);
            }
            other => panic!("unexpected geometry {other:?}"),
        }

        // falls back to the feature id
        assert_eq!(data.features[1].id.as_deref(), Some("7"));
        assert_eq!(
            data.features[1].geometry,
            Geometry::Point { coordinates: vec![1.0, 2.0, 3.0, 4.0] }
        );
    }

    #[test]
    fn test_custom_id_field() {
        let data = parse_str(COLLECTION, "code").unwrap();
        assert_eq!(data.features[0].id, None);
        assert_eq!(data.features[1].id.as_deref(), Some("12"));
    }

    #[test]
    fn test_tx_table_is_read() {
        let text = r#"{"type": "FeatureCollection", "features": [],
            "ac-tx": {"default": {"crs": "mercator", "scale": 2}}}"#;
        let data = parse_str(text, "id").unwrap();
        assert!(data.tx.is_some());
    }

    #[test]
    fn test_rejects_bad_roots() {
        assert!(matches!(parse_str("<svg/>", "id"), Err(MapError::UnsupportedSvg)));
        assert!(matches!(parse_str("42", "id"), Err(MapError::InvalidGeoData(_))));
        assert!(parse_str("{\"type\": ", "id").is_err());
        assert!(parse_str(r#"{"type": "Nope"}"#, "id").is_err());
    }
}
