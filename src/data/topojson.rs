//! TopoJSON topologies: shared arcs, optional quantization, per-object features.

use serde_json::{Map, Value};

use super::{convert_geometry, feature_id, GeoDataKind, GeoParser};
use crate::error::{MapError, Result};
use crate::map::geometry::GeoFeature;

type Position = Vec<f64>;

/// Quantization transform: positions are delta encoded integers.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Quantization {
    scale: [f64; 2],
    translate: [f64; 2],
}

impl Quantization {
    fn from_value(value: &Value) -> Result<Self> {
        let pair = |key: &str| -> Result<[f64; 2]> {
            let items = value
                .get(key)
                .and_then(Value::as_array)
                .filter(|a| a.len() == 2)
                .ok_or_else(|| MapError::TopoJson(format!("transform.{key} must hold two numbers")))?;
            let x = items[0].as_f64().ok_or_else(|| MapError::TopoJson(format!("bad transform.{key}")))?;
            let y = items[1].as_f64().ok_or_else(|| MapError::TopoJson(format!("bad transform.{key}")))?;
            Ok([x, y])
        };
        Ok(Self {
            scale: pair("scale")?,
            translate: pair("translate")?,
        })
    }

    fn point(&self, p: &[f64]) -> Position {
        vec![p[0] * self.scale[0] + self.translate[0], p[1] * self.scale[1] + self.translate[1]]
    }
}

fn position(value: &Value) -> Result<Position> {
    let items = value
        .as_array()
        .filter(|a| a.len() >= 2)
        .ok_or_else(|| MapError::TopoJson("position must hold two numbers".into()))?;
    items
        .iter()
        .take(2)
        .map(|v| v.as_f64().ok_or_else(|| MapError::TopoJson("position must be numeric".into())))
        .collect()
}

/// A decoded topology: absolute arc coordinates plus the quantization.
struct Topology {
    arcs: Vec<Vec<Position>>,
    quantization: Option<Quantization>,
}

impl Topology {
    fn from_value(value: &Value) -> Result<Self> {
        let quantization = value.get("transform").map(Quantization::from_value).transpose()?;
        let raw = value
            .get("arcs")
            .and_then(Value::as_array)
            .ok_or_else(|| MapError::TopoJson("missing arcs".into()))?;

        let mut arcs = Vec::with_capacity(raw.len());
        for arc in raw {
            let points = arc.as_array().ok_or_else(|| MapError::TopoJson("arc must be an array".into()))?;
            let mut decoded = Vec::with_capacity(points.len());
            let (mut x, mut y) = (0.0, 0.0);
            for point in points {
                let p = position(point)?;
                decoded.push(match quantization {
                    Some(q) => {
                        x += p[0];
                        y += p[1];
                        q.point(&[x, y])
                    }
                    None => p,
                });
            }
            arcs.push(decoded);
        }
        Ok(Self { arcs, quantization })
    }

    fn point(&self, value: &Value) -> Result<Position> {
        let p = position(value)?;
        Ok(match self.quantization {
            Some(q) => q.point(&p),
            None => p,
        })
    }

    /// Append arc `index` to `points`. Negative indices (`!i`) run backwards.
    fn push_arc(&self, index: i64, points: &mut Vec<Position>) -> Result<()> {
        let (slot, reversed) = if index < 0 { (!index, true) } else { (index, false) };
        let arc = usize::try_from(slot)
            .ok()
            .and_then(|i| self.arcs.get(i))
            .ok_or_else(|| MapError::TopoJson(format!("arc {index} out of range")))?;
        // Consecutive arcs share their joint.
        points.pop();
        if reversed {
            points.extend(arc.iter().rev().cloned());
        } else {
            points.extend(arc.iter().cloned());
        }
        Ok(())
    }

    fn line(&self, arcs: &Value) -> Result<Vec<Position>> {
        let indices = arcs.as_array().ok_or_else(|| MapError::TopoJson("arcs must be an array".into()))?;
        let mut points = Vec::new();
        for index in indices {
            let index = index.as_i64().ok_or_else(|| MapError::TopoJson("arc index must be an integer".into()))?;
            self.push_arc(index, &mut points)?;
        }
        if let Some(first) = points.first().cloned() {
            if points.len() < 2 {
                points.push(first);
            }
        }
        Ok(points)
    }

    fn ring(&self, arcs: &Value) -> Result<Vec<Position>> {
        let mut points = self.line(arcs)?;
        if let Some(first) = points.first().cloned() {
            while points.len() < 4 {
                points.push(first.clone());
            }
        }
        Ok(points)
    }

    fn polygon(&self, arcs: &Value) -> Result<Vec<Vec<Position>>> {
        nested(arcs)?.iter().map(|ring| self.ring(ring)).collect()
    }

    fn geometry(&self, object: &Value) -> Result<Option<geojson::Value>> {
        let arcs = || object.get("arcs").ok_or_else(|| MapError::TopoJson("missing arcs member".into()));
        let coordinates =
            || object.get("coordinates").ok_or_else(|| MapError::TopoJson("missing coordinates member".into()));

        let value = match object.get("type").and_then(Value::as_str) {
            Some("Point") => geojson::Value::Point(self.point(coordinates()?)?),
            Some("MultiPoint") => geojson::Value::MultiPoint(
                nested(coordinates()?)?.iter().map(|p| self.point(p)).collect::<Result<_>>()?,
            ),
            Some("LineString") => geojson::Value::LineString(self.line(arcs()?)?),
            Some("MultiLineString") => geojson::Value::MultiLineString(
                nested(arcs()?)?.iter().map(|l| self.line(l)).collect::<Result<_>>()?,
            ),
            Some("Polygon") => geojson::Value::Polygon(self.polygon(arcs()?)?),
            Some("MultiPolygon") => geojson::Value::MultiPolygon(
                nested(arcs()?)?.iter().map(|p| self.polygon(p)).collect::<Result<_>>()?,
            ),
            Some("GeometryCollection") => {
                let mut members = Vec::new();
                for member in nested(object.get("geometries").unwrap_or(&Value::Null))? {
                    if let Some(value) = self.geometry(member)? {
                        members.push(geojson::Geometry::new(value));
                    }
                }
                geojson::Value::GeometryCollection(members)
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}

fn nested(value: &Value) -> Result<&Vec<Value>> {
    value.as_array().ok_or_else(|| MapError::TopoJson("expected an array".into()))
}

pub struct TopoJsonParser {
    geo_id_field: String,
}

impl TopoJsonParser {
    pub fn new(geo_id_field: impl Into<String>) -> Self {
        Self {
            geo_id_field: geo_id_field.into(),
        }
    }

    fn feature(&self, topology: &Topology, object: &Value) -> Result<GeoFeature> {
        let properties: Map<String, Value> =
            object.get("properties").and_then(Value::as_object).cloned().unwrap_or_default();
        let id = feature_id(&properties, &self.geo_id_field).or_else(|| {
            if self.geo_id_field != "id" {
                return None;
            }
            match object.get("id")? {
                Value::String(id) => Some(id.clone()),
                Value::Number(id) => Some(id.to_string()),
                _ => None,
            }
        });
        let geometry = topology.geometry(object)?.map(convert_geometry).unwrap_or_default();
        Ok(GeoFeature::new(id, properties, geometry))
    }
}

impl GeoParser for TopoJsonParser {
    fn kind(&self) -> GeoDataKind {
        GeoDataKind::TopoJson
    }

    fn parse(&self, value: &Value) -> Result<Vec<GeoFeature>> {
        let topology = Topology::from_value(value)?;
        let objects = value
            .get("objects")
            .and_then(Value::as_object)
            .ok_or_else(|| MapError::TopoJson("missing objects".into()))?;

        let mut features = Vec::new();
        for object in objects.values() {
            // A top-level collection contributes one feature per member.
            if object.get("type").and_then(Value::as_str) == Some("GeometryCollection") {
                for member in nested(object.get("geometries").unwrap_or(&Value::Null))? {
                    features.push(self.feature(&topology, member)?);
                }
            } else {
                features.push(self.feature(&topology, object)?);
            }
        }
        Ok(features)
    }
}
