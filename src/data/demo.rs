//! Built-in low resolution world used when no geo data file is given.

use serde_json::{json, Map, Value};

use super::{GeoData, GeoDataKind};
use crate::map::geometry::{GeoFeature, Geometry};
use crate::map::series::DataPoint;

fn continent(id: &str, name: &str, ring: &[(f64, f64)]) -> GeoFeature {
    let mut properties = Map::new();
    properties.insert("id".into(), Value::String(id.into()));
    properties.insert("name".into(), json!(name));
    let flat = ring.iter().flat_map(|&(lon, lat)| [lon, lat]).collect();
    GeoFeature::new(Some(id.into()), properties, Geometry::polygon(flat))
}

/// Simplified continent outlines.
pub fn demo_world() -> GeoData {
    let features = vec![
        continent(
            "NA",
            "North America",
            &[
                (-168.0, 65.0), (-166.0, 60.0), (-141.0, 60.0), (-130.0, 55.0),
                (-125.0, 48.0), (-124.0, 40.0), (-117.0, 32.0), (-110.0, 25.0),
                (-97.0, 25.0), (-97.0, 28.0), (-82.0, 24.0), (-80.0, 25.0),
                (-81.0, 31.0), (-75.0, 35.0), (-70.0, 41.0), (-67.0, 45.0),
                (-65.0, 47.0), (-55.0, 47.0), (-52.0, 47.0), (-55.0, 52.0),
                (-58.0, 55.0), (-64.0, 60.0), (-73.0, 62.0), (-80.0, 63.0),
                (-95.0, 62.0), (-110.0, 68.0), (-130.0, 70.0), (-145.0, 70.0),
            ],
        ),
        continent(
            "SA",
            "South America",
            &[
                (-80.0, 10.0), (-75.0, 5.0), (-70.0, 5.0), (-60.0, 5.0),
                (-50.0, 0.0), (-35.0, -5.0), (-35.0, -10.0), (-38.0, -15.0),
                (-40.0, -22.0), (-48.0, -25.0), (-55.0, -34.0), (-58.0, -38.0),
                (-65.0, -42.0), (-68.0, -50.0), (-75.0, -52.0), (-75.0, -45.0),
                (-72.0, -40.0), (-72.0, -30.0), (-70.0, -20.0), (-70.0, -15.0),
                (-80.0, -5.0), (-80.0, 0.0),
            ],
        ),
        continent(
            "EU",
            "Europe",
            &[
                (-10.0, 36.0), (-5.0, 36.0), (0.0, 38.0), (5.0, 43.0),
                (10.0, 44.0), (15.0, 45.0), (20.0, 40.0), (25.0, 37.0),
                (30.0, 40.0), (35.0, 42.0), (40.0, 43.0), (40.0, 55.0),
                (30.0, 60.0), (25.0, 65.0), (20.0, 70.0), (10.0, 71.0),
                (5.0, 62.0), (5.0, 58.0), (-5.0, 58.0), (-10.0, 52.0),
                (-5.0, 48.0), (-5.0, 43.0),
            ],
        ),
        continent(
            "AF",
            "Africa",
            &[
                (-17.0, 15.0), (-17.0, 20.0), (-15.0, 28.0), (-5.0, 35.0),
                (10.0, 37.0), (20.0, 33.0), (25.0, 32.0), (35.0, 30.0),
                (35.0, 20.0), (42.0, 12.0), (50.0, 12.0), (45.0, 5.0),
                (35.0, -5.0), (35.0, -20.0), (35.0, -25.0), (30.0, -30.0),
                (20.0, -35.0), (18.0, -35.0), (15.0, -30.0), (10.0, -15.0),
                (10.0, 0.0), (5.0, 5.0), (-5.0, 5.0), (-10.0, 10.0),
            ],
        ),
        continent(
            "AS",
            "Asia",
            &[
                (40.0, 43.0), (50.0, 40.0), (55.0, 37.0), (60.0, 25.0),
                (65.0, 25.0), (70.0, 20.0), (75.0, 15.0), (80.0, 8.0),
                (80.0, 15.0), (88.0, 22.0), (92.0, 22.0), (95.0, 16.0),
                (100.0, 14.0), (105.0, 10.0), (110.0, 20.0), (115.0, 22.0),
                (120.0, 22.0), (122.0, 25.0), (125.0, 30.0), (130.0, 35.0),
                (135.0, 35.0), (140.0, 40.0), (145.0, 45.0), (145.0, 50.0),
                (140.0, 55.0), (135.0, 55.0), (130.0, 52.0), (130.0, 43.0),
                (120.0, 40.0), (110.0, 45.0), (90.0, 50.0), (70.0, 55.0),
                (60.0, 55.0), (50.0, 50.0),
            ],
        ),
        continent(
            "OC",
            "Oceania",
            &[
                (115.0, -20.0), (120.0, -18.0), (130.0, -12.0), (140.0, -12.0),
                (145.0, -15.0), (150.0, -25.0), (153.0, -30.0), (150.0, -35.0),
                (145.0, -38.0), (140.0, -38.0), (135.0, -35.0), (130.0, -32.0),
                (125.0, -32.0), (115.0, -35.0), (115.0, -25.0),
            ],
        ),
    ];
    GeoData::new(GeoDataKind::GeoJson, features).with_name("world")
}

/// Population in millions per continent.
pub fn demo_regions() -> Vec<DataPoint> {
    [("NA", 600.0), ("SA", 430.0), ("EU", 745.0), ("AF", 1400.0), ("AS", 4700.0), ("OC", 45.0)]
        .into_iter()
        .map(|(id, value)| DataPoint::region(id, value))
        .collect()
}

/// Major cities, population in millions.
pub fn demo_cities() -> Vec<DataPoint> {
    [
        ("New York", -74.0, 40.7, 18.8),
        ("London", -0.1, 51.5, 9.0),
        ("Paris", 2.3, 48.9, 11.0),
        ("Tokyo", 139.7, 35.7, 37.4),
        ("Sydney", 151.2, -33.9, 5.3),
        ("Rio", -43.2, -22.9, 13.5),
        ("Moscow", 37.6, 55.8, 12.5),
        ("Beijing", 116.4, 39.9, 21.5),
        ("Delhi", 77.2, 28.6, 32.9),
        ("Los Angeles", -118.2, 34.0, 12.4),
        ("Mexico City", -99.1, 19.4, 21.8),
        ("Buenos Aires", -58.4, -34.6, 15.0),
    ]
    .into_iter()
    .map(|(name, lon, lat, value)| DataPoint::at(lon, lat, value).named(name))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_regions_match_features() {
        let world = demo_world();
        for point in demo_regions() {
            let id = point.id.as_deref();
            assert!(world.features.iter().any(|f| f.id.as_deref() == id), "{id:?}");
        }
    }
}
