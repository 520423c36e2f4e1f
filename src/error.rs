//! Error types for the map engine.
//!
//! Only structural failures travel as `Err`. Configuration and reference
//! problems are reported through [`crate::map::Warning`] instead.

use thiserror::Error;

/// Errors surfaced by geo data parsing and configuration loading.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("unknown projection `{0}`")]
    UnknownProjection(String),

    #[error("invalid geo data: {0}")]
    InvalidGeoData(String),

    #[error("svg geo data is not supported")]
    UnsupportedSvg,

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed json: {0}")]
    SimdJson(#[from] simd_json::Error),

    #[error("invalid geojson: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("invalid topojson: {0}")]
    TopoJson(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = MapError> = std::result::Result<T, E>;
