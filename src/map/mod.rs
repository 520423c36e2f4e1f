//! Map chart engine: projections, the geo scale, retained layers, series,
//! label overlap and the chart orchestrator.

pub mod animation;
pub mod chart;
pub mod config;
pub mod drill;
pub mod elements;
pub mod events;
mod features;
pub mod geometry;
mod globe;
pub mod graphics;
pub mod heap;
pub mod interactivity;
pub mod labels;
pub mod navigation;
pub mod projection;
pub mod renderer;
pub mod scale;
pub mod series;
mod spatial;
pub mod state;
pub mod tx;

pub use animation::{Animation, AnimationKind, AnimationState};
pub use chart::{Drawable, Drillable, MapChart, Zoomable};
pub use config::{ChartSettings, MapChartConfig};
pub use drill::{DrillPoint, SceneId};
pub use events::{ChartEvent, Warning, WarningCode};
pub use geometry::{GeoFeature, Geometry};
pub use labels::OverlapMode;
pub use projection::{Crs, Projection, TwinProjection};
pub use renderer::{MapLayers, MapRenderer};
pub use scale::{GeoPoint, GeoScale};
pub use series::{DataPoint, MapSeries, Series, SeriesType};
pub use state::ConsistencyState;
