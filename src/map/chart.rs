//! The map chart: owns geo data, the scale, the map layer and the series, and
//! resolves consistency states in a fixed order on every draw.
//!
//! Public mutators never draw. They set consistency bits and the next
//! [`MapChart::draw`] resolves them, so several changes made in one tick cost
//! one redraw. Navigation lives in `navigation.rs`, per-feature transforms in
//! `features.rs`, hit testing and selection in `interactivity.rs` and
//! drill-down in `drill.rs`.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::data::GeoData;
use crate::error::Result;
use crate::geo::Rect;
use crate::map::animation::{Animation, AnimationId, AnimationKind, AnimationState};
use crate::map::config::ChartSettings;
use crate::map::drill::{DrillPoint, SceneGraph, SceneId};
use crate::map::elements::{ChartElements, UnboundRegions};
use crate::map::events::{ChartEvent, EventQueue, Warning, WarningCode};
use crate::map::geometry::{FeatureStore, GeoFeature, PathKind};
use crate::map::graphics::{Layer, Path};
use crate::map::interactivity::Marquee;
use crate::map::labels::{self, is_overlap_forbidden, LabelCandidate, Resolution};
use crate::map::navigation::FeatureZoomToggle;
use crate::map::projection::{Crs, Projection, TwinProjection};
use crate::map::scale::{GeoPoint, GeoScale};
use crate::map::series::{PointState, Series, SeriesContext, SeriesCoordinator};
use crate::map::spatial::FeatureGrid;
use crate::map::state::{run_stages, Consistency, ConsistencyState, Stage};
use crate::map::tx::TxOrigin;

/// Fill bucket used for selected regions.
pub const SELECTED_FILL: u8 = u8::MAX;

/// Something that lays itself out in a viewport and draws incrementally.
pub trait Drawable {
    fn set_bounds(&mut self, bounds: Rect);
    fn calculate(&mut self);
    fn draw(&mut self);
    /// Advance animations. Returns whether anything is still moving.
    fn tick(&mut self, dt: Duration) -> bool;
}

pub trait Zoomable {
    fn zoom_level(&self) -> f64;
    fn zoom_by(&mut self, factor: f64, cx: Option<f64>, cy: Option<f64>, duration: Option<Duration>);
    fn zoom_to_level(&mut self, level: f64, cx: Option<f64>, cy: Option<f64>, duration: Option<Duration>);
    fn move_view(&mut self, dx: f64, dy: f64);
    fn fit(&mut self);
}

pub trait Drillable {
    fn drill_down(&mut self, id: &str, target: Option<MapChart>);
    fn drill_back(&mut self);
    fn drill_path(&self) -> &[DrillPoint];
    fn scene_id(&self) -> SceneId;
}

/// A running crs change.
#[derive(Debug, Clone)]
struct CrsTransition {
    animation: Animation,
    from: Crs,
    to: Crs,
}

pub struct MapChart {
    pub(crate) settings: ChartSettings,
    pub(crate) geo_data_name: Option<String>,
    pending_geo_data: Option<GeoData>,
    pub(crate) features: FeatureStore,
    pub(crate) scale: GeoScale,
    pub(crate) grid: FeatureGrid,
    pub(crate) bounds: Option<Rect>,
    pub(crate) map_layer: Layer,
    pub(crate) series: SeriesCoordinator,
    pub(crate) elements: ChartElements,
    pub(crate) labels: Resolution,
    states: ConsistencyState,

    /// Current map layer frame `[zoom, dx, dy]`.
    pub(crate) view: [f64; 3],
    pub(crate) view_animation: Option<Animation>,
    crs_transition: Option<CrsTransition>,
    next_animation: u64,
    /// Only series that redraw per frame are drawn in this pass.
    frame_pass: bool,

    pub(crate) zoom_toggle: FeatureZoomToggle,
    pub(crate) events: EventQueue,
    pub(crate) selected_features: BTreeSet<String>,
    pub(crate) marquee: Option<Marquee>,
    pub(crate) visible: bool,
    pub(crate) drill: SceneGraph,
}

impl Default for MapChart {
    fn default() -> Self {
        Self::new()
    }
}

impl Consistency for MapChart {
    fn states(&self) -> ConsistencyState {
        self.states
    }

    fn states_mut(&mut self) -> &mut ConsistencyState {
        &mut self.states
    }

    fn invalidate_state(&mut self, flags: ConsistencyState) {
        if flags.contains(ConsistencyState::SERIES) {
            self.frame_pass = false;
        }
        self.states.insert(flags);
    }
}

const CALCULATION_STAGES: [Stage<MapChart>; 3] = [
    Stage { flag: ConsistencyState::GEO_DATA, name: "geo_data", resolve: MapChart::install_geo_data },
    Stage { flag: ConsistencyState::SCALE, name: "scale", resolve: MapChart::calculate_scale },
    Stage { flag: ConsistencyState::GEO_DATA_INDEX, name: "geo_data_index", resolve: MapChart::index_geo_data },
];

const DRAW_STAGES: [Stage<MapChart>; 11] = [
    Stage { flag: ConsistencyState::BOUNDS, name: "bounds", resolve: MapChart::draw_bounds },
    Stage { flag: ConsistencyState::ZOOM, name: "zoom", resolve: MapChart::draw_zoom },
    Stage { flag: ConsistencyState::MOVE, name: "move", resolve: MapChart::draw_move },
    Stage { flag: ConsistencyState::AXES, name: "axes", resolve: MapChart::draw_axes },
    Stage { flag: ConsistencyState::GRIDS, name: "grids", resolve: MapChart::draw_grids },
    Stage { flag: ConsistencyState::CROSSHAIR, name: "crosshair", resolve: MapChart::draw_crosshair },
    Stage { flag: ConsistencyState::APPEARANCE, name: "appearance", resolve: MapChart::draw_appearance },
    Stage { flag: ConsistencyState::SERIES, name: "series", resolve: MapChart::draw_series },
    Stage { flag: ConsistencyState::LABELS, name: "labels", resolve: MapChart::draw_labels },
    Stage { flag: ConsistencyState::COLOR_RANGE, name: "color_range", resolve: MapChart::draw_color_range },
    Stage { flag: ConsistencyState::CALLOUT, name: "callout", resolve: MapChart::draw_callouts },
];

impl MapChart {
    pub fn new() -> Self {
        Self::with_settings(ChartSettings::default())
    }

    pub fn with_settings(settings: ChartSettings) -> Self {
        let mut scale = GeoScale::new();
        if let Some(crs) = settings.crs {
            scale.tx_mut().set_default_crs(crs);
        }
        Self {
            settings,
            geo_data_name: None,
            pending_geo_data: None,
            features: FeatureStore::default(),
            scale,
            grid: FeatureGrid::default(),
            bounds: None,
            map_layer: Layer::new(0),
            series: SeriesCoordinator::new(),
            elements: ChartElements::default(),
            labels: Resolution::default(),
            states: ConsistencyState::all(),
            view: [1.0, 0.0, 0.0],
            view_animation: None,
            crs_transition: None,
            next_animation: 0,
            frame_pass: false,
            zoom_toggle: FeatureZoomToggle::default(),
            events: EventQueue::default(),
            selected_features: BTreeSet::new(),
            marquee: None,
            visible: true,
            drill: SceneGraph::default(),
        }
    }

    pub fn settings(&self) -> &ChartSettings {
        &self.settings
    }

    /// Change settings. Zoom limits apply from the next navigation call.
    pub fn settings_mut(&mut self) -> &mut ChartSettings {
        self.invalidate_state(ConsistencyState::APPEARANCE | ConsistencyState::LABELS);
        &mut self.settings
    }

    // Geo data

    /// Queue parsed geo data. It is installed by the next `calculate`.
    pub fn set_geo_data(&mut self, data: GeoData) -> &mut Self {
        self.geo_data_name = data.name.clone().or_else(|| self.geo_data_name.take());
        self.pending_geo_data = Some(data);
        self.invalidate_state(ConsistencyState::GEO_DATA);
        self
    }

    /// Parse a geo data payload with this chart's id field and queue it.
    pub fn set_geo_data_json(&mut self, text: &str) -> Result<&mut Self> {
        let data = crate::data::parse_str(text, &self.settings.geo_id_field)?;
        Ok(self.set_geo_data(data))
    }

    pub fn features(&self) -> &FeatureStore {
        &self.features
    }

    pub fn feature_by_id(&self, id: &str) -> Option<&GeoFeature> {
        self.features.get(id)
    }

    // Projection

    pub fn crs(&self) -> Crs {
        self.scale.tx().default_record().crs
    }

    /// Switch the default projection. With geo data loaded and crs animation
    /// enabled the change is blended over several frames.
    pub fn set_crs(&mut self, crs: Crs) -> &mut Self {
        let from = self.crs();
        self.settings.crs = Some(crs);
        if from == crs {
            let settled = crs.projection();
            if self.crs_transition.is_none() && self.scale.tx().default_record().current_projection != settled {
                self.scale.tx_mut().set_blend(crs, settled);
                self.invalidate_state(ConsistencyState::SCALE | ConsistencyState::APPEARANCE);
            }
            return self;
        }
        if let Some(transition) = self.crs_transition.as_mut() {
            transition.animation.stop();
        }
        self.crs_transition = None;
        self.scale.tx_mut().set_default_crs(crs);

        let duration = self.settings.crs_animation.duration();
        if !self.features.is_empty() && !duration.is_zero() {
            let id = self.next_animation_id();
            let mut animation = Animation::new(id, AnimationKind::Crs, [0.0; 3], [1.0, 0.0, 0.0], duration)
                .with_easing(self.settings.crs_animation.easing);
            animation.play();
            self.scale
                .tx_mut()
                .set_blend(crs, Projection::Twin(TwinProjection::new(from, crs, 0.0)));
            self.events.emit(ChartEvent::AnimationStart { kind: AnimationKind::Crs });
            self.crs_transition = Some(CrsTransition { animation, from, to: crs });
        }
        tracing::debug!(from = %from, to = %crs, "crs change");
        self.invalidate_state(ConsistencyState::SCALE | ConsistencyState::APPEARANCE);
        self
    }

    /// Resolve a projection name. Unknown names fall back to `wsg84` with a
    /// warning.
    pub fn set_crs_by_name(&mut self, name: &str) -> &mut Self {
        match name.parse::<Crs>() {
            Ok(crs) => self.set_crs(crs),
            Err(err) => {
                self.events.warn(Warning::new(WarningCode::UnknownProjection, err.to_string()));
                self.set_crs(Crs::Wsg84)
            }
        }
    }

    pub fn is_crs_animating(&self) -> bool {
        self.crs_transition.as_ref().is_some_and(|t| t.animation.is_playing())
    }

    // Scale

    pub fn scale(&self) -> &GeoScale {
        &self.scale
    }

    /// Mutable scale access. The range is recomputed on the next calculate.
    pub fn scale_mut(&mut self) -> &mut GeoScale {
        self.invalidate_state(ConsistencyState::SCALE);
        &mut self.scale
    }

    /// Lon/lat to screen pixels at the current frame.
    pub fn transform(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y) = self.scale.tx().pick_tx(lon, lat).project(lon, lat);
        let (px, py) = self.scale.scale_to_px(x, y);
        self.local_to_screen(px, py)
    }

    /// Screen pixels back to data units and lon/lat.
    pub fn inverse_transform(&self, sx: f64, sy: f64) -> GeoPoint {
        let (px, py) = self.screen_to_local(sx, sy);
        let (x, y) = self.scale.px_to_scale(px, py);
        let (long, lat) = self.scale.tx().pick_tx_projected(x, y).unproject(x, y);
        GeoPoint { x, y, long, lat }
    }

    pub(crate) fn local_to_screen(&self, px: f64, py: f64) -> (f64, f64) {
        let [zoom, dx, dy] = self.view;
        (px * zoom + dx, py * zoom + dy)
    }

    pub(crate) fn screen_to_local(&self, sx: f64, sy: f64) -> (f64, f64) {
        let [zoom, dx, dy] = self.view;
        ((sx - dx) / zoom, (sy - dy) / zoom)
    }

    // Series

    pub fn add_series(&mut self, mut series: Box<dyn Series>) -> usize {
        series.set_geo_data(&self.features);
        let index = self.series.add(series);
        self.invalidate_state(
            ConsistencyState::SERIES
                | ConsistencyState::LABELS
                | ConsistencyState::COLOR_RANGE
                | ConsistencyState::CALLOUT
                | ConsistencyState::APPEARANCE,
        );
        index
    }

    pub fn remove_series(&mut self, index: usize) -> Option<Box<dyn Series>> {
        let removed = self.series.remove(index)?;
        self.invalidate_state(
            ConsistencyState::SERIES
                | ConsistencyState::LABELS
                | ConsistencyState::COLOR_RANGE
                | ConsistencyState::CALLOUT
                | ConsistencyState::APPEARANCE,
        );
        Some(removed)
    }

    pub fn series(&self) -> &SeriesCoordinator {
        &self.series
    }

    /// Mutable access to the series. Everything series-related is redrawn.
    pub fn series_mut(&mut self) -> &mut SeriesCoordinator {
        self.invalidate_state(
            ConsistencyState::SERIES
                | ConsistencyState::LABELS
                | ConsistencyState::COLOR_RANGE
                | ConsistencyState::CALLOUT
                | ConsistencyState::APPEARANCE,
        );
        &mut self.series
    }

    /// Visibility of the labels of the last resolution pass.
    pub fn label_resolution(&self) -> &Resolution {
        &self.labels
    }

    // Elements

    pub fn elements(&self) -> &ChartElements {
        &self.elements
    }

    /// Mutable access to axes, grids, crosshair, color range and callouts.
    pub fn elements_mut(&mut self) -> &mut ChartElements {
        self.invalidate_state(
            ConsistencyState::AXES
                | ConsistencyState::GRIDS
                | ConsistencyState::CROSSHAIR
                | ConsistencyState::COLOR_RANGE
                | ConsistencyState::CALLOUT,
        );
        &mut self.elements
    }

    /// Pointer position for the crosshair read-out.
    pub fn set_pointer(&mut self, pointer: Option<(f64, f64)>) {
        self.elements.crosshair.set_pointer(pointer);
        self.invalidate_state(ConsistencyState::CROSSHAIR);
    }

    // Layers and visibility

    pub fn map_layer(&self) -> &Layer {
        &self.map_layer
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.map_layer.set_visible(visible);
    }

    // Events

    /// Events queued since the last call, from this chart and its scenes.
    pub fn drain_events(&mut self) -> Vec<ChartEvent> {
        let mut events = self.events.drain_events();
        for scene in self.drill.charts_mut() {
            events.extend(scene.drain_events());
        }
        events
    }

    /// Warnings queued since the last call, from this chart and its scenes.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        let mut warnings = self.events.take_warnings();
        for scene in self.drill.charts_mut() {
            warnings.extend(scene.take_warnings());
        }
        warnings
    }

    // Animations

    pub(crate) fn next_animation_id(&mut self) -> AnimationId {
        self.next_animation += 1;
        AnimationId(self.next_animation)
    }

    /// State of the last zoom or move animation, `None` if there never was one.
    pub fn view_animation_state(&self) -> Option<AnimationState> {
        self.view_animation.as_ref().map(Animation::state)
    }

    pub fn is_animating(&self) -> bool {
        self.view_animation.as_ref().is_some_and(Animation::is_playing) || self.is_crs_animating()
    }

    /// Play a zoom or move animation towards `to`, stopping the running one.
    pub(crate) fn animate_view(&mut self, kind: AnimationKind, to: [f64; 3], duration: Duration) {
        if let Some(running) = self.view_animation.as_mut() {
            if running.is_playing() {
                running.stop();
                tracing::debug!(id = running.id().0, "view animation replaced");
            }
        }
        if kind == AnimationKind::Zoom {
            self.events.emit(ChartEvent::ZoomStart { from: self.view[0], to: to[0] });
        }

        let id = self.next_animation_id();
        let mut animation =
            Animation::new(id, kind, self.view, to, duration).with_easing(self.settings.zoom_animation.easing);
        animation.play();
        if animation.is_finished() {
            self.set_view(to);
            self.invalidate_state(ConsistencyState::NAVIGATION | ConsistencyState::SERIES);
        } else {
            self.events.emit(ChartEvent::AnimationStart { kind });
        }
        self.view_animation = Some(animation);
    }

    /// Stop every running animation, keeping the last frame.
    pub fn stop_animations(&mut self) {
        if let Some(animation) = self.view_animation.as_mut() {
            if animation.is_playing() {
                animation.stop();
                self.invalidate_state(ConsistencyState::NAVIGATION | ConsistencyState::SERIES);
            }
        }
        // The blend stays at its last ratio until the next crs change.
        if let Some(mut transition) = self.crs_transition.take() {
            transition.animation.stop();
            tracing::debug!(from = %transition.from, to = %transition.to, "crs animation stopped");
        }
    }

    pub(crate) fn set_view(&mut self, view: [f64; 3]) {
        self.view = view;
        self.invalidate_state(
            ConsistencyState::ZOOM
                | ConsistencyState::MOVE
                | ConsistencyState::AXES
                | ConsistencyState::GRIDS
                | ConsistencyState::CROSSHAIR,
        );
    }

    fn tick_view(&mut self, dt: Duration) -> bool {
        let Some(animation) = self.view_animation.as_mut() else { return false };
        if !animation.is_playing() {
            return false;
        }
        let frame = animation.tick(dt);
        let kind = animation.kind();
        let finished = animation.is_finished();
        self.set_view(frame);

        if finished {
            self.events.emit(ChartEvent::AnimationEnd { kind });
            self.invalidate_state(ConsistencyState::NAVIGATION | ConsistencyState::SERIES);
            false
        } else {
            if self.series.iter().any(|s| s.redraw_on_zoom_frame()) {
                let fresh = !self.has_state(ConsistencyState::SERIES);
                self.invalidate_state(ConsistencyState::SERIES);
                self.frame_pass = fresh;
            }
            true
        }
    }

    fn tick_crs(&mut self, dt: Duration) -> bool {
        let Some(transition) = self.crs_transition.as_mut() else { return false };
        let [ratio, _, _] = transition.animation.tick(dt);
        let (from, to) = (transition.from, transition.to);
        let finished = transition.animation.is_finished();

        let projection = if finished {
            to.projection()
        } else {
            Projection::Twin(TwinProjection::new(from, to, ratio))
        };
        self.scale.tx_mut().set_blend(to, projection);
        self.invalidate_state(ConsistencyState::SCALE | ConsistencyState::APPEARANCE);

        if finished {
            self.crs_transition = None;
            self.events.emit(ChartEvent::AnimationEnd { kind: AnimationKind::Crs });
        }
        !finished
    }

    // Pipeline

    /// Resolve data, scale and index states.
    pub fn calculate(&mut self) {
        if self.states.intersects(ConsistencyState::CALCULATION) {
            run_stages(self, &CALCULATION_STAGES);
        }
    }

    /// Resolve every dirty state in dependency order. Nothing is drawn until
    /// the chart has bounds.
    pub fn draw(&mut self) {
        self.calculate();
        if self.bounds.is_none() {
            return;
        }
        let resolved = run_stages(self, &DRAW_STAGES);
        if !resolved.is_empty() {
            tracing::trace!(?resolved, "draw pass");
        }
        self.frame_pass = false;
        for scene in self.drill.charts_mut() {
            if scene.is_visible() {
                scene.draw();
            }
        }
    }

    fn install_geo_data(&mut self) {
        let Some(data) = self.pending_geo_data.take() else { return };
        let overrides: Vec<_> = self
            .scale
            .tx()
            .names()
            .filter_map(|name| {
                let record = self.scale.tx().get(name)?;
                (record.origin == TxOrigin::Feature).then(|| (name.to_string(), record.clone()))
            })
            .collect();

        let mut tx = data.tx.unwrap_or_default();
        for (name, record) in overrides {
            tx.insert(name, record);
        }
        if let Some(crs) = self.settings.crs {
            tx.set_default_crs(crs);
        }
        tracing::debug!(features = data.features.len(), kind = ?data.kind, "installing geo data");

        self.scale.set_tx(tx);
        self.features = FeatureStore::new(data.features);
        self.map_layer.clear();
        self.selected_features.clear();
        self.zoom_toggle.clear();
        self.view = [1.0, 0.0, 0.0];
        self.invalidate_state(
            ConsistencyState::SCALE
                | ConsistencyState::GEO_DATA_INDEX
                | ConsistencyState::LAYOUT
                | ConsistencyState::ZOOM
                | ConsistencyState::MOVE
                | ConsistencyState::APPEARANCE,
        );
    }

    fn calculate_scale(&mut self) {
        self.scale.start_auto_calc(true);
        let range = self.features.reproject_all(self.scale.tx());
        self.scale.extend_data_bounds(&range);
        self.scale.finish_auto_calc();
        self.invalidate_state(
            ConsistencyState::GEO_DATA_INDEX | ConsistencyState::LAYOUT | ConsistencyState::APPEARANCE,
        );
    }

    fn index_geo_data(&mut self) {
        self.series.set_geo_data(&self.features);
        self.grid = FeatureGrid::build(&self.features);
        self.invalidate_state(
            ConsistencyState::SERIES
                | ConsistencyState::LABELS
                | ConsistencyState::COLOR_RANGE
                | ConsistencyState::CALLOUT
                | ConsistencyState::APPEARANCE,
        );
    }

    fn draw_bounds(&mut self) {
        let Some(bounds) = self.bounds else { return };
        self.scale.set_bounds(bounds);
        self.map_layer.set_clip(Some(bounds));
        self.rebuild_feature_paths();
        self.invalidate_state(
            ConsistencyState::LAYOUT.difference(ConsistencyState::BOUNDS)
                | ConsistencyState::ZOOM
                | ConsistencyState::MOVE
                | ConsistencyState::APPEARANCE,
        );
    }

    /// Recreate one path per feature in map-layer pixels.
    fn rebuild_feature_paths(&mut self) {
        self.map_layer.clear();
        self.features.clear_elements();

        let scale = &self.scale;
        let mut elements = Vec::new();
        for feature in self.features.iter_all() {
            let mut path = match &feature.id {
                Some(id) => Path::tagged(id.clone()),
                None => Path::new(),
            };
            feature.projected.for_each_path(&mut |flat, kind| match kind {
                PathKind::Points => {
                    for pair in flat.chunks_exact(2) {
                        let (x, y) = scale.scale_to_px(pair[0], pair[1]);
                        if x.is_finite() && y.is_finite() {
                            path.move_to(x, y);
                        }
                    }
                }
                PathKind::Open => path.append_flat(flat, false, |x, y| scale.scale_to_px(x, y)),
                PathKind::Ring => path.append_flat(flat, true, |x, y| scale.scale_to_px(x, y)),
            });
            if path.is_empty() {
                continue;
            }
            let element = self.map_layer.add(path);
            if let Some(id) = &feature.id {
                elements.push((id.clone(), element));
            }
        }
        for (id, element) in elements {
            self.features.set_element(&id, element);
        }
    }

    fn apply_view_matrix(&mut self) {
        let [zoom, dx, dy] = self.view;
        self.map_layer.set_transformation_matrix([zoom, 0.0, 0.0, zoom, dx, dy]);
    }

    fn draw_zoom(&mut self) {
        self.scale.set_map_zoom(self.view[0]);
        self.apply_view_matrix();
    }

    fn draw_move(&mut self) {
        self.scale.set_offset_focus_point(self.view[1], self.view[2]);
        self.apply_view_matrix();
    }

    fn draw_axes(&mut self) {
        self.elements.axes.calculate(&self.scale);
    }

    fn draw_grids(&mut self) {
        self.elements.grids.calculate(&self.scale);
    }

    fn draw_crosshair(&mut self) {
        self.elements.crosshair.calculate(&self.scale);
    }

    fn draw_appearance(&mut self) {
        let hide_unbound =
            self.settings.unbound_regions == UnboundRegions::Hide && self.series.last_choropleth().is_some();
        for path in self.map_layer.elements_mut() {
            let Some(id) = path.tag.as_deref() else { continue };
            let bucket = self.series.fill_bucket(id);
            path.visible = bucket.is_some() || !hide_unbound;
            path.fill = if self.selected_features.contains(id) { Some(SELECTED_FILL) } else { bucket };
        }
    }

    fn draw_series(&mut self) {
        let frame_only = self.frame_pass;
        let ctx = SeriesContext {
            scale: &self.scale,
            features: &self.features,
            zoom: self.view[0],
            offset: (self.view[1], self.view[2]),
        };
        for series in self.series.iter_mut() {
            if frame_only && !series.redraw_on_zoom_frame() {
                continue;
            }
            series.calculate(&ctx);
            series.draw(&ctx);
        }
    }

    fn draw_labels(&mut self) {
        let global = self.settings.overlap_mode;
        let mut candidates = Vec::new();
        for series in self.series.iter() {
            if !series.enabled() || !series.labels_enabled() {
                continue;
            }
            for (index, point) in series.points().enumerate() {
                if series.anchor(index).is_none() {
                    continue;
                }
                candidates.push(LabelCandidate {
                    series: series.index(),
                    index,
                    series_type: series.series_type(),
                    bounds: series.label_bounds(index, PointState::Normal),
                    rank: point.labelrank.unwrap_or(0.0),
                    overlap_forbidden: is_overlap_forbidden(global, series.overlap_mode(), point.overlap_mode),
                });
            }
        }

        self.labels = labels::resolve(&candidates);
        tracing::trace!(candidates = candidates.len(), hidden = self.labels.hidden_count(), "labels resolved");
        for series in self.series.iter_mut() {
            let states = self.labels.series_states(series.index());
            series.set_labels_drawing_map(states);
        }
    }

    fn draw_color_range(&mut self) {
        self.elements.color_range.calculate(&self.series);
    }

    fn draw_callouts(&mut self) {
        let bounds = self.bounds;
        for callout in &mut self.elements.callouts {
            callout.calculate(&self.series, bounds);
        }
    }
}

impl Drawable for MapChart {
    fn set_bounds(&mut self, bounds: Rect) {
        if self.bounds == Some(bounds) {
            return;
        }
        self.bounds = Some(bounds);
        self.invalidate_state(ConsistencyState::LAYOUT | ConsistencyState::ZOOM | ConsistencyState::MOVE);
        for scene in self.drill.charts_mut() {
            Drawable::set_bounds(scene, bounds);
        }
    }

    fn calculate(&mut self) {
        MapChart::calculate(self);
    }

    fn draw(&mut self) {
        MapChart::draw(self);
    }

    fn tick(&mut self, dt: Duration) -> bool {
        let mut active = self.tick_view(dt);
        active |= self.tick_crs(dt);
        for scene in self.drill.charts_mut() {
            active |= scene.tick(dt);
        }
        if self.drill.is_drilling() {
            self.pump_transition();
            active = true;
        }
        active
    }
}

impl MapChart {
    /// Set the viewport in screen pixels.
    pub fn set_bounds(&mut self, bounds: Rect) -> &mut Self {
        Drawable::set_bounds(self, bounds);
        self
    }

    /// Advance animations and drill transitions by `dt`.
    pub fn tick(&mut self, dt: Duration) -> bool {
        Drawable::tick(self, dt)
    }
}

impl Zoomable for MapChart {
    fn zoom_level(&self) -> f64 {
        self.view[0]
    }

    fn zoom_by(&mut self, factor: f64, cx: Option<f64>, cy: Option<f64>, duration: Option<Duration>) {
        self.zoom(factor, cx, cy, duration);
    }

    fn zoom_to_level(&mut self, level: f64, cx: Option<f64>, cy: Option<f64>, duration: Option<Duration>) {
        self.zoom_to(level, cx, cy, duration);
    }

    fn move_view(&mut self, dx: f64, dy: f64) {
        self.move_by(dx, dy);
    }

    fn fit(&mut self) {
        self.fit_all();
    }
}

impl Drillable for MapChart {
    fn drill_down(&mut self, id: &str, target: Option<MapChart>) {
        self.drill_to(id, target);
    }

    fn drill_back(&mut self) {
        self.drill_up();
    }

    fn drill_path(&self) -> &[DrillPoint] {
        self.drilldown_path()
    }

    fn scene_id(&self) -> SceneId {
        self.current_scene()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::{GeoData, GeoDataKind};
    use crate::map::series::{DataPoint, MapSeries};
    use serde_json::{json, Map};

    pub(crate) fn square(id: &str, x: f64, y: f64, size: f64) -> GeoFeature {
        let mut props = Map::new();
        props.insert("name".into(), json!(id.to_lowercase()));
        GeoFeature::new(
            Some(id.to_string()),
            props,
            crate::map::geometry::Geometry::polygon(vec![x, y, x + size, y, x + size, y + size, x, y + size]),
        )
    }

    /// A 100x100 degree world with three regions, drawn into a 100x100 px viewport.
    pub(crate) fn chart() -> MapChart {
        let mut chart = MapChart::with_settings(ChartSettings::without_animations());
        chart.set_geo_data(GeoData::new(
            GeoDataKind::GeoJson,
            vec![square("FR", 0.0, 0.0, 40.0), square("DE", 60.0, 0.0, 40.0), square("IT", 0.0, 60.0, 40.0)],
        ));
        chart.set_bounds(Rect::new(0.0, 0.0, 100.0, 100.0));
        chart.draw();
        chart
    }

    #[test]
    fn test_first_draw_resolves_everything() {
        let chart = chart();
        assert!(chart.states().is_empty());
        assert_eq!(chart.map_layer().len(), 3);
        assert!(chart.feature_by_id("FR").and_then(|f| f.element).is_some());
        assert_eq!(chart.scale().visible_range(), crate::geo::DataBounds::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn test_mutations_coalesce_until_draw() {
        let mut chart = chart();
        chart.add_series(Box::new(MapSeries::choropleth(vec![DataPoint::region("FR", 1.0)])));
        chart.add_series(Box::new(MapSeries::choropleth(vec![DataPoint::region("DE", 2.0)])));
        assert!(chart.has_state(ConsistencyState::SERIES | ConsistencyState::LABELS));

        chart.draw();
        assert!(chart.states().is_empty());
        assert_eq!(chart.series().len(), 2);
        assert_eq!(chart.elements().color_range.series(), Some(1));
    }

    #[test]
    fn test_transform_round_trip() {
        let chart = chart();
        let (x, y) = chart.transform(20.0, 20.0);
        assert!((x - 20.0).abs() < 1e-9 && (y - 80.0).abs() < 1e-9);
        let point = chart.inverse_transform(x, y);
        assert!((point.long - 20.0).abs() < 1e-9 && (point.lat - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_choropleth_fill_and_unbound_regions() {
        let mut chart = chart();
        chart.add_series(Box::new(MapSeries::choropleth(vec![
            DataPoint::region("FR", 1.0),
            DataPoint::region("DE", 9.0),
        ])));
        chart.settings_mut().unbound_regions = UnboundRegions::Hide;
        chart.draw();

        let paths = chart.map_layer().elements();
        let by_tag = |tag: &str| paths.iter().find(|p| p.tag.as_deref() == Some(tag)).cloned();
        assert_eq!(by_tag("FR").and_then(|p| p.fill), Some(0));
        assert_eq!(by_tag("DE").and_then(|p| p.fill), Some(4));
        assert_eq!(by_tag("IT").map(|p| p.visible), Some(false));
    }

    #[test]
    fn test_crs_animation_blends_then_settles() {
        let mut chart = chart();
        chart.settings_mut().crs_animation.enabled = true;
        chart.set_crs(Crs::Robinson);
        assert!(chart.is_crs_animating());
        assert!(matches!(
            chart.scale().tx().default_record().current_projection,
            Projection::Twin(_)
        ));

        while chart.tick(Duration::from_millis(16)) {
            chart.draw();
        }
        chart.draw();
        assert_eq!(chart.scale().tx().default_record().current_projection, Projection::Single(Crs::Robinson));
        let events = chart.drain_events();
        assert!(events.contains(&ChartEvent::AnimationStart { kind: AnimationKind::Crs }));
        assert!(events.contains(&ChartEvent::AnimationEnd { kind: AnimationKind::Crs }));
    }

    #[test]
    fn test_stopped_crs_animation_keeps_the_blend() {
        let mut chart = chart();
        chart.settings_mut().crs_animation.enabled = true;
        chart.set_crs(Crs::Robinson);
        chart.tick(Duration::from_millis(50));
        chart.stop_animations();
        assert!(!chart.is_crs_animating());

        let frozen = chart.scale().tx().default_record().current_projection;
        match frozen {
            Projection::Twin(twin) => {
                assert_eq!((twin.source, twin.destination), (Crs::Wsg84, Crs::Robinson));
                assert!(twin.ratio > 0.0 && twin.ratio < 1.0);
            }
            other => panic!("expected a blend, got {other:?}"),
        }
        assert!(!chart.tick(Duration::from_secs(1)));
        assert_eq!(chart.scale().tx().default_record().current_projection, frozen);

        chart.set_crs(Crs::Robinson);
        assert_eq!(chart.scale().tx().default_record().current_projection, Projection::Single(Crs::Robinson));
    }

    #[test]
    fn test_unknown_crs_name_falls_back_to_wsg84() {
        let mut chart = chart();
        chart.set_crs(Crs::Mercator);
        chart.set_crs_by_name("flat-earth");
        assert_eq!(chart.crs(), Crs::Wsg84);
        let warnings = chart.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::UnknownProjection);
    }
}
