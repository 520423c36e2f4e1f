//! Drill-down scene graph.
//!
//! The root chart owns every scene in an arena. A transition between scenes
//! is a queue of steps pumped on every tick: a step that waits for a zoom
//! blocks the queue until the zoom completes, and a zoom that gets stopped
//! aborts the whole transition.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::geo::Rect;
use crate::map::animation::{AnimationId, AnimationKind, AnimationState, DRILL_DOWN_DURATION, DRILL_UP_DURATION};
use crate::map::chart::MapChart;
use crate::map::config::{DEFAULT_MAX_ZOOM_LEVEL, DEFAULT_MIN_ZOOM_LEVEL};
use crate::map::events::{ChartEvent, Warning};
use crate::map::state::{Consistency, ConsistencyState};

/// Scale a drilled-up scene shrinks to when its feature is gone.
const FALLBACK_SHRINK: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SceneId(pub usize);

impl SceneId {
    pub const ROOT: SceneId = SceneId(0);
}

/// One breadcrumb: drilling into `feature_id` of `parent` showed `current`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrillPoint {
    pub parent: SceneId,
    pub current: SceneId,
    pub feature_properties: Map<String, Value>,
    pub feature_id: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    /// Zoom `scene` onto one of its features.
    FocusFeature { scene: SceneId, feature: String },
    ZoomHome(SceneId),
    /// Zoom `scene` out until it covers `feature` as drawn by `target`.
    Shrink { scene: SceneId, target: SceneId, feature: String },
    AwaitZoom(SceneId),
    Swap { hide: SceneId, show: SceneId },
    Finalize,
}

#[derive(Debug, Clone, PartialEq)]
enum Direction {
    Down(DrillPoint),
    Up { target: SceneId, levels: usize },
}

#[derive(Debug, Clone)]
struct Transition {
    direction: Direction,
    steps: VecDeque<Step>,
    /// Animation the next `AwaitZoom` waits for.
    awaiting: Option<AnimationId>,
}

struct SceneNode {
    chart: Box<MapChart>,
    parent: SceneId,
}

/// Scenes reachable from the root chart.
#[derive(Default)]
pub struct SceneGraph {
    nodes: Vec<Option<SceneNode>>,
    drill_map: BTreeMap<SceneId, BTreeMap<String, SceneId>>,
    current: SceneId,
    path: Vec<DrillPoint>,
    transition: Option<Transition>,
}

impl SceneGraph {
    fn register(&mut self, chart: MapChart, parent: SceneId) -> SceneId {
        self.nodes.push(Some(SceneNode { chart: Box::new(chart), parent }));
        SceneId(self.nodes.len())
    }

    fn node(&self, id: SceneId) -> Option<&SceneNode> {
        id.0.checked_sub(1).and_then(|i| self.nodes.get(i)).and_then(Option::as_ref)
    }

    /// Chart of a non-root scene.
    pub fn chart(&self, id: SceneId) -> Option<&MapChart> {
        self.node(id).map(|node| node.chart.as_ref())
    }

    pub fn chart_mut(&mut self, id: SceneId) -> Option<&mut MapChart> {
        id.0.checked_sub(1)
            .and_then(|i| self.nodes.get_mut(i))
            .and_then(Option::as_mut)
            .map(|node| node.chart.as_mut())
    }

    pub fn parent(&self, id: SceneId) -> Option<SceneId> {
        self.node(id).map(|node| node.parent)
    }

    /// Every non-root scene.
    pub fn charts_mut(&mut self) -> impl Iterator<Item = &mut MapChart> {
        self.nodes.iter_mut().flatten().map(|node| node.chart.as_mut())
    }

    /// Drill targets registered for features of `scene`.
    pub fn drill_map_of(&self, scene: SceneId) -> impl Iterator<Item = (&str, SceneId)> {
        self.drill_map
            .get(&scene)
            .into_iter()
            .flat_map(|entries| entries.iter().map(|(id, child)| (id.as_str(), *child)))
    }

    /// Drill targets of the root scene.
    pub fn drill_map(&self) -> impl Iterator<Item = (&str, SceneId)> {
        self.drill_map_of(SceneId::ROOT)
    }

    fn target(&self, scene: SceneId, id: &str) -> Option<SceneId> {
        self.drill_map.get(&scene)?.get(id).copied()
    }

    pub fn is_drilling(&self) -> bool {
        self.transition.is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop `scene`'s drill targets and everything below them. Returns the
    /// removed scenes.
    fn remove_targets(&mut self, scene: SceneId) -> Vec<SceneId> {
        let roots = self
            .drill_map
            .remove(&scene)
            .map(|entries| entries.into_values().collect())
            .unwrap_or_default();
        self.remove_subtrees(roots)
    }

    /// Drop the target registered for feature `id` of `scene`, with its subtree.
    fn remove_target(&mut self, scene: SceneId, id: &str) -> Vec<SceneId> {
        let roots = self
            .drill_map
            .get_mut(&scene)
            .and_then(|entries| entries.remove(id))
            .into_iter()
            .collect();
        self.remove_subtrees(roots)
    }

    fn remove_subtrees(&mut self, mut pending: Vec<SceneId>) -> Vec<SceneId> {
        let mut removed = Vec::new();
        while let Some(child) = pending.pop() {
            if let Some(entries) = self.drill_map.remove(&child) {
                pending.extend(entries.into_values());
            }
            if let Some(slot) = child.0.checked_sub(1).and_then(|i| self.nodes.get_mut(i)) {
                *slot = None;
            }
            removed.push(child);
        }
        removed
    }

    /// Move the scenes of a chart's own graph under `under`.
    fn adopt(&mut self, under: SceneId, nested: SceneGraph) {
        let mut ids = BTreeMap::from([(SceneId::ROOT, under)]);
        for (i, node) in nested.nodes.into_iter().enumerate() {
            let Some(node) = node else { continue };
            let parent = ids.get(&node.parent).copied().unwrap_or(under);
            let id = self.register(*node.chart, parent);
            ids.insert(SceneId(i + 1), id);
        }
        for (scene, entries) in nested.drill_map {
            let Some(&scene) = ids.get(&scene) else { continue };
            for (feature, child) in entries {
                if let Some(&child) = ids.get(&child) {
                    self.drill_map.entry(scene).or_default().insert(feature, child);
                }
            }
        }
    }
}

impl MapChart {
    pub fn scene(&self, id: SceneId) -> Option<&MapChart> {
        if id == SceneId::ROOT {
            Some(self)
        } else {
            self.drill.chart(id)
        }
    }

    pub fn scene_mut(&mut self, id: SceneId) -> Option<&mut MapChart> {
        if id == SceneId::ROOT {
            Some(self)
        } else {
            self.drill.chart_mut(id)
        }
    }

    pub fn drilldown_path(&self) -> &[DrillPoint] {
        &self.drill.path
    }

    pub fn current_scene(&self) -> SceneId {
        self.drill.current
    }

    pub fn root_scene(&self) -> SceneId {
        SceneId::ROOT
    }

    /// The chart currently on screen.
    pub fn current_chart(&self) -> &MapChart {
        self.scene(self.drill.current).unwrap_or(self)
    }

    /// The chart navigation input should go to.
    pub fn current_chart_mut(&mut self) -> Option<&mut MapChart> {
        self.scene_mut(self.drill.current)
    }

    pub fn is_drilling(&self) -> bool {
        self.drill.is_drilling()
    }

    /// Drill targets of the root scene, replacing the previous ones.
    pub fn set_drill_down_map(&mut self, entries: impl IntoIterator<Item = (String, MapChart)>) -> &mut Self {
        self.set_scene_drill_down_map(SceneId::ROOT, entries)
    }

    /// Drill targets for the features of `scene`. Charts carrying drill
    /// targets of their own bring them along.
    pub fn set_scene_drill_down_map(
        &mut self,
        scene: SceneId,
        entries: impl IntoIterator<Item = (String, MapChart)>,
    ) -> &mut Self {
        let removed = self.drill.remove_targets(scene);
        if self.drill.path.iter().any(|point| removed.contains(&point.current)) {
            tracing::debug!("current scene replaced, back to the root");
            self.drill.transition = None;
            self.drill.path.clear();
            self.drill.current = SceneId::ROOT;
            self.set_visible(true);
        }
        for (id, chart) in entries {
            self.register_target(scene, id, chart);
        }
        self
    }

    fn register_target(&mut self, scene: SceneId, id: String, mut chart: MapChart) -> SceneId {
        let replaced = self.drill.remove_target(scene, &id);
        if !replaced.is_empty() {
            tracing::debug!(id = %id, scenes = replaced.len(), "drill target replaced");
        }
        let nested = std::mem::take(&mut chart.drill);
        chart.set_visible(false);
        if let Some(bounds) = self.bounds {
            chart.set_bounds(bounds);
        }
        let child = self.drill.register(chart, scene);
        self.drill.adopt(child, nested);
        self.drill.drill_map.entry(scene).or_default().insert(id, child);
        child
    }

    /// Drill into feature `id` of the current scene. Without a target the
    /// registered drill map is used, then the breadcrumbs: naming a feature
    /// drilled into earlier goes back up to the scene it opened. Ignored
    /// while another transition runs.
    pub fn drill_to(&mut self, id: &str, target: Option<MapChart>) -> &mut Self {
        if self.drill.is_drilling() {
            tracing::debug!(id, "drill in progress, request dropped");
            return self;
        }
        let current = self.drill.current;
        if let Some(scene) = self.scene_mut(current) {
            scene.calculate();
        }

        if let Some(chart) = target {
            if self.scene(current).is_some_and(|scene| scene.feature_by_id(id).is_none()) {
                self.events.warn(Warning::feature_not_found(id));
                return self;
            }
            let child = self.register_target(current, id.to_string(), chart);
            self.start_drill_down(id, child);
        } else if let Some(child) = self.drill.target(current, id) {
            self.start_drill_down(id, child);
        } else if let Some(i) = self.drill.path.iter().rposition(|point| point.feature_id == id) {
            let levels = self.drill.path.len() - 1 - i;
            let target = self.drill.path[i].current;
            if levels > 0 {
                self.start_drill_up(target, levels);
            }
        } else {
            self.events.warn(Warning::feature_not_found(id));
        }
        self
    }

    /// Back to the parent scene. Aborts a transition that is still running.
    pub fn drill_up(&mut self) -> &mut Self {
        if self.drill.is_drilling() {
            self.abort_transition();
            return self;
        }
        if let Some(parent) = self.drill.parent(self.drill.current) {
            self.start_drill_up(parent, 1);
        }
        self
    }

    fn drill_duration(&self, duration: Duration) -> Duration {
        if self.settings.zoom_animation.enabled {
            duration
        } else {
            Duration::ZERO
        }
    }

    fn start_drill_down(&mut self, id: &str, child: SceneId) {
        let source = self.drill.current;
        let Some(properties) = self.scene_mut(source).and_then(|scene| {
            scene.calculate();
            scene.feature_by_id(id).map(|feature| feature.properties.clone())
        }) else {
            self.events.warn(Warning::feature_not_found(id));
            return;
        };

        let (min_zoom, max_zoom) = match self.scene(source) {
            Some(scene) => (scene.settings.min_zoom_level, scene.settings.max_zoom_level),
            None => (DEFAULT_MIN_ZOOM_LEVEL, DEFAULT_MAX_ZOOM_LEVEL),
        };
        if let Some(chart) = self.drill.chart_mut(child) {
            if chart.settings.min_zoom_level == DEFAULT_MIN_ZOOM_LEVEL {
                chart.settings.min_zoom_level = min_zoom;
            }
            if chart.settings.max_zoom_level == DEFAULT_MAX_ZOOM_LEVEL {
                chart.settings.max_zoom_level = max_zoom;
            }
        }

        tracing::debug!(id, ?source, ?child, "drilling down");
        let point = DrillPoint {
            parent: source,
            current: child,
            feature_properties: properties,
            feature_id: id.to_string(),
        };
        self.drill.transition = Some(Transition {
            direction: Direction::Down(point),
            steps: VecDeque::from([
                Step::FocusFeature { scene: source, feature: id.to_string() },
                Step::AwaitZoom(source),
                Step::Swap { hide: source, show: child },
                Step::Finalize,
            ]),
            awaiting: None,
        });
        self.pump_transition();
    }

    fn start_drill_up(&mut self, target: SceneId, levels: usize) {
        let source = self.drill.current;
        let Some(crumb) = self.drill.path.len().checked_sub(levels).and_then(|i| self.drill.path.get(i)) else {
            return;
        };
        let feature = crumb.feature_id.clone();
        tracing::debug!(?source, ?target, levels, "drilling up");
        self.drill.transition = Some(Transition {
            direction: Direction::Up { target, levels },
            steps: VecDeque::from([
                Step::ZoomHome(source),
                Step::AwaitZoom(source),
                Step::Shrink { scene: source, target, feature },
                Step::AwaitZoom(source),
                Step::Swap { hide: source, show: target },
                Step::Finalize,
            ]),
            awaiting: None,
        });
        self.pump_transition();
    }

    /// Stop the running transition where it is.
    fn abort_transition(&mut self) {
        let Some(transition) = self.drill.transition.take() else { return };
        tracing::debug!(direction = ?transition.direction, "drill aborted");
        let scene = transition.steps.iter().find_map(|step| match step {
            Step::AwaitZoom(scene) => Some(*scene),
            _ => None,
        });
        if let Some(chart) = scene.and_then(|scene| self.scene_mut(scene)) {
            if let Some(animation) = chart.view_animation.as_mut() {
                animation.stop();
            }
        }
    }

    /// Run transition steps until one has to wait for a zoom.
    pub(crate) fn pump_transition(&mut self) {
        loop {
            let Some(step) = self.drill.transition.as_ref().and_then(|t| t.steps.front().cloned()) else {
                return;
            };
            match step {
                Step::AwaitZoom(scene) => {
                    let awaited = self.drill.transition.as_ref().and_then(|t| t.awaiting);
                    if let Some(awaited) = awaited {
                        let state = self
                            .scene(scene)
                            .and_then(|chart| chart.view_animation.as_ref())
                            .filter(|animation| animation.id() == awaited)
                            .map(|animation| animation.state());
                        match state {
                            Some(AnimationState::Playing) | Some(AnimationState::Idle) => return,
                            Some(AnimationState::Completed) => {}
                            Some(AnimationState::Stopped) | None => {
                                tracing::debug!(?scene, "awaited zoom stopped");
                                self.drill.transition = None;
                                return;
                            }
                        }
                    }
                }
                Step::FocusFeature { scene, feature } => {
                    let duration = self.drill_duration(DRILL_DOWN_DURATION);
                    let awaiting = self.scene_mut(scene).and_then(|chart| {
                        chart.draw();
                        let local = chart.feature_local_bounds(&feature)?;
                        if !chart.zoom_to_local(local, duration) {
                            return None;
                        }
                        chart.view_animation.as_ref().map(|a| a.id())
                    });
                    self.set_awaiting(awaiting);
                }
                Step::ZoomHome(scene) => {
                    let duration = self.drill_duration(DRILL_DOWN_DURATION);
                    let awaiting = self.scene_mut(scene).and_then(|chart| {
                        chart.animate_view(AnimationKind::Zoom, [1.0, 0.0, 0.0], duration);
                        chart.view_animation.as_ref().map(|a| a.id())
                    });
                    self.set_awaiting(awaiting);
                }
                Step::Shrink { scene, target, feature } => {
                    let frame = self.shrink_frame(target, &feature);
                    let duration = self.drill_duration(DRILL_UP_DURATION);
                    let awaiting = self.scene_mut(scene).and_then(|chart| {
                        chart.animate_view(AnimationKind::Zoom, frame, duration);
                        chart.view_animation.as_ref().map(|a| a.id())
                    });
                    self.set_awaiting(awaiting);
                }
                Step::Swap { hide, show } => self.swap_scenes(hide, show),
                Step::Finalize => {
                    self.drill.transition = None;
                    self.events.emit(ChartEvent::DrillChange {
                        path: self.drill.path.clone(),
                        current: self.drill.current,
                    });
                    return;
                }
            }
            if let Some(transition) = self.drill.transition.as_mut() {
                transition.steps.pop_front();
            }
        }
    }

    fn set_awaiting(&mut self, awaiting: Option<AnimationId>) {
        if let Some(transition) = self.drill.transition.as_mut() {
            transition.awaiting = awaiting;
        }
    }

    /// Frame that fits a whole scene into the box `feature` occupies in
    /// `target` at its home view.
    fn shrink_frame(&mut self, target: SceneId, feature: &str) -> [f64; 3] {
        let bounds = self.bounds.unwrap_or_default();
        let local = self.scene_mut(target).and_then(|chart| {
            chart.draw();
            chart.feature_local_bounds(feature)
        });
        let rect = match local {
            Some(rect) if bounds.width > 0.0 && bounds.height > 0.0 => rect,
            _ => {
                self.events.warn(Warning::feature_not_found(feature));
                let (cx, cy) = bounds.center();
                let (w, h) = (bounds.width * FALLBACK_SHRINK, bounds.height * FALLBACK_SHRINK);
                Rect::new(cx - w / 2.0, cy - h / 2.0, w, h)
            }
        };
        let zoom = if bounds.width > 0.0 && bounds.height > 0.0 {
            (rect.width / bounds.width).min(rect.height / bounds.height)
        } else {
            FALLBACK_SHRINK
        };
        let (rx, ry) = rect.center();
        let (bx, by) = bounds.center();
        [zoom, rx - bx * zoom, ry - by * zoom]
    }

    fn swap_scenes(&mut self, hide: SceneId, show: SceneId) {
        let Some(direction) = self.drill.transition.as_ref().map(|t| t.direction.clone()) else { return };
        let bounds = self.bounds;
        if let Some(chart) = self.scene_mut(hide) {
            chart.set_visible(false);
        }
        if let Some(chart) = self.scene_mut(show) {
            if let Some(bounds) = bounds {
                chart.set_bounds(bounds);
            }
            chart.set_visible(true);
        }

        match direction {
            Direction::Down(point) => {
                if let Some(chart) = self.scene_mut(point.current) {
                    chart.reset_view();
                }
                self.drill.current = point.current;
                self.drill.path.push(point);
            }
            Direction::Up { target, levels } => {
                for scene in [hide, target] {
                    if let Some(chart) = self.scene_mut(scene) {
                        chart.reset_view();
                    }
                }
                self.drill.current = target;
                let keep = self.drill.path.len().saturating_sub(levels);
                self.drill.path.truncate(keep);
            }
        }
    }

    /// Jump to the home frame without animating.
    pub(crate) fn reset_view(&mut self) {
        if let Some(animation) = self.view_animation.as_mut() {
            animation.stop();
        }
        self.zoom_toggle.clear();
        self.set_view([1.0, 0.0, 0.0]);
        self.invalidate_state(ConsistencyState::SERIES | ConsistencyState::LABELS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{GeoData, GeoDataKind};
    use crate::map::chart::tests::{chart, square};
    use crate::map::config::ChartSettings;
    use crate::map::events::WarningCode;
    use serde_json::json;

    fn child() -> MapChart {
        let mut chart = MapChart::with_settings(ChartSettings::without_animations());
        chart.set_geo_data(GeoData::new(
            GeoDataKind::GeoJson,
            vec![square("NORD", 0.0, 0.0, 50.0), square("SUD", 50.0, 50.0, 50.0)],
        ));
        chart
    }

    fn drill_changes(chart: &mut MapChart) -> usize {
        chart
            .drain_events()
            .iter()
            .filter(|event| matches!(event, ChartEvent::DrillChange { .. }))
            .count()
    }

    #[test]
    fn test_drill_down_without_animation_completes_at_once() {
        let mut chart = chart();
        chart.drill_to("FR", Some(child()));

        assert!(!chart.is_drilling());
        assert_ne!(chart.current_scene(), SceneId::ROOT);
        assert!(!chart.is_visible());
        assert!(chart.current_chart().is_visible());

        let path = chart.drilldown_path();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].parent, SceneId::ROOT);
        assert_eq!(path[0].feature_id, "FR");
        assert_eq!(path[0].feature_properties.get("name"), Some(&json!("fr")));
        assert_eq!(drill_changes(&mut chart), 1);
    }

    #[test]
    fn test_drill_up_restores_the_parent() {
        let mut chart = chart();
        chart.drill_to("FR", Some(child()));
        let child_scene = chart.current_scene();
        chart.drill_up();

        assert_eq!(chart.current_scene(), SceneId::ROOT);
        assert!(chart.drilldown_path().is_empty());
        assert!(chart.is_visible());
        assert_eq!(chart.view(), [1.0, 0.0, 0.0]);
        assert_eq!(chart.scene(child_scene).map(MapChart::is_visible), Some(false));
        assert_eq!(drill_changes(&mut chart), 2);
    }

    #[test]
    fn test_drill_up_during_drill_down_aborts_it() {
        let mut chart = chart();
        *chart.settings_mut() = ChartSettings::default();
        chart.drill_to("FR", Some(child()));
        assert!(chart.is_drilling());

        chart.drill_to("DE", Some(child()));
        chart.drill_up();

        assert!(!chart.is_drilling());
        assert_eq!(chart.current_scene(), SceneId::ROOT);
        assert!(chart.drilldown_path().is_empty());
        chart.tick(Duration::from_secs(1));
        assert_eq!(chart.current_scene(), SceneId::ROOT);
        assert_eq!(drill_changes(&mut chart), 0);
    }

    #[test]
    fn test_animated_drill_swaps_after_the_zoom() {
        let mut chart = chart();
        *chart.settings_mut() = ChartSettings::default();
        chart.drill_to("FR", Some(child()));

        chart.tick(Duration::from_millis(350));
        assert_eq!(chart.current_scene(), SceneId::ROOT);
        assert!(chart.zoom_level() > 1.0);

        while chart.tick(Duration::from_millis(16)) {
            chart.draw();
        }
        assert_ne!(chart.current_scene(), SceneId::ROOT);
        assert!(!chart.is_visible());
        assert_eq!(drill_changes(&mut chart), 1);
    }

    #[test]
    fn test_stopped_zoom_aborts_the_transition() {
        let mut chart = chart();
        *chart.settings_mut() = ChartSettings::default();
        chart.drill_to("FR", Some(child()));
        chart.move_by(5.0, 5.0);
        chart.tick(Duration::from_millis(16));

        assert!(!chart.is_drilling());
        assert_eq!(chart.current_scene(), SceneId::ROOT);
    }

    #[test]
    fn test_unknown_feature_is_a_warning() {
        let mut chart = chart();
        chart.drill_to("XX", Some(child()));
        chart.drill_to("YY", None);
        assert_eq!(chart.current_scene(), SceneId::ROOT);
        let warnings = chart.take_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.code == WarningCode::FeatureIdNotFound));
    }

    #[test]
    fn test_drill_map_and_breadcrumb_navigation() {
        let mut chart = chart();
        let mut france = child();
        france.set_drill_down_map([("NORD".to_string(), child())]);
        chart.set_drill_down_map([("FR".to_string(), france)]);
        assert_eq!(chart.drill.len(), 2);

        chart.drill_to("FR", None);
        let france = chart.current_scene();
        chart.draw();
        chart.drill_to("NORD", None);
        assert_eq!(chart.drilldown_path().len(), 2);
        assert_eq!(chart.drilldown_path()[1].parent, france);

        chart.drill_to("FR", None);
        assert_eq!(chart.current_scene(), france);
        assert_eq!(chart.drilldown_path().len(), 1);
    }

    #[test]
    fn test_repeated_drill_with_a_new_target_frees_the_old_scene() {
        let mut chart = chart();
        for _ in 0..5 {
            chart.drill_to("FR", Some(child()));
            chart.drill_up();
        }
        assert_eq!(chart.current_scene(), SceneId::ROOT);
        assert_eq!(chart.drill.len(), 1);
        assert_eq!(chart.drill.drill_map().count(), 1);
    }

    #[test]
    fn test_replaced_target_takes_its_subtree_along() {
        let mut chart = chart();
        let mut france = child();
        france.set_drill_down_map([("NORD".to_string(), child())]);
        chart.set_drill_down_map([("FR".to_string(), france)]);
        assert_eq!(chart.drill.len(), 2);

        chart.drill_to("FR", Some(child()));
        assert_eq!(chart.drill.len(), 1);
        assert_eq!(chart.drilldown_path().len(), 1);
    }

    #[test]
    fn test_replacing_the_drill_map_returns_to_root() {
        let mut chart = chart();
        chart.set_drill_down_map([("FR".to_string(), child())]);
        chart.drill_to("FR", None);
        assert_ne!(chart.current_scene(), SceneId::ROOT);

        chart.set_drill_down_map([("DE".to_string(), child())]);
        assert_eq!(chart.current_scene(), SceneId::ROOT);
        assert!(chart.is_visible());
        assert_eq!(chart.drill.len(), 1);
        assert_eq!(chart.drill.drill_map().map(|(id, _)| id).collect::<Vec<_>>(), vec!["DE"]);
    }
}
