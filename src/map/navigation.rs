//! Zoom, pan and fit operations on the map layer frame.

use std::time::Duration;

use crate::geo::{roughly_equal, Rect, EPSILON};
use crate::map::animation::{AnimationKind, ZOOM_TO_FEATURE_DURATION, ZOOM_TO_HOME_DURATION};
use crate::map::chart::MapChart;
use crate::map::events::Warning;
use crate::map::state::{Consistency, ConsistencyState};

/// Remembers the last `zoom_to_feature` target so a repeated call zooms home.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureZoomToggle {
    zoomed: Option<String>,
}

impl FeatureZoomToggle {
    fn key(ids: &[&str]) -> String {
        ids.join(",")
    }

    pub fn is_zoomed_to(&self, ids: &[&str]) -> bool {
        self.zoomed.as_deref() == Some(Self::key(ids).as_str())
    }

    pub fn clear(&mut self) {
        self.zoomed = None;
    }

    fn set(&mut self, ids: &[&str]) {
        self.zoomed = Some(Self::key(ids));
    }
}

impl MapChart {
    pub fn zoom_level(&self) -> f64 {
        self.view[0]
    }

    /// Map layer frame `[zoom, dx, dy]` as currently drawn.
    pub fn view(&self) -> [f64; 3] {
        self.view
    }

    /// Frame the running zoom is heading to, or the current one.
    pub fn target_view(&self) -> [f64; 3] {
        match &self.view_animation {
            Some(animation) if animation.is_playing() => animation.to(),
            _ => self.view,
        }
    }

    fn navigation_duration(&self, duration: Option<Duration>, default: Duration) -> Duration {
        if !self.settings.zoom_animation.enabled {
            return Duration::ZERO;
        }
        duration.unwrap_or(default)
    }

    fn viewport_center(&self) -> (f64, f64) {
        self.bounds.map(|b| b.center()).unwrap_or((0.0, 0.0))
    }

    /// Multiply the zoom by `factor` keeping the screen point `(cx, cy)`
    /// fixed. The point defaults to the viewport center.
    pub fn zoom(&mut self, factor: f64, cx: Option<f64>, cy: Option<f64>, duration: Option<Duration>) {
        if !factor.is_finite() || factor <= 0.0 {
            tracing::debug!(factor, "ignoring zoom factor");
            return;
        }
        self.zoom_toggle.clear();
        let [base, dx, dy] = self.target_view();
        let level = self.settings.clamp_zoom(base * factor);
        let (center_x, center_y) = self.viewport_center();
        let (cx, cy) = (cx.unwrap_or(center_x), cy.unwrap_or(center_y));

        let ratio = level / base;
        let (dx, dy) = self.clamp_offset(level, cx - (cx - dx) * ratio, cy - (cy - dy) * ratio);
        let target = [level, dx, dy];
        if target == self.target_view() {
            return;
        }
        let duration = self.navigation_duration(duration, self.settings.zoom_animation.duration());
        self.animate_view(AnimationKind::Zoom, target, duration);
    }

    /// Zoom to an absolute level.
    pub fn zoom_to(&mut self, level: f64, cx: Option<f64>, cy: Option<f64>, duration: Option<Duration>) {
        if !level.is_finite() || level <= 0.0 {
            return;
        }
        self.zoom(level / self.target_view()[0], cx, cy, duration);
    }

    pub fn zoom_in(&mut self) {
        self.zoom(self.settings.zoom_factor, None, None, None);
    }

    pub fn zoom_out(&mut self) {
        self.zoom(1.0 / self.settings.zoom_factor, None, None, None);
    }

    /// Back to the unzoomed frame.
    pub fn fit_all(&mut self) {
        self.zoom_home(None);
    }

    pub fn zoom_home(&mut self, duration: Option<Duration>) {
        self.zoom_toggle.clear();
        let duration = self.navigation_duration(duration, ZOOM_TO_HOME_DURATION);
        self.animate_view(AnimationKind::Zoom, [1.0, 0.0, 0.0], duration);
    }

    /// Pan by a pixel delta immediately. A running zoom stops where it is.
    pub fn move_by(&mut self, dx: f64, dy: f64) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        self.zoom_toggle.clear();
        if let Some(animation) = self.view_animation.as_mut() {
            animation.stop();
        }
        let [zoom, x, y] = self.view;
        let (x, y) = self.clamp_offset(zoom, x + dx, y + dy);
        self.set_view([zoom, x, y]);
        self.invalidate_state(ConsistencyState::SERIES | ConsistencyState::LABELS);
    }

    /// Animate the map so that `(lon, lat)` lands in the viewport center.
    pub fn center_on(&mut self, lon: f64, lat: f64, duration: Option<Duration>) {
        let [zoom, _, _] = self.target_view();
        let (x, y) = self.scale.tx().pick_tx(lon, lat).project(lon, lat);
        let (px, py) = self.scale.scale_to_px(x, y);
        if !px.is_finite() || !py.is_finite() {
            return;
        }
        self.zoom_toggle.clear();
        let (cx, cy) = self.viewport_center();
        let (dx, dy) = self.clamp_offset(zoom, cx - px * zoom, cy - py * zoom);
        let duration = self.navigation_duration(duration, self.settings.zoom_animation.duration());
        self.animate_view(AnimationKind::Move, [zoom, dx, dy], duration);
    }

    /// Zoom so that a screen rectangle fills the viewport.
    pub fn zoom_to_bounds(&mut self, rect: Rect, duration: Option<Duration>) {
        let (x1, y1) = self.screen_to_local(rect.left, rect.top);
        let (x2, y2) = self.screen_to_local(rect.right(), rect.bottom());
        self.zoom_toggle.clear();
        let duration = self.navigation_duration(duration, self.settings.zoom_animation.duration());
        self.zoom_to_local(Rect::from_corners(x1, y1, x2, y2), duration);
    }

    /// Zoom so that a map-layer rectangle fills the viewport. Returns false
    /// when there is nothing to zoom to.
    pub(crate) fn zoom_to_local(&mut self, local: Rect, duration: Duration) -> bool {
        let Some(bounds) = self.bounds else { return false };
        if !local.is_finite() || local.width <= 0.0 || local.height <= 0.0 {
            return false;
        }
        let level = self
            .settings
            .clamp_zoom((bounds.width / local.width).min(bounds.height / local.height));
        let (cx, cy) = local.center();
        let (bx, by) = bounds.center();
        let (dx, dy) = self.clamp_offset(level, bx - cx * level, by - cy * level);
        self.animate_view(AnimationKind::Zoom, [level, dx, dy], duration);
        true
    }

    /// Map-layer pixel rectangle of a feature.
    pub(crate) fn feature_local_bounds(&self, id: &str) -> Option<Rect> {
        let bounds = self.features.get(id)?.projected_bounds();
        if bounds.is_empty() {
            return None;
        }
        let (x1, y1) = self.scale.scale_to_px(bounds.min_x, bounds.min_y);
        let (x2, y2) = self.scale.scale_to_px(bounds.max_x, bounds.max_y);
        let rect = Rect::from_corners(x1, y1, x2, y2);
        rect.is_finite().then_some(rect)
    }

    /// Zoom onto one feature. Returns false and warns when it does not exist.
    pub fn focus_feature(&mut self, id: &str, duration: Option<Duration>) -> bool {
        let Some(local) = self.feature_local_bounds(id) else {
            self.events.warn(Warning::feature_not_found(id));
            return false;
        };
        let duration = self.navigation_duration(duration, ZOOM_TO_FEATURE_DURATION);
        self.zoom_to_local(local, duration)
    }

    /// Zoom onto the union of the given features. Calling it again with the
    /// same ids zooms back home.
    pub fn zoom_to_feature(&mut self, ids: &[&str], duration: Option<Duration>) {
        if ids.is_empty() {
            return;
        }
        if self.zoom_toggle.is_zoomed_to(ids) {
            self.zoom_home(duration);
            return;
        }

        let mut target: Option<Rect> = None;
        for id in ids {
            match self.feature_local_bounds(id) {
                Some(local) => target = Some(target.map_or(local, |t| t.union(&local))),
                None => self.events.warn(Warning::feature_not_found(id)),
            }
        }
        let Some(target) = target else { return };
        self.zoom_toggle.set(ids);
        let duration = self.navigation_duration(duration, ZOOM_TO_FEATURE_DURATION);
        self.zoom_to_local(target, duration);
    }

    /// Keep the zoomed content over the viewport. Content smaller than the
    /// viewport is centered.
    pub(crate) fn clamp_offset(&self, zoom: f64, dx: f64, dy: f64) -> (f64, f64) {
        let Some(bounds) = self.bounds else { return (dx, dy) };
        let content = self.scale.view_space();
        if !content.is_finite() {
            return (dx, dy);
        }
        let clamp_axis = |offset: f64, start: f64, size: f64, content_start: f64, content_size: f64| {
            let scaled = content_size * zoom;
            if scaled <= size || roughly_equal(scaled, size, EPSILON) {
                start + (size - scaled) / 2.0 - content_start * zoom
            } else {
                let low = start + size - (content_start + content_size) * zoom;
                let high = start - content_start * zoom;
                offset.clamp(low, high)
            }
        };
        (
            clamp_axis(dx, bounds.left, bounds.width, content.left, content.width),
            clamp_axis(dy, bounds.top, bounds.height, content.top, content.height),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::map::animation::{AnimationKind, AnimationState};
    use crate::map::chart::tests::chart;
    use crate::map::config::ChartSettings;
    use crate::map::events::{ChartEvent, WarningCode};
    use std::time::Duration;

    fn assert_view(actual: [f64; 3], expected: [f64; 3]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_zoom_in_keeps_the_center_fixed() {
        let mut chart = chart();
        chart.zoom_in();
        assert_view(chart.view(), [1.3, -15.0, -15.0]);
        chart.draw();
        assert_eq!(chart.scale().zoom(), 1.3);
        assert_eq!(chart.scale().offset(), (-15.0, -15.0));
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut chart = chart();
        chart.zoom_to(50.0, None, None, None);
        assert_eq!(chart.zoom_level(), 10.0);
        chart.zoom_to(0.1, None, None, None);
        assert_view(chart.view(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_invalid_factor_is_ignored() {
        let mut chart = chart();
        chart.zoom(f64::NAN, None, None, None);
        chart.zoom(-2.0, None, None, None);
        chart.zoom(0.0, None, None, None);
        assert_view(chart.view(), [1.0, 0.0, 0.0]);
        assert!(chart.drain_events().is_empty());
    }

    #[test]
    fn test_move_is_clamped_to_content() {
        let mut chart = chart();
        chart.move_by(30.0, 0.0);
        assert_view(chart.view(), [1.0, 0.0, 0.0]);

        chart.zoom_to(2.0, None, None, None);
        assert_view(chart.view(), [2.0, -50.0, -50.0]);
        chart.move_by(100.0, -10.0);
        assert_view(chart.view(), [2.0, 0.0, -60.0]);
    }

    #[test]
    fn test_animated_zoom_reports_progress() {
        let mut chart = chart();
        *chart.settings_mut() = ChartSettings::default();
        chart.zoom_in();
        assert_eq!(chart.view_animation_state(), Some(AnimationState::Playing));
        assert_eq!(chart.zoom_level(), 1.0);

        chart.tick(Duration::from_millis(100));
        let halfway = chart.zoom_level();
        assert!(halfway > 1.0 && halfway < 1.3);

        chart.tick(Duration::from_millis(150));
        assert_eq!(chart.view_animation_state(), Some(AnimationState::Completed));
        assert!((chart.zoom_level() - 1.3).abs() < 1e-9);

        let events = chart.drain_events();
        assert_eq!(events.first(), Some(&ChartEvent::ZoomStart { from: 1.0, to: 1.3 }));
        assert!(events.contains(&ChartEvent::AnimationEnd { kind: AnimationKind::Zoom }));
    }

    #[test]
    fn test_animated_zoom_to_settles_on_the_exact_level() {
        let mut chart = chart();
        *chart.settings_mut() = ChartSettings::default();
        chart.zoom_to(5.0, None, None, None);
        assert_eq!(chart.view_animation_state(), Some(AnimationState::Playing));
        while chart.tick(Duration::from_millis(16)) {
            chart.draw();
        }
        assert_eq!(chart.view_animation_state(), Some(AnimationState::Completed));
        assert_eq!(chart.zoom_level(), 5.0);
    }

    #[test]
    fn test_new_zoom_continues_from_the_running_target() {
        let mut chart = chart();
        *chart.settings_mut() = ChartSettings::default();
        chart.zoom_in();
        chart.tick(Duration::from_millis(50));
        chart.zoom_in();
        assert!((chart.target_view()[0] - 1.69).abs() < 1e-9);
        while chart.tick(Duration::from_millis(16)) {}
        assert!((chart.zoom_level() - 1.69).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_to_feature_toggles() {
        let mut chart = chart();
        chart.zoom_to_feature(&["FR"], None);
        assert_view(chart.view(), [2.5, 0.0, -150.0]);

        chart.zoom_to_feature(&["FR"], None);
        assert_view(chart.view(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_other_navigation_resets_the_feature_toggle() {
        let mut chart = chart();
        chart.zoom_to_feature(&["FR"], None);
        chart.move_by(0.0, 10.0);
        chart.zoom_to_feature(&["FR"], None);
        assert_view(chart.view(), [2.5, 0.0, -150.0]);
    }

    #[test]
    fn test_zoom_to_missing_feature_warns() {
        let mut chart = chart();
        chart.zoom_to_feature(&["XX"], None);
        assert_view(chart.view(), [1.0, 0.0, 0.0]);
        let warnings = chart.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::FeatureIdNotFound);

        chart.zoom_to_feature(&["XX", "DE"], None);
        assert_eq!(chart.take_warnings().len(), 1);
        assert!(chart.zoom_level() > 1.0);
    }

    #[test]
    fn test_center_on_pans_without_zooming() {
        let mut chart = chart();
        chart.zoom_to(2.0, None, None, None);
        chart.center_on(20.0, 20.0, None);
        assert_view(chart.view(), [2.0, 0.0, -100.0]);
    }
}
