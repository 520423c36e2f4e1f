//! Per-feature transforms: translation, scale and crs overrides.
//!
//! Translations are reported in map-layer pixels at zoom 1 with y pointing
//! down, like everything else on screen.

use crate::map::chart::MapChart;
use crate::map::events::Warning;
use crate::map::geometry::Geometry;
use crate::map::projection::Crs;
use crate::map::state::{Consistency, ConsistencyState};

impl MapChart {
    fn feature_source(&mut self, id: &str) -> Option<Geometry> {
        match self.features.get(id) {
            Some(feature) => Some(feature.flattened_geometry()),
            None => {
                self.events.warn(Warning::feature_not_found(id));
                None
            }
        }
    }

    fn feature_transform_changed(&mut self, id: &str) {
        tracing::debug!(id, "feature transform changed");
        self.invalidate_state(ConsistencyState::SCALE | ConsistencyState::BOUNDS);
    }

    /// Pixel offset of feature `id` from where its geo data puts it.
    pub fn feature_translation(&self, id: &str) -> Option<(f64, f64)> {
        let source = self.features.get(id)?.flattened_geometry();
        let tx = self.scale.tx();
        if !tx.has_override(id) {
            return Some((0.0, 0.0));
        }
        let own = tx.governing(id, &source);
        let inherited = tx.inherited(&source);
        let (ox, oy) = source.projected_bounds(|lon, lat| own.project(lon, lat)).center();
        let (ix, iy) = source.projected_bounds(|lon, lat| inherited.project(lon, lat)).center();
        let ratio = self.scale.ratio();
        Some(((ox - ix) * ratio, (iy - oy) * ratio))
    }

    /// Place feature `id` at an absolute pixel offset.
    pub fn set_feature_translation(&mut self, id: &str, dx: f64, dy: f64) -> &mut Self {
        let Some(current) = self.feature_translation(id) else {
            self.events.warn(Warning::feature_not_found(id));
            return self;
        };
        let ratio = self.scale.ratio();
        self.shift_feature(id, (dx - current.0) / ratio, (current.1 - dy) / ratio)
    }

    /// Move feature `id` by a screen pixel delta at the current zoom.
    pub fn translate_feature(&mut self, id: &str, dx: f64, dy: f64) -> &mut Self {
        let ratio = self.scale.ratio() * self.view[0];
        self.shift_feature(id, dx / ratio, -dy / ratio)
    }

    fn shift_feature(&mut self, id: &str, dx: f64, dy: f64) -> &mut Self {
        if !dx.is_finite() || !dy.is_finite() {
            return self;
        }
        let Some(source) = self.feature_source(id) else { return self };
        self.scale.tx_mut().translate_feature(id, &source, dx, dy);
        self.feature_transform_changed(id);
        self
    }

    /// Scale of feature `id` relative to its geo data record.
    pub fn feature_scale_factor(&self, id: &str) -> Option<f64> {
        let source = self.features.get(id)?.flattened_geometry();
        let tx = self.scale.tx();
        Some(tx.governing(id, &source).scale / tx.inherited(&source).scale)
    }

    /// Resize feature `id` around its center.
    pub fn set_feature_scale_factor(&mut self, id: &str, ratio: f64) -> &mut Self {
        if !ratio.is_finite() || ratio <= 0.0 {
            return self;
        }
        let Some(source) = self.feature_source(id) else { return self };
        let base = self.scale.tx().inherited(&source).scale;
        self.scale.tx_mut().scale_feature(id, &source, base * ratio);
        self.feature_transform_changed(id);
        self
    }

    pub fn feature_crs(&self, id: &str) -> Option<Crs> {
        let source = self.features.get(id)?.flattened_geometry();
        Some(self.scale.tx().governing(id, &source).crs)
    }

    /// Draw feature `id` in its own projection, keeping its center in place.
    pub fn set_feature_crs(&mut self, id: &str, crs: Crs) -> &mut Self {
        let Some(source) = self.feature_source(id) else { return self };
        self.scale.tx_mut().reproject_feature(id, &source, crs);
        self.feature_transform_changed(id);
        self
    }
}
