//! Chart events and non-fatal warnings.

use std::fmt;

use crate::geo::Rect;
use crate::map::animation::AnimationKind;
use crate::map::drill::{DrillPoint, SceneId};

/// Plain-data notifications queued by the chart and drained by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartEvent {
    ZoomStart { from: f64, to: f64 },
    AnimationStart { kind: AnimationKind },
    AnimationEnd { kind: AnimationKind },
    DrillChange { path: Vec<DrillPoint>, current: SceneId },
    /// `(series, point)` pairs selected by a click or a marquee.
    PointsSelect { points: Vec<(usize, usize)> },
    SelectMarqueeStart { rect: Rect },
    SelectMarqueeChange { rect: Rect },
    SelectMarqueeFinish { rect: Rect },
}

/// Numeric warning codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum WarningCode {
    UnknownProjection = 101,
    InvalidGeoData = 102,
    InvalidConfig = 103,
    FeatureIdNotFound = 301,
}

impl WarningCode {
    pub fn code(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub code: WarningCode,
    pub detail: String,
}

impl Warning {
    pub fn new(code: WarningCode, detail: impl Into<String>) -> Self {
        Self { code, detail: detail.into() }
    }

    pub fn feature_not_found(id: &str) -> Self {
        Self::new(WarningCode::FeatureIdNotFound, format!("feature `{id}` not found"))
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warning {}: {}", self.code.code(), self.detail)
    }
}

/// Queues filled during API calls and ticks.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<ChartEvent>,
    warnings: Vec<Warning>,
}

impl EventQueue {
    pub fn emit(&mut self, event: ChartEvent) {
        tracing::debug!(?event, "chart event");
        self.events.push(event);
    }

    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(code = warning.code.code(), detail = %warning.detail, "chart warning");
        self.warnings.push(warning);
    }

    pub fn drain_events(&mut self) -> Vec<ChartEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn events(&self) -> &[ChartEvent] {
        &self.events
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Move everything queued in `other` to the end of this queue.
    pub fn absorb(&mut self, other: &mut EventQueue) {
        self.events.append(&mut other.events);
        self.warnings.append(&mut other.warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_the_queue() {
        let mut queue = EventQueue::default();
        queue.emit(ChartEvent::ZoomStart { from: 1.0, to: 2.0 });
        queue.warn(Warning::feature_not_found("XX"));

        assert_eq!(queue.drain_events().len(), 1);
        assert!(queue.drain_events().is_empty());

        let warnings = queue.take_warnings();
        assert_eq!(warnings[0].code.code(), 301);
        assert_eq!(warnings[0].to_string(), "warning 301: feature `XX` not found");
    }
}
