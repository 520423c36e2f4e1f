//! Time-based interpolation for zoom, move and crs transitions.
//!
//! An animation is advanced by `tick(dt)` from the chart's frame loop. It
//! interpolates a `[f64; 3]` triple: `[zoom, dx, dy]` for zoom and move,
//! `[ratio, 0, 0]` for a crs blend.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ZOOM_DURATION: Duration = Duration::from_millis(200);
pub const ZOOM_TO_FEATURE_DURATION: Duration = Duration::from_millis(500);
pub const ZOOM_TO_HOME_DURATION: Duration = Duration::from_millis(300);
pub const DRILL_DOWN_DURATION: Duration = Duration::from_millis(700);
pub const DRILL_UP_DURATION: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationState {
    Idle,
    Playing,
    Completed,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimationKind {
    Zoom,
    Move,
    Crs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    #[default]
    Linear,
    EaseInOutCubic,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimationId(pub u64);

/// Animation settings as found in chart configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationSettings {
    pub enabled: bool,
    pub duration: u64,
    #[serde(default)]
    pub easing: Easing,
}

impl AnimationSettings {
    pub fn duration(&self) -> Duration {
        if self.enabled {
            Duration::from_millis(self.duration)
        } else {
            Duration::ZERO
        }
    }
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            duration: 300,
            easing: Easing::Linear,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    id: AnimationId,
    kind: AnimationKind,
    from: [f64; 3],
    to: [f64; 3],
    current: [f64; 3],
    duration: Duration,
    elapsed: Duration,
    easing: Easing,
    state: AnimationState,
}

impl Animation {
    pub fn new(id: AnimationId, kind: AnimationKind, from: [f64; 3], to: [f64; 3], duration: Duration) -> Self {
        Self {
            id,
            kind,
            from,
            to,
            current: from,
            duration,
            elapsed: Duration::ZERO,
            easing: Easing::Linear,
            state: AnimationState::Idle,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn id(&self) -> AnimationId {
        self.id
    }

    pub fn kind(&self) -> AnimationKind {
        self.kind
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == AnimationState::Playing
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, AnimationState::Completed | AnimationState::Stopped)
    }

    pub fn from(&self) -> [f64; 3] {
        self.from
    }

    pub fn to(&self) -> [f64; 3] {
        self.to
    }

    /// Last interpolated frame.
    pub fn current(&self) -> [f64; 3] {
        self.current
    }

    /// Start playing. A zero duration completes at once.
    pub fn play(&mut self) {
        if self.state != AnimationState::Idle {
            return;
        }
        if self.duration.is_zero() {
            self.current = self.to;
            self.state = AnimationState::Completed;
        } else {
            self.state = AnimationState::Playing;
        }
    }

    /// Advance by `dt` and return the new frame. No-op unless playing.
    pub fn tick(&mut self, dt: Duration) -> [f64; 3] {
        if self.state != AnimationState::Playing {
            return self.current;
        }
        self.elapsed = (self.elapsed + dt).min(self.duration);
        let t = self.easing.apply(self.elapsed.as_secs_f64() / self.duration.as_secs_f64());
        if self.elapsed >= self.duration {
            self.current = self.to;
            self.state = AnimationState::Completed;
        } else {
            for i in 0..3 {
                self.current[i] = self.from[i] + (self.to[i] - self.from[i]) * t;
            }
        }
        self.current
    }

    /// Cancel, keeping the last interpolated frame.
    pub fn stop(&mut self) {
        if matches!(self.state, AnimationState::Idle | AnimationState::Playing) {
            self.state = AnimationState::Stopped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zoom(duration_ms: u64) -> Animation {
        Animation::new(
            AnimationId(1),
            AnimationKind::Zoom,
            [1.0, 0.0, 0.0],
            [3.0, -100.0, 50.0],
            Duration::from_millis(duration_ms),
        )
    }

    #[test]
    fn test_linear_interpolation() {
        let mut anim = zoom(200);
        anim.play();
        let frame = anim.tick(Duration::from_millis(100));
        assert_eq!(frame, [2.0, -50.0, 25.0]);
        assert!(anim.is_playing());

        let frame = anim.tick(Duration::from_millis(150));
        assert_eq!(frame, [3.0, -100.0, 50.0]);
        assert_eq!(anim.state(), AnimationState::Completed);
    }

    #[test]
    fn test_zero_duration_completes_on_play() {
        let mut anim = zoom(0);
        anim.play();
        assert_eq!(anim.state(), AnimationState::Completed);
        assert_eq!(anim.current(), anim.to());
    }

    #[test]
    fn test_stop_keeps_last_frame() {
        let mut anim = zoom(400);
        anim.play();
        anim.tick(Duration::from_millis(100));
        anim.stop();
        assert_eq!(anim.state(), AnimationState::Stopped);
        assert_eq!(anim.current(), [1.5, -25.0, 12.5]);

        // Ticking a stopped animation does nothing.
        assert_eq!(anim.tick(Duration::from_millis(500)), [1.5, -25.0, 12.5]);
    }

    #[test]
    fn test_easing_ends_are_fixed() {
        for easing in [Easing::Linear, Easing::EaseInOutCubic] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
        }
        assert!(Easing::EaseInOutCubic.apply(0.25) < 0.25);
    }
}
