//! Consistency states: the dirty bits of the chart pipeline.

use bitflags::bitflags;

bitflags! {
    /// Parts of the chart that must be recomputed before the next frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ConsistencyState: u16 {
        // Calculation (resolved by `calculate`)

        /// Geo data must be installed and projected.
        const GEO_DATA       = 1 << 0;
        /// The scale range must be accumulated again.
        const SCALE          = 1 << 1;
        /// Series must rebind to the feature index.
        const GEO_DATA_INDEX = 1 << 2;

        // Drawing (resolved by `draw`, in declaration order)

        /// Viewport or content bounds changed.
        const BOUNDS         = 1 << 3;
        const ZOOM           = 1 << 4;
        const MOVE           = 1 << 5;
        const AXES           = 1 << 6;
        const GRIDS          = 1 << 7;
        const CROSSHAIR      = 1 << 8;
        /// Feature paths must be restyled.
        const APPEARANCE     = 1 << 9;
        const SERIES         = 1 << 10;
        const LABELS         = 1 << 11;
        const COLOR_RANGE    = 1 << 12;
        const CALLOUT        = 1 << 13;
    }
}

impl ConsistencyState {
    pub const CALCULATION: Self = Self::GEO_DATA.union(Self::SCALE).union(Self::GEO_DATA_INDEX);

    /// Everything a viewport change touches.
    pub const LAYOUT: Self = Self::BOUNDS
        .union(Self::AXES)
        .union(Self::GRIDS)
        .union(Self::SERIES)
        .union(Self::LABELS)
        .union(Self::COLOR_RANGE)
        .union(Self::CALLOUT)
        .union(Self::CROSSHAIR);

    /// What a pan or zoom frame touches.
    pub const NAVIGATION: Self = Self::ZOOM
        .union(Self::MOVE)
        .union(Self::AXES)
        .union(Self::GRIDS)
        .union(Self::LABELS)
        .union(Self::CALLOUT);
}

/// One pipeline stage: the bit it resolves and the function resolving it.
pub struct Stage<T> {
    pub flag: ConsistencyState,
    pub name: &'static str,
    pub resolve: fn(&mut T),
}

impl<T> Clone for Stage<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Stage<T> {}

/// Owner of a consistency bit set.
pub trait Consistency {
    fn states(&self) -> ConsistencyState;
    fn states_mut(&mut self) -> &mut ConsistencyState;

    fn has_state(&self, flag: ConsistencyState) -> bool {
        self.states().intersects(flag)
    }

    fn invalidate_state(&mut self, flags: ConsistencyState) {
        self.states_mut().insert(flags);
    }

    fn mark_consistent(&mut self, flags: ConsistencyState) {
        self.states_mut().remove(flags);
    }
}

/// Walk `stages` in order, running each stage whose bit is set and clearing
/// it afterwards. A stage may set later bits; earlier ones wait for the next
/// pass. Returns the bits that were resolved.
pub fn run_stages<T: Consistency>(target: &mut T, stages: &[Stage<T>]) -> ConsistencyState {
    let mut resolved = ConsistencyState::empty();
    for stage in stages {
        if target.has_state(stage.flag) {
            tracing::trace!(stage = stage.name, "resolving");
            (stage.resolve)(target);
            target.mark_consistent(stage.flag);
            resolved.insert(stage.flag);
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        states: ConsistencyState,
        log: Vec<&'static str>,
    }

    impl Consistency for Recorder {
        fn states(&self) -> ConsistencyState {
            self.states
        }

        fn states_mut(&mut self) -> &mut ConsistencyState {
            &mut self.states
        }
    }

    fn stages() -> [Stage<Recorder>; 3] {
        [
            Stage {
                flag: ConsistencyState::BOUNDS,
                name: "bounds",
                resolve: |r| {
                    r.log.push("bounds");
                    r.invalidate_state(ConsistencyState::SERIES);
                },
            },
            Stage {
                flag: ConsistencyState::ZOOM,
                name: "zoom",
                resolve: |r| r.log.push("zoom"),
            },
            Stage {
                flag: ConsistencyState::SERIES,
                name: "series",
                resolve: |r| {
                    r.log.push("series");
                    r.invalidate_state(ConsistencyState::BOUNDS);
                },
            },
        ]
    }

    #[test]
    fn test_stages_run_in_order_and_clear_bits() {
        let mut recorder = Recorder {
            states: ConsistencyState::SERIES | ConsistencyState::BOUNDS,
            ..Default::default()
        };
        let resolved = run_stages(&mut recorder, &stages());

        assert_eq!(recorder.log, vec!["bounds", "series"]);
        assert_eq!(resolved, ConsistencyState::BOUNDS | ConsistencyState::SERIES);
        // The bit set by a later stage waits for the next pass.
        assert_eq!(recorder.states, ConsistencyState::BOUNDS);
    }

    #[test]
    fn test_default_state_is_consistent() {
        assert!(ConsistencyState::default().is_empty());
        assert!(!Recorder::default().has_state(ConsistencyState::all()));
    }

    #[test]
    fn test_clean_target_runs_nothing() {
        let mut recorder = Recorder::default();
        assert!(run_stages(&mut recorder, &stages()).is_empty());
        assert!(recorder.log.is_empty());
    }
}
