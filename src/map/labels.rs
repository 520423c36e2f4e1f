//! Label overlap resolution.
//!
//! Candidates compete only inside their series-type group. Every candidate is
//! keyed by its number of conflicts and popped from a min-heap, so the least
//! conflicted labels are settled first; a popped label that loses a conflict
//! is hidden and its neighbours' keys drop by one.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::geo::Rect;
use crate::map::heap::BinaryHeap;
use crate::map::series::SeriesType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OverlapMode {
    #[default]
    NoOverlap,
    AllowOverlap,
    /// Labels are shrunk to fit; they still may not overlap.
    AutoWidth,
}

impl OverlapMode {
    pub fn name(self) -> &'static str {
        match self {
            OverlapMode::NoOverlap => "no-overlap",
            OverlapMode::AllowOverlap => "allow-overlap",
            OverlapMode::AutoWidth => "auto-width",
        }
    }

    pub fn forbids_overlap(self) -> bool {
        self != OverlapMode::AllowOverlap
    }

    pub fn toggled(self) -> OverlapMode {
        match self {
            OverlapMode::AllowOverlap => OverlapMode::NoOverlap,
            _ => OverlapMode::AllowOverlap,
        }
    }
}

impl fmt::Display for OverlapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OverlapMode {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "no-overlap" | "nooverlap" | "false" => Ok(OverlapMode::NoOverlap),
            "allow-overlap" | "allowoverlap" | "true" => Ok(OverlapMode::AllowOverlap),
            "auto-width" | "autowidth" => Ok(OverlapMode::AutoWidth),
            _ => Err(MapError::Config(format!("unknown overlap mode `{s}`"))),
        }
    }
}

impl TryFrom<String> for OverlapMode {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OverlapMode> for String {
    fn from(mode: OverlapMode) -> Self {
        mode.name().to_string()
    }
}

/// Whether a label may not overlap others, given the chart, series and point
/// settings. Unset levels inherit from the one above.
pub fn is_overlap_forbidden(
    global: OverlapMode,
    series: Option<OverlapMode>,
    point: Option<OverlapMode>,
) -> bool {
    point.or(series).unwrap_or(global).forbids_overlap()
}

/// One label competing for space.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCandidate {
    pub series: usize,
    pub index: usize,
    pub series_type: SeriesType,
    /// Screen bounds, `None` when the label could not be measured.
    pub bounds: Option<Rect>,
    pub rank: f64,
    pub overlap_forbidden: bool,
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    states: BTreeMap<(usize, usize), bool>,
    /// True when no candidate had measurable bounds.
    pub no_label_drawn: bool,
}

impl Resolution {
    pub fn is_visible(&self, series: usize, index: usize) -> bool {
        self.states.get(&(series, index)).copied().unwrap_or(true)
    }

    /// `(point index, visible)` pairs of one series, in point order.
    pub fn series_states(&self, series: usize) -> Vec<(usize, bool)> {
        self.states
            .range((series, 0)..=(series, usize::MAX))
            .map(|(&(_, index), &state)| (index, state))
            .collect()
    }

    pub fn hidden_count(&self) -> usize {
        self.states.values().filter(|visible| !**visible).count()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Decide which labels stay visible.
pub fn resolve(candidates: &[LabelCandidate]) -> Resolution {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by_key(|&i| (candidates[i].series, candidates[i].index));

    let mut groups: BTreeMap<SeriesType, Vec<usize>> = BTreeMap::new();
    for &i in &order {
        groups.entry(candidates[i].series_type).or_default().push(i);
    }

    let mut state = vec![true; candidates.len()];
    for members in groups.values() {
        resolve_group(candidates, members, &mut state);
    }

    let states = order
        .iter()
        .map(|&i| ((candidates[i].series, candidates[i].index), state[i]))
        .collect();
    Resolution {
        states,
        no_label_drawn: candidates.iter().all(|c| c.bounds.is_none()),
    }
}

fn resolve_group(candidates: &[LabelCandidate], members: &[usize], state: &mut [bool]) {
    let mut intersects: Vec<Vec<usize>> = vec![Vec::new(); candidates.len()];
    for (a, &i) in members.iter().enumerate() {
        let Some(bounds_i) = candidates[i].bounds else { continue };
        for &j in &members[a + 1..] {
            let Some(bounds_j) = candidates[j].bounds else { continue };
            if bounds_i.intersects(&bounds_j) {
                intersects[i].push(j);
                intersects[j].push(i);
            }
        }
    }

    let mut in_heap = vec![false; candidates.len()];
    let items: Vec<(usize, usize)> = members
        .iter()
        .map(|&i| {
            in_heap[i] = true;
            (intersects[i].len(), i)
        })
        .collect();
    let mut heap = BinaryHeap::new(items, |a: &(usize, usize), b: &(usize, usize)| a.0 > b.0);

    while let Some((_, i)) = heap.pop() {
        in_heap[i] = false;
        let label = &candidates[i];
        if !label.overlap_forbidden || !state[i] {
            continue;
        }

        let loses = intersects[i].iter().any(|&j| {
            if !state[j] {
                return false;
            }
            let other = &candidates[j];
            if !other.overlap_forbidden {
                return true;
            }
            if label.rank == other.rank {
                label.series >= other.series
            } else {
                label.rank < other.rank
            }
        });

        if loses {
            state[i] = false;
            for &j in &intersects[i] {
                if state[j] && in_heap[j] {
                    if let Some(pos) = heap.position(|item| item.1 == j) {
                        if let Some(item) = heap.get_mut(pos) {
                            item.0 = item.0.saturating_sub(1);
                        }
                        heap.shift_down(pos);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(series: usize, index: usize, left: f64, rank: f64) -> LabelCandidate {
        LabelCandidate {
            series,
            index,
            series_type: SeriesType::Choropleth,
            bounds: Some(Rect::new(left, 0.0, 10.0, 4.0)),
            rank,
            overlap_forbidden: true,
        }
    }

    fn assert_no_forbidden_overlap(candidates: &[LabelCandidate], resolution: &Resolution) {
        for a in candidates {
            for b in candidates {
                if (a.series, a.index) == (b.series, b.index) || a.series_type != b.series_type {
                    continue;
                }
                let (Some(ba), Some(bb)) = (a.bounds, b.bounds) else { continue };
                if a.overlap_forbidden && b.overlap_forbidden && ba.intersects(&bb) {
                    assert!(
                        !(resolution.is_visible(a.series, a.index) && resolution.is_visible(b.series, b.index)),
                        "{:?} and {:?} both visible",
                        (a.series, a.index),
                        (b.series, b.index)
                    );
                }
            }
        }
    }

    #[test]
    fn test_higher_rank_wins() {
        let candidates = vec![label(0, 0, 0.0, 1.0), label(0, 1, 5.0, 3.0)];
        let resolution = resolve(&candidates);
        assert!(!resolution.is_visible(0, 0));
        assert!(resolution.is_visible(0, 1));
    }

    #[test]
    fn test_equal_rank_lower_series_wins() {
        let candidates = vec![label(1, 0, 0.0, 0.0), label(0, 0, 5.0, 0.0)];
        let resolution = resolve(&candidates);
        assert!(resolution.is_visible(0, 0));
        assert!(!resolution.is_visible(1, 0));
    }

    #[test]
    fn test_allow_overlap_keeps_both() {
        let mut candidates = vec![label(0, 0, 0.0, 0.0), label(0, 1, 5.0, 0.0)];
        for c in &mut candidates {
            c.overlap_forbidden = is_overlap_forbidden(OverlapMode::AllowOverlap, None, None);
        }
        let resolution = resolve(&candidates);
        assert!(resolution.is_visible(0, 0) && resolution.is_visible(0, 1));
    }

    #[test]
    fn test_groups_do_not_compete() {
        let mut bubble = label(1, 0, 0.0, 0.0);
        bubble.series_type = SeriesType::Bubble;
        let candidates = vec![label(0, 0, 0.0, 0.0), bubble];
        let resolution = resolve(&candidates);
        assert_eq!(resolution.hidden_count(), 0);
    }

    #[test]
    fn test_chain_ties_inside_one_series() {
        // a overlaps b, b overlaps c. The ends are popped first and, on a tie
        // inside one series, the popped label gives way.
        let candidates = vec![label(0, 0, 0.0, 0.0), label(0, 1, 8.0, 0.0), label(0, 2, 16.0, 0.0)];
        let resolution = resolve(&candidates);
        assert_eq!(resolution.series_states(0), vec![(0, false), (1, true), (2, false)]);
    }

    #[test]
    fn test_chain_with_ranked_ends() {
        let candidates = vec![label(0, 0, 0.0, 2.0), label(0, 1, 8.0, 0.0), label(0, 2, 16.0, 2.0)];
        let resolution = resolve(&candidates);
        assert_eq!(resolution.series_states(0), vec![(0, true), (1, false), (2, true)]);
    }

    #[test]
    fn test_resolution_is_idempotent_and_consistent() {
        let mut candidates = Vec::new();
        for series in 0..3 {
            for index in 0..12 {
                let left = ((series * 7 + index * 13) % 40) as f64 * 2.5;
                let rank = ((series + index) % 3) as f64;
                let mut c = label(series, index, left, rank);
                c.overlap_forbidden = (series + index) % 5 != 0;
                candidates.push(c);
            }
        }
        let first = resolve(&candidates);
        let second = resolve(&candidates);
        assert_eq!(first, second);
        assert_no_forbidden_overlap(&candidates, &first);
    }

    #[test]
    fn test_unmeasured_labels_never_conflict() {
        let mut hidden = label(0, 0, 0.0, 0.0);
        hidden.bounds = None;
        let candidates = vec![hidden, label(0, 1, 0.0, 0.0)];
        let resolution = resolve(&candidates);
        assert!(resolution.is_visible(0, 0) && resolution.is_visible(0, 1));
        assert!(!resolution.no_label_drawn);

        let mut only = label(0, 0, 0.0, 0.0);
        only.bounds = None;
        assert!(resolve(&[only]).no_label_drawn);
    }

    #[test]
    fn test_overlap_mode_inheritance() {
        use OverlapMode::*;
        assert!(is_overlap_forbidden(NoOverlap, None, None));
        assert!(!is_overlap_forbidden(NoOverlap, Some(AllowOverlap), None));
        assert!(is_overlap_forbidden(AllowOverlap, Some(AllowOverlap), Some(NoOverlap)));
        assert!(!is_overlap_forbidden(AllowOverlap, None, None));
        assert_eq!("allow_overlap".parse::<OverlapMode>().unwrap(), AllowOverlap);
    }
}
