//! Time-interval reconciliation between detected scenes and the windows a
//! caller asked for.
//!
//! Two multiplicity policies exist and are kept apart on purpose:
//!
//! - [`OverlapMode::WindowExpansion`] builds the timestamp list sent to the
//!   captioning services. A scene overlapping two windows is emitted twice.
//! - [`OverlapMode::SegmentFilter`] decides whether an already captioned
//!   segment is kept. A segment is kept at most once, on its first matching
//!   window.

use serde::{Deserialize, Serialize};

use crate::error::IntervalError;

/// Tolerance used when comparing interval bounds echoed back by
/// collaborators.
const BOUND_EPSILON: f64 = 1e-6;

/// A closed `[start, end]` range in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntervalBounds")]
pub struct Interval {
    start: f64,
    end: f64,
}

#[derive(Deserialize)]
struct IntervalBounds {
    start: f64,
    end: f64,
}

impl TryFrom<IntervalBounds> for Interval {
    type Error = IntervalError;

    fn try_from(bounds: IntervalBounds) -> Result<Self, Self::Error> {
        Interval::new(bounds.start, bounds.end)
    }
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Result<Self, IntervalError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(IntervalError::NotFinite { start, end });
        }
        if start > end {
            return Err(IntervalError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    /// Closed-interval overlap: touching endpoints count.
    pub fn overlaps(&self, other: &Interval) -> bool {
        !(other.end < self.start || other.start > self.end)
    }

    pub fn same_bounds(&self, other: &Interval) -> bool {
        (self.start - other.start).abs() <= BOUND_EPSILON
            && (self.end - other.end).abs() <= BOUND_EPSILON
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapMode {
    /// One output entry per (scene, overlapping window) pair.
    WindowExpansion,
    /// Each scene at most once, stopping at the first overlapping window.
    SegmentFilter,
}

/// Keep the detected intervals that overlap at least one window, with the
/// multiplicity given by `mode`. Output order follows `detected`.
pub fn filter_overlapping(
    detected: &[Interval],
    windows: &[Interval],
    mode: OverlapMode,
) -> Vec<Interval> {
    match mode {
        OverlapMode::WindowExpansion => detected
            .iter()
            .flat_map(|scene| {
                windows
                    .iter()
                    .filter(|window| scene.overlaps(window))
                    .map(|_| *scene)
            })
            .collect(),
        OverlapMode::SegmentFilter => detected
            .iter()
            .filter(|scene| first_overlapping_window(scene, windows).is_some())
            .copied()
            .collect(),
    }
}

/// The first window, in caller order, that overlaps `interval`.
pub fn first_overlapping_window(interval: &Interval, windows: &[Interval]) -> Option<Interval> {
    windows
        .iter()
        .find(|window| interval.overlaps(window))
        .copied()
}
