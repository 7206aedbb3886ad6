pub mod algebra;
pub mod builder;

pub use algebra::{filter_by_min_duration, intersect_all, intersect_pair};
pub use builder::build_timeline;

use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed span of time in seconds, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        debug_assert!(start <= end, "interval start {} after end {}", start, end);
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Inclusive on both bounds.
    pub fn contains(&self, ts: f64) -> bool {
        self.start <= ts && ts <= self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Ordered, strictly increasing, disjoint intervals of continuous coverage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    intervals: Vec<Interval>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from intervals already known to be sorted and disjoint.
    pub fn from_sorted(intervals: Vec<Interval>) -> Self {
        debug_assert!(
            intervals.windows(2).all(|w| w[0].end < w[1].start),
            "timeline intervals must be strictly increasing"
        );
        Self { intervals }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn total_duration(&self) -> f64 {
        self.intervals.iter().map(Interval::duration).sum()
    }

    /// True when `ts` falls inside any interval, bounds included.
    pub fn contains(&self, ts: f64) -> bool {
        // partition_point finds the first interval ending at or after ts
        let idx = self.intervals.partition_point(|iv| iv.end < ts);
        self.intervals
            .get(idx)
            .map(|iv| iv.contains(ts))
            .unwrap_or(false)
    }

    pub(crate) fn push(&mut self, interval: Interval) {
        self.intervals.push(interval);
    }
}

impl From<Vec<(f64, f64)>> for Timeline {
    fn from(pairs: Vec<(f64, f64)>) -> Self {
        Self::from_sorted(
            pairs
                .into_iter()
                .map(|(start, end)| Interval::new(start, end))
                .collect(),
        )
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, iv) in self.intervals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", iv)?;
        }
        write!(f, "]")
    }
}
