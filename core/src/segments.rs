//! Dive profile segments.
//!
//! A segment is a linear depth change (or a flat stay) breathing one gas.
//! Depths are in metres, durations in seconds.

use crate::error::PlanError;
use crate::gases::Gas;

/// Speeds closer than this (m/s) count as equal when merging.
const SPEED_TOLERANCE: f64 = 1e-9;

/// Depths closer than this (m) count as equal.
const DEPTH_TOLERANCE: f64 = 1e-9;

/// One linear part of a dive profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    start_depth: f64,
    end_depth: f64,
    gas: Gas,
    duration: f64,
    /// Index of the user chosen tank, overrides the gas based tank selection.
    tank: Option<usize>,
}

impl Segment {
    pub fn new(start_depth: f64, end_depth: f64, gas: Gas, duration: f64) -> Result<Self, PlanError> {
        if !start_depth.is_finite() || !end_depth.is_finite() || start_depth < 0.0 || end_depth < 0.0 {
            return Err(PlanError::InvalidSegment(format!(
                "depths must be non-negative, got {start_depth} m to {end_depth} m"
            )));
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(PlanError::InvalidSegment(format!(
                "duration must be non-negative, got {duration} s"
            )));
        }
        Ok(Self {
            start_depth,
            end_depth,
            gas,
            duration,
            tank: None,
        })
    }

    /// Segment generated by the planner from values known to be valid.
    pub(crate) fn planned(start_depth: f64, end_depth: f64, gas: Gas, duration: f64) -> Self {
        Self {
            start_depth: start_depth.max(0.0),
            end_depth: end_depth.max(0.0),
            gas,
            duration: duration.max(0.0),
            tank: None,
        }
    }

    /// Stay at one depth.
    pub fn flat(depth: f64, gas: Gas, duration: f64) -> Result<Self, PlanError> {
        Self::new(depth, depth, gas, duration)
    }

    pub fn with_tank(mut self, tank: usize) -> Self {
        self.tank = Some(tank);
        self
    }

    pub fn with_duration(&self, duration: f64) -> Result<Self, PlanError> {
        let mut changed = Self::new(self.start_depth, self.end_depth, self.gas, duration)?;
        changed.tank = self.tank;
        Ok(changed)
    }

    pub fn start_depth(&self) -> f64 {
        self.start_depth
    }

    pub fn end_depth(&self) -> f64 {
        self.end_depth
    }

    pub fn gas(&self) -> Gas {
        self.gas
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn tank(&self) -> Option<usize> {
        self.tank
    }

    /// Depth change speed (m/s), positive when descending.
    pub fn speed(&self) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (self.end_depth - self.start_depth) / self.duration
    }

    pub fn average_depth(&self) -> f64 {
        (self.start_depth + self.end_depth) / 2.0
    }

    pub fn max_depth(&self) -> f64 {
        self.start_depth.max(self.end_depth)
    }

    pub fn is_flat(&self) -> bool {
        (self.end_depth - self.start_depth).abs() < DEPTH_TOLERANCE
    }

    pub fn is_ascent(&self) -> bool {
        self.end_depth < self.start_depth - DEPTH_TOLERANCE
    }

    pub fn is_descent(&self) -> bool {
        self.end_depth > self.start_depth + DEPTH_TOLERANCE
    }

    /// Depth after `elapsed` seconds spent in this segment.
    pub fn depth_at(&self, elapsed: f64) -> f64 {
        let elapsed = elapsed.clamp(0.0, self.duration);
        self.start_depth + self.speed() * elapsed
    }

    /// Seconds after the segment start at which the given depth is crossed.
    /// Only meaningful for depths between start and end depth.
    pub fn time_at_depth(&self, depth: f64) -> f64 {
        let speed = self.speed();
        if speed.abs() < SPEED_TOLERANCE {
            return 0.0;
        }
        ((depth - self.start_depth) / speed).clamp(0.0, self.duration)
    }

    fn can_merge(&self, next: &Segment) -> bool {
        self.gas.composition_equals(&next.gas)
            && self.tank == next.tank
            && (self.speed() - next.speed()).abs() < SPEED_TOLERANCE
            && (self.end_depth - next.start_depth).abs() < DEPTH_TOLERANCE
    }
}

/// Ordered, growing list of segments with incrementally tracked max depth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segments {
    items: Vec<Segment>,
    max_depth: f64,
}

impl Segments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slice(segments: &[Segment]) -> Self {
        let mut result = Self::new();
        for segment in segments {
            result.add(segment.clone());
        }
        result
    }

    pub fn add(&mut self, segment: Segment) {
        self.max_depth = self.max_depth.max(segment.max_depth());
        self.items.push(segment);
    }

    /// Appends a segment continuing from the current depth.
    pub fn add_change(&mut self, end_depth: f64, gas: Gas, duration: f64) -> Result<(), PlanError> {
        let segment = Segment::new(self.current_depth(), end_depth, gas, duration)?;
        self.add(segment);
        Ok(())
    }

    /// Appends a flat segment at the current depth.
    pub fn add_flat(&mut self, gas: Gas, duration: f64) -> Result<(), PlanError> {
        self.add_change(self.current_depth(), gas, duration)
    }

    pub fn items(&self) -> &[Segment] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Segment> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.items.last()
    }

    pub fn current_depth(&self) -> f64 {
        self.items.last().map(|s| s.end_depth).unwrap_or(0.0)
    }

    pub fn max_depth(&self) -> f64 {
        self.max_depth
    }

    /// Drops segments added after `len`.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.items.len() {
            return;
        }
        self.items.truncate(len);
        self.max_depth = self
            .items
            .iter()
            .map(Segment::max_depth)
            .fold(0.0_f64, f64::max);
    }

    /// Makes the profile contiguous: each segment starts where the previous ended.
    pub fn fix_start_depths(&mut self) {
        for index in 1..self.items.len() {
            let previous_end = self.items[index - 1].end_depth;
            self.items[index].start_depth = previous_end;
        }
    }

    pub fn total_duration(&self) -> f64 {
        self.items.iter().map(|s| s.duration).sum()
    }

    /// Time weighted average depth of all segments.
    pub fn average_depth(&self) -> f64 {
        average_depth(&self.items)
    }

    /// Joins contiguous segments with the same gas, tank and speed.
    ///
    /// Segments before `start_index` are copied unchanged and never merged.
    pub fn merge_flat(&self, start_index: usize) -> Segments {
        let mut merged = Segments::new();
        for (index, segment) in self.items.iter().enumerate() {
            if index > start_index && merged.len() > start_index {
                if let Some(last) = merged.items.last_mut() {
                    if last.can_merge(segment) {
                        last.end_depth = segment.end_depth;
                        last.duration += segment.duration;
                        continue;
                    }
                }
            }
            merged.add(segment.clone());
        }
        merged
    }
}

/// Time weighted average depth of the given segments.
pub fn average_depth(segments: &[Segment]) -> f64 {
    let total: f64 = segments.iter().map(|s| s.duration).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = segments.iter().map(|s| s.average_depth() * s.duration).sum();
    weighted / total
}
