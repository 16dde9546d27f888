//! Mutable state of one decompression computation.

use crate::depth::DepthConverter;
use crate::gases::{BestGasQuery, Gas, Gases};
use crate::gradient::SubSurfaceGradientFactors;
use crate::options::{AscentSpeeds, Options, SafetyStop, AUTO_SAFETY_STOP_DEPTH, DECO_STOP_DISTANCE};
use crate::profile::{CalculatedProfile, Ceiling, TissueOverPressures};
use crate::segments::{self, Segment, Segments};
use crate::tissues::{LoadSegment, Tissues};

const DEPTH_TOLERANCE: f64 = 1e-6;

/// Checkpoint of the context. Ceilings, over-pressures and segments only grow,
/// so their lengths are enough to restore them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AlgorithmMemento {
    tissues: Tissues,
    runtime: f64,
    ceilings: usize,
    over_pressures: usize,
    segments: usize,
    current_gas: Gas,
}

/// Owns the tissues, recorded ceilings and generated segments of one computation.
pub(crate) struct AlgorithmContext<'a> {
    options: &'a Options,
    gases: &'a Gases,
    converter: DepthConverter,
    tissues: Tissues,
    gradients: SubSurfaceGradientFactors,
    ceilings: Vec<Ceiling>,
    over_pressures: Vec<TissueOverPressures>,
    segments: Segments,
    current_gas: Gas,
    runtime: f64,
    ascent_speeds: AscentSpeeds,
}

impl<'a> AlgorithmContext<'a> {
    pub fn new(options: &'a Options, gases: &'a Gases, tissues: Tissues, start_gas: Gas) -> Self {
        let converter = options.depth_converter();
        Self {
            options,
            gases,
            converter,
            tissues,
            gradients: SubSurfaceGradientFactors::new(
                options.gf_low,
                options.gf_high,
                converter.surface_pressure(),
            ),
            ceilings: Vec::new(),
            over_pressures: Vec::new(),
            segments: Segments::new(),
            current_gas: start_gas,
            runtime: 0.0,
            ascent_speeds: AscentSpeeds::new(options, 0.0),
        }
    }

    pub fn options(&self) -> &Options {
        self.options
    }

    pub fn converter(&self) -> &DepthConverter {
        &self.converter
    }

    pub fn tissues(&self) -> &Tissues {
        &self.tissues
    }

    pub fn gradients(&self) -> &SubSurfaceGradientFactors {
        &self.gradients
    }

    pub fn ceilings(&self) -> &[Ceiling] {
        &self.ceilings
    }

    pub fn current_gas(&self) -> Gas {
        self.current_gas
    }

    pub fn set_current_gas(&mut self, gas: Gas) {
        self.current_gas = gas;
    }

    pub fn runtime(&self) -> f64 {
        self.runtime
    }

    pub fn current_depth(&self) -> f64 {
        self.segments.current_depth()
    }

    pub fn is_at_surface(&self) -> bool {
        self.current_depth() <= DEPTH_TOLERANCE
    }

    pub fn create_memento(&self) -> AlgorithmMemento {
        AlgorithmMemento {
            tissues: self.tissues,
            runtime: self.runtime,
            ceilings: self.ceilings.len(),
            over_pressures: self.over_pressures.len(),
            segments: self.segments.len(),
            current_gas: self.current_gas,
        }
    }

    /// Rolls back to the checkpoint. The gradient factor anchor is kept.
    pub fn restore(&mut self, memento: &AlgorithmMemento) {
        self.tissues = memento.tissues;
        self.runtime = memento.runtime;
        self.ceilings.truncate(memento.ceilings);
        self.over_pressures.truncate(memento.over_pressures);
        self.segments.truncate(memento.segments);
        self.current_gas = memento.current_gas;
    }

    /// Appends the segment and simulates it second by second.
    ///
    /// Returns the summed tissue loading change.
    pub fn swim(&mut self, segment: Segment) -> f64 {
        let speed = self.converter.bar_per_meter(segment.speed());
        let gas = segment.gas();
        let duration = segment.duration();
        let start_depth = segment.start_depth();
        self.current_gas = gas;
        self.segments.add(segment.clone());

        let whole_seconds = duration.floor();
        let mut elapsed = 0.0;
        let mut delta = 0.0;
        while elapsed < whole_seconds {
            delta += self.load_step(&segment, elapsed, 1.0, speed, &gas);
            elapsed += 1.0;
        }
        let remainder = duration - whole_seconds;
        if remainder > 1e-9 {
            delta += self.load_step(&segment, elapsed, remainder, speed, &gas);
        }

        tracing::trace!(
            start_depth,
            end_depth = segment.end_depth(),
            duration,
            "simulated segment"
        );
        delta
    }

    fn load_step(&mut self, segment: &Segment, elapsed: f64, duration: f64, speed: f64, gas: &Gas) -> f64 {
        let load = LoadSegment {
            start_pressure: self.converter.to_bar(segment.depth_at(elapsed)),
            duration,
            speed,
        };
        let delta = self.tissues.load(&load, gas);
        self.runtime += duration;

        let depth = self.ceiling();
        self.ceilings.push(Ceiling {
            time: self.runtime,
            depth,
        });
        if self.options.collect_tissue_history {
            let ambient = self.converter.to_bar(segment.depth_at(elapsed + duration));
            self.over_pressures.push(self.tissues.over_pressures(ambient));
        }
        delta
    }

    /// Current ceiling depth (m), 0 when no stop is required.
    pub fn ceiling(&mut self) -> f64 {
        let pressure = self.gradients.ceiling(&self.tissues);
        self.converter.from_bar(pressure).max(0.0)
    }

    /// Anchors the three-tier ascent speeds at the average depth of the first `count` segments.
    pub fn mark_average_depth(&mut self, count: usize) {
        let count = count.min(self.segments.len());
        let average = segments::average_depth(&self.segments.items()[..count]);
        self.ascent_speeds = AscentSpeeds::new(self.options, average);
    }

    /// Next shallower stop depth (m) on the deco stop grid, 0 at the final ascent.
    pub fn next_stop(&self, current_stop: f64) -> f64 {
        let last_stop = self.options.last_stop_depth;
        if current_stop <= last_stop + DEPTH_TOLERANCE {
            return 0.0;
        }

        let rounded = (current_stop / DECO_STOP_DISTANCE).floor() * DECO_STOP_DISTANCE;
        let next = if (current_stop - rounded).abs() < DEPTH_TOLERANCE {
            rounded - DECO_STOP_DISTANCE
        } else {
            rounded
        };
        next.max(last_stop)
    }

    pub fn best_deco_gas(&self) -> Gas {
        let query = BestGasQuery {
            current_depth: self.current_depth(),
            current_gas: self.current_gas,
            max_deco_ppo2: self.options.max_deco_ppo2,
            oxygen_narcotic: self.options.oxygen_narcotic,
            max_end: self.options.max_end,
            stop_distance: DECO_STOP_DISTANCE,
        };
        self.gases.best_gas(&self.converter, &query)
    }

    pub fn should_add_safety_stop(&self) -> bool {
        let at_stop_depth = (self.current_depth() - self.options.last_stop_depth).abs() < DEPTH_TOLERANCE;
        if !at_stop_depth || self.is_at_surface() {
            return false;
        }
        match self.options.safety_stop {
            SafetyStop::Never => false,
            SafetyStop::Always => true,
            SafetyStop::Auto => self.segments.max_depth() >= AUTO_SAFETY_STOP_DEPTH,
        }
    }

    /// Flat segment at the current depth breathing the current gas.
    pub fn stop_segment(&self, duration: f64) -> Segment {
        let depth = self.current_depth();
        Segment::planned(depth, depth, self.current_gas, duration)
    }

    /// Ascent from the current depth to `target` with the speed of the current tier.
    pub fn ascent_segment(&self, target: f64) -> Segment {
        let depth = self.current_depth();
        let speed = self.ascent_speeds.ascent(depth);
        let distance = (depth - target).max(0.0);
        let duration = (distance * 60.0 / speed - 1e-9).ceil().max(0.0);
        Segment::planned(depth, target, self.current_gas, duration)
    }

    /// Final profile with generated segments after `user_count` merged.
    pub fn into_profile(self, user_count: usize) -> CalculatedProfile {
        let merged = self.segments.merge_flat(user_count);
        CalculatedProfile::from_profile(
            merged.into_items(),
            self.ceilings,
            &self.tissues,
            self.over_pressures,
            user_count,
        )
    }
}
