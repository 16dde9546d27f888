//! Gas consumption and reserve.
//!
//! Consumption of each segment is `duration * ambient pressure at average depth * RMV`.
//! The reserve of each tank is the gas needed for an emergency ascent from the
//! end of the bottom part, breathed with the stress RMV after a short pause to
//! solve the problem.

use crate::algorithm::{AlgorithmParams, BuhlmannAlgorithm};
use crate::depth::DepthConverter;
use crate::error::PlanError;
use crate::gases::{Gas, Gases};
use crate::options::{Options, SafetyStop};
use crate::profile::CalculatedProfile;
use crate::search::{BinaryIntervalSearch, SearchContext, SearchTarget};
use crate::segments::Segment;
use crate::tanks::Tank;

/// Upper bound (min) of the max bottom time search.
const MAX_BOTTOM_TIME: u32 = 24 * 60;

const BOTTOM_TIME_SEARCH_STEP: u32 = 10;

/// Diver and reserve settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionOptions {
    /// Respiratory minute volume (l/min).
    pub rmv: f64,
    /// RMV during an emergency (l/min).
    pub stress_rmv: f64,
    /// Minimum reserve of the first tank (bar).
    pub primary_tank_reserve: f64,
    /// Minimum reserve of all other tanks (bar).
    pub stage_tank_reserve: f64,
    /// Time (min) spent solving the problem before the emergency ascent.
    pub problem_solving_duration: f64,
}

impl Default for ConsumptionOptions {
    fn default() -> Self {
        Self {
            rmv: 20.0,
            stress_rmv: 30.0,
            primary_tank_reserve: 30.0,
            stage_tank_reserve: 20.0,
            problem_solving_duration: 1.0,
        }
    }
}

/// Gas volumes (l) waiting to be taken from tanks carrying the gas.
#[derive(Debug, Default)]
struct GasVolumes {
    items: Vec<(Gas, f64)>,
}

impl GasVolumes {
    fn add(&mut self, gas: Gas, liters: f64) {
        match self.items.iter_mut().find(|(g, _)| g.composition_equals(&gas)) {
            Some((_, total)) => *total += liters,
            None => self.items.push((gas, liters)),
        }
    }
}

fn tanks_with_gas(tanks: &[Tank], gas: &Gas) -> Vec<usize> {
    tanks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.gas().composition_equals(gas))
        .map(|(index, _)| index)
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct Consumption {
    converter: DepthConverter,
}

impl Consumption {
    pub fn new(options: &Options) -> Self {
        Self {
            converter: options.depth_converter(),
        }
    }

    /// Gas volume (l) breathed during the segment.
    pub fn segment_liters(&self, segment: &Segment, rmv: f64) -> f64 {
        let pressure = self.converter.to_bar(segment.average_depth());
        segment.duration() / 60.0 * pressure * rmv
    }

    /// The plan with a problem solving pause at its last depth followed by an ascent.
    ///
    /// Segments up to the plan's ascent are the same as in the plan, so the
    /// emergency part starts at the plan's start of ascent index.
    pub fn emergency_ascent(
        &self,
        segments: &[Segment],
        gases: &Gases,
        options: &Options,
        consumption_options: &ConsumptionOptions,
    ) -> CalculatedProfile {
        let mut emergency = segments.to_vec();
        if let Some(last) = segments.last() {
            let duration = consumption_options.problem_solving_duration.max(0.0) * 60.0;
            let mut pause = Segment::planned(last.end_depth(), last.end_depth(), last.gas(), duration);
            if let Some(tank) = last.tank() {
                pause = pause.with_tank(tank);
            }
            emergency.push(pause);
        }

        let options = Options {
            safety_stop: SafetyStop::Never,
            ..options.clone()
        };
        let params = AlgorithmParams::new(&emergency, gases, &options);
        BuhlmannAlgorithm::new().decompression(&params)
    }

    /// Fills consumed gas and reserve of all tanks, clearing previous values.
    ///
    /// `emergency_ascent` holds only the segments after the plan's start of ascent.
    pub fn consume_from_tanks(
        &self,
        plan: &[Segment],
        emergency_ascent: &[Segment],
        tanks: &mut [Tank],
        consumption_options: &ConsumptionOptions,
    ) {
        tanks.iter_mut().for_each(Tank::reset);
        if tanks.is_empty() {
            return;
        }

        self.update_reserve(emergency_ascent, tanks, consumption_options);
        self.consume(plan, tanks, consumption_options.rmv);
        tracing::debug!(tanks = tanks.len(), "consumption computed");
    }

    /// Both profiles computed for the same plan, see [`Consumption::emergency_ascent`].
    pub fn consume_profiles(
        &self,
        plan: &CalculatedProfile,
        emergency: &CalculatedProfile,
        tanks: &mut [Tank],
        consumption_options: &ConsumptionOptions,
    ) {
        if plan.has_errors() || emergency.has_errors() {
            tanks.iter_mut().for_each(Tank::reset);
            return;
        }
        let ascent_start = plan.start_ascent_index().min(emergency.segments().len());
        let ascent = &emergency.segments()[ascent_start..];
        self.consume_from_tanks(plan.segments(), ascent, tanks, consumption_options);
    }

    /// Reserve of the emergency ascent taken from the first tanks carrying its gases.
    fn update_reserve(&self, ascent: &[Segment], tanks: &mut [Tank], consumption_options: &ConsumptionOptions) {
        let mut reserved = vec![0.0; tanks.len()];
        let mut by_gas = GasVolumes::default();
        for segment in ascent {
            let liters = self.segment_liters(segment, consumption_options.stress_rmv);
            match segment.tank().filter(|index| *index < tanks.len()) {
                Some(index) => reserved[index] += liters,
                None => by_gas.add(segment.gas(), liters),
            }
        }

        for (gas, liters) in by_gas.items {
            let candidates = tanks_with_gas(tanks, &gas);
            let Some(first) = candidates.first().copied() else {
                tracing::warn!(%gas, liters, "no tank carries the emergency ascent gas");
                continue;
            };

            let mut remaining = liters;
            for index in candidates {
                let capacity = (tanks[index].volume() - reserved[index]).max(0.0);
                let taken = remaining.min(capacity);
                reserved[index] += taken;
                remaining -= taken;
            }
            if remaining > 0.0 {
                reserved[first] += remaining;
            }
        }

        for (index, tank) in tanks.iter_mut().enumerate() {
            let minimum = if index == 0 {
                consumption_options.primary_tank_reserve
            } else {
                consumption_options.stage_tank_reserve
            };
            let needed = (reserved[index] / tank.size()).ceil();
            tank.set_reserve(needed.max(minimum));
        }
    }

    /// Consumed gas of the plan. Segments with a user chosen tank breathe from it,
    /// the others use the tanks with their gas, last declared tank first.
    fn consume(&self, segments: &[Segment], tanks: &mut [Tank], rmv: f64) {
        let mut by_gas = GasVolumes::default();
        for segment in segments {
            let liters = self.segment_liters(segment, rmv);
            match segment.tank().filter(|index| *index < tanks.len()) {
                Some(index) => tanks[index].consume(liters),
                None => by_gas.add(segment.gas(), liters),
            }
        }

        for (gas, liters) in by_gas.items {
            let candidates = tanks_with_gas(tanks, &gas);
            let Some(first) = candidates.first().copied() else {
                tracing::warn!(%gas, liters, "no tank carries the breathed gas");
                continue;
            };

            let mut remaining = liters;
            for index in candidates.iter().rev() {
                let taken = remaining.min(tanks[*index].available_above_reserve());
                tanks[*index].consume(taken);
                remaining -= taken;
            }
            for index in &candidates {
                let taken = remaining.min(tanks[*index].available());
                tanks[*index].consume(taken);
                remaining -= taken;
            }
            if remaining > 0.0 {
                tanks[first].consume(remaining);
            }
        }
    }

    /// Longest duration (min) of the last plan segment for which all tanks keep their reserve.
    ///
    /// Returns 0 when even one minute runs into the reserve.
    pub fn max_bottom_time(
        &self,
        segments: &[Segment],
        gases: &Gases,
        options: &Options,
        tanks: &[Tank],
        consumption_options: &ConsumptionOptions,
    ) -> Result<u32, PlanError> {
        let Some((last, leading)) = segments.split_last() else {
            return Ok(0);
        };

        let mut target = BottomTimeSearch {
            consumption: self,
            leading,
            last,
            gases,
            options,
            tanks: tanks.to_vec(),
            consumption_options,
            has_reserve: false,
        };

        target.do_work(1);
        if !target.meets_condition() {
            return Ok(0);
        }

        let context = SearchContext {
            initial_value: 1,
            max_value: MAX_BOTTOM_TIME,
            estimation_step: BOTTOM_TIME_SEARCH_STEP,
        };
        let found = BinaryIntervalSearch::search(&context, &mut target)?;
        tracing::debug!(minutes = found, "max bottom time found");
        Ok(found)
    }
}

/// Bottom time probe: the condition holds while all tanks keep their reserve.
struct BottomTimeSearch<'a> {
    consumption: &'a Consumption,
    leading: &'a [Segment],
    last: &'a Segment,
    gases: &'a Gases,
    options: &'a Options,
    tanks: Vec<Tank>,
    consumption_options: &'a ConsumptionOptions,
    has_reserve: bool,
}

impl BottomTimeSearch<'_> {
    fn evaluate(&mut self, minutes: u32) -> Result<bool, PlanError> {
        let mut segments = self.leading.to_vec();
        segments.push(self.last.with_duration(f64::from(minutes) * 60.0)?);

        let params = AlgorithmParams::new(&segments, self.gases, self.options);
        let plan = BuhlmannAlgorithm::new().decompression(&params);
        if plan.has_errors() {
            return Ok(false);
        }
        let emergency =
            self.consumption
                .emergency_ascent(&segments, self.gases, self.options, self.consumption_options);
        self.consumption
            .consume_profiles(&plan, &emergency, &mut self.tanks, self.consumption_options);
        Ok(self.tanks.iter().all(Tank::has_reserve))
    }
}

impl SearchTarget for BottomTimeSearch<'_> {
    fn do_work(&mut self, value: u32) {
        self.has_reserve = self.evaluate(value).unwrap_or(false);
    }

    fn meets_condition(&mut self) -> bool {
        self.has_reserve
    }
}
