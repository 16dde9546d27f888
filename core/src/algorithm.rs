//! Bühlmann ZHL-16C decompression planner.
//!
//! Simulates the user segments, then ascends stop by stop: switch to the best
//! deco gas, hold a deco stop found by binary search, add the safety stop and
//! ascend to the next stop until the surface is reached.

use crate::context::{AlgorithmContext, AlgorithmMemento};
use crate::events::Event;
use crate::gases::{Gas, Gases, StandardGases};
use crate::options::{Options, SAFETY_STOP_DURATION};
use crate::profile::CalculatedProfile;
use crate::search::{BinaryIntervalSearch, SearchContext, SearchTarget};
use crate::segments::{Segment, Segments};
use crate::tissues::{LoadSegment, Tissues};

/// Upper bound of all searches (s).
const ONE_DAY: u32 = 24 * 60 * 60;

const DECO_STOP_SEARCH_STEP: u32 = 20 * 60;
const NO_DECO_SEARCH_STEP: u32 = 10 * 60;

/// Inputs of one decompression computation.
#[derive(Debug, Clone)]
pub struct AlgorithmParams<'a> {
    pub segments: &'a [Segment],
    pub gases: &'a Gases,
    pub options: &'a Options,
    /// Tissues at the end of a previous dive.
    pub previous_tissues: Option<Tissues>,
    /// Surface interval after the previous dive (s).
    pub surface_interval: f64,
}

impl<'a> AlgorithmParams<'a> {
    pub fn new(segments: &'a [Segment], gases: &'a Gases, options: &'a Options) -> Self {
        Self {
            segments,
            gases,
            options,
            previous_tissues: None,
            surface_interval: 0.0,
        }
    }

    /// Starts from the tissues of a previous dive after spending `surface_interval` seconds on air.
    pub fn with_previous_dive(mut self, tissues: Tissues, surface_interval: f64) -> Self {
        self.previous_tissues = Some(tissues);
        self.surface_interval = surface_interval.max(0.0);
        self
    }

    fn start_tissues(&self) -> Tissues {
        let surface = self.options.depth_converter().surface_pressure();
        match self.previous_tissues {
            Some(mut tissues) => {
                let interval = LoadSegment::flat(surface, self.surface_interval);
                tissues.load(&interval, &StandardGases::AIR);
                tissues
            }
            None => Tissues::create(surface),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BuhlmannAlgorithm;

impl BuhlmannAlgorithm {
    pub fn new() -> Self {
        Self
    }

    /// Extends the user segments by the ascent to the surface.
    ///
    /// Invalid plans are returned with error events and without ceilings.
    pub fn decompression(&self, params: &AlgorithmParams) -> CalculatedProfile {
        tracing::debug!(
            segments = params.segments.len(),
            gases = params.gases.len(),
            "computing decompression"
        );
        let errors = validate(params.segments, params.gases, params.options);
        if !errors.is_empty() {
            tracing::warn!(count = errors.len(), "plan is not valid");
            return CalculatedProfile::from_errors(params.segments.to_vec(), errors);
        }

        let mut user_segments = Segments::from_slice(params.segments);
        user_segments.fix_start_depths();
        let user_count = user_segments.len();
        let start_gas = user_segments.items()[0].gas();

        let mut context = AlgorithmContext::new(params.options, params.gases, params.start_tissues(), start_gas);
        for segment in user_segments.into_items() {
            context.swim(segment);
        }
        context.mark_average_depth(user_count);

        let mut next_stop = context.next_stop(context.current_depth());
        while !context.is_at_surface() {
            try_switch_gases(&mut context);
            stay_at_deco_stop(&mut context, next_stop);
            if context.should_add_safety_stop() {
                let stop = context.stop_segment(SAFETY_STOP_DURATION);
                context.swim(stop);
            }

            let ascent = context.ascent_segment(next_stop);
            context.swim(ascent);
            next_stop = context.next_stop(next_stop);
        }

        tracing::debug!(
            runtime = context.runtime(),
            ceilings = context.ceilings().len(),
            "decompression computed"
        );
        context.into_profile(user_count)
    }

    /// No decompression limit (min) for a square dive at `depth` including the descent.
    ///
    /// Returns 0 when the gas isn't breathable at the depth and infinity when
    /// the tissues never require a stop.
    pub fn no_deco_limit(&self, depth: f64, gas: Gas, options: &Options) -> f64 {
        let converter = options.depth_converter();
        if depth > gas.mod_depth(&converter, options.max_ppo2) + 1e-9 || depth < gas.ceiling_depth(&converter) {
            tracing::warn!(depth, gas = %gas, "gas isn't breathable at no deco limit depth");
            return 0.0;
        }

        let duration = (depth / options.descent_speed * 60.0).ceil();
        let descent = Segment::planned(0.0, depth, gas, duration);
        let gases = Gases::from_slice(&[gas]);
        self.no_deco_limit_multi_level(&[descent], &gases, options)
    }

    /// No decompression limit (min) of a multi-level dive, staying at the last depth with the last gas.
    ///
    /// The limit is the runtime in whole minutes before the first ceiling appears.
    pub fn no_deco_limit_multi_level(&self, segments: &[Segment], gases: &Gases, options: &Options) -> f64 {
        let errors = validate(segments, gases, options);
        if !errors.is_empty() {
            tracing::warn!(count = errors.len(), "no deco limit plan is not valid");
            return 0.0;
        }

        let surface = options.depth_converter().surface_pressure();
        let mut context = AlgorithmContext::new(options, gases, Tissues::create(surface), segments[0].gas());
        let mut user_segments = Segments::from_slice(segments);
        user_segments.fix_start_depths();
        for segment in user_segments.into_items() {
            context.swim(segment);
        }

        if let Some(ceiling) = context.ceilings().iter().find(|c| !c.not_required()) {
            return to_no_deco_limit(ceiling.time);
        }

        let depth = context.current_depth();
        let gas = context.current_gas();
        let pressure = context.converter().to_bar(depth);
        let saturated = context.tissues().saturated(pressure, &gas);
        let mut gradients = *context.gradients();
        if gradients.ceiling(&saturated) <= surface {
            return f64::INFINITY;
        }

        let bottom_runtime = context.runtime();
        let memento = context.create_memento();
        let search_context = SearchContext {
            initial_value: 0,
            max_value: ONE_DAY,
            estimation_step: NO_DECO_SEARCH_STEP,
        };
        let mut target = NoDecoSearch {
            context: &mut context,
            memento,
        };
        let stay = match BinaryIntervalSearch::search(&search_context, &mut target) {
            Ok(stay) => stay,
            Err(err) => {
                tracing::warn!(%err, "no deco limit search failed");
                return 0.0;
            }
        };

        to_no_deco_limit(bottom_runtime + f64::from(stay) + 1.0)
    }
}

/// Whole minutes before the ceiling appears at `time` seconds.
fn to_no_deco_limit(time: f64) -> f64 {
    ((time / 60.0).floor() - 1.0).max(0.0)
}

/// Problems making the plan impossible to compute, as error events.
pub fn validate(segments: &[Segment], gases: &Gases, options: &Options) -> Vec<Event> {
    let mut errors = Vec::new();
    if segments.is_empty() {
        errors.push(Event::error("No segment defined"));
    }
    if gases.is_empty() {
        errors.push(Event::error("No gas defined"));
    }
    for (index, segment) in segments.iter().enumerate() {
        if !gases.is_registered(&segment.gas()) {
            errors.push(Event::error(format!(
                "Gas {} used in segment {} is not registered",
                segment.gas(),
                index + 1
            )));
        }
    }
    for problem in options.problems() {
        errors.push(Event::error(problem));
    }
    errors
}

fn try_switch_gases(context: &mut AlgorithmContext) {
    let current = context.current_gas();
    let best = context.best_deco_gas();
    if best.composition_equals(&current) {
        return;
    }

    tracing::trace!(depth = context.current_depth(), gas = %best, "switching gas");
    context.set_current_gas(best);
    let duration = context.options().gas_switch_duration * 60.0;
    if duration > 0.0 {
        let switch = context.stop_segment(duration);
        context.swim(switch);
    }
}

fn needs_deco_stop(context: &mut AlgorithmContext, next_stop: f64) -> bool {
    let memento = context.create_memento();
    let ascent = context.ascent_segment(next_stop);
    context.swim(ascent);
    let needed = context.ceiling() > next_stop;
    context.restore(&memento);
    needed
}

fn stay_at_deco_stop(context: &mut AlgorithmContext, next_stop: f64) {
    if !needs_deco_stop(context, next_stop) {
        return;
    }

    let memento = context.create_memento();
    let search_context = SearchContext {
        initial_value: 0,
        max_value: ONE_DAY,
        estimation_step: DECO_STOP_SEARCH_STEP,
    };
    let mut target = DecoStopSearch {
        context: &mut *context,
        memento,
        next_stop,
    };
    let found = match BinaryIntervalSearch::search(&search_context, &mut target) {
        Ok(found) => found,
        Err(err) => {
            tracing::warn!(%err, "deco stop search failed");
            ONE_DAY
        }
    };
    context.restore(&memento);

    let mut duration = f64::from(found) + 1.0;
    if context.options().round_stops_to_minutes {
        duration = (duration / 60.0).ceil() * 60.0;
    }
    tracing::trace!(depth = context.current_depth(), duration, "deco stop");
    let stop = context.stop_segment(duration);
    context.swim(stop);
}

/// Stop duration probe: the condition holds while the stop is still too short.
struct DecoStopSearch<'c, 'a> {
    context: &'c mut AlgorithmContext<'a>,
    memento: AlgorithmMemento,
    next_stop: f64,
}

impl SearchTarget for DecoStopSearch<'_, '_> {
    fn do_work(&mut self, value: u32) {
        self.context.restore(&self.memento);
        let stop = self.context.stop_segment(f64::from(value));
        self.context.swim(stop);
        let ascent = self.context.ascent_segment(self.next_stop);
        self.context.swim(ascent);
    }

    fn meets_condition(&mut self) -> bool {
        self.context.ceiling() > self.next_stop
    }
}

/// Bottom time probe: the condition holds while no ceiling exists.
struct NoDecoSearch<'c, 'a> {
    context: &'c mut AlgorithmContext<'a>,
    memento: AlgorithmMemento,
}

impl SearchTarget for NoDecoSearch<'_, '_> {
    fn do_work(&mut self, value: u32) {
        self.context.restore(&self.memento);
        let stay = self.context.stop_segment(f64::from(value));
        self.context.swim(stay);
    }

    fn meets_condition(&mut self) -> bool {
        self.context.ceiling() <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventOptions, EventType, ProfileEvents};
    use crate::notation::format_profile;
    use crate::options::SafetyStop;

    fn square_dive(depth: f64, minutes: f64, gas: Gas) -> Vec<Segment> {
        let descent = (depth / 18.0 * 60.0).ceil();
        vec![
            Segment::new(0.0, depth, gas, descent).unwrap(),
            Segment::flat(depth, gas, minutes * 60.0 - descent).unwrap(),
        ]
    }

    fn calculate(segments: &[Segment], gases: &Gases, options: &Options) -> CalculatedProfile {
        BuhlmannAlgorithm::new().decompression(&AlgorithmParams::new(segments, gases, options))
    }

    #[test]
    fn test_shallow_dive_with_safety_stop() {
        let air = StandardGases::AIR;
        let options = Options {
            safety_stop: SafetyStop::Always,
            ..Options::default().with_uniform_speeds(10.0, 20.0)
        };
        let gases = Gases::from_slice(&[air]);
        let segments = [
            Segment::new(0.0, 10.0, air, 30.0).unwrap(),
            Segment::flat(10.0, air, 2370.0).unwrap(),
        ];
        let profile = calculate(&segments, &gases, &options);

        assert!(!profile.has_errors());
        assert_eq!(
            format_profile(profile.segments()),
            "0,10,30; 10,10,2370; 10,3,42; 3,3,180; 3,0,18;"
        );
        assert_eq!(profile.start_ascent_index(), 2);
        assert_eq!(profile.ceilings().len(), 2640);
        assert!(profile.no_deco_end().is_none());
    }

    #[test]
    fn test_auto_safety_stop_skipped_for_shallow_dive() {
        let air = StandardGases::AIR;
        let gases = Gases::from_slice(&[air]);
        let profile = calculate(&square_dive(8.0, 20.0, air), &gases, &Options::default());

        let generated = &profile.segments()[profile.start_ascent_index()..];
        assert!(!generated.is_empty());
        assert!(generated.iter().all(|s| !s.is_flat()));
        assert_eq!(profile.segments().last().unwrap().end_depth(), 0.0);
    }

    #[test]
    fn test_deco_dive_switches_to_deco_gas() {
        let air = StandardGases::AIR;
        let ean50 = StandardGases::EAN50;
        let options = Options::default();
        let gases = Gases::from_slice(&[air, ean50]);
        let profile = calculate(&square_dive(40.0, 25.0, air), &gases, &options);

        assert!(!profile.has_errors());
        assert!(profile.no_deco_end().is_some());
        assert_eq!(profile.tissues().len(), 16);
        assert_eq!(profile.segments().last().unwrap().end_depth(), 0.0);

        let generated = &profile.segments()[profile.start_ascent_index()..];
        let switch = generated
            .iter()
            .find(|s| s.gas().composition_equals(&ean50))
            .expect("switch to EAN50");
        assert!(switch.is_flat());
        assert_eq!(switch.start_depth(), 21.0);
        assert!(switch.duration() >= 60.0);

        for stop in generated.iter().filter(|s| s.is_flat()) {
            assert_eq!(stop.duration() % 60.0, 0.0, "stop at {} m", stop.start_depth());
        }

        let event_options = EventOptions::new(profile.start_ascent_index(), options);
        let events = ProfileEvents::generate(profile.segments(), profile.ceilings(), &event_options);
        let count = |event_type: EventType| events.iter().filter(|e| e.event_type == event_type).count();
        assert_eq!(count(EventType::BrokenCeiling), 0);
        assert_eq!(count(EventType::HighAscentSpeed), 0);
        assert_eq!(count(EventType::GasSwitch), 1);
        assert_eq!(count(EventType::NoDecoEnd), 1);
    }

    fn assert_ceilings_respected(profile: &CalculatedProfile) {
        let mut elapsed = 0.0;
        let mut cursor = 0;
        let ceilings = profile.ceilings();
        for (index, segment) in profile.segments().iter().enumerate() {
            let end = elapsed + segment.duration();
            while cursor < ceilings.len() && ceilings[cursor].time <= end + 1e-9 {
                let depth = segment.depth_at(ceilings[cursor].time - elapsed);
                if index >= profile.start_ascent_index() {
                    assert!(
                        depth + 0.1 >= ceilings[cursor].depth,
                        "at {} s depth {depth} above ceiling {}",
                        ceilings[cursor].time,
                        ceilings[cursor].depth
                    );
                }
                cursor += 1;
            }
            elapsed = end;
        }
    }

    #[test]
    fn test_ceiling_is_respected_during_ascent() {
        let air = StandardGases::AIR;
        let gases = Gases::from_slice(&[air]);
        let profile = calculate(&square_dive(30.0, 40.0, air), &gases, &Options::default());
        assert_ceilings_respected(&profile);
    }

    #[test]
    fn test_stops_rounded_to_seconds() {
        let air = StandardGases::AIR;
        let gases = Gases::from_slice(&[air]);
        let options = Options {
            round_stops_to_minutes: false,
            ..Options::default()
        };
        let profile = calculate(&square_dive(40.0, 30.0, air), &gases, &options);
        assert!(!profile.has_errors());
        assert_eq!(profile.segments().last().unwrap().end_depth(), 0.0);

        let generated = &profile.segments()[profile.start_ascent_index()..];
        let stops: Vec<&Segment> = generated.iter().filter(|s| s.is_flat()).collect();
        assert!(stops.len() > 1, "expected deco stops, got {}", format_profile(generated));
        assert!(
            stops.iter().any(|s| s.duration() % 60.0 != 0.0),
            "all stops whole minutes: {}",
            format_profile(generated)
        );
        assert!(stops.iter().all(|s| s.duration().fract() == 0.0));
        assert_ceilings_respected(&profile);
    }

    #[test]
    fn test_same_inputs_same_profile() {
        let air = StandardGases::AIR;
        let gases = Gases::from_slice(&[air, StandardGases::EAN50]);
        let segments = square_dive(35.0, 30.0, air);
        let first = calculate(&segments, &gases, &Options::default());
        let second = calculate(&segments, &gases, &Options::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_repetitive_dive_needs_more_deco() {
        let air = StandardGases::AIR;
        let gases = Gases::from_slice(&[air]);
        let options = Options::default();
        let segments = square_dive(30.0, 30.0, air);
        let first = calculate(&segments, &gases, &options);
        let tissues = first.final_tissues().unwrap();

        let params = AlgorithmParams::new(&segments, &gases, &options).with_previous_dive(tissues, 30.0 * 60.0);
        let second = BuhlmannAlgorithm::new().decompression(&params);

        assert!(
            second.total_duration() >= first.total_duration(),
            "repetitive {} s, first {} s",
            second.total_duration(),
            first.total_duration()
        );
        let first_end = first.no_deco_end().unwrap();
        let second_end = second.no_deco_end().unwrap();
        assert!(second_end < first_end);
    }

    #[test]
    fn test_invalid_plans_are_not_simulated() {
        let air = StandardGases::AIR;
        let options = Options::default();
        let segments = square_dive(20.0, 20.0, air);

        let profile = calculate(&segments, &Gases::new(), &options);
        assert!(profile.has_errors());
        assert!(profile.ceilings().is_empty());
        assert!(profile.tissues().is_empty());
        assert_eq!(profile.segments(), segments.as_slice());

        let profile = calculate(&[], &Gases::from_slice(&[air]), &options);
        assert_eq!(profile.errors().len(), 1);
        assert_eq!(profile.errors()[0].event_type, EventType::Error);

        let unregistered = Gases::from_slice(&[StandardGases::EAN32]);
        let profile = calculate(&segments, &unregistered, &options);
        assert_eq!(profile.errors().len(), 2);

        let bad_factors = Options {
            gf_low: 0.9,
            gf_high: 0.3,
            ..Options::default()
        };
        let profile = calculate(&segments, &Gases::from_slice(&[air]), &bad_factors);
        assert!(profile.has_errors());
    }

    #[test]
    fn test_no_deco_limit_at_surface_is_infinite() {
        let options = Options {
            gf_low: 1.0,
            gf_high: 1.0,
            ..Options::default()
        };
        let ndl = BuhlmannAlgorithm::new().no_deco_limit(0.0, StandardGases::AIR, &options);
        assert_eq!(ndl, f64::INFINITY);
    }

    #[test]
    fn test_no_deco_limit_below_mod_is_zero() {
        let ndl = BuhlmannAlgorithm::new().no_deco_limit(60.0, StandardGases::AIR, &Options::default());
        assert_eq!(ndl, 0.0);
    }

    #[test]
    fn test_no_deco_limit_shorter_when_deeper() {
        let algorithm = BuhlmannAlgorithm::new();
        let options = Options::default();
        let ndl_18 = algorithm.no_deco_limit(18.0, StandardGases::AIR, &options);
        let ndl_30 = algorithm.no_deco_limit(30.0, StandardGases::AIR, &options);

        assert!(ndl_30 >= 8.0 && ndl_30 <= 25.0, "30 m: {ndl_30} min");
        assert!(ndl_18 > ndl_30, "18 m: {ndl_18} min, 30 m: {ndl_30} min");
        assert!(ndl_18.is_finite());
        assert_eq!(ndl_30, ndl_30.floor());
    }

    #[test]
    fn test_no_deco_limit_longer_with_nitrox() {
        let algorithm = BuhlmannAlgorithm::new();
        let options = Options::default();
        let air = algorithm.no_deco_limit(25.0, StandardGases::AIR, &options);
        let nitrox = algorithm.no_deco_limit(25.0, StandardGases::EAN32, &options);
        assert!(nitrox > air, "EAN32 {nitrox} min, air {air} min");
    }

    #[test]
    fn test_multi_level_matches_square_dive() {
        let algorithm = BuhlmannAlgorithm::new();
        let options = Options::default();
        let air = StandardGases::AIR;
        let descent = [Segment::new(0.0, 18.0, air, 60.0).unwrap()];
        let multi = algorithm.no_deco_limit_multi_level(&descent, &Gases::from_slice(&[air]), &options);
        let square = algorithm.no_deco_limit(18.0, air, &options);
        assert_eq!(multi, square);
    }

    #[test]
    fn test_multi_level_with_ceiling_in_plan() {
        let algorithm = BuhlmannAlgorithm::new();
        let air = StandardGases::AIR;
        let segments = square_dive(40.0, 60.0, air);
        let ndl = algorithm.no_deco_limit_multi_level(&segments, &Gases::from_slice(&[air]), &Options::default());
        assert!(ndl > 0.0 && ndl < 60.0, "got {ndl}");
    }

    #[test]
    fn test_validate_unregistered_gas_message() {
        let segments = [Segment::flat(10.0, StandardGases::EAN32, 60.0).unwrap()];
        let errors = validate(&segments, &Gases::from_slice(&[StandardGases::AIR]), &Options::default());
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message.as_deref(),
            Some("Gas EAN32 used in segment 1 is not registered")
        );
    }
}
