//! Profile events.
//!
//! One pass over the final segments checks speeds, gas switches, ppO2, END
//! and gas density. A second pass over the ceiling samples finds broken
//! ceilings of the user segments and the end of the no-deco time.

use crate::gases::{Gas, GasMixtures};
use crate::options::{AscentSpeeds, Options, SAFETY_STOP_DURATION};
use crate::profile::Ceiling;
use crate::segments::{self, Segment};

const TOLERANCE: f64 = 1e-6;

/// Max gas density (g/l) recommended for breathing.
pub const DEFAULT_MAX_DENSITY: f64 = 5.5;

/// Continuous time (s) on high ppO2 after which an air break is expected.
const AIR_BREAK_INTERVAL: f64 = 20.0 * 60.0;

/// Time (s) on a low ppO2 gas needed to count as a break.
const AIR_BREAK_DURATION: f64 = 5.0 * 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// The plan can't be computed.
    Error,
    GasSwitch,
    /// First moment a deco stop is required.
    NoDecoEnd,
    LowPpO2,
    HighPpO2,
    HighAscentSpeed,
    HighDescentSpeed,
    /// A user segment is shallower than the ceiling.
    BrokenCeiling,
    MaxEndExceeded,
    /// Isobaric counter diffusion risk.
    SwitchToHigherN2,
    HighGasDensity,
    SafetyStop,
    /// A user segment surfaces while the plan continues deeper.
    MinDepth,
    MaxDepth,
    MissingAirBreak,
}

/// Something worth noting at one moment of the profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Runtime (s).
    pub time: f64,
    /// Depth (m).
    pub depth: f64,
    pub event_type: EventType,
    pub message: Option<String>,
    /// Gas involved, e.g. the new gas of a gas switch.
    pub gas: Option<Gas>,
}

impl Event {
    pub fn new(time: f64, depth: f64, event_type: EventType) -> Self {
        Self {
            time,
            depth,
            event_type,
            message: None,
            gas: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(0.0, 0.0, EventType::Error).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_gas(mut self, gas: Gas) -> Self {
        self.gas = Some(gas);
        self
    }
}

/// Options of the events pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EventOptions {
    /// Index of the first segment added by the planner.
    pub start_ascent_index: usize,
    /// Max gas density (g/l).
    pub max_density: f64,
    pub options: Options,
}

impl EventOptions {
    pub fn new(start_ascent_index: usize, options: Options) -> Self {
        Self {
            start_ascent_index,
            max_density: DEFAULT_MAX_DENSITY,
            options,
        }
    }
}

impl Default for EventOptions {
    fn default() -> Self {
        Self::new(0, Options::default())
    }
}

/// Limits crossed by the previous segment, to fire only once per violation.
#[derive(Debug, Default)]
struct Fixed {
    end: bool,
    density: bool,
}

pub struct ProfileEvents;

impl ProfileEvents {
    /// Events of the profile ordered by time.
    pub fn generate(segments: &[Segment], ceilings: &[Ceiling], event_options: &EventOptions) -> Vec<Event> {
        let mut generator = Generator::new(segments, event_options);
        generator.segment_events();
        generator.broken_ceilings(ceilings);
        generator.no_deco_end(ceilings);
        generator.max_depth();
        generator.min_depth();
        generator.missing_air_break();

        let mut events = generator.events;
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        tracing::debug!(count = events.len(), "profile events generated");
        events
    }
}

struct Generator<'a> {
    segments: &'a [Segment],
    options: &'a Options,
    start_ascent_index: usize,
    max_density: f64,
    speeds: AscentSpeeds,
    events: Vec<Event>,
}

impl<'a> Generator<'a> {
    fn new(segments: &'a [Segment], event_options: &'a EventOptions) -> Self {
        let start_ascent_index = event_options.start_ascent_index.min(segments.len());
        let average = segments::average_depth(&segments[..start_ascent_index]);
        Self {
            segments,
            options: &event_options.options,
            start_ascent_index,
            max_density: event_options.max_density,
            speeds: AscentSpeeds::new(&event_options.options, average),
            events: Vec::new(),
        }
    }

    fn segment_events(&mut self) {
        let converter = self.options.depth_converter();
        let mut fixed = Fixed::default();
        let mut elapsed = 0.0;
        let mut previous: Option<&Segment> = None;

        for (index, segment) in self.segments.iter().enumerate() {
            let switched = previous.is_some_and(|p| {
                !p.gas().composition_equals(&segment.gas()) || p.tank() != segment.tank()
            });
            let gas = segment.gas();

            self.ascent_speed(segment, elapsed);
            self.descent_speed(segment, elapsed);

            if switched {
                self.push(Event::new(elapsed, segment.start_depth(), EventType::GasSwitch).with_gas(gas));
            }

            if segment.is_descent() || (switched && index < self.start_ascent_index) {
                let limit = if index < self.start_ascent_index {
                    self.options.max_ppo2
                } else {
                    self.options.max_deco_ppo2
                };
                let mod_depth = gas.mod_depth(&converter, limit);
                if let Some((time, depth)) = crossing(segment, elapsed, mod_depth) {
                    self.push(Event::new(time, depth, EventType::HighPpO2).with_gas(gas));
                }
            }

            self.low_ppo2(segment, elapsed, index == 0 || switched, gas.ceiling_depth(&converter));

            if let Some(previous) = previous.filter(|_| switched) {
                self.counter_diffusion(previous, segment, elapsed);
            }

            let mnd = gas.mnd_depth(&converter, self.options.max_end, self.options.oxygen_narcotic);
            if let Some((time, depth)) = self.limit_crossing(segment, elapsed, mnd, &mut fixed.end) {
                self.push(Event::new(time, depth, EventType::MaxEndExceeded).with_gas(gas));
            }

            let density_depth = gas.density_depth(&converter, self.max_density);
            if let Some((time, depth)) = self.limit_crossing(segment, elapsed, density_depth, &mut fixed.density) {
                self.push(Event::new(time, depth, EventType::HighGasDensity).with_gas(gas));
            }

            if self.is_safety_stop(index, segment) {
                self.push(Event::new(elapsed, segment.start_depth(), EventType::SafetyStop));
            }

            elapsed += segment.duration();
            previous = Some(segment);
        }
    }

    fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// The allowed speed is the tier at the leg's start depth, the same tier the
    /// planner uses for its stop to stop ascents. A long leg crossing into a
    /// slower tier is judged by where it starts.
    fn ascent_speed(&mut self, segment: &Segment, elapsed: f64) {
        if !segment.is_ascent() {
            return;
        }
        let speed = -segment.speed() * 60.0;
        let allowed = self.speeds.ascent(segment.start_depth());
        if speed > allowed + TOLERANCE {
            let event = Event::new(elapsed, segment.start_depth(), EventType::HighAscentSpeed)
                .with_message(format!("{speed:.1} m/min, allowed {allowed:.1} m/min"));
            self.push(event);
        }
    }

    fn descent_speed(&mut self, segment: &Segment, elapsed: f64) {
        if !segment.is_descent() {
            return;
        }
        let speed = segment.speed() * 60.0;
        let allowed = self.options.descent_speed;
        if speed > allowed + TOLERANCE {
            let event = Event::new(elapsed, segment.start_depth(), EventType::HighDescentSpeed)
                .with_message(format!("{speed:.1} m/min, allowed {allowed:.1} m/min"));
            self.push(event);
        }
    }

    /// Hypoxic gas at the start of the dive, after a switch, or when ascending above its ceiling.
    fn low_ppo2(&mut self, segment: &Segment, elapsed: f64, gas_started: bool, ceiling: f64) {
        let gas = segment.gas();
        if gas_started && segment.start_depth() + TOLERANCE < ceiling {
            self.push(Event::new(elapsed, segment.start_depth(), EventType::LowPpO2).with_gas(gas));
            return;
        }

        if segment.is_ascent() && segment.start_depth() >= ceiling && segment.end_depth() + TOLERANCE < ceiling {
            let time = elapsed + segment.time_at_depth(ceiling);
            self.push(Event::new(time, ceiling, EventType::LowPpO2).with_gas(gas));
        }
    }

    /// Switch from a helium mix to a gas with disproportionally more nitrogen.
    fn counter_diffusion(&mut self, previous: &Segment, segment: &Segment, elapsed: f64) {
        let (from, to) = (previous.gas(), segment.gas());
        if from.fhe() <= 0.0 || to.fhe() >= from.fhe() {
            return;
        }
        let delta_n2 = to.fn2() - from.fn2();
        let delta_he = to.fhe() - from.fhe();
        if delta_n2 * 5.0 > -delta_he {
            self.push(Event::new(elapsed, segment.start_depth(), EventType::SwitchToHigherN2).with_gas(to));
        }
    }

    /// Crossing of a depth limit reported once until the segment ends within the limit again.
    fn limit_crossing(&self, segment: &Segment, elapsed: f64, limit: f64, fixed: &mut bool) -> Option<(f64, f64)> {
        let found = if *fixed {
            None
        } else {
            crossing(segment, elapsed, limit)
        };
        if found.is_some() {
            *fixed = true;
        }
        if segment.end_depth() <= limit + TOLERANCE {
            *fixed = false;
        }
        found
    }

    fn is_safety_stop(&self, index: usize, segment: &Segment) -> bool {
        index + 2 == self.segments.len()
            && index >= self.start_ascent_index
            && segment.is_flat()
            && segment.start_depth() > 0.0
            && segment.duration() + TOLERANCE >= SAFETY_STOP_DURATION
    }

    fn broken_ceilings(&mut self, ceilings: &[Ceiling]) {
        let mut cursor = 0;
        let mut elapsed = 0.0;
        let mut fixed = false;

        for segment in &self.segments[..self.start_ascent_index] {
            let end_time = elapsed + segment.duration();
            while let Some(ceiling) = ceilings.get(cursor).filter(|c| c.time <= end_time + TOLERANCE) {
                let depth = segment.depth_at(ceiling.time - elapsed);
                if depth + TOLERANCE < ceiling.depth {
                    if !fixed {
                        let event = Event::new(ceiling.time, depth, EventType::BrokenCeiling)
                            .with_message(format!("ceiling at {:.1} m", ceiling.depth));
                        self.events.push(event);
                        fixed = true;
                    }
                } else {
                    fixed = false;
                }
                cursor += 1;
            }
            elapsed = end_time;
        }
    }

    fn no_deco_end(&mut self, ceilings: &[Ceiling]) {
        if let Some(ceiling) = ceilings.iter().find(|c| !c.not_required()) {
            let depth = depth_at_time(self.segments, ceiling.time);
            self.push(Event::new(ceiling.time, depth, EventType::NoDecoEnd));
        }
    }

    fn max_depth(&mut self) {
        let max_depth = self.segments.iter().map(Segment::max_depth).fold(0.0, f64::max);
        if max_depth <= 0.0 {
            return;
        }

        let mut elapsed = 0.0;
        for segment in self.segments {
            if segment.max_depth() + TOLERANCE >= max_depth {
                let time = if segment.start_depth() + TOLERANCE >= max_depth {
                    elapsed
                } else {
                    elapsed + segment.duration()
                };
                self.push(Event::new(time, max_depth, EventType::MaxDepth));
                return;
            }
            elapsed += segment.duration();
        }
    }

    fn min_depth(&mut self) {
        let mut elapsed = 0.0;
        let mut found = Vec::new();
        for (index, segment) in self.segments[..self.start_ascent_index].iter().enumerate() {
            elapsed += segment.duration();
            let surfaced = segment.end_depth() <= TOLERANCE && segment.max_depth() > TOLERANCE;
            let descends_later = self.segments[index + 1..].iter().any(Segment::is_descent);
            if surfaced && descends_later {
                found.push(Event::new(elapsed, 0.0, EventType::MinDepth));
            }
        }
        self.events.extend(found);
    }

    fn missing_air_break(&mut self) {
        let converter = self.options.depth_converter();
        let mut elapsed = 0.0;
        let mut high_time = 0.0;
        let mut break_time = 0.0;
        let mut reported = false;
        let mut found = Vec::new();

        for segment in self.segments {
            let pressure = converter.to_bar(segment.average_depth());
            let ppo2 = GasMixtures::partial_pressure(pressure, segment.gas().fo2());
            if ppo2 > self.options.max_ppo2 + TOLERANCE {
                let before = high_time;
                high_time += segment.duration();
                break_time = 0.0;
                if !reported && high_time > AIR_BREAK_INTERVAL {
                    let time = elapsed + (AIR_BREAK_INTERVAL - before);
                    let depth = segment.depth_at(time - elapsed);
                    found.push(Event::new(time, depth, EventType::MissingAirBreak).with_gas(segment.gas()));
                    reported = true;
                }
            } else {
                break_time += segment.duration();
                if break_time + TOLERANCE >= AIR_BREAK_DURATION {
                    high_time = 0.0;
                    reported = false;
                }
            }
            elapsed += segment.duration();
        }
        self.events.extend(found);
    }
}

/// Moment (runtime s, depth m) at which the segment gets deeper than `limit`.
fn crossing(segment: &Segment, elapsed: f64, limit: f64) -> Option<(f64, f64)> {
    if segment.max_depth() <= limit + TOLERANCE {
        return None;
    }
    if segment.start_depth() > limit + TOLERANCE {
        return Some((elapsed, segment.start_depth()));
    }
    Some((elapsed + segment.time_at_depth(limit), limit))
}

/// Depth (m) of the profile at the given runtime (s).
fn depth_at_time(segments: &[Segment], time: f64) -> f64 {
    let mut elapsed = 0.0;
    for segment in segments {
        if time <= elapsed + segment.duration() {
            return segment.depth_at(time - elapsed);
        }
        elapsed += segment.duration();
    }
    segments.last().map(Segment::end_depth).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gases::StandardGases;

    fn segment(start: f64, end: f64, gas: Gas, duration: f64) -> Segment {
        Segment::new(start, end, gas, duration).unwrap()
    }

    fn count(events: &[Event], event_type: EventType) -> usize {
        events.iter().filter(|e| e.event_type == event_type).count()
    }

    fn generate(segments: &[Segment], start_ascent_index: usize) -> Vec<Event> {
        let options = EventOptions::new(start_ascent_index, Options::default());
        ProfileEvents::generate(segments, &[], &options)
    }

    #[test]
    fn test_high_gas_density_fires_once() {
        let air = StandardGases::AIR;
        let segments = [
            segment(0.0, 40.0, air, 160.0),
            segment(40.0, 40.0, air, 600.0),
            segment(40.0, 40.0, air, 300.0),
        ];
        let events = generate(&segments, 3);
        let density: Vec<_> = events
            .iter()
            .filter(|e| e.event_type == EventType::HighGasDensity)
            .collect();

        assert_eq!(density.len(), 1);
        let converter = Options::default().depth_converter();
        let expected_depth = air.density_depth(&converter, DEFAULT_MAX_DENSITY);
        assert!((density[0].depth - expected_depth).abs() < 1e-9);
        let expected_time = expected_depth / 40.0 * 160.0;
        assert!(
            (density[0].time - expected_time).abs() < 1e-6,
            "density crossing at {}, expected {expected_time}",
            density[0].time
        );
    }

    #[test]
    fn test_max_end_fires_once_per_violation() {
        let air = StandardGases::AIR;
        let segments = [
            segment(0.0, 40.0, air, 160.0),
            segment(40.0, 40.0, air, 600.0),
            segment(40.0, 20.0, air, 200.0),
            segment(20.0, 35.0, air, 100.0),
            segment(35.0, 0.0, air, 700.0),
        ];
        let events = generate(&segments, 5);
        assert_eq!(count(&events, EventType::MaxEndExceeded), 2);
    }

    #[test]
    fn test_switch_to_higher_nitrogen() {
        let trimix = StandardGases::TRIMIX_18_45;
        let ean50 = StandardGases::EAN50;
        let segments = [
            segment(0.0, 40.0, trimix, 180.0),
            segment(40.0, 40.0, trimix, 1200.0),
            segment(40.0, 21.0, trimix, 130.0),
            segment(21.0, 21.0, ean50, 60.0),
            segment(21.0, 0.0, ean50, 420.0),
        ];
        let events = generate(&segments, 2);

        assert_eq!(count(&events, EventType::SwitchToHigherN2), 1);
        assert_eq!(count(&events, EventType::GasSwitch), 1);
        let switch = events
            .iter()
            .find(|e| e.event_type == EventType::SwitchToHigherN2)
            .unwrap();
        assert_eq!(switch.time, 1510.0);
        assert_eq!(switch.depth, 21.0);
    }

    #[test]
    fn test_nitrox_switch_is_not_counter_diffusion() {
        let air = StandardGases::AIR;
        let segments = [
            segment(0.0, 30.0, air, 120.0),
            segment(30.0, 30.0, air, 1200.0),
            segment(30.0, 21.0, air, 60.0),
            segment(21.0, 21.0, StandardGases::EAN50, 60.0),
            segment(21.0, 0.0, StandardGases::EAN50, 420.0),
        ];
        let events = generate(&segments, 2);
        assert_eq!(count(&events, EventType::SwitchToHigherN2), 0);
        assert_eq!(count(&events, EventType::GasSwitch), 1);
    }

    #[test]
    fn test_high_ppo2_on_descent() {
        let ean50 = StandardGases::EAN50;
        let segments = [segment(0.0, 30.0, ean50, 120.0), segment(30.0, 30.0, ean50, 600.0)];
        let events = generate(&segments, 2);
        let high: Vec<_> = events.iter().filter(|e| e.event_type == EventType::HighPpO2).collect();
        assert_eq!(high.len(), 1);

        let mod_depth = ean50.mod_depth(&Options::default().depth_converter(), 1.4);
        assert!((high[0].depth - mod_depth).abs() < 1e-9);
        assert!(high[0].time > 0.0 && high[0].time < 120.0);
    }

    #[test]
    fn test_low_ppo2_at_start() {
        let hypoxic = StandardGases::TRIMIX_10_70;
        let segments = [segment(0.0, 50.0, hypoxic, 180.0), segment(50.0, 50.0, hypoxic, 600.0)];
        let events = generate(&segments, 2);
        assert_eq!(count(&events, EventType::LowPpO2), 1);
    }

    #[test]
    fn test_speed_events() {
        let air = StandardGases::AIR;
        let segments = [
            segment(0.0, 30.0, air, 60.0),
            segment(30.0, 30.0, air, 600.0),
            segment(30.0, 0.0, air, 60.0),
        ];
        let events = generate(&segments, 3);
        assert_eq!(count(&events, EventType::HighDescentSpeed), 1);
        assert_eq!(count(&events, EventType::HighAscentSpeed), 1);
    }

    #[test]
    fn test_ascent_speed_tier_taken_at_leg_start() {
        let air = StandardGases::AIR;
        // average depth 27.5 m, the 50 % tier starts at 13.75 m
        let segments = [
            segment(0.0, 30.0, air, 120.0),
            segment(30.0, 30.0, air, 600.0),
            segment(30.0, 15.0, air, 100.0),
            segment(15.0, 12.0, air, 20.0),
            segment(12.0, 6.0, air, 60.0),
            segment(6.0, 3.0, air, 30.0),
            segment(3.0, 0.0, air, 60.0),
        ];
        let events = generate(&segments, 2);
        let fast: Vec<&Event> = events
            .iter()
            .filter(|e| e.event_type == EventType::HighAscentSpeed)
            .collect();
        assert_eq!(fast.len(), 1, "got {events:?}");
        assert_eq!(fast[0].depth, 6.0);
        assert_eq!(fast[0].time, 900.0);
    }

    #[test]
    fn test_broken_ceiling_once_per_violation() {
        let air = StandardGases::AIR;
        let segments = [
            segment(0.0, 10.0, air, 60.0),
            segment(10.0, 10.0, air, 60.0),
            segment(10.0, 0.0, air, 60.0),
        ];
        let ceilings: Vec<Ceiling> = (1..=180)
            .map(|second| {
                let depth = if (100..=170).contains(&second) { 5.0 } else { 0.0 };
                Ceiling {
                    time: f64::from(second),
                    depth,
                }
            })
            .collect();
        let options = EventOptions::new(3, Options::default().with_uniform_speeds(10.0, 18.0));
        let events = ProfileEvents::generate(&segments, &ceilings, &options);

        let broken: Vec<_> = events
            .iter()
            .filter(|e| e.event_type == EventType::BrokenCeiling)
            .collect();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].time, 151.0);

        let no_deco: Vec<_> = events.iter().filter(|e| e.event_type == EventType::NoDecoEnd).collect();
        assert_eq!(no_deco.len(), 1);
        assert_eq!(no_deco[0].time, 100.0);
        assert_eq!(no_deco[0].depth, 10.0);
    }

    #[test]
    fn test_max_and_min_depth() {
        let air = StandardGases::AIR;
        let segments = [
            segment(0.0, 18.0, air, 60.0),
            segment(18.0, 0.0, air, 360.0),
            segment(0.0, 12.0, air, 60.0),
            segment(12.0, 0.0, air, 240.0),
        ];
        let events = generate(&segments, 4);

        let max: Vec<_> = events.iter().filter(|e| e.event_type == EventType::MaxDepth).collect();
        assert_eq!(max.len(), 1);
        assert_eq!(max[0].time, 60.0);
        assert_eq!(max[0].depth, 18.0);

        let min: Vec<_> = events.iter().filter(|e| e.event_type == EventType::MinDepth).collect();
        assert_eq!(min.len(), 1);
        assert_eq!(min[0].time, 420.0);
    }

    #[test]
    fn test_missing_air_break_on_oxygen() {
        let oxygen = StandardGases::OXYGEN;
        let segments = [
            segment(0.0, 6.0, oxygen, 60.0),
            segment(6.0, 6.0, oxygen, 1500.0),
            segment(6.0, 0.0, oxygen, 120.0),
        ];
        let events = generate(&segments, 1);
        let missing: Vec<_> = events
            .iter()
            .filter(|e| e.event_type == EventType::MissingAirBreak)
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].time, 1260.0);
    }

    #[test]
    fn test_safety_stop_marker() {
        let air = StandardGases::AIR;
        let segments = [
            segment(0.0, 15.0, air, 60.0),
            segment(15.0, 15.0, air, 1200.0),
            segment(15.0, 3.0, air, 120.0),
            segment(3.0, 3.0, air, 180.0),
            segment(3.0, 0.0, air, 60.0),
        ];
        let events = generate(&segments, 2);
        assert_eq!(count(&events, EventType::SafetyStop), 1);
    }

    #[test]
    fn test_events_ordered_by_time() {
        let air = StandardGases::AIR;
        let segments = [
            segment(0.0, 40.0, air, 60.0),
            segment(40.0, 40.0, air, 600.0),
            segment(40.0, 0.0, air, 100.0),
        ];
        let events = generate(&segments, 3);
        assert!(events.windows(2).all(|w| w[0].time <= w[1].time));
    }
}
