//! Plain data boundary exported to the host applications.
//!
//! Every record here crosses the FFI untouched; conversions into the planner
//! types validate the values and report contract violations as [`ComputeError`].

use crate::algorithm::{AlgorithmParams, BuhlmannAlgorithm};
use crate::consumption::{Consumption, ConsumptionOptions};
use crate::depth::Salinity;
use crate::error::PlanError;
use crate::events::{Event, EventOptions, EventType, ProfileEvents};
use crate::gases::{Gas, Gases};
use crate::notation;
use crate::options::{Options, SafetyStop};
use crate::profile::{CalculatedProfile, Ceiling};
use crate::segments::Segment;
use crate::tanks::Tank;
use crate::tissues::{Tissue, Tissues, NUM_COMPARTMENTS};
use crate::toxicity::OxygenToxicity;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum ComputeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("blend is not achievable: {0}")]
    Unreachable(String),
}

impl From<PlanError> for ComputeError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::ParseError { .. } | PlanError::UnknownGas(_) => ComputeError::Parse(err.to_string()),
            PlanError::UnreachableBlend(_) => ComputeError::Unreachable(err.to_string()),
            _ => ComputeError::InvalidInput(err.to_string()),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// Gas fractions in range 0-1.
#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct GasMix {
    pub o2: f64,
    pub he: f64,
}

impl From<Gas> for GasMix {
    fn from(gas: Gas) -> Self {
        Self {
            o2: gas.fo2(),
            he: gas.fhe(),
        }
    }
}

impl TryFrom<GasMix> for Gas {
    type Error = PlanError;

    fn try_from(mix: GasMix) -> Result<Self, Self::Error> {
        Gas::new(mix.o2, mix.he)
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct PlanSegment {
    pub start_depth: f64,
    pub end_depth: f64,
    /// Seconds.
    pub duration: f64,
    pub gas: GasMix,
    pub tank: Option<u32>,
}

impl From<&Segment> for PlanSegment {
    fn from(segment: &Segment) -> Self {
        Self {
            start_depth: segment.start_depth(),
            end_depth: segment.end_depth(),
            duration: segment.duration(),
            gas: segment.gas().into(),
            tank: segment.tank().and_then(|t| u32::try_from(t).ok()),
        }
    }
}

impl TryFrom<&PlanSegment> for Segment {
    type Error = PlanError;

    fn try_from(plan: &PlanSegment) -> Result<Self, Self::Error> {
        let segment = Segment::new(plan.start_depth, plan.end_depth, plan.gas.try_into()?, plan.duration)?;
        Ok(match plan.tank {
            Some(tank) => segment.with_tank(tank as usize),
            None => segment,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum SafetyStopPolicy {
    Never,
    Auto,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum WaterSalinity {
    Fresh,
    Brackish,
    Salt,
}

/// Plan options, speeds in m/min, depths in m, gas switch duration in minutes.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct PlanOptions {
    pub gf_low: f64,
    pub gf_high: f64,
    pub max_ppo2: f64,
    pub max_deco_ppo2: f64,
    pub oxygen_narcotic: bool,
    pub max_end: f64,
    pub ascent_speed_50perc: f64,
    pub ascent_speed_50perc_to_6m: f64,
    pub ascent_speed_6m: f64,
    pub descent_speed: f64,
    pub gas_switch_duration: f64,
    pub safety_stop: SafetyStopPolicy,
    pub last_stop_depth: f64,
    pub altitude: f64,
    pub salinity: WaterSalinity,
    pub round_stops_to_minutes: bool,
    pub collect_tissue_history: bool,
}

impl From<&PlanOptions> for Options {
    fn from(plan: &PlanOptions) -> Self {
        Options {
            gf_low: plan.gf_low,
            gf_high: plan.gf_high,
            max_ppo2: plan.max_ppo2,
            max_deco_ppo2: plan.max_deco_ppo2,
            oxygen_narcotic: plan.oxygen_narcotic,
            max_end: plan.max_end,
            ascent_speed_50perc: plan.ascent_speed_50perc,
            ascent_speed_50perc_to_6m: plan.ascent_speed_50perc_to_6m,
            ascent_speed_6m: plan.ascent_speed_6m,
            descent_speed: plan.descent_speed,
            gas_switch_duration: plan.gas_switch_duration,
            safety_stop: match plan.safety_stop {
                SafetyStopPolicy::Never => SafetyStop::Never,
                SafetyStopPolicy::Auto => SafetyStop::Auto,
                SafetyStopPolicy::Always => SafetyStop::Always,
            },
            last_stop_depth: plan.last_stop_depth,
            altitude: plan.altitude,
            salinity: match plan.salinity {
                WaterSalinity::Fresh => Salinity::Fresh,
                WaterSalinity::Brackish => Salinity::Brackish,
                WaterSalinity::Salt => Salinity::Salt,
            },
            round_stops_to_minutes: plan.round_stops_to_minutes,
            collect_tissue_history: plan.collect_tissue_history,
        }
    }
}

impl Default for PlanOptions {
    fn default() -> Self {
        let options = Options::default();
        Self {
            gf_low: options.gf_low,
            gf_high: options.gf_high,
            max_ppo2: options.max_ppo2,
            max_deco_ppo2: options.max_deco_ppo2,
            oxygen_narcotic: options.oxygen_narcotic,
            max_end: options.max_end,
            ascent_speed_50perc: options.ascent_speed_50perc,
            ascent_speed_50perc_to_6m: options.ascent_speed_50perc_to_6m,
            ascent_speed_6m: options.ascent_speed_6m,
            descent_speed: options.descent_speed,
            gas_switch_duration: options.gas_switch_duration,
            safety_stop: SafetyStopPolicy::Auto,
            last_stop_depth: options.last_stop_depth,
            altitude: options.altitude,
            salinity: WaterSalinity::Fresh,
            round_stops_to_minutes: options.round_stops_to_minutes,
            collect_tissue_history: options.collect_tissue_history,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct CeilingSample {
    /// Runtime (s).
    pub time: f64,
    pub depth: f64,
}

/// Inert gas pressures (bar) of one compartment.
#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct TissueLoad {
    pub n2: f64,
    pub he: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum EventKind {
    Error,
    GasSwitch,
    NoDecoEnd,
    LowPpO2,
    HighPpO2,
    HighAscentSpeed,
    HighDescentSpeed,
    BrokenCeiling,
    MaxEndExceeded,
    SwitchToHigherN2,
    HighGasDensity,
    SafetyStop,
    MinDepth,
    MaxDepth,
    MissingAirBreak,
}

impl From<EventType> for EventKind {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Error => EventKind::Error,
            EventType::GasSwitch => EventKind::GasSwitch,
            EventType::NoDecoEnd => EventKind::NoDecoEnd,
            EventType::LowPpO2 => EventKind::LowPpO2,
            EventType::HighPpO2 => EventKind::HighPpO2,
            EventType::HighAscentSpeed => EventKind::HighAscentSpeed,
            EventType::HighDescentSpeed => EventKind::HighDescentSpeed,
            EventType::BrokenCeiling => EventKind::BrokenCeiling,
            EventType::MaxEndExceeded => EventKind::MaxEndExceeded,
            EventType::SwitchToHigherN2 => EventKind::SwitchToHigherN2,
            EventType::HighGasDensity => EventKind::HighGasDensity,
            EventType::SafetyStop => EventKind::SafetyStop,
            EventType::MinDepth => EventKind::MinDepth,
            EventType::MaxDepth => EventKind::MaxDepth,
            EventType::MissingAirBreak => EventKind::MissingAirBreak,
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct PlanEvent {
    pub time: f64,
    pub depth: f64,
    pub kind: EventKind,
    pub message: Option<String>,
    pub gas: Option<GasMix>,
}

impl From<&Event> for PlanEvent {
    fn from(event: &Event) -> Self {
        Self {
            time: event.time,
            depth: event.depth,
            kind: event.event_type.into(),
            message: event.message.clone(),
            gas: event.gas.map(GasMix::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct ProfileResult {
    pub segments: Vec<PlanSegment>,
    pub ceilings: Vec<CeilingSample>,
    /// Final tissues, empty when the plan has errors.
    pub tissues: Vec<TissueLoad>,
    /// Over-pressures of the 16 compartments for each simulated second.
    pub tissue_over_pressures: Vec<Vec<f64>>,
    pub start_ascent_index: u32,
    pub errors: Vec<PlanEvent>,
}

impl From<&CalculatedProfile> for ProfileResult {
    fn from(profile: &CalculatedProfile) -> Self {
        Self {
            segments: profile.segments().iter().map(PlanSegment::from).collect(),
            ceilings: profile
                .ceilings()
                .iter()
                .map(|c| CeilingSample {
                    time: c.time,
                    depth: c.depth,
                })
                .collect(),
            tissues: profile
                .tissues()
                .iter()
                .map(|t| TissueLoad { n2: t.p_n2, he: t.p_he })
                .collect(),
            tissue_over_pressures: profile.tissue_over_pressures().iter().map(|p| p.to_vec()).collect(),
            start_ascent_index: u32::try_from(profile.start_ascent_index()).unwrap_or(u32::MAX),
            errors: profile.errors().iter().map(PlanEvent::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct TankSetup {
    /// Water volume (l).
    pub size: f64,
    pub start_pressure: f64,
    pub gas: GasMix,
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct ConsumptionSetup {
    pub rmv: f64,
    pub stress_rmv: f64,
    pub primary_tank_reserve: f64,
    pub stage_tank_reserve: f64,
    /// Minutes.
    pub problem_solving_duration: f64,
}

impl From<&ConsumptionSetup> for ConsumptionOptions {
    fn from(setup: &ConsumptionSetup) -> Self {
        ConsumptionOptions {
            rmv: setup.rmv,
            stress_rmv: setup.stress_rmv,
            primary_tank_reserve: setup.primary_tank_reserve,
            stage_tank_reserve: setup.stage_tank_reserve,
            problem_solving_duration: setup.problem_solving_duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct TankUsage {
    pub size: f64,
    pub start_pressure: f64,
    pub gas: GasMix,
    /// Bar.
    pub consumed: f64,
    /// Bar.
    pub reserve: f64,
    pub end_pressure: f64,
    pub has_reserve: bool,
}

impl From<&Tank> for TankUsage {
    fn from(tank: &Tank) -> Self {
        Self {
            size: tank.size(),
            start_pressure: tank.start_pressure(),
            gas: tank.gas().into(),
            consumed: tank.consumed(),
            reserve: tank.reserve(),
            end_pressure: tank.end_pressure(),
            has_reserve: tank.has_reserve(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct OxygenExposure {
    pub otu: f64,
    /// Percent.
    pub cns: f64,
}

// ============================================================================
// Conversions
// ============================================================================

fn to_segments(segments: &[PlanSegment]) -> Result<Vec<Segment>, PlanError> {
    segments.iter().map(Segment::try_from).collect()
}

fn to_gases(gases: &[GasMix]) -> Result<Gases, PlanError> {
    let mut result = Gases::new();
    for mix in gases {
        result.add(Gas::try_from(*mix)?);
    }
    Ok(result)
}

fn to_tanks(tanks: &[TankSetup]) -> Result<Vec<Tank>, PlanError> {
    tanks
        .iter()
        .map(|t| Tank::new(t.size, t.start_pressure, t.gas.try_into()?))
        .collect()
}

fn to_tissues(tissues: &[TissueLoad]) -> Result<Tissues, ComputeError> {
    let items: Vec<Tissue> = tissues.iter().map(|t| Tissue { p_n2: t.n2, p_he: t.he }).collect();
    let items: [Tissue; NUM_COMPARTMENTS] = items.try_into().map_err(|items: Vec<Tissue>| {
        ComputeError::InvalidInput(format!(
            "expected {NUM_COMPARTMENTS} tissues, got {}",
            items.len()
        ))
    })?;
    Ok(Tissues::from_loaded(items))
}

// ============================================================================
// Exported functions
// ============================================================================

/// Decompression plan of the user segments.
///
/// `previous_tissues` with `surface_interval` (s) plan a repetitive dive.
#[uniffi::export]
pub fn compute_profile(
    segments: Vec<PlanSegment>,
    gases: Vec<GasMix>,
    options: PlanOptions,
    previous_tissues: Option<Vec<TissueLoad>>,
    surface_interval: Option<f64>,
) -> Result<ProfileResult, ComputeError> {
    let segments = to_segments(&segments)?;
    let gases = to_gases(&gases)?;
    let options = Options::from(&options);

    let mut params = AlgorithmParams::new(&segments, &gases, &options);
    if let Some(previous) = previous_tissues {
        params = params.with_previous_dive(to_tissues(&previous)?, surface_interval.unwrap_or(0.0));
    }
    let profile = BuhlmannAlgorithm::new().decompression(&params);
    Ok(ProfileResult::from(&profile))
}

/// No decompression limit (min) of a square dive, infinite when there is none.
#[uniffi::export]
pub fn compute_no_deco_limit(depth: f64, gas: GasMix, options: PlanOptions) -> Result<f64, ComputeError> {
    let gas = Gas::try_from(gas)?;
    Ok(BuhlmannAlgorithm::new().no_deco_limit(depth, gas, &Options::from(&options)))
}

/// No decompression limit (min) when staying at the end of the given segments.
#[uniffi::export]
pub fn compute_no_deco_limit_multi_level(
    segments: Vec<PlanSegment>,
    gases: Vec<GasMix>,
    options: PlanOptions,
) -> Result<f64, ComputeError> {
    let segments = to_segments(&segments)?;
    let gases = to_gases(&gases)?;
    Ok(BuhlmannAlgorithm::new().no_deco_limit_multi_level(&segments, &gases, &Options::from(&options)))
}

/// Events of a computed profile, its errors when the plan failed.
#[uniffi::export]
pub fn compute_events(
    profile: ProfileResult,
    options: PlanOptions,
    max_density: f64,
) -> Result<Vec<PlanEvent>, ComputeError> {
    if !profile.errors.is_empty() {
        return Ok(profile.errors);
    }

    let segments = to_segments(&profile.segments)?;
    let ceilings: Vec<Ceiling> = profile
        .ceilings
        .iter()
        .map(|c| Ceiling {
            time: c.time,
            depth: c.depth,
        })
        .collect();
    let event_options = EventOptions {
        start_ascent_index: profile.start_ascent_index as usize,
        max_density,
        options: Options::from(&options),
    };
    let events = ProfileEvents::generate(&segments, &ceilings, &event_options);
    Ok(events.iter().map(PlanEvent::from).collect())
}

/// Profile of an emergency ascent from the end of the user segments.
#[uniffi::export]
pub fn compute_emergency_ascent(
    segments: Vec<PlanSegment>,
    gases: Vec<GasMix>,
    options: PlanOptions,
    consumption: ConsumptionSetup,
) -> Result<ProfileResult, ComputeError> {
    let segments = to_segments(&segments)?;
    let gases = to_gases(&gases)?;
    let options = Options::from(&options);
    let emergency = Consumption::new(&options).emergency_ascent(
        &segments,
        &gases,
        &options,
        &ConsumptionOptions::from(&consumption),
    );
    Ok(ProfileResult::from(&emergency))
}

/// Consumed gas and reserve of the tanks for a profile and its emergency ascent.
#[uniffi::export]
pub fn compute_consumption(
    profile: ProfileResult,
    emergency_ascent: ProfileResult,
    tanks: Vec<TankSetup>,
    options: PlanOptions,
    consumption: ConsumptionSetup,
) -> Result<Vec<TankUsage>, ComputeError> {
    let mut tanks = to_tanks(&tanks)?;
    if profile.errors.is_empty() && emergency_ascent.errors.is_empty() {
        let plan = to_segments(&profile.segments)?;
        let emergency = to_segments(&emergency_ascent.segments)?;
        let start = (profile.start_ascent_index as usize).min(emergency.len());
        Consumption::new(&Options::from(&options)).consume_from_tanks(
            &plan,
            &emergency[start..],
            &mut tanks,
            &ConsumptionOptions::from(&consumption),
        );
    }
    Ok(tanks.iter().map(TankUsage::from).collect())
}

/// Longest duration (min) of the last segment keeping the reserve in all tanks.
#[uniffi::export]
pub fn compute_max_bottom_time(
    segments: Vec<PlanSegment>,
    gases: Vec<GasMix>,
    options: PlanOptions,
    tanks: Vec<TankSetup>,
    consumption: ConsumptionSetup,
) -> Result<u32, ComputeError> {
    let segments = to_segments(&segments)?;
    let gases = to_gases(&gases)?;
    let tanks = to_tanks(&tanks)?;
    let options = Options::from(&options);
    let found = Consumption::new(&options).max_bottom_time(
        &segments,
        &gases,
        &options,
        &tanks,
        &ConsumptionOptions::from(&consumption),
    )?;
    Ok(found)
}

#[uniffi::export]
pub fn compute_oxygen_toxicity(segments: Vec<PlanSegment>, options: PlanOptions) -> Result<OxygenExposure, ComputeError> {
    let segments = to_segments(&segments)?;
    let toxicity = OxygenToxicity::new(&Options::from(&options));
    Ok(OxygenExposure {
        otu: toxicity.otu(&segments),
        cns: toxicity.cns(&segments),
    })
}

/// Compact text form of the segments, e.g. `0,10,30; 10,10,2370;`.
#[uniffi::export]
pub fn format_profile(segments: Vec<PlanSegment>) -> Result<String, ComputeError> {
    let segments = to_segments(&segments)?;
    Ok(notation::format_profile(&segments))
}

/// Gas of a name like `EAN32` or `Trimix 18/45`.
#[uniffi::export]
pub fn parse_gas_name(name: String) -> Result<GasMix, ComputeError> {
    Ok(notation::parse_gas(&name)?.into())
}

#[uniffi::export]
pub fn gas_name(gas: GasMix) -> Result<String, ComputeError> {
    Ok(notation::gas_name(&Gas::try_from(gas)?))
}
