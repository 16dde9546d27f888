//! Plan options.

use crate::depth::{DepthConverter, Salinity};

/// Distance between deco stops (m).
pub const DECO_STOP_DISTANCE: f64 = 3.0;

/// Safety stop duration (s).
pub const SAFETY_STOP_DURATION: f64 = 180.0;

/// With [`SafetyStop::Auto`] a safety stop is added from this max depth (m).
pub const AUTO_SAFETY_STOP_DEPTH: f64 = 10.0;

/// When to add a safety stop at the last stop depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyStop {
    Never,
    /// Only when the dive was at least 10 m deep.
    Auto,
    Always,
}

/// Options of one computation.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub gf_low: f64,
    pub gf_high: f64,
    /// Bottom ppO2 limit (bar).
    pub max_ppo2: f64,
    /// Deco ppO2 limit (bar), used for gas switches during ascent.
    pub max_deco_ppo2: f64,
    /// Whether O2 counts as narcotic for END.
    pub oxygen_narcotic: bool,
    /// Maximum equivalent narcotic depth (m).
    pub max_end: f64,
    /// Ascent speed (m/min) deeper than 50 % of the average depth.
    pub ascent_speed_50perc: f64,
    /// Ascent speed (m/min) from 50 % of the average depth to 6 m.
    pub ascent_speed_50perc_to_6m: f64,
    /// Ascent speed (m/min) shallower than 6 m.
    pub ascent_speed_6m: f64,
    /// Descent speed (m/min).
    pub descent_speed: f64,
    /// Gas switch duration (min).
    pub gas_switch_duration: f64,
    pub safety_stop: SafetyStop,
    /// Last deco stop depth (m), also the safety stop depth.
    pub last_stop_depth: f64,
    /// Altitude above sea level (m).
    pub altitude: f64,
    pub salinity: Salinity,
    /// Round deco stop durations up to whole minutes instead of seconds.
    pub round_stops_to_minutes: bool,
    /// Record tissue over-pressures for every simulated second.
    pub collect_tissue_history: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            gf_low: 0.4,
            gf_high: 0.85,
            max_ppo2: 1.4,
            max_deco_ppo2: 1.6,
            oxygen_narcotic: true,
            max_end: 30.0,
            ascent_speed_50perc: 9.0,
            ascent_speed_50perc_to_6m: 6.0,
            ascent_speed_6m: 3.0,
            descent_speed: 18.0,
            gas_switch_duration: 1.0,
            safety_stop: SafetyStop::Auto,
            last_stop_depth: 3.0,
            altitude: 0.0,
            salinity: Salinity::Fresh,
            round_stops_to_minutes: true,
            collect_tissue_history: true,
        }
    }
}

impl Options {
    pub fn depth_converter(&self) -> DepthConverter {
        DepthConverter::new(self.salinity, self.altitude)
    }

    /// Same ascent and descent speed for all depths.
    pub fn with_uniform_speeds(mut self, ascent: f64, descent: f64) -> Self {
        self.ascent_speed_50perc = ascent;
        self.ascent_speed_50perc_to_6m = ascent;
        self.ascent_speed_6m = ascent;
        self.descent_speed = descent;
        self
    }

    /// Problems making the options unusable, empty when valid.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let factor = |v: f64| v.is_finite() && v > 0.0 && v <= 1.0;
        if !factor(self.gf_low) || !factor(self.gf_high) {
            problems.push("Gradient factors have to be in range 0-1".to_string());
        } else if self.gf_low > self.gf_high {
            problems.push("Gradient factor low can't be higher than gradient factor high".to_string());
        }
        let speeds = [
            self.ascent_speed_50perc,
            self.ascent_speed_50perc_to_6m,
            self.ascent_speed_6m,
            self.descent_speed,
        ];
        if speeds.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            problems.push("Speeds have to be positive".to_string());
        }
        if self.last_stop_depth < 0.0 || self.gas_switch_duration < 0.0 {
            problems.push("Last stop depth and gas switch duration can't be negative".to_string());
        }
        problems
    }
}

/// Three-tier ascent speed model anchored at the average depth of the plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AscentSpeeds {
    speed_50perc: f64,
    speed_50perc_to_6m: f64,
    speed_6m: f64,
    /// 50 % of the average depth (m).
    half_depth: f64,
}

impl AscentSpeeds {
    pub fn new(options: &Options, average_depth: f64) -> Self {
        Self {
            speed_50perc: options.ascent_speed_50perc,
            speed_50perc_to_6m: options.ascent_speed_50perc_to_6m,
            speed_6m: options.ascent_speed_6m,
            half_depth: average_depth / 2.0,
        }
    }

    /// Allowed ascent speed (m/min) when ascending from `depth`.
    pub fn ascent(&self, depth: f64) -> f64 {
        if depth <= 6.0 {
            self.speed_6m
        } else if depth > self.half_depth {
            self.speed_50perc
        } else {
            self.speed_50perc_to_6m
        }
    }
}
