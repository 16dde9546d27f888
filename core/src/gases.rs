//! Breathing gases and the gas math the planner needs.
//!
//! Gas fractions are always in the 0–1 range. All pressures are absolute in
//! bar, all depths in metres; conversion goes through a [`DepthConverter`].

use std::fmt;

use crate::depth::{DepthConverter, STANDARD_PRESSURE};
use crate::error::PlanError;
use crate::notation;

// ============================================================================
// Physical Constants
// ============================================================================

/// Minimum breathable ppO2 (bar), below it the gas is hypoxic.
pub const MIN_PPO2: f64 = 0.18;

/// Fraction of O2 in air.
pub const AIR_FO2: f64 = 0.209;

/// Tolerance used when comparing fractions.
const FRACTION_TOLERANCE: f64 = 1e-9;

/// Density of O2 at 0°C and 1 atm (g/l).
const O2_DENSITY: f64 = 1.429;

/// Density of N2 at 0°C and 1 atm (g/l).
const N2_DENSITY: f64 = 1.2506;

/// Density of He at 0°C and 1 atm (g/l).
const HE_DENSITY: f64 = 0.1786;

// ============================================================================
// Gas
// ============================================================================

/// A breathing gas mix. Equality is by composition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gas {
    fo2: f64,
    fhe: f64,
}

impl Gas {
    /// Create a gas from O2 and He fractions (0–1).
    ///
    /// Fails when a fraction is outside 0–1 or the fractions sum above 1.
    pub fn new(fo2: f64, fhe: f64) -> Result<Self, PlanError> {
        let valid_range = |f: f64| f.is_finite() && (0.0..=1.0).contains(&f);
        if !valid_range(fo2) || !valid_range(fhe) || fo2 <= 0.0 {
            return Err(PlanError::InvalidGas { o2: fo2, he: fhe });
        }
        if fo2 + fhe > 1.0 + FRACTION_TOLERANCE {
            return Err(PlanError::InvalidGas { o2: fo2, he: fhe });
        }
        Ok(Self { fo2, fhe })
    }

    const fn constant(fo2: f64, fhe: f64) -> Self {
        Self { fo2, fhe }
    }

    pub fn fo2(&self) -> f64 {
        self.fo2
    }

    pub fn fhe(&self) -> f64 {
        self.fhe
    }

    pub fn fn2(&self) -> f64 {
        (1.0 - self.fo2 - self.fhe).max(0.0)
    }

    /// Deterministic code identifying the composition (permille precision).
    pub fn content_code(&self) -> u32 {
        let o2 = (self.fo2 * 1000.0).round() as u32;
        let he = (self.fhe * 1000.0).round() as u32;
        o2 * 10_000 + he
    }

    pub fn composition_equals(&self, other: &Gas) -> bool {
        self.content_code() == other.content_code()
    }

    /// Maximum operating depth (m) for the given ppO2 limit.
    pub fn mod_depth(&self, converter: &DepthConverter, max_ppo2: f64) -> f64 {
        converter.from_bar(GasMixtures::mod_bar(max_ppo2, self.fo2))
    }

    /// Minimum depth (m) at which the gas is not hypoxic, 0 when breathable at the surface.
    pub fn ceiling_depth(&self, converter: &DepthConverter) -> f64 {
        let pressure = GasMixtures::ceiling_bar(self.fo2, converter.surface_pressure());
        converter.from_bar(pressure).max(0.0)
    }

    /// Equivalent narcotic depth (m) when breathing this gas at the given depth.
    pub fn end_depth(&self, converter: &DepthConverter, depth: f64, oxygen_narcotic: bool) -> f64 {
        let pressure = converter.to_bar(depth);
        let end_pressure = GasMixtures::end_bar(pressure, self.fn2(), self.narcotic_fo2(oxygen_narcotic));
        converter.from_bar(end_pressure).max(0.0)
    }

    /// Maximum narcotic depth (m): deepest depth where the END stays within `max_end`.
    pub fn mnd_depth(&self, converter: &DepthConverter, max_end: f64, oxygen_narcotic: bool) -> f64 {
        let narcotic = self.fn2() + self.narcotic_fo2(oxygen_narcotic);
        if narcotic <= FRACTION_TOLERANCE {
            return f64::INFINITY;
        }
        converter.from_bar(converter.to_bar(max_end) / narcotic)
    }

    /// Oxygen fraction counted as narcotic.
    fn narcotic_fo2(&self, oxygen_narcotic: bool) -> f64 {
        if oxygen_narcotic {
            self.fo2
        } else {
            0.0
        }
    }

    /// Density of the mix at 1 ATA (g/l).
    pub fn surface_density(&self) -> f64 {
        self.fo2 * O2_DENSITY + self.fn2() * N2_DENSITY + self.fhe * HE_DENSITY
    }

    /// Density (g/l) of the mix at the given absolute pressure (bar).
    pub fn density(&self, pressure: f64) -> f64 {
        self.surface_density() * pressure / STANDARD_PRESSURE
    }

    /// Depth (m) where the mix reaches the given density (g/l).
    pub fn density_depth(&self, converter: &DepthConverter, max_density: f64) -> f64 {
        let pressure = max_density / self.surface_density() * STANDARD_PRESSURE;
        converter.from_bar(pressure)
    }
}

impl fmt::Display for Gas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", notation::gas_name(self))
    }
}

/// Well known mixes.
pub struct StandardGases;

impl StandardGases {
    pub const AIR: Gas = Gas::constant(AIR_FO2, 0.0);
    pub const EAN32: Gas = Gas::constant(0.32, 0.0);
    pub const EAN36: Gas = Gas::constant(0.36, 0.0);
    pub const EAN50: Gas = Gas::constant(0.50, 0.0);
    pub const OXYGEN: Gas = Gas::constant(1.0, 0.0);
    pub const TRIMIX_21_35: Gas = Gas::constant(0.21, 0.35);
    pub const TRIMIX_18_45: Gas = Gas::constant(0.18, 0.45);
    pub const TRIMIX_10_70: Gas = Gas::constant(0.10, 0.70);
}

// ============================================================================
// Gas mixture formulas
// ============================================================================

/// Pure pressure formulas, no depth conversion.
pub struct GasMixtures;

impl GasMixtures {
    /// Partial pressure (bar) of a gas fraction at the given absolute pressure.
    pub fn partial_pressure(absolute_pressure: f64, fraction: f64) -> f64 {
        absolute_pressure * fraction
    }

    /// Maximum operating pressure (bar) for the ppO2 limit.
    pub fn mod_bar(max_ppo2: f64, fo2: f64) -> f64 {
        max_ppo2 / fo2
    }

    /// Minimum breathable pressure (bar), never below the surface pressure.
    pub fn ceiling_bar(fo2: f64, surface_pressure: f64) -> f64 {
        (MIN_PPO2 / fo2).max(surface_pressure)
    }

    /// Equivalent narcotic pressure (bar) for narcotic fractions at `pressure`.
    pub fn end_bar(pressure: f64, fn2: f64, narcotic_fo2: f64) -> f64 {
        pressure * (fn2 + narcotic_fo2)
    }
}

// ============================================================================
// Registered gases
// ============================================================================

/// Inputs for the automatic deco gas selection.
#[derive(Debug, Clone, Copy)]
pub struct BestGasQuery {
    pub current_depth: f64,
    pub current_gas: Gas,
    pub max_deco_ppo2: f64,
    pub oxygen_narcotic: bool,
    pub max_end: f64,
    /// MOD is rounded to the nearest multiple of this distance (m).
    pub stop_distance: f64,
}

/// Gases available for one computation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gases {
    items: Vec<Gas>,
}

impl Gases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slice(gases: &[Gas]) -> Self {
        let mut result = Self::new();
        for gas in gases {
            result.add(*gas);
        }
        result
    }

    /// Registers the gas unless the same composition is already present.
    pub fn add(&mut self, gas: Gas) {
        if !self.is_registered(&gas) {
            self.items.push(gas);
        }
    }

    pub fn is_registered(&self, gas: &Gas) -> bool {
        self.items.iter().any(|g| g.composition_equals(gas))
    }

    pub fn items(&self) -> &[Gas] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Best gas to breathe at the queried depth.
    ///
    /// Candidates must be breathable (rounded MOD at or below the depth, not
    /// hypoxic) and within the END limit; the highest O2 fraction wins. On equal
    /// O2 the current gas stays, otherwise the first registered one is taken.
    /// Returns the current gas when nothing qualifies.
    pub fn best_gas(&self, converter: &DepthConverter, query: &BestGasQuery) -> Gas {
        let depth = query.current_depth;
        let mut found = query.current_gas;

        for gas in &self.items {
            let mod_depth = gas.mod_depth(converter, query.max_deco_ppo2);
            let rounded_mod = round_to_distance(mod_depth, query.stop_distance);
            if depth > rounded_mod + FRACTION_TOLERANCE {
                continue;
            }
            if depth + FRACTION_TOLERANCE < gas.ceiling_depth(converter) {
                continue;
            }
            let end = gas.end_depth(converter, depth, query.oxygen_narcotic);
            if end > query.max_end + FRACTION_TOLERANCE {
                continue;
            }
            if gas.fo2 > found.fo2 + FRACTION_TOLERANCE {
                found = *gas;
            }
        }

        found
    }
}

fn round_to_distance(depth: f64, distance: f64) -> f64 {
    if distance <= 0.0 {
        return depth;
    }
    (depth / distance).round() * distance
}
