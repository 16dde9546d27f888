//! Depth and pressure conversion.
//!
//! Converts between depth in metres and absolute pressure in bar for a given
//! water density and altitude. Surface pressure at altitude follows the
//! international barometric formula.

// ============================================================================
// Physical Constants
// ============================================================================

/// Standard gravity (m/s²).
const GRAVITY: f64 = 9.80665;

/// Standard atmospheric pressure at sea level (bar).
pub const STANDARD_PRESSURE: f64 = 1.01325;

/// Pascals per bar.
const PASCAL_PER_BAR: f64 = 100_000.0;

/// Temperature lapse rate (K/m).
const LAPSE_RATE: f64 = 0.0065;

/// Standard temperature at sea level (K).
const STANDARD_TEMPERATURE: f64 = 288.15;

/// Molar mass of dry air (kg/mol).
const AIR_MOLAR_MASS: f64 = 0.028_964_4;

/// Universal gas constant (J/(mol·K)).
const GAS_CONSTANT: f64 = 8.314_47;

/// Water salinity, selects the water density used for depth conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Salinity {
    /// 1000 kg/m³
    Fresh,
    /// 1020 kg/m³ (EN 13319)
    Brackish,
    /// 1030 kg/m³
    Salt,
}

impl Salinity {
    pub fn density(&self) -> f64 {
        match self {
            Salinity::Fresh => 1000.0,
            Salinity::Brackish => 1020.0,
            Salinity::Salt => 1030.0,
        }
    }
}

/// Surface pressure (bar) at the given altitude (metres above sea level).
pub fn altitude_pressure(altitude: f64) -> f64 {
    let altitude = altitude.max(0.0);
    let base = 1.0 - LAPSE_RATE * altitude / STANDARD_TEMPERATURE;
    let exponent = GRAVITY * AIR_MOLAR_MASS / (GAS_CONSTANT * LAPSE_RATE);
    STANDARD_PRESSURE * base.powf(exponent)
}

/// Linear depth to pressure conversion for one water density and altitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthConverter {
    surface_pressure: f64,
    density: f64,
}

impl DepthConverter {
    pub fn new(salinity: Salinity, altitude: f64) -> Self {
        Self {
            surface_pressure: altitude_pressure(altitude),
            density: salinity.density(),
        }
    }

    pub fn surface_pressure(&self) -> f64 {
        self.surface_pressure
    }

    /// Absolute pressure (bar) at the given depth (m).
    pub fn to_bar(&self, depth: f64) -> f64 {
        let water_pressure = self.density * GRAVITY * depth / PASCAL_PER_BAR;
        self.surface_pressure + water_pressure
    }

    /// Depth (m) at the given absolute pressure (bar). Negative above the surface.
    pub fn from_bar(&self, pressure: f64) -> f64 {
        let water_pressure = pressure - self.surface_pressure;
        water_pressure * PASCAL_PER_BAR / (self.density * GRAVITY)
    }

    /// Pressure change (bar) across the given depth difference (m).
    pub fn bar_per_meter(&self, distance: f64) -> f64 {
        self.density * GRAVITY * distance / PASCAL_PER_BAR
    }
}

impl Default for DepthConverter {
    fn default() -> Self {
        Self::new(Salinity::Fresh, 0.0)
    }
}
