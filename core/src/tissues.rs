//! Bühlmann ZHL-16C tissue compartments.
//!
//! Sixteen compartments track inert gas (N2 and He) loading using the
//! Schreiner equation, which handles both constant depth and linear depth
//! changes exactly. Loading is evaluated per gas with its own half-time.

use crate::gases::{Gas, StandardGases};

// ============================================================================
// Physical Constants
// ============================================================================

/// Water vapour pressure in the lungs (bar), at 37°C.
pub const P_WATER_VAPOR: f64 = 0.0627;

// ============================================================================
// ZHL-16C Compartment Constants (Bühlmann / Baker)
// ============================================================================

/// Number of tissue compartments.
pub const NUM_COMPARTMENTS: usize = 16;

/// N2 half-times in minutes for compartments 1–16 (ZHL-16C).
const N2_HALF_TIMES: [f64; NUM_COMPARTMENTS] = [
    5.0, 8.0, 12.5, 18.5, 27.0, 38.3, 54.3, 77.0, 109.0, 146.0, 187.0, 239.0, 305.0, 390.0, 498.0,
    635.0,
];

/// He half-times in minutes for compartments 1–16 (ZHL-16C).
const HE_HALF_TIMES: [f64; NUM_COMPARTMENTS] = [
    1.88, 3.02, 4.72, 6.99, 10.21, 14.48, 20.53, 29.11, 41.20, 55.19, 70.69, 90.34, 115.29, 147.42,
    188.24, 240.03,
];

/// N2 'a' coefficients (bar) for ZHL-16C.
const A_N2: [f64; NUM_COMPARTMENTS] = [
    1.1696, 1.0000, 0.8618, 0.7562, 0.6200, 0.5043, 0.4410, 0.4000, 0.3750, 0.3500, 0.3295, 0.3065,
    0.2835, 0.2610, 0.2480, 0.2327,
];

/// N2 'b' coefficients (dimensionless) for ZHL-16C.
const B_N2: [f64; NUM_COMPARTMENTS] = [
    0.5578, 0.6514, 0.7222, 0.7825, 0.8126, 0.8434, 0.8693, 0.8910, 0.9092, 0.9222, 0.9319, 0.9403,
    0.9477, 0.9544, 0.9602, 0.9653,
];

/// He 'a' coefficients (bar) for ZHL-16C.
const A_HE: [f64; NUM_COMPARTMENTS] = [
    1.6189, 1.3830, 1.1919, 1.0458, 0.9220, 0.8205, 0.7305, 0.6502, 0.5950, 0.5545, 0.5333, 0.5189,
    0.5181, 0.5176, 0.5172, 0.5119,
];

/// He 'b' coefficients (dimensionless) for ZHL-16C.
const B_HE: [f64; NUM_COMPARTMENTS] = [
    0.4770, 0.5747, 0.6527, 0.7223, 0.7582, 0.7957, 0.8279, 0.8553, 0.8757, 0.8903, 0.8997, 0.9073,
    0.9122, 0.9171, 0.9217, 0.9267,
];

/// Time constant k (1/s) for a half-time in minutes.
fn time_constant(half_time_min: f64) -> f64 {
    std::f64::consts::LN_2 / (half_time_min * 60.0)
}

/// Schreiner equation.
///
/// `p_gas`: inspired partial pressure at the segment start (bar).
/// `rate`: change of the inspired partial pressure (bar/s).
fn schreiner(p_begin: f64, p_gas: f64, rate: f64, k: f64, t: f64) -> f64 {
    p_gas + rate * (t - 1.0 / k) - (p_gas - p_begin - rate / k) * (-k * t).exp()
}

/// Inspired (alveolar) partial pressure of a gas fraction at ambient pressure.
fn inspired_pressure(ambient: f64, fraction: f64) -> f64 {
    (ambient - P_WATER_VAPOR).max(0.0) * fraction
}

// ============================================================================
// Tissue State
// ============================================================================

/// Inert gas loading of one compartment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tissue {
    /// N2 partial pressure (bar).
    pub p_n2: f64,
    /// He partial pressure (bar).
    pub p_he: f64,
}

impl Tissue {
    pub fn p_total(&self) -> f64 {
        self.p_n2 + self.p_he
    }

    /// Bühlmann a, b weighted by the N2/He loading of compartment `index`.
    pub fn coefficients(&self, index: usize) -> (f64, f64) {
        let p_total = self.p_total();
        if p_total > 1e-10 {
            let a = (A_N2[index] * self.p_n2 + A_HE[index] * self.p_he) / p_total;
            let b = (B_N2[index] * self.p_n2 + B_HE[index] * self.p_he) / p_total;
            (a, b)
        } else {
            (A_N2[index], B_N2[index])
        }
    }

    /// Lowest ambient pressure (bar) this compartment tolerates at gradient factor `gf`.
    pub fn tolerated(&self, index: usize, gf: f64) -> f64 {
        let (a, b) = self.coefficients(index);
        (self.p_total() - a * gf) / (gf / b + 1.0 - gf)
    }
}

/// A linear pressure change to load the tissues with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSegment {
    /// Ambient pressure at the start (bar).
    pub start_pressure: f64,
    /// Duration (s).
    pub duration: f64,
    /// Ambient pressure change (bar/s), positive when descending.
    pub speed: f64,
}

impl LoadSegment {
    pub fn flat(pressure: f64, duration: f64) -> Self {
        Self {
            start_pressure: pressure,
            duration,
            speed: 0.0,
        }
    }
}

/// State of the 16 tissue compartments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tissues {
    items: [Tissue; NUM_COMPARTMENTS],
}

impl Tissues {
    /// Tissues at surface equilibrium breathing air.
    pub fn create(surface_pressure: f64) -> Self {
        let p_n2 = inspired_pressure(surface_pressure, StandardGases::AIR.fn2());
        Self {
            items: [Tissue { p_n2, p_he: 0.0 }; NUM_COMPARTMENTS],
        }
    }

    /// Tissues restored from a previous computation.
    pub fn from_loaded(items: [Tissue; NUM_COMPARTMENTS]) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[Tissue; NUM_COMPARTMENTS] {
        &self.items
    }

    /// Load all compartments for one segment using the Schreiner equation.
    ///
    /// Returns the summed absolute change of compartment pressures (bar);
    /// zero means the tissues are in equilibrium with the breathed gas.
    pub fn load(&mut self, segment: &LoadSegment, gas: &Gas) -> f64 {
        if segment.duration <= 0.0 {
            return 0.0;
        }

        let p_n2_gas = inspired_pressure(segment.start_pressure, gas.fn2());
        let p_he_gas = inspired_pressure(segment.start_pressure, gas.fhe());
        let n2_rate = segment.speed * gas.fn2();
        let he_rate = segment.speed * gas.fhe();
        let t = segment.duration;

        let mut delta = 0.0;
        for (i, tissue) in self.items.iter_mut().enumerate() {
            let before = tissue.p_total();
            tissue.p_n2 = schreiner(tissue.p_n2, p_n2_gas, n2_rate, time_constant(N2_HALF_TIMES[i]), t);
            tissue.p_he = schreiner(tissue.p_he, p_he_gas, he_rate, time_constant(HE_HALF_TIMES[i]), t);
            delta += (tissue.p_total() - before).abs();
        }
        delta
    }

    /// Ceiling (bar) for a single gradient factor, never below the surface pressure.
    pub fn ceiling(&self, gf: f64, surface_pressure: f64) -> f64 {
        self.items
            .iter()
            .enumerate()
            .map(|(i, t)| t.tolerated(i, gf))
            .fold(surface_pressure, f64::max)
    }

    /// Copy of the tissues fully saturated breathing `gas` at `pressure`.
    pub fn saturated(&self, pressure: f64, gas: &Gas) -> Tissues {
        let tissue = Tissue {
            p_n2: inspired_pressure(pressure, gas.fn2()),
            p_he: inspired_pressure(pressure, gas.fhe()),
        };
        Tissues {
            items: [tissue; NUM_COMPARTMENTS],
        }
    }

    /// Compartment pressure above ambient (bar), negative while on-gassing.
    pub fn over_pressures(&self, ambient: f64) -> [f64; NUM_COMPARTMENTS] {
        let mut result = [0.0; NUM_COMPARTMENTS];
        for (value, tissue) in result.iter_mut().zip(self.items.iter()) {
            *value = tissue.p_total() - ambient;
        }
        result
    }
}
