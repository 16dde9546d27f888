//! Gradient factor ceiling.
//!
//! The gradient factor runs linearly from `gf_low` at the deepest ceiling seen
//! during the dive (computed with `gf_low`) to `gf_high` at the surface. The
//! deepest ceiling anchor only ever moves deeper during one computation.

use crate::tissues::{Tissue, Tissues};

const PRESSURE_TOLERANCE: f64 = 1e-9;

/// Two-point gradient factor model with a monotone lowest ceiling anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubSurfaceGradientFactors {
    gf_low: f64,
    gf_high: f64,
    surface_pressure: f64,
    /// Deepest `gf_low` ceiling seen so far (bar).
    lowest_ceiling: f64,
}

impl SubSurfaceGradientFactors {
    pub fn new(gf_low: f64, gf_high: f64, surface_pressure: f64) -> Self {
        Self {
            gf_low,
            gf_high,
            surface_pressure,
            lowest_ceiling: surface_pressure,
        }
    }

    pub fn lowest_ceiling(&self) -> f64 {
        self.lowest_ceiling
    }

    /// Ceiling (bar) of the tissues, never below the surface pressure.
    ///
    /// Moves the lowest ceiling anchor deeper when the tissues require it.
    pub fn ceiling(&mut self, tissues: &Tissues) -> f64 {
        let low_ceiling = tissues.ceiling(self.gf_low, self.surface_pressure);
        if low_ceiling > self.lowest_ceiling {
            self.lowest_ceiling = low_ceiling;
        }

        tissues
            .items()
            .iter()
            .enumerate()
            .map(|(i, tissue)| self.tolerated(i, tissue))
            .fold(self.surface_pressure, f64::max)
    }

    /// Tolerated ambient pressure of one compartment with the interpolated gradient.
    fn tolerated(&self, index: usize, tissue: &Tissue) -> f64 {
        let surface = self.surface_pressure;
        let anchor = self.lowest_ceiling;
        let (gl, gh) = (self.gf_low, self.gf_high);

        if anchor - surface <= PRESSURE_TOLERANCE {
            return tissue.tolerated(index, gh);
        }

        let (a, b) = tissue.coefficients(index);
        let p = tissue.p_total();
        let m = 1.0 / b - 1.0;
        // f(P) = P + gf(P) * (a + m * P) - p, its root is the tolerated pressure
        let residual = |pressure: f64, gf: f64| pressure + gf * (a + m * pressure) - p;

        if residual(surface, gh) >= 0.0 {
            return surface;
        }
        if residual(anchor, gl) <= 0.0 {
            return tissue.tolerated(index, gl);
        }

        // gf(P) = g0 + c * P between the anchors
        let c = (gl - gh) / (anchor - surface);
        let g0 = gh - c * surface;
        let qa = c * m;
        let qb = 1.0 + g0 * m + c * a;
        let qc = g0 * a - p;

        let root = if qa.abs() < 1e-12 {
            -qc / qb
        } else {
            let discriminant = (qb * qb - 4.0 * qa * qc).max(0.0);
            let q = -0.5 * (qb + qb.signum() * discriminant.sqrt());
            let first = q / qa;
            let second = if q.abs() > 1e-12 { qc / q } else { first };
            let distance = |x: f64| {
                if x < surface {
                    surface - x
                } else if x > anchor {
                    x - anchor
                } else {
                    0.0
                }
            };
            if distance(first) <= distance(second) {
                first
            } else {
                second
            }
        };

        root.clamp(surface, anchor)
    }
}
