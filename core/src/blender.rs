//! Partial pressure gas blending.
//!
//! Ideal gas model: the source tank is optionally drained, then helium, oxygen
//! and finally the top mix are added until the target pressure and mix are
//! reached.

use crate::error::PlanError;
use crate::gases::Gas;

/// Steps of the drain search, enough for sub-millibar precision at 300 bar.
const DRAIN_ITERATIONS: usize = 50;

const PRESSURE_TOLERANCE: f64 = 1e-9;

/// Pressure (bar) and mix of a tank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankFill {
    pub pressure: f64,
    pub gas: Gas,
}

/// Pressure changes (bar) needed to blend the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendResult {
    /// Pressure released from the source tank before adding gases.
    pub drained: f64,
    pub helium: f64,
    pub oxygen: f64,
    pub top_mix: f64,
}

/// Additions needed when the source tank holds `source_pressure`.
#[derive(Debug, Clone, Copy)]
struct Additions {
    helium: f64,
    oxygen: f64,
    top_mix: f64,
}

impl Additions {
    fn is_feasible(&self) -> bool {
        self.helium >= -PRESSURE_TOLERANCE
            && self.oxygen >= -PRESSURE_TOLERANCE
            && self.top_mix >= -PRESSURE_TOLERANCE
    }
}

pub struct GasBlender;

impl GasBlender {
    /// Blend `target` from `source` using pure helium, pure oxygen and `top_mix`.
    pub fn blend(source: &TankFill, target: &TankFill, top_mix: &Gas) -> Result<BlendResult, PlanError> {
        for fill in [source, target] {
            if !fill.pressure.is_finite() || fill.pressure < 0.0 {
                return Err(PlanError::InvalidTank(format!(
                    "pressure can't be negative, got {} bar",
                    fill.pressure
                )));
            }
        }

        let additions = |pressure: f64| Self::additions(pressure, source, target, top_mix);
        let full = additions(source.pressure)?;
        if full.is_feasible() {
            return Ok(Self::result(0.0, full));
        }

        let empty = additions(0.0)?;
        if !empty.is_feasible() {
            return Err(PlanError::UnreachableBlend(format!(
                "{} can't be blended from helium, oxygen and {}",
                target.gas, top_mix
            )));
        }

        // feasible source pressures form the interval [0, kept]
        let (mut kept, mut too_much) = (0.0, source.pressure);
        for _ in 0..DRAIN_ITERATIONS {
            let middle = (kept + too_much) / 2.0;
            if additions(middle)?.is_feasible() {
                kept = middle;
            } else {
                too_much = middle;
            }
        }

        tracing::debug!(drained = source.pressure - kept, "source tank drained");
        Ok(Self::result(source.pressure - kept, additions(kept)?))
    }

    fn additions(kept: f64, source: &TankFill, target: &TankFill, top_mix: &Gas) -> Result<Additions, PlanError> {
        let missing_n2 = target.pressure * target.gas.fn2() - kept * source.gas.fn2();
        let top = if top_mix.fn2() > PRESSURE_TOLERANCE {
            missing_n2 / top_mix.fn2()
        } else if missing_n2.abs() <= PRESSURE_TOLERANCE {
            0.0
        } else {
            return Err(PlanError::UnreachableBlend(format!(
                "top mix {top_mix} contains no nitrogen"
            )));
        };

        Ok(Additions {
            helium: target.pressure * target.gas.fhe() - kept * source.gas.fhe() - top * top_mix.fhe(),
            oxygen: target.pressure * target.gas.fo2() - kept * source.gas.fo2() - top * top_mix.fo2(),
            top_mix: top,
        })
    }

    fn result(drained: f64, additions: Additions) -> BlendResult {
        BlendResult {
            drained,
            helium: additions.helium.max(0.0),
            oxygen: additions.oxygen.max(0.0),
            top_mix: additions.top_mix.max(0.0),
        }
    }
}
