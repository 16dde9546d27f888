//! Tanks carried by the diver.

use crate::error::PlanError;
use crate::gases::Gas;

const PRESSURE_TOLERANCE: f64 = 1e-9;

/// One tank, pressures are in bar and gas volumes in liters at surface pressure.
#[derive(Debug, Clone, PartialEq)]
pub struct Tank {
    /// Water volume (l).
    size: f64,
    start_pressure: f64,
    gas: Gas,
    consumed: f64,
    reserve: f64,
}

impl Tank {
    pub fn new(size: f64, start_pressure: f64, gas: Gas) -> Result<Self, PlanError> {
        if !size.is_finite() || size <= 0.0 {
            return Err(PlanError::InvalidTank(format!("size must be positive, got {size} l")));
        }
        if !start_pressure.is_finite() || start_pressure < 0.0 {
            return Err(PlanError::InvalidTank(format!(
                "start pressure can't be negative, got {start_pressure} bar"
            )));
        }
        Ok(Self {
            size,
            start_pressure,
            gas,
            consumed: 0.0,
            reserve: 0.0,
        })
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn start_pressure(&self) -> f64 {
        self.start_pressure
    }

    pub fn gas(&self) -> Gas {
        self.gas
    }

    /// Consumed gas (bar).
    pub fn consumed(&self) -> f64 {
        self.consumed
    }

    /// Gas needed for an emergency ascent (bar).
    pub fn reserve(&self) -> f64 {
        self.reserve
    }

    /// Remaining pressure (bar), never below zero.
    pub fn end_pressure(&self) -> f64 {
        (self.start_pressure - self.consumed).max(0.0)
    }

    /// Gas volume (l) of the full tank.
    pub fn volume(&self) -> f64 {
        self.size * self.start_pressure
    }

    /// Gas volume (l) left above the reserve.
    pub fn available_above_reserve(&self) -> f64 {
        (self.start_pressure - self.consumed - self.reserve).max(0.0) * self.size
    }

    /// Gas volume (l) left in the tank.
    pub fn available(&self) -> f64 {
        (self.start_pressure - self.consumed).max(0.0) * self.size
    }

    pub fn has_reserve(&self) -> bool {
        self.start_pressure - self.consumed + PRESSURE_TOLERANCE >= self.reserve
    }

    /// Adds the volume (l) to the consumed gas.
    pub fn consume(&mut self, liters: f64) {
        self.consumed += liters / self.size;
    }

    pub fn set_reserve(&mut self, reserve: f64) {
        self.reserve = reserve.max(0.0);
    }

    /// Clears consumed gas and reserve.
    pub fn reset(&mut self) {
        self.consumed = 0.0;
        self.reserve = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gases::StandardGases;

    #[test]
    fn test_invalid_tank_fails() {
        assert!(Tank::new(0.0, 200.0, StandardGases::AIR).is_err());
        assert!(Tank::new(-12.0, 200.0, StandardGases::AIR).is_err());
        assert!(Tank::new(12.0, -1.0, StandardGases::AIR).is_err());
        assert!(Tank::new(12.0, f64::NAN, StandardGases::AIR).is_err());
    }

    #[test]
    fn test_consume_and_reserve() {
        let mut tank = Tank::new(12.0, 200.0, StandardGases::AIR).unwrap();
        assert_eq!(tank.volume(), 2400.0);

        tank.consume(1200.0);
        tank.set_reserve(50.0);
        assert!((tank.end_pressure() - 100.0).abs() < 1e-9);
        assert!((tank.available_above_reserve() - 600.0).abs() < 1e-9);
        assert!(tank.has_reserve());

        tank.consume(720.0);
        assert!((tank.end_pressure() - 40.0).abs() < 1e-9);
        assert!(!tank.has_reserve());

        tank.consume(1200.0);
        assert_eq!(tank.end_pressure(), 0.0);
        assert_eq!(tank.available(), 0.0);

        tank.reset();
        assert_eq!(tank.consumed(), 0.0);
        assert_eq!(tank.reserve(), 0.0);
    }
}
