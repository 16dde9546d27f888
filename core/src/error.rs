use thiserror::Error;

/// Error type for contract violations in the planner inputs.
///
/// Plan validation problems (no gas, no segments) are not errors: they are
/// reported as `EventType::Error` events on the calculated profile.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("invalid gas mix: O2 {o2}, He {he}")]
    InvalidGas { o2: f64, he: f64 },

    #[error("invalid segment: {0}")]
    InvalidSegment(String),

    #[error("invalid tank: {0}")]
    InvalidTank(String),

    #[error("invalid search range: initial {initial}, max {max}, step {step}")]
    InvalidSearchRange { initial: u32, max: u32, step: u32 },

    #[error("parse error at position {position}: {message}")]
    ParseError { position: usize, message: String },

    #[error("unknown gas: {0}")]
    UnknownGas(String),

    #[error("blend is not achievable: {0}")]
    UnreachableBlend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_error_display() {
        let err = PlanError::InvalidGas { o2: 0.8, he: 0.4 };
        assert_eq!(err.to_string(), "invalid gas mix: O2 0.8, He 0.4");

        let err = PlanError::ParseError {
            position: 5,
            message: "expected ';'".to_string(),
        };
        assert_eq!(err.to_string(), "parse error at position 5: expected ';'");

        let err = PlanError::InvalidSearchRange {
            initial: 10,
            max: 5,
            step: 1,
        };
        assert_eq!(
            err.to_string(),
            "invalid search range: initial 10, max 5, step 1"
        );

        let err = PlanError::UnknownGas("Kryptox".to_string());
        assert_eq!(err.to_string(), "unknown gas: Kryptox");
    }
}
