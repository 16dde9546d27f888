//! Binary interval search.
//!
//! Finds the largest value for which a monotone condition still holds. The
//! condition is evaluated against state changed by the last `do_work` call,
//! so the probe and the check are two methods of one [`SearchTarget`].

use crate::error::PlanError;

/// Range and estimation step of one search (whole time units).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchContext {
    /// Value known to meet the condition.
    pub initial_value: u32,
    pub max_value: u32,
    /// First bracket width, doubled until the condition fails.
    pub estimation_step: u32,
}

/// State probed by the search.
pub trait SearchTarget {
    /// Prepare the state for `value`.
    fn do_work(&mut self, value: u32);

    /// Whether the state left by the last `do_work` meets the condition.
    fn meets_condition(&mut self) -> bool;
}

pub struct BinaryIntervalSearch;

impl BinaryIntervalSearch {
    /// Largest value in `initial_value..=max_value` meeting the condition.
    ///
    /// The condition is assumed to hold at `initial_value` and, once it fails,
    /// to stay failed for all larger values.
    pub fn search<T: SearchTarget>(context: &SearchContext, target: &mut T) -> Result<u32, PlanError> {
        let SearchContext {
            initial_value,
            max_value,
            estimation_step,
        } = *context;

        let range_error = PlanError::InvalidSearchRange {
            initial: initial_value,
            max: max_value,
            step: estimation_step,
        };
        if max_value < initial_value || estimation_step > max_value - initial_value {
            return Err(range_error);
        }
        if max_value == initial_value {
            return Ok(initial_value);
        }
        if estimation_step == 0 {
            return Err(range_error);
        }

        let (mut left, mut right) = Self::estimate(context, target);
        if left == max_value {
            return Ok(max_value);
        }

        while right - left > 1 {
            let middle = left + (right - left) / 2;
            target.do_work(middle);
            if target.meets_condition() {
                left = middle;
            } else {
                right = middle;
            }
        }

        Ok(left)
    }

    /// Grows the bracket until the condition fails or the max value is reached.
    fn estimate<T: SearchTarget>(context: &SearchContext, target: &mut T) -> (u32, u32) {
        let mut step = context.estimation_step;
        let mut left = context.initial_value;
        let mut right = left.saturating_add(step).min(context.max_value);

        loop {
            target.do_work(right);
            if !target.meets_condition() {
                return (left, right);
            }

            left = right;
            if left == context.max_value {
                return (left, left);
            }
            step = step.saturating_mul(2);
            right = right.saturating_add(step).min(context.max_value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Condition holds up to `threshold`, counts the probes.
    struct Threshold {
        threshold: u32,
        current: u32,
        calls: u32,
    }

    impl Threshold {
        fn new(threshold: u32) -> Self {
            Self {
                threshold,
                current: 0,
                calls: 0,
            }
        }
    }

    impl SearchTarget for Threshold {
        fn do_work(&mut self, value: u32) {
            self.current = value;
            self.calls += 1;
        }

        fn meets_condition(&mut self) -> bool {
            self.current <= self.threshold
        }
    }

    fn context(initial: u32, max: u32, step: u32) -> SearchContext {
        SearchContext {
            initial_value: initial,
            max_value: max,
            estimation_step: step,
        }
    }

    #[test]
    fn test_finds_threshold() {
        let mut target = Threshold::new(35);
        let result = BinaryIntervalSearch::search(&context(0, 100, 10), &mut target).unwrap();
        assert_eq!(result, 35);
        assert_eq!(target.calls, 8);
    }

    #[test]
    fn test_same_inputs_same_number_of_calls() {
        let mut first = Threshold::new(1234);
        let mut second = Threshold::new(1234);
        let ctx = context(0, 86_400, 1200);
        let a = BinaryIntervalSearch::search(&ctx, &mut first).unwrap();
        let b = BinaryIntervalSearch::search(&ctx, &mut second).unwrap();
        assert_eq!(a, 1234);
        assert_eq!(a, b);
        assert_eq!(first.calls, second.calls);
    }

    #[test]
    fn test_always_true_returns_max() {
        let mut target = Threshold::new(u32::MAX);
        let result = BinaryIntervalSearch::search(&context(5, 500, 7), &mut target).unwrap();
        assert_eq!(result, 500);
    }

    #[test]
    fn test_always_false_returns_initial() {
        let mut target = Threshold::new(0);
        let result = BinaryIntervalSearch::search(&context(0, 500, 50), &mut target).unwrap();
        assert_eq!(result, 0);
    }

    #[test]
    fn test_result_within_range() {
        for threshold in [0, 1, 2, 99, 100, 101, 499, 10_000] {
            let mut target = Threshold::new(threshold);
            let result = BinaryIntervalSearch::search(&context(1, 500, 3), &mut target).unwrap();
            assert!((1..=500).contains(&result));
            assert_eq!(result, threshold.clamp(1, 500));
        }
    }

    #[test]
    fn test_invalid_ranges_fail() {
        let mut target = Threshold::new(10);
        assert!(BinaryIntervalSearch::search(&context(10, 5, 1), &mut target).is_err());
        assert!(BinaryIntervalSearch::search(&context(0, 5, 6), &mut target).is_err());
        assert!(BinaryIntervalSearch::search(&context(0, 5, 0), &mut target).is_err());
        assert_eq!(target.calls, 0);
    }

    #[test]
    fn test_empty_range() {
        let mut target = Threshold::new(10);
        let result = BinaryIntervalSearch::search(&context(7, 7, 0), &mut target).unwrap();
        assert_eq!(result, 7);
        assert_eq!(target.calls, 0);
    }
}
