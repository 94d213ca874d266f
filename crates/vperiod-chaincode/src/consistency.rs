//! Invariants relating the gateway path, the direct ledger path, and
//! successive observations. Violations are surfaced, never retried.

use thiserror::Error;

/// An observed invariant violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    /// The gateway and a direct ledger read returned different values.
    #[error("gateway and ledger disagree")]
    Mismatch {
        /// Value from the query gateway.
        gateway: i64,
        /// Value from the direct ledger read.
        ledger: i64,
    },
    /// A later observation is smaller than an earlier one.
    #[error("validity period moved backwards")]
    Regression {
        /// Earlier observation.
        previous: i64,
        /// Later observation.
        current: i64,
    },
    /// Two observations differ by something other than a multiple of the interval.
    #[error("validity period delta is not a multiple of the interval")]
    Delta {
        /// Earlier observation.
        previous: i64,
        /// Later observation.
        current: i64,
        /// Configured interval in seconds.
        interval: i64,
    },
}

/// Require the gateway and ledger reads to agree, returning the shared value.
///
/// # Errors
///
/// Returns [`ConsistencyError::Mismatch`] when they differ.
pub const fn check_agreement(gateway: i64, ledger: i64) -> Result<i64, ConsistencyError> {
    if gateway == ledger {
        Ok(gateway)
    } else {
        Err(ConsistencyError::Mismatch { gateway, ledger })
    }
}

/// Require `current - previous` to be a non-negative multiple of `interval`,
/// returning the number of updates between the observations.
///
/// # Errors
///
/// Returns [`ConsistencyError::Regression`] when the value decreased and
/// [`ConsistencyError::Delta`] when the difference is not a whole number of
/// intervals (or the interval is not positive).
pub fn check_delta(previous: i64, current: i64, interval: i64) -> Result<u64, ConsistencyError> {
    let delta = i128::from(current) - i128::from(previous);
    if delta < 0 {
        return Err(ConsistencyError::Regression { previous, current });
    }
    let interval_wide = i128::from(interval);
    if interval_wide <= 0 || delta % interval_wide != 0 {
        return Err(ConsistencyError::Delta {
            previous,
            current,
            interval,
        });
    }
    u64::try_from(delta / interval_wide).map_err(|_| ConsistencyError::Delta {
        previous,
        current,
        interval,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_requires_identical_values() {
        assert_eq!(check_agreement(5, 5), Ok(5));
        assert_eq!(
            check_agreement(5, 6),
            Err(ConsistencyError::Mismatch {
                gateway: 5,
                ledger: 6
            })
        );
    }

    #[test]
    fn delta_counts_whole_intervals() {
        assert_eq!(check_delta(100, 100, 37), Ok(0));
        assert_eq!(check_delta(100, 137, 37), Ok(1));
        assert_eq!(check_delta(100, 100 + 37 * 4, 37), Ok(4));
    }

    #[test]
    fn delta_rejects_regressions_and_partial_steps() {
        assert!(matches!(
            check_delta(100, 63, 37),
            Err(ConsistencyError::Regression { .. })
        ));
        assert!(matches!(
            check_delta(100, 140, 37),
            Err(ConsistencyError::Delta { .. })
        ));
        assert!(matches!(
            check_delta(100, 100, 0),
            Err(ConsistencyError::Delta { .. })
        ));
    }
}
