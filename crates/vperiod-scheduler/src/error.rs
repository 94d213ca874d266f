//! Error types for the scheduler task.

use thiserror::Error;
use tokio::task::JoinError;

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors surfaced by the scheduler. Update failures are not errors here:
/// they are logged, counted, and retried on the next tick.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The first deadline overflows the clock.
    #[error("scheduler interval out of range")]
    IntervalOutOfRange {
        /// Configured interval in seconds.
        interval_secs: u64,
    },
    /// The background task panicked or was cancelled.
    #[error("scheduler task failed")]
    Join {
        /// Underlying join error.
        source: JoinError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_errors_keep_constant_message() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let source = handle.await.expect_err("aborted");
        let err = SchedulerError::Join { source };
        assert_eq!(err.to_string(), "scheduler task failed");
    }
}
