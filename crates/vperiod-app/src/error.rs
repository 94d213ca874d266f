//! # Design
//!
//! - Centralize application-level errors for bootstrap and peer wiring.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: vperiod_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: vperiod_telemetry::TelemetryError,
    },
    /// Ledger operations failed.
    #[error("ledger operation failed")]
    Ledger {
        /// Operation identifier.
        operation: &'static str,
        /// Source ledger error.
        source: vperiod_ledger::LedgerError,
    },
    /// Chaincode construction or deployment failed.
    #[error("chaincode operation failed")]
    Chaincode {
        /// Operation identifier.
        operation: &'static str,
        /// Source chaincode error.
        source: vperiod_chaincode::ChaincodeError,
    },
    /// Scheduler could not start or shut down cleanly.
    #[error("scheduler operation failed")]
    Scheduler {
        /// Operation identifier.
        operation: &'static str,
        /// Source scheduler error.
        source: vperiod_scheduler::SchedulerError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: vperiod_api::ApiServerError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: vperiod_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: vperiod_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn ledger(
        operation: &'static str,
        source: vperiod_ledger::LedgerError,
    ) -> Self {
        Self::Ledger { operation, source }
    }

    pub(crate) const fn chaincode(
        operation: &'static str,
        source: vperiod_chaincode::ChaincodeError,
    ) -> Self {
        Self::Chaincode { operation, source }
    }

    pub(crate) const fn scheduler(
        operation: &'static str,
        source: vperiod_scheduler::SchedulerError,
    ) -> Self {
        Self::Scheduler { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: vperiod_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn app_error_helpers_keep_sources() {
        let ledger = AppError::ledger("ledger.open", vperiod_ledger::LedgerError::EmptyWriteSet);
        assert!(matches!(
            ledger,
            AppError::Ledger {
                operation: "ledger.open",
                ..
            }
        ));
        assert_eq!(ledger.to_string(), "ledger operation failed");
        assert!(ledger.source().is_some());

        let chaincode = AppError::chaincode(
            "chaincode.deploy",
            vperiod_chaincode::ChaincodeError::AlreadyDeployed {
                chaincode_id: "cc".into(),
            },
        );
        assert!(matches!(chaincode, AppError::Chaincode { .. }));
    }
}
