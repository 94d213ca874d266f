//! # Design
//!
//! - Chaincode failures and gateway failures are distinct types: the gateway
//!   separates parse problems from transport problems and from chaincode-side
//!   rejections.
//! - Messages are constant; identifiers and offending values live in fields.

use std::error::Error as StdError;

use thiserror::Error;
use vperiod_ledger::LedgerError;

/// Result type for chaincode operations.
pub type ChaincodeResult<T> = Result<T, ChaincodeError>;

/// Result type for gateway queries.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors raised by the chaincode runtime and the validity period chaincode.
#[derive(Debug, Error)]
pub enum ChaincodeError {
    /// No chaincode is deployed under the requested id.
    #[error("unknown chaincode")]
    UnknownChaincode {
        /// Requested id.
        chaincode_id: String,
    },
    /// A chaincode with the same id is already deployed.
    #[error("chaincode already deployed")]
    AlreadyDeployed {
        /// Duplicate id.
        chaincode_id: String,
    },
    /// The requested function is not externally dispatchable.
    #[error("unknown chaincode function")]
    UnknownFunction {
        /// Requested function.
        function: String,
    },
    /// Invocation arguments were rejected.
    #[error("invalid chaincode arguments")]
    InvalidArguments {
        /// Machine-readable reason.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The invoker token was not accepted.
    #[error("invoker not authorised")]
    Unauthorized {
        /// Chaincode the invocation targeted.
        chaincode_id: String,
    },
    /// The key has never been initialised.
    #[error("state not found")]
    NotFound {
        /// Owning chaincode.
        chaincode_id: String,
        /// Missing key.
        key: String,
    },
    /// Stored bytes are not a decimal integer.
    #[error("stored state corrupt")]
    Corrupt {
        /// Key holding the bad value.
        key: String,
        /// Lossy rendering of the stored bytes.
        value: String,
    },
    /// Advancing the value would overflow `i64`.
    #[error("validity period overflow")]
    Overflow {
        /// Current value.
        value: i64,
        /// Increment that overflowed.
        interval: i64,
    },
    /// The ledger rejected a read or commit.
    #[error("ledger operation failed")]
    Ledger {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying ledger error.
        source: LedgerError,
    },
    /// A response payload could not be serialised.
    #[error("payload encode failed")]
    Encode {
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

impl ChaincodeError {
    pub(crate) fn ledger(operation: &'static str) -> impl FnOnce(LedgerError) -> Self {
        move |source| Self::Ledger { operation, source }
    }

    /// Short label used for the `outcome` metric dimension.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::UnknownChaincode { .. } => "unknown_chaincode",
            Self::AlreadyDeployed { .. } => "already_deployed",
            Self::UnknownFunction { .. } => "unknown_function",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::Unauthorized { .. } => "unauthorized",
            Self::NotFound { .. } => "not_found",
            Self::Corrupt { .. } => "corrupt",
            Self::Overflow { .. } => "overflow",
            Self::Ledger { .. } => "ledger",
            Self::Encode { .. } => "encode",
        }
    }
}

/// Errors surfaced by [`crate::QueryGateway`] implementations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The response payload was not a `{Name, Value}` document with a decimal value.
    #[error("gateway payload malformed")]
    Parse {
        /// Machine-readable reason.
        reason: &'static str,
        /// Offending payload or value when available.
        payload: Option<String>,
    },
    /// The request never produced a chaincode response.
    #[error("gateway transport failure")]
    Transport {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying transport error.
        source: Box<dyn StdError + Send + Sync>,
    },
    /// The chaincode side refused or failed the query.
    #[error("chaincode rejected query")]
    Rejected {
        /// HTTP status when the rejection came over the wire.
        status: Option<u16>,
        /// Rendered rejection detail.
        detail: String,
    },
}

impl From<ChaincodeError> for GatewayError {
    fn from(err: ChaincodeError) -> Self {
        Self::Rejected {
            status: None,
            detail: format!("{}: {err:?}", err.outcome()),
        }
    }
}
