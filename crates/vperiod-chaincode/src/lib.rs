#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Chaincode runtime, the validity period system chaincode, and the query
//! gateway contract.
//!
//! Layout: `runtime.rs` (trait, stub, registry, support), `invocation.rs`
//! (wire messages), `validity.rs` (the validity period chaincode),
//! `gateway.rs` (query gateway and direct ledger read), `consistency.rs`
//! (cross-path invariants), `error.rs`.

pub mod consistency;
pub mod error;
pub mod gateway;
pub mod invocation;
pub mod runtime;
pub mod validity;

pub use consistency::{ConsistencyError, check_agreement, check_delta};
pub use error::{ChaincodeError, ChaincodeResult, GatewayError, GatewayResult};
pub use gateway::{LocalGateway, QueryGateway, decode_validity_period, read_validity_period};
pub use invocation::{ChaincodeInvocationSpec, QUERY_FUNCTION, QueryResponse, SYSTEM_INVOKER};
pub use runtime::{Chaincode, ChaincodeRegistry, ChaincodeStub, ChaincodeSupport};
pub use validity::{
    VALIDITY_PERIOD_KEY, ValidityPeriodChaincode, ValidityPeriodPayload, ValidityUpdate,
};
