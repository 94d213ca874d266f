//! HTTP surface modules (router, handlers, middleware).

/// Chaincode query and direct ledger read handlers.
pub mod chaincode;
/// Shared constants and header names.
pub mod constants;
/// Problem response helpers and error types.
pub mod errors;
/// Health and metrics endpoints.
pub mod health;
/// Router construction and server host.
pub mod router;
/// Server-sent event streaming.
pub mod sse;
/// Metrics middleware for HTTP requests.
pub mod telemetry;
