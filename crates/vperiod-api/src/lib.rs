#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! HTTP surface of the query gateway.
//!
//! Layout: `http/router.rs` (server host and layers), `http/chaincode.rs`
//! (query, direct state read, chain height), `http/sse.rs` (event stream),
//! `http/health.rs` (health and metrics), `http/errors.rs` (problem
//! responses), `http/telemetry.rs` (metrics middleware), `state.rs`,
//! `models.rs`, `error.rs`.

pub mod error;
pub mod http;
pub mod models;
mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::{ApiServer, BoundApiServer};
pub use models::{ChainResponse, HealthResponse, HistoryEntry, ProblemDetails, StateResponse};
