#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Validity period peer bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (process wiring), `peer.rs` (ledger, chaincode,
//! scheduler, and API assembly), `error.rs`.

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application error type.
pub mod error;
/// Peer assembly.
pub mod peer;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
pub use peer::{Peer, open_ledger};
