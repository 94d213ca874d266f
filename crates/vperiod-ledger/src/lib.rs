#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Committed key/value state for deployed chaincodes.
//!
//! Layout: `model.rs` (keys, write sets, commits), `store.rs` (the
//! copy-on-write [`Ledger`] and the [`StateStore`] seam), `journal.rs`
//! (durable JSON-lines commit log), `error.rs` (error types).

pub mod error;
mod journal;
pub mod model;
pub mod store;

pub use error::{LedgerError, LedgerResult};
pub use journal::JOURNAL_FILE;
pub use model::{Commit, StateKey, StateWrite, VersionedValue, WriteSet};
pub use store::{Ledger, StateStore};
