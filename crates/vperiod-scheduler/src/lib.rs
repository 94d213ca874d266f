#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Fixed-interval driver for the validity period update path.
//!
//! One background task fires once per interval, awaits the update in-loop (so
//! updates never overlap), and publishes each commit on a watch channel and the
//! event bus.

pub mod error;
pub mod worker;

pub use error::{SchedulerError, SchedulerResult};
pub use worker::{Scheduler, SchedulerHandle, UpdateCommitted};
