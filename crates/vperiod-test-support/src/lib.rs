#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (in-process peer), mocks.rs (fault-injecting store).

pub mod fixtures;
pub mod mocks;

pub use fixtures::{FixtureOptions, PeerFixture};
pub use mocks::FaultyStore;
