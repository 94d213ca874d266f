//! Command handlers.

pub(crate) mod query;
pub(crate) mod state;
pub(crate) mod watch;
