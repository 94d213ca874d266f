//! Binary entrypoint that wires the peer services together and serves the
//! query gateway until ctrl-c.

use vperiod_app::{AppResult, run_app};

/// Bootstraps the peer and blocks until shutdown.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
