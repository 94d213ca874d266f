//! `vperiod` binary entrypoint.

#[tokio::main]
async fn main() {
    std::process::exit(vperiod_cli::run().await);
}
