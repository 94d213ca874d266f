//! Process bootstrap: configuration, logging, peer wiring, and the API
//! listener, torn down on ctrl-c.

use tracing::{error, info, warn};
use vperiod_config::PeerConfig;
use vperiod_events::EventBus;
use vperiod_telemetry::{
    GlobalContextGuard, LogFormat, LoggingConfig, Metrics, build_sha, record_app_mode,
};

use crate::error::{AppError, AppResult};
use crate::peer::{Peer, open_ledger};

/// Dependencies required to bootstrap the peer.
pub(crate) struct BootstrapDependencies {
    config: PeerConfig,
    events: EventBus,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config = vperiod_config::load_from_env()
            .map_err(|err| AppError::config("config.load_from_env", err))?;
        Self::with_config(config)
    }

    pub(crate) fn with_config(config: PeerConfig) -> AppResult<Self> {
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            config,
            events: EventBus::new(),
            telemetry,
        })
    }
}

/// Entry point for the peer boot sequence.
///
/// # Errors
///
/// Returns an error if dependency construction or startup fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    let format = LogFormat::parse(&dependencies.config.logging.format).unwrap_or_else(LogFormat::infer);
    let logging = LoggingConfig {
        level: &dependencies.config.logging.level,
        format,
        build_sha: build_sha(),
    };
    vperiod_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("peer");

    run_app_with(dependencies, shutdown_signal()).await
}

/// Boot sequence that relies entirely on injected dependencies and an
/// injected shutdown signal.
pub(crate) async fn run_app_with<F>(dependencies: BootstrapDependencies, shutdown: F) -> AppResult<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    info!("validity period peer bootstrap starting");
    let BootstrapDependencies {
        config,
        events,
        telemetry,
    } = dependencies;

    let ledger = open_ledger(config.ledger.path.as_deref())?;
    let mut peer = Peer::start(&config.validity_period, ledger, events, telemetry).await?;
    let api = peer.api_server();

    let addr = config.server.socket_addr();
    info!(addr = %addr, "launching api listener");
    let serve_result = match api.bind(addr).await {
        Ok(bound) => {
            record_app_mode("serving");
            bound.serve(shutdown).await
        }
        Err(err) => Err(err),
    };

    if let Err(err) = peer.shutdown().await {
        error!(error = %err, "peer shutdown failed");
    }
    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("api server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn config(port: u16) -> PeerConfig {
        let mut config = PeerConfig::default();
        config.server.bind_addr = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.server.http_port = port;
        config
    }

    #[tokio::test]
    async fn bind_failure_is_reported_after_peer_teardown() {
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = occupied.local_addr().expect("addr").port();
        let deps = BootstrapDependencies::with_config(config(port)).expect("deps");
        let result = run_app_with(deps, std::future::pending()).await;
        assert!(matches!(
            result,
            Err(AppError::ApiServer {
                source: vperiod_api::ApiServerError::Bind { .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn shutdown_signal_stops_the_peer() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        let deps = BootstrapDependencies::with_config(config(port)).expect("deps");
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_app_with(deps, tokio::time::sleep(Duration::from_millis(50))),
        )
        .await
        .expect("peer stops on signal");
        assert!(result.is_ok());
    }
}
