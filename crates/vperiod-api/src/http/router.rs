//! Router construction and server host for the query gateway.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, Method, Request, header::CONTENT_TYPE},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Span, info};
use vperiod_chaincode::ChaincodeSupport;
use vperiod_events::EventBus;
use vperiod_ledger::Ledger;
use vperiod_telemetry::{Metrics, build_sha};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::chaincode::{get_chain, get_history, get_state, query_chaincode};
use crate::http::constants::{HEADER_LAST_EVENT_ID, HEADER_REQUEST_ID};
use crate::http::health::{health, metrics};
use crate::http::sse::stream_events;
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::ApiState;

/// Axum router wrapper hosting the gateway endpoints.
pub struct ApiServer {
    router: Router,
    state: Arc<ApiState>,
}

impl std::fmt::Debug for ApiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServer").finish_non_exhaustive()
    }
}

impl ApiServer {
    /// Wire the shared dependencies into application state and build the router.
    #[must_use]
    pub fn new(
        support: Arc<ChaincodeSupport>,
        ledger: Ledger,
        events: EventBus,
        telemetry: Metrics,
    ) -> Self {
        let state = Arc::new(ApiState::new(
            support,
            ledger,
            events,
            telemetry.clone(),
        ));
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, HeaderName::from_static(HEADER_LAST_EVENT_ID)]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let method = request.method().clone();
                let uri_path = request.uri().path();
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %method,
                    route = %uri_path,
                    request_id = %request_id,
                    mode = tracing::field::Empty,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(vperiod_telemetry::propagate_request_id_layer())
            .layer(vperiod_telemetry::set_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        let router = Self::build_router()
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(Arc::clone(&state));

        Self { router, state }
    }

    fn build_router() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route("/v1/chaincode/query", post(query_chaincode))
            .route("/v1/state/{chaincode_id}/{key}", get(get_state))
            .route("/v1/state/{chaincode_id}/{key}/history", get(get_history))
            .route("/v1/chain", get(get_chain))
            .route("/v1/events", get(stream_events))
    }

    /// Start mirroring health transitions from the event bus into `/health`.
    #[must_use]
    pub fn spawn_health_tracker(&self) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.state).track_health())
    }

    /// Router with state applied, for embedding or in-process requests.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the listener without serving yet.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] when the address cannot be bound and
    /// [`ApiServerError::LocalAddr`] when the bound address is unavailable.
    pub async fn bind(self, addr: SocketAddr) -> ApiServerResult<BoundApiServer> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ApiServerError::LocalAddr { source })?;
        info!(addr = %local_addr, "api listener bound");
        Ok(BoundApiServer {
            listener,
            local_addr,
            router: self.router,
        })
    }

    /// Serve the API on the supplied address until the server stops.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        self.bind(addr).await?.serve(std::future::pending()).await
    }
}

/// An [`ApiServer`] whose listener is bound.
#[derive(Debug)]
pub struct BoundApiServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
}

impl BoundApiServer {
    /// Address the listener accepted, with any ephemeral port resolved.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Serve`] when the server terminates unexpectedly.
    pub async fn serve<F>(self, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = %self.local_addr, "starting api");
        axum::serve(self.listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }
}
