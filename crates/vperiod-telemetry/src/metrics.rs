//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauges relevant to the validity period peer.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    chaincode_queries_total: IntCounterVec,
    updates_total: IntCounter,
    update_failures_total: IntCounter,
    validity_period_value: IntGauge,
    ledger_height: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Successful scheduled updates.
    pub updates_total: u64,
    /// Failed scheduled updates.
    pub update_failures_total: u64,
    /// Last committed validity period value.
    pub validity_period_value: i64,
    /// Current ledger height.
    pub ledger_height: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["route", "code"],
        )
        .map_err(collector_error("http_requests_total"))?;
        let events_emitted_total = IntCounterVec::new(
            Opts::new("events_emitted_total", "Peer events emitted by type"),
            &["type"],
        )
        .map_err(collector_error("events_emitted_total"))?;
        let chaincode_queries_total = IntCounterVec::new(
            Opts::new(
                "chaincode_queries_total",
                "Chaincode query invocations by outcome",
            ),
            &["outcome"],
        )
        .map_err(collector_error("chaincode_queries_total"))?;
        let updates_total = IntCounter::with_opts(Opts::new(
            "validity_period_updates_total",
            "Validity period updates committed by the scheduler",
        ))
        .map_err(collector_error("validity_period_updates_total"))?;
        let update_failures_total = IntCounter::with_opts(Opts::new(
            "validity_period_update_failures_total",
            "Scheduled validity period updates that failed",
        ))
        .map_err(collector_error("validity_period_update_failures_total"))?;
        let validity_period_value = IntGauge::with_opts(Opts::new(
            "validity_period_value",
            "Last committed validity period value (seconds)",
        ))
        .map_err(collector_error("validity_period_value"))?;
        let ledger_height =
            IntGauge::with_opts(Opts::new("ledger_height", "Committed ledger height"))
                .map_err(collector_error("ledger_height"))?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "events_emitted_total", &events_emitted_total)?;
        register(&registry, "chaincode_queries_total", &chaincode_queries_total)?;
        register(&registry, "validity_period_updates_total", &updates_total)?;
        register(
            &registry,
            "validity_period_update_failures_total",
            &update_failures_total,
        )?;
        register(&registry, "validity_period_value", &validity_period_value)?;
        register(&registry, "ledger_height", &ledger_height)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                events_emitted_total,
                chaincode_queries_total,
                updates_total,
                update_failures_total,
                validity_period_value,
                ledger_height,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Count a chaincode query by outcome (`ok`, `not_found`, `error`, ...).
    pub fn inc_chaincode_query(&self, outcome: &str) {
        self.inner
            .chaincode_queries_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a committed update and its resulting value and height.
    pub fn record_update(&self, value: i64, height: u64) {
        self.inner.updates_total.inc();
        self.inner.validity_period_value.set(value);
        self.set_ledger_height(height);
    }

    /// Increment the failed update counter.
    pub fn inc_update_failure(&self) {
        self.inner.update_failures_total.inc();
    }

    /// Set the ledger height gauge.
    pub fn set_ledger_height(&self, height: u64) {
        self.inner
            .ledger_height
            .set(i64::try_from(height).unwrap_or(i64::MAX));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            updates_total: self.inner.updates_total.get(),
            update_failures_total: self.inner.update_failures_total.get(),
            validity_period_value: self.inner.validity_period_value.get(),
            ledger_height: self.inner.ledger_height.get(),
        }
    }
}

fn collector_error(name: &'static str) -> impl FnOnce(prometheus::Error) -> TelemetryError {
    move |source| TelemetryError::MetricsCollector { name, source }
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
