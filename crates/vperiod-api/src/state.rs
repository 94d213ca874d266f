//! Shared handler state and health tracking.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use vperiod_chaincode::ChaincodeSupport;
use vperiod_events::{Event, EventBus};
use vperiod_ledger::Ledger;
use vperiod_telemetry::Metrics;

pub(crate) struct ApiState {
    pub(crate) support: Arc<ChaincodeSupport>,
    pub(crate) ledger: Ledger,
    pub(crate) events: EventBus,
    pub(crate) telemetry: Metrics,
    health_status: Mutex<Vec<String>>,
}

impl ApiState {
    pub(crate) fn new(
        support: Arc<ChaincodeSupport>,
        ledger: Ledger,
        events: EventBus,
        telemetry: Metrics,
    ) -> Self {
        Self {
            support,
            ledger,
            events,
            telemetry,
            health_status: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn current_health_degraded(&self) -> Vec<String> {
        self.health_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_degraded(&self, mut degraded: Vec<String>) {
        degraded.sort();
        degraded.dedup();
        debug!(degraded = ?degraded, "health status updated");
        *self
            .health_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = degraded;
    }

    /// Mirror `HealthChanged` events into the health snapshot until the bus
    /// closes. Buffered events are replayed first so earlier transitions count.
    pub(crate) async fn track_health(self: Arc<Self>) {
        let mut stream = self.events.subscribe(Some(0));
        while let Some(envelope) = stream.next().await {
            if let Event::HealthChanged { degraded } = envelope.event {
                self.replace_degraded(degraded);
            }
        }
    }
}
