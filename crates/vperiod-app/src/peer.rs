//! A wired peer: ledger, deployed validity period chaincode, query gateway,
//! scheduler, and the API built over them.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use vperiod_api::ApiServer;
use vperiod_chaincode::{
    ChaincodeRegistry, ChaincodeSupport, LocalGateway, ValidityPeriodChaincode,
};
use vperiod_config::ValidityPeriodConfig;
use vperiod_events::{Event, EventBus};
use vperiod_ledger::{Ledger, StateStore};
use vperiod_scheduler::{Scheduler, SchedulerHandle};
use vperiod_telemetry::Metrics;

use crate::error::{AppError, AppResult};

/// Running peer services. Dropping it stops the scheduler; call
/// [`Peer::shutdown`] to wait for it.
pub struct Peer {
    chaincode_id: String,
    ledger: Ledger,
    support: Arc<ChaincodeSupport>,
    events: EventBus,
    telemetry: Metrics,
    scheduler: SchedulerHandle,
    background: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("chaincode_id", &self.chaincode_id)
            .field("ledger", &self.ledger)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Peer {
    /// Deploy the validity period chaincode on `ledger` (genesis) and start
    /// its scheduler. An already initialised value is kept.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Chaincode`] when the chaincode cannot be built or
    /// deployed.
    pub async fn start(
        settings: &ValidityPeriodConfig,
        ledger: Ledger,
        events: EventBus,
        telemetry: Metrics,
    ) -> AppResult<Self> {
        let initial_value = settings
            .initial_value
            .resolve(chrono::Utc::now().timestamp());
        let chaincode = Arc::new(
            ValidityPeriodChaincode::new(
                settings.chaincode_id.clone(),
                settings.update_interval(),
                initial_value,
            )
            .map_err(|err| AppError::chaincode("chaincode.new", err))?,
        );

        let store: Arc<dyn StateStore> = Arc::new(ledger.clone());
        let registry = Arc::new(ChaincodeRegistry::new(Arc::clone(&store)));
        let genesis = registry
            .deploy(chaincode.clone())
            .await
            .map_err(|err| AppError::chaincode("chaincode.deploy", err))?;
        telemetry.set_ledger_height(store.height());
        publish_event(
            &events,
            &telemetry,
            Event::ChaincodeDeployed {
                chaincode_id: settings.chaincode_id.clone(),
            },
        );
        info!(
            chaincode_id = %settings.chaincode_id,
            genesis_height = genesis.as_ref().map(|commit| commit.height),
            interval_secs = settings.update_interval_secs,
            "validity period chaincode ready"
        );

        let support = Arc::new(
            ChaincodeSupport::new(registry, settings.invoker_token.clone())
                .with_metrics(telemetry.clone()),
        );
        let scheduler = Scheduler::new(chaincode, store, events.clone(), telemetry.clone())
            .spawn()
            .map_err(|err| AppError::scheduler("scheduler.spawn", err))?;

        Ok(Self {
            chaincode_id: settings.chaincode_id.clone(),
            ledger,
            support,
            events,
            telemetry,
            scheduler,
            background: Vec::new(),
        })
    }

    /// Build the HTTP API over this peer and start its health tracker.
    pub fn api_server(&mut self) -> ApiServer {
        let api = ApiServer::new(
            Arc::clone(&self.support),
            self.ledger.clone(),
            self.events.clone(),
            self.telemetry.clone(),
        );
        self.background.push(api.spawn_health_tracker());
        api
    }

    /// In-process query gateway for the deployed chaincode.
    #[must_use]
    pub fn gateway(&self) -> LocalGateway {
        LocalGateway::new(Arc::clone(&self.support), self.chaincode_id.clone())
    }

    /// Deployed chaincode id.
    #[must_use]
    pub fn chaincode_id(&self) -> &str {
        &self.chaincode_id
    }

    /// Backing ledger.
    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Scheduler driving updates.
    #[must_use]
    pub const fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    /// Event bus shared by the peer's services.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Stop the scheduler and background tasks.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Scheduler`] when the scheduler task panicked.
    pub async fn shutdown(self) -> AppResult<()> {
        for task in self.background {
            task.abort();
        }
        self.scheduler
            .shutdown()
            .await
            .map_err(|err| AppError::scheduler("scheduler.shutdown", err))?;
        info!(chaincode_id = %self.chaincode_id, "peer stopped");
        Ok(())
    }
}

/// Open the configured ledger: durable when a path is set, in memory otherwise.
///
/// # Errors
///
/// Returns [`AppError::Ledger`] when the journal cannot be opened or replayed.
pub fn open_ledger(path: Option<&std::path::Path>) -> AppResult<Ledger> {
    match path {
        Some(path) => Ledger::open(path).map_err(|err| AppError::ledger("ledger.open", err)),
        None => {
            warn!("no ledger path configured; state will not survive restarts");
            Ok(Ledger::in_memory())
        }
    }
}

fn publish_event(events: &EventBus, telemetry: &Metrics, event: Event) {
    let kind = event.kind();
    match events.publish(event) {
        Ok(_) => telemetry.inc_event(kind),
        Err(error) => warn!(
            event_id = error.event_id(),
            event_kind = error.event_kind(),
            error = %error,
            "failed to publish event"
        ),
    }
}
