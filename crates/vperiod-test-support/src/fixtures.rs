//! In-process peer fixture: ledger, deployed validity period chaincode,
//! query gateway, and a running scheduler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;
use vperiod_chaincode::{
    ChaincodeRegistry, ChaincodeSupport, LocalGateway, QueryGateway, SYSTEM_INVOKER,
    ValidityPeriodChaincode, check_agreement, read_validity_period,
};
use vperiod_events::EventBus;
use vperiod_ledger::{Ledger, StateStore};
use vperiod_scheduler::{Scheduler, SchedulerHandle, UpdateCommitted};
use vperiod_telemetry::Metrics;

/// Knobs for [`PeerFixture::setup`].
#[derive(Debug, Clone)]
pub struct FixtureOptions {
    /// Id the chaincode is deployed under.
    pub chaincode_id: String,
    /// Scheduler interval.
    pub interval: Duration,
    /// Value written at deployment.
    pub initial_value: i64,
    /// Back the ledger with a journal in a temporary directory.
    pub durable: bool,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            chaincode_id: "validity_period_chaincode".to_string(),
            interval: Duration::from_secs(37),
            initial_value: 1_700_000_000,
            durable: false,
        }
    }
}

/// A running peer. Call [`PeerFixture::teardown`] to stop the scheduler and
/// remove any journal.
pub struct PeerFixture {
    options: FixtureOptions,
    dir: Option<TempDir>,
    ledger: Ledger,
    support: Arc<ChaincodeSupport>,
    gateway: LocalGateway,
    events: EventBus,
    metrics: Metrics,
    scheduler: Option<SchedulerHandle>,
}

impl std::fmt::Debug for PeerFixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerFixture")
            .field("options", &self.options)
            .field("ledger", &self.ledger)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl PeerFixture {
    /// Open the ledger, deploy the chaincode, and start the scheduler.
    ///
    /// # Errors
    ///
    /// Fails when the ledger cannot be opened or the chaincode cannot be deployed.
    pub async fn setup(options: FixtureOptions) -> Result<Self> {
        let (dir, ledger) = if options.durable {
            let dir = tempfile::tempdir().context("create ledger dir")?;
            let ledger = Ledger::open(dir.path()).context("open ledger")?;
            (Some(dir), ledger)
        } else {
            (None, Ledger::in_memory())
        };
        let store: Arc<dyn StateStore> = Arc::new(ledger.clone());
        let metrics = Metrics::new().context("metrics")?;
        let events = EventBus::new();

        let chaincode = Arc::new(
            ValidityPeriodChaincode::new(
                options.chaincode_id.clone(),
                options.interval,
                options.initial_value,
            )
            .context("chaincode")?,
        );
        let registry = Arc::new(ChaincodeRegistry::new(Arc::clone(&store)));
        registry
            .deploy(chaincode.clone())
            .await
            .context("deploy chaincode")?;
        let support = Arc::new(
            ChaincodeSupport::new(registry, SYSTEM_INVOKER).with_metrics(metrics.clone()),
        );
        let gateway = LocalGateway::new(Arc::clone(&support), options.chaincode_id.clone());
        let scheduler = Scheduler::new(chaincode, store, events.clone(), metrics.clone())
            .spawn()
            .context("spawn scheduler")?;

        Ok(Self {
            options,
            dir,
            ledger,
            support,
            gateway,
            events,
            metrics,
            scheduler: Some(scheduler),
        })
    }

    /// Fixture with [`FixtureOptions::default`].
    ///
    /// # Errors
    ///
    /// See [`PeerFixture::setup`].
    pub async fn setup_default() -> Result<Self> {
        Self::setup(FixtureOptions::default()).await
    }

    /// Wait until the scheduler has committed tick `tick`.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler is stopped or exits first.
    pub async fn wait_for_commit(&self, tick: u64) -> Result<UpdateCommitted> {
        let handle = self
            .scheduler
            .as_ref()
            .ok_or_else(|| anyhow!("scheduler stopped"))?;
        let mut commits = handle.subscribe();
        let committed = commits
            .wait_for(|update| update.is_some_and(|update| update.tick >= tick))
            .await
            .context("scheduler exited")?;
        (*committed).ok_or_else(|| anyhow!("no commit observed"))
    }

    /// Read through the query gateway.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures.
    pub async fn query_validity_period(&self) -> Result<i64> {
        Ok(self.gateway.query_validity_period().await?)
    }

    /// Read the ledger directly.
    ///
    /// # Errors
    ///
    /// Fails when the key is missing or corrupt.
    pub fn ledger_value(&self) -> Result<i64> {
        Ok(read_validity_period(&self.ledger, &self.options.chaincode_id)?)
    }

    /// Read through both paths and require them to agree.
    ///
    /// # Errors
    ///
    /// Fails on either read failing or on a mismatch.
    pub async fn check_agreement(&self) -> Result<i64> {
        let gateway = self.query_validity_period().await?;
        let ledger = self.ledger_value()?;
        Ok(check_agreement(gateway, ledger)?)
    }

    /// Interval in whole seconds.
    #[must_use]
    pub const fn interval_secs(&self) -> u64 {
        self.options.interval.as_secs()
    }

    /// Deployed chaincode id.
    #[must_use]
    pub fn chaincode_id(&self) -> &str {
        &self.options.chaincode_id
    }

    /// Backing ledger.
    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Chaincode dispatcher.
    #[must_use]
    pub const fn support(&self) -> &Arc<ChaincodeSupport> {
        &self.support
    }

    /// Event bus the scheduler publishes to.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Shared metrics.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Stop the scheduler and remove any journal.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler task panicked or the journal cannot be removed.
    pub async fn teardown(mut self) -> Result<()> {
        if let Some(handle) = self.scheduler.take() {
            handle.shutdown().await.context("stop scheduler")?;
        }
        if let Some(dir) = self.dir.take() {
            Ledger::destroy(dir.path()).context("destroy ledger")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fixture_paths_agree_across_ticks() -> Result<()> {
        let fixture = PeerFixture::setup(FixtureOptions {
            interval: Duration::from_secs(5),
            initial_value: 100,
            ..FixtureOptions::default()
        })
        .await?;
        assert_eq!(fixture.check_agreement().await?, 100);

        let committed = fixture.wait_for_commit(2).await?;
        assert_eq!(committed.value, 110);
        assert_eq!(fixture.check_agreement().await?, 110);
        fixture.teardown().await
    }

    #[tokio::test(start_paused = true)]
    async fn durable_fixture_removes_its_journal() -> Result<()> {
        let fixture = PeerFixture::setup(FixtureOptions {
            durable: true,
            ..FixtureOptions::default()
        })
        .await?;
        let path = fixture
            .ledger()
            .path()
            .map(std::path::Path::to_path_buf)
            .ok_or_else(|| anyhow!("durable ledger has a path"))?;
        fixture.wait_for_commit(1).await?;
        fixture.teardown().await?;
        assert!(!path.exists());
        Ok(())
    }
}
