//! Scheduler task and its handle.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};
use vperiod_chaincode::{Chaincode, ValidityPeriodChaincode};
use vperiod_events::{Event, EventBus};
use vperiod_ledger::StateStore;
use vperiod_telemetry::Metrics;

use crate::error::{SchedulerError, SchedulerResult};

const COMPONENT: &str = "scheduler";

/// Signal published after every successful update commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateCommitted {
    /// 1-based tick that produced the commit.
    pub tick: u64,
    /// Committed validity period.
    pub value: i64,
    /// Ledger height of the commit.
    pub height: u64,
}

/// Drives [`ValidityPeriodChaincode::update`] once per interval.
pub struct Scheduler {
    chaincode: Arc<ValidityPeriodChaincode>,
    store: Arc<dyn StateStore>,
    events: EventBus,
    metrics: Metrics,
    interval: Duration,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("chaincode_id", &self.chaincode.id())
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Scheduler firing every `interval_secs` of the chaincode.
    #[must_use]
    pub fn new(
        chaincode: Arc<ValidityPeriodChaincode>,
        store: Arc<dyn StateStore>,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        let interval = Duration::from_secs(chaincode.interval_secs().unsigned_abs());
        Self {
            chaincode,
            store,
            events,
            metrics,
            interval,
        }
    }

    /// Start the background task. The first tick fires one interval from now.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::IntervalOutOfRange`] when the first deadline
    /// cannot be represented by the clock.
    pub fn spawn(self) -> SchedulerResult<SchedulerHandle> {
        let start = Instant::now()
            .checked_add(self.interval)
            .ok_or(SchedulerError::IntervalOutOfRange {
                interval_secs: self.interval.as_secs(),
            })?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (commits_tx, commits_rx) = watch::channel(None);
        info!(
            chaincode_id = %self.chaincode.id(),
            interval_secs = self.interval.as_secs(),
            "validity period scheduler started"
        );
        let join = tokio::spawn(self.run(start, shutdown_rx, commits_tx));
        Ok(SchedulerHandle {
            join,
            shutdown: shutdown_tx,
            commits: commits_rx,
        })
    }

    async fn run(
        self,
        start: Instant,
        mut shutdown: watch::Receiver<bool>,
        commits: watch::Sender<Option<UpdateCommitted>>,
    ) {
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut worker = Worker {
            scheduler: &self,
            commits,
            health: BTreeSet::new(),
        };
        let mut tick = 0_u64;

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    tick += 1;
                    worker.fire(tick);
                }
            }
        }
        info!(chaincode_id = %self.chaincode.id(), ticks = tick, "validity period scheduler stopped");
    }
}

struct Worker<'a> {
    scheduler: &'a Scheduler,
    commits: watch::Sender<Option<UpdateCommitted>>,
    health: BTreeSet<String>,
}

impl Worker<'_> {
    fn fire(&mut self, tick: u64) {
        let scheduler = self.scheduler;
        let chaincode_id = scheduler.chaincode.id().to_string();
        match scheduler.chaincode.update(Arc::clone(&scheduler.store)) {
            Ok(update) => {
                scheduler.metrics.record_update(update.value, update.height);
                self.commits.send_replace(Some(UpdateCommitted {
                    tick,
                    value: update.value,
                    height: update.height,
                }));
                debug!(
                    chaincode_id = %chaincode_id,
                    tick,
                    value = update.value,
                    height = update.height,
                    "scheduled update committed"
                );
                self.publish(Event::ValidityPeriodAdvanced {
                    chaincode_id,
                    value: update.value,
                    tick,
                    height: update.height,
                });
                self.mark_recovered();
            }
            Err(err) => {
                scheduler.metrics.inc_update_failure();
                warn!(
                    chaincode_id = %chaincode_id,
                    tick,
                    error = %err,
                    detail = ?err,
                    "scheduled update failed; retrying next tick"
                );
                self.publish(Event::UpdateFailed {
                    chaincode_id,
                    tick,
                    message: format!("{err}: {err:?}"),
                });
                self.mark_degraded();
            }
        }
    }

    fn publish(&self, event: Event) {
        let kind = event.kind();
        match self.scheduler.events.publish(event) {
            Ok(_) => self.scheduler.metrics.inc_event(kind),
            Err(err) => warn!(error = %err, event_kind = kind, "failed to publish scheduler event"),
        }
    }

    fn mark_degraded(&mut self) {
        if self.health.insert(COMPONENT.to_string()) {
            let degraded = self.health.iter().cloned().collect::<Vec<_>>();
            self.publish(Event::HealthChanged { degraded });
            warn!(component = COMPONENT, "component degraded");
        }
    }

    fn mark_recovered(&mut self) {
        if self.health.remove(COMPONENT) {
            let degraded = self.health.iter().cloned().collect::<Vec<_>>();
            self.publish(Event::HealthChanged { degraded });
            info!(component = COMPONENT, "component recovered");
        }
    }
}

/// Handle to the running scheduler. Dropping it stops the task at its next
/// wake-up.
#[derive(Debug)]
pub struct SchedulerHandle {
    join: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
    commits: watch::Receiver<Option<UpdateCommitted>>,
}

impl SchedulerHandle {
    /// Receiver observing the last committed update (`None` before the first).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<UpdateCommitted>> {
        self.commits.clone()
    }

    /// Last committed update, if any.
    #[must_use]
    pub fn last_commit(&self) -> Option<UpdateCommitted> {
        *self.commits.borrow()
    }

    /// Whether the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop the task and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Join`] when the task panicked.
    pub async fn shutdown(self) -> SchedulerResult<()> {
        let _ = self.shutdown.send(true);
        self.join
            .await
            .map_err(|source| SchedulerError::Join { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vperiod_chaincode::ChaincodeRegistry;
    use vperiod_ledger::Ledger;

    async fn scheduler(interval: u64) -> (Scheduler, Arc<Ledger>, EventBus, Metrics) {
        let ledger = Arc::new(Ledger::in_memory());
        let registry = ChaincodeRegistry::new(ledger.clone());
        let chaincode = Arc::new(
            ValidityPeriodChaincode::new("cc", Duration::from_secs(interval), 1_000)
                .expect("chaincode"),
        );
        registry.deploy(chaincode.clone()).await.expect("deploy");
        let events = EventBus::new();
        let metrics = Metrics::new().expect("metrics");
        (
            Scheduler::new(chaincode, ledger.clone(), events.clone(), metrics.clone()),
            ledger,
            events,
            metrics,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_interval() {
        let (scheduler, _ledger, _events, _metrics) = scheduler(37).await;
        let handle = scheduler.spawn().expect("spawn");
        let mut commits = handle.subscribe();

        tokio::time::sleep(Duration::from_secs(36)).await;
        assert_eq!(handle.last_commit(), None);

        commits.changed().await.expect("commit");
        let first = handle.last_commit().expect("first commit");
        assert_eq!((first.tick, first.value, first.height), (1, 1_037, 2));

        handle.shutdown().await.expect("shutdown");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_further_updates() {
        let (scheduler, ledger, _events, metrics) = scheduler(5).await;
        let handle = scheduler.spawn().expect("spawn");
        let mut commits = handle.subscribe();
        commits
            .wait_for(|update| update.is_some_and(|u| u.tick == 3))
            .await
            .expect("three ticks");
        handle.shutdown().await.expect("shutdown");

        let height = StateStore::height(ledger.as_ref());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(StateStore::height(ledger.as_ref()), height);
        assert_eq!(metrics.snapshot().updates_total, 3);
        assert_eq!(metrics.snapshot().validity_period_value, 1_015);
    }

    #[tokio::test]
    async fn unrepresentable_interval_is_rejected_before_spawning() {
        let (scheduler, ledger, _events, _metrics) = scheduler(i64::MAX.unsigned_abs()).await;
        assert!(matches!(
            scheduler.spawn(),
            Err(SchedulerError::IntervalOutOfRange { interval_secs }) if interval_secs == i64::MAX.unsigned_abs()
        ));
        assert_eq!(StateStore::height(ledger.as_ref()), 1);
    }
}
