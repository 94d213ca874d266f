use std::sync::Arc;
use std::time::Duration;

use vperiod_chaincode::{ChaincodeRegistry, ValidityPeriodChaincode, read_validity_period};
use vperiod_events::{Event, EventBus};
use vperiod_ledger::Ledger;
use vperiod_scheduler::Scheduler;
use vperiod_telemetry::Metrics;
use vperiod_test_support::FaultyStore;

#[tokio::test(start_paused = true)]
async fn failed_tick_is_reported_and_retried_next_tick() -> anyhow::Result<()> {
    let store = Arc::new(FaultyStore::new(Ledger::in_memory()));
    let registry = ChaincodeRegistry::new(store.clone());
    let chaincode = Arc::new(ValidityPeriodChaincode::new("cc", Duration::from_secs(10), 0)?);
    registry.deploy(chaincode.clone()).await?;

    let events = EventBus::new();
    let mut stream = events.subscribe(None);
    let metrics = Metrics::new()?;
    store.fail_commits(true);
    let handle = Scheduler::new(chaincode, store.clone(), events.clone(), metrics.clone()).spawn()?;

    let failed = stream.next().await.expect("event");
    assert!(matches!(
        failed.event,
        Event::UpdateFailed { tick: 1, ref chaincode_id, .. } if chaincode_id == "cc"
    ));
    let health = stream.next().await.expect("event");
    assert_eq!(
        health.event,
        Event::HealthChanged {
            degraded: vec!["scheduler".to_string()]
        }
    );
    assert_eq!(read_validity_period(store.as_ref(), "cc")?, 0);

    store.fail_commits(false);
    let mut commits = handle.subscribe();
    let committed = commits
        .wait_for(Option::is_some)
        .await?
        .expect("commit");
    assert_eq!((committed.tick, committed.value), (2, 10));

    let advanced = stream.next().await.expect("event");
    assert!(matches!(
        advanced.event,
        Event::ValidityPeriodAdvanced { tick: 2, value: 10, .. }
    ));
    let recovered = stream.next().await.expect("event");
    assert_eq!(recovered.event, Event::HealthChanged { degraded: vec![] });

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.update_failures_total, 1);
    assert_eq!(snapshot.updates_total, 1);

    handle.shutdown().await?;
    Ok(())
}
