use std::time::Duration;

use anyhow::Result;
use vperiod_app::{AppError, Peer, open_ledger};
use vperiod_chaincode::{
    QueryGateway, VALIDITY_PERIOD_KEY, check_agreement, check_delta, read_validity_period,
};
use vperiod_cli::GatewayClient;
use vperiod_config::{InitialValue, ValidityPeriodConfig};
use vperiod_events::{Event, EventBus};
use vperiod_ledger::Ledger;
use vperiod_telemetry::Metrics;

fn settings(interval_secs: u64, initial_value: InitialValue) -> ValidityPeriodConfig {
    ValidityPeriodConfig {
        update_interval_secs: interval_secs,
        initial_value,
        ..ValidityPeriodConfig::default()
    }
}

async fn start(settings: &ValidityPeriodConfig, ledger: Ledger) -> Result<Peer> {
    Ok(Peer::start(settings, ledger, EventBus::new(), Metrics::new()?).await?)
}

async fn agreed_value(peer: &Peer) -> Result<i64> {
    let gateway = peer.gateway().query_validity_period().await?;
    let ledger = read_validity_period(peer.ledger(), peer.chaincode_id())?;
    Ok(check_agreement(gateway, ledger)?)
}

#[tokio::test(start_paused = true)]
async fn validity_period_advances_in_whole_intervals() -> Result<()> {
    let peer = start(&settings(37, InitialValue::Now), Ledger::in_memory()).await?;

    let first = agreed_value(&peer).await?;
    tokio::time::sleep(Duration::from_secs(180)).await;
    let second = agreed_value(&peer).await?;
    assert_eq!((second - first) % 37, 0);
    assert_eq!(check_delta(first, second, 37)?, 4);

    tokio::time::sleep(Duration::from_secs(40)).await;
    let third = agreed_value(&peer).await?;
    assert!([0, 37].contains(&(third - second)), "delta {}", third - second);

    peer.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn adjacent_commits_differ_by_exactly_one_interval() -> Result<()> {
    let peer = start(&settings(37, InitialValue::Fixed(1_700_000_000)), Ledger::in_memory()).await?;
    let mut commits = peer.scheduler().subscribe();

    let mut previous = agreed_value(&peer).await?;
    assert_eq!(previous, 1_700_000_000);
    for tick in 1..=5 {
        let committed = commits
            .wait_for(|update| update.is_some_and(|update| update.tick == tick))
            .await?
            .ok_or_else(|| anyhow::anyhow!("commit missing"))?;
        let current = agreed_value(&peer).await?;
        assert_eq!(current, committed.value);
        assert_eq!(current - previous, 37);
        previous = current;
    }

    peer.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn deployment_is_announced_and_restart_keeps_state() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let settings = settings(10, InitialValue::Zero);

    let peer = start(&settings, open_ledger(Some(dir.path()))?).await?;
    let mut stream = peer.events().subscribe(Some(0));
    let deployed = stream.next().await.ok_or_else(|| anyhow::anyhow!("no events"))?;
    assert!(matches!(
        deployed.event,
        Event::ChaincodeDeployed { ref chaincode_id } if chaincode_id == peer.chaincode_id()
    ));
    peer.scheduler()
        .subscribe()
        .wait_for(|update| update.is_some_and(|update| update.tick == 2))
        .await?;
    peer.shutdown().await?;

    let restarted = start(&settings, open_ledger(Some(dir.path()))?).await?;
    assert_eq!(agreed_value(&restarted).await?, 20);
    assert_eq!(restarted.ledger().history(restarted.chaincode_id(), VALIDITY_PERIOD_KEY).len(), 3);
    restarted.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn unschedulable_interval_fails_start() {
    let settings = settings(i64::MAX.unsigned_abs(), InitialValue::Zero);
    let err = start(&settings, Ledger::in_memory())
        .await
        .expect_err("interval overflows the clock");
    assert!(matches!(
        err.downcast_ref::<AppError>(),
        Some(AppError::Scheduler {
            operation: "scheduler.spawn",
            ..
        })
    ));
}

#[tokio::test]
async fn remote_gateway_agrees_with_ledger() -> Result<()> {
    let mut peer = start(&settings(1, InitialValue::Fixed(500)), Ledger::in_memory()).await?;
    let bound = peer.api_server().bind("127.0.0.1:0".parse()?).await?;
    let base_url = format!("http://{}", bound.local_addr());
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(bound.serve(async move {
        let _ = stopped.await;
    }));

    peer.scheduler()
        .subscribe()
        .wait_for(|update| update.is_some_and(|update| update.tick >= 1))
        .await?;
    let client = GatewayClient::new(base_url.parse()?, peer.chaincode_id());

    let remote = client.query_validity_period().await?;
    let direct = client
        .get_state(peer.chaincode_id(), VALIDITY_PERIOD_KEY)
        .await?
        .ok_or_else(|| anyhow::anyhow!("state missing"))?;
    let direct: i64 = direct.value.parse()?;
    // The scheduler may commit between the two reads.
    assert!(check_delta(remote, direct, 1)? <= 1);
    assert!(remote >= 501);

    let _ = stop.send(());
    server.await??;
    peer.shutdown().await?;
    Ok(())
}
