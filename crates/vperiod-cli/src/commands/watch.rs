//! `vperiod watch`: successive samples with delta checks.

use std::time::Duration;

use anyhow::anyhow;
use tokio::time::sleep;
use vperiod_chaincode::{QueryGateway, check_delta};

use crate::cli::{OutputFormat, WatchArgs};
use crate::client::{CliError, CliResult};
use crate::output::{Sample, render_sample};

pub(crate) async fn handle_watch(
    gateway: &dyn QueryGateway,
    args: WatchArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let samples = collect_samples(gateway, &args, |sample| render_sample(sample, format)).await?;
    tracing::debug!(samples = samples.len(), "watch finished");
    Ok(())
}

/// Take `args.samples` observations, failing on the first delta that is not
/// a whole number of intervals.
pub(crate) async fn collect_samples<F>(
    gateway: &dyn QueryGateway,
    args: &WatchArgs,
    mut emit: F,
) -> CliResult<Vec<Sample>>
where
    F: FnMut(&Sample) -> CliResult<()>,
{
    if args.samples < 2 {
        return Err(CliError::validation("watch needs at least two samples"));
    }
    let interval = i64::try_from(args.interval)
        .ok()
        .filter(|interval| *interval > 0)
        .ok_or_else(|| CliError::validation("interval must be a positive number of seconds"))?;

    let mut samples: Vec<Sample> = Vec::with_capacity(args.samples as usize);
    for index in 0..args.samples {
        if index > 0 {
            sleep(Duration::from_secs(args.every)).await;
        }
        let value = gateway.query_validity_period().await?;
        let (delta, updates) = match samples.last() {
            Some(previous) => {
                let updates = check_delta(previous.value, value, interval)
                    .map_err(|err| CliError::failure(anyhow!("{err}: {err:?}")))?;
                let delta = i64::try_from(updates)
                    .ok()
                    .and_then(|updates| updates.checked_mul(interval))
                    .ok_or_else(|| {
                        CliError::failure(anyhow!(
                            "delta between {} and {value} overflows",
                            previous.value
                        ))
                    })?;
                (Some(delta), Some(updates))
            }
            None => (None, None),
        };
        let sample = Sample {
            index,
            value,
            delta,
            updates,
        };
        emit(&sample)?;
        samples.push(sample);
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use vperiod_chaincode::GatewayResult;

    struct Scripted(Mutex<Vec<i64>>);

    #[async_trait]
    impl QueryGateway for Scripted {
        async fn query_validity_period(&self) -> GatewayResult<i64> {
            let mut values = self.0.lock().expect("lock");
            Ok(values.remove(0))
        }
    }

    fn args(samples: u32) -> WatchArgs {
        WatchArgs {
            samples,
            every: 0,
            interval: 37,
        }
    }

    #[tokio::test]
    async fn deltas_count_whole_updates() {
        let gateway = Scripted(Mutex::new(vec![100, 100, 137, 211]));
        let samples = collect_samples(&gateway, &args(4), |_| Ok(()))
            .await
            .expect("samples");
        let updates: Vec<_> = samples.iter().map(|s| s.updates).collect();
        assert_eq!(updates, vec![None, Some(0), Some(1), Some(2)]);
        assert_eq!(samples[3].delta, Some(74));
    }

    #[tokio::test]
    async fn partial_step_fails_operationally() {
        let gateway = Scripted(Mutex::new(vec![100, 120]));
        let err = collect_samples(&gateway, &args(2), |_| Ok(()))
            .await
            .expect_err("delta violation");
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn delta_beyond_i64_fails_instead_of_wrapping() {
        let gateway = Scripted(Mutex::new(vec![i64::MIN, i64::MAX]));
        let args = WatchArgs {
            interval: 1,
            ..args(2)
        };
        let err = collect_samples(&gateway, &args, |_| Ok(()))
            .await
            .expect_err("overflow");
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn too_few_samples_is_a_validation_error() {
        let gateway = Scripted(Mutex::new(Vec::new()));
        let err = collect_samples(&gateway, &args(1), |_| Ok(()))
            .await
            .expect_err("validation");
        assert_eq!(err.exit_code(), 2);
    }
}
