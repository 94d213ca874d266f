//! Output renderers for CLI commands.

use anyhow::anyhow;
use serde::Serialize;
use vperiod_api::StateResponse;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// One observation taken by `watch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct Sample {
    pub(crate) index: u32,
    pub(crate) value: i64,
    pub(crate) delta: Option<i64>,
    pub(crate) updates: Option<u64>,
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_value(value: i64, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "value": value })),
        OutputFormat::Table => {
            println!("{value}");
            Ok(())
        }
    }
}

pub(crate) fn render_state(state: &StateResponse, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(state),
        OutputFormat::Table => {
            println!("{}/{}: {}", state.chaincode_id, state.key, state.value);
            Ok(())
        }
    }
}

pub(crate) fn render_sample(sample: &Sample, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string(sample)
                .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
            println!("{text}");
        }
        OutputFormat::Table => {
            if sample.index == 0 {
                println!("{:>5} {:>20} {:>10} {:>7}", "#", "VALUE", "DELTA", "UPDATES");
            }
            println!(
                "{:>5} {:>20} {:>10} {:>7}",
                sample.index,
                sample.value,
                sample.delta.map_or_else(|| "-".to_string(), |d| d.to_string()),
                sample.updates.map_or_else(|| "-".to_string(), |u| u.to_string()),
            );
        }
    }
    Ok(())
}
