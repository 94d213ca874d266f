//! `vperiod state <chaincode> <key>`.

use anyhow::anyhow;

use crate::cli::{OutputFormat, StateArgs};
use crate::client::{CliError, CliResult, GatewayClient};
use crate::output::render_state;

pub(crate) async fn handle_state(
    gateway: &GatewayClient,
    args: StateArgs,
    format: OutputFormat,
) -> CliResult<()> {
    if args.chaincode_id.trim().is_empty() || args.key.trim().is_empty() {
        return Err(CliError::validation("chaincode and key must not be empty"));
    }
    let state = gateway
        .get_state(&args.chaincode_id, &args.key)
        .await?
        .ok_or_else(|| {
            CliError::failure(anyhow!(
                "no state for key '{}' of chaincode '{}'",
                args.key,
                args.chaincode_id
            ))
        })?;
    render_state(&state, format)
}
