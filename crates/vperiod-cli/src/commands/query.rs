//! `vperiod query`.

use vperiod_chaincode::QueryGateway;

use crate::cli::OutputFormat;
use crate::client::CliResult;
use crate::output::render_value;

pub(crate) async fn handle_query(gateway: &dyn QueryGateway, format: OutputFormat) -> CliResult<()> {
    let value = gateway.query_validity_period().await?;
    render_value(value, format)
}
