//! Argument parsing and command dispatch.

use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::Url;
use uuid::Uuid;
use vperiod_config::defaults;

use crate::client::{CliResult, GatewayClient, build_http_client, parse_url};
use crate::commands::query::handle_query;
use crate::commands::state::handle_state;
use crate::commands::watch::handle_watch;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Parses CLI arguments, executes the requested command, and reports the
/// outcome. Returns the process exit code.
pub async fn run() -> i32 {
    run_with(Cli::parse()).await
}

pub(crate) async fn run_with(cli: Cli) -> i32 {
    let trace_id = Uuid::new_v4().to_string();
    match dispatch(cli, &trace_id).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, trace_id: &str) -> CliResult<()> {
    let client = build_http_client(&cli, trace_id)?;
    let gateway = GatewayClient::new(cli.gateway_url.clone(), cli.chaincode_id.clone())
        .with_client(client)
        .with_invoker_token(cli.invoker_token.clone());

    match cli.command {
        Command::Query => handle_query(&gateway, cli.output).await,
        Command::State(args) => handle_state(&gateway, args, cli.output).await,
        Command::Watch(args) => handle_watch(&gateway, args, cli.output).await,
    }
}

#[derive(Parser)]
#[command(name = "vperiod", about = "Client for the validity period query gateway")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "VPERIOD_GATEWAY_URL",
        value_parser = parse_url,
        default_value = defaults::GATEWAY_URL
    )]
    pub(crate) gateway_url: Url,
    #[arg(
        long,
        global = true,
        env = "VPERIOD_CHAINCODE_ID",
        default_value = defaults::CHAINCODE_ID
    )]
    pub(crate) chaincode_id: String,
    #[arg(
        long,
        global = true,
        env = "VPERIOD_INVOKER_TOKEN",
        default_value = defaults::SYSTEM_INVOKER
    )]
    pub(crate) invoker_token: String,
    #[arg(
        long,
        global = true,
        env = "VPERIOD_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Read the validity period through the chaincode query path.
    Query,
    /// Read a key directly from the peer's ledger.
    State(StateArgs),
    /// Sample the validity period repeatedly and report deltas.
    Watch(WatchArgs),
}

#[derive(Args)]
pub(crate) struct StateArgs {
    /// Owning chaincode id.
    pub(crate) chaincode_id: String,
    /// Key to read.
    pub(crate) key: String,
}

#[derive(Args)]
pub(crate) struct WatchArgs {
    /// Number of samples to take; at least two.
    #[arg(long, default_value_t = 3)]
    pub(crate) samples: u32,
    /// Seconds to wait between samples.
    #[arg(long, default_value_t = defaults::UPDATE_INTERVAL_SECS)]
    pub(crate) every: u64,
    /// Update interval the deltas are checked against.
    #[arg(long, default_value_t = defaults::UPDATE_INTERVAL_SECS)]
    pub(crate) interval: u64,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_peer() {
        let cli = Cli::try_parse_from(["vperiod", "query"]).expect("parse");
        assert_eq!(cli.gateway_url.as_str(), "http://127.0.0.1:7050/");
        assert_eq!(cli.chaincode_id, defaults::CHAINCODE_ID);
        assert!(matches!(cli.command, Command::Query));
    }

    #[test]
    fn watch_and_state_arguments_parse() {
        let cli = Cli::try_parse_from([
            "vperiod", "watch", "--samples", "4", "--every", "1", "--interval", "37",
        ])
        .expect("parse");
        match cli.command {
            Command::Watch(args) => {
                assert_eq!((args.samples, args.every, args.interval), (4, 1, 37));
            }
            _ => panic!("expected watch"),
        }

        let cli = Cli::try_parse_from(["vperiod", "state", "cc", "k", "--output", "json"])
            .expect("parse");
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Command::State(StateArgs { ref key, .. }) if key == "k"));
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(Cli::try_parse_from(["vperiod", "--gateway-url", "not a url", "query"]).is_err());
    }

    #[tokio::test]
    async fn unreachable_gateway_exits_with_failure_code() {
        let cli = Cli::try_parse_from([
            "vperiod",
            "--gateway-url",
            "http://127.0.0.1:9",
            "--timeout",
            "1",
            "query",
        ])
        .expect("parse");
        assert_eq!(run_with(cli).await, 3);
    }
}
