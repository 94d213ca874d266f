//! Default values for peer configuration.

use std::net::{IpAddr, Ipv4Addr};

/// Identifier the validity period chaincode is deployed under.
pub const CHAINCODE_ID: &str = "validity_period_chaincode";
/// Ledger key holding the validity period.
pub const VALIDITY_PERIOD_KEY: &str = "system.validity.period";
/// Seconds between scheduled updates.
pub const UPDATE_INTERVAL_SECS: u64 = 37;
/// Largest accepted update interval (one year).
pub const MAX_UPDATE_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;
/// Invoker token presented by system components.
pub const SYSTEM_INVOKER: &str = "system_chaincode_invoker";
/// Bind address of the HTTP gateway.
pub const BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
/// Port of the HTTP gateway.
pub const HTTP_PORT: u16 = 7050;
/// Base URL clients use to reach the gateway.
pub const GATEWAY_URL: &str = "http://127.0.0.1:7050";
/// Configuration file looked up when `VPERIOD_CONFIG` is unset.
pub const CONFIG_FILE: &str = "vperiod.yaml";
/// Logging level when neither file nor environment provide one.
pub const LOG_LEVEL: &str = "info";
/// Logging format; `auto` picks pretty for debug builds.
pub const LOG_FORMAT: &str = "auto";
