//! Typed configuration models.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Fully validated peer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeerConfig {
    /// Validity period chaincode and scheduler settings.
    pub validity_period: ValidityPeriodConfig,
    /// Ledger storage settings.
    pub ledger: LedgerConfig,
    /// HTTP gateway listener settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Settings for the validity period chaincode, its scheduler, and its gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidityPeriodConfig {
    /// Identifier (hash) the chaincode is deployed and resolved under.
    pub chaincode_id: String,
    /// Seconds between scheduled updates; always positive.
    pub update_interval_secs: u64,
    /// Value written at deployment.
    pub initial_value: InitialValue,
    /// Token presented by system invokers.
    pub invoker_token: String,
    /// Base URL of the query gateway for remote clients.
    pub gateway_url: String,
}

impl ValidityPeriodConfig {
    /// Scheduled update interval as a [`Duration`].
    #[must_use]
    pub const fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}

impl Default for ValidityPeriodConfig {
    fn default() -> Self {
        Self {
            chaincode_id: defaults::CHAINCODE_ID.to_string(),
            update_interval_secs: defaults::UPDATE_INTERVAL_SECS,
            initial_value: InitialValue::Now,
            invoker_token: defaults::SYSTEM_INVOKER.to_string(),
            gateway_url: defaults::GATEWAY_URL.to_string(),
        }
    }
}

/// Value written to the ledger when the chaincode is first deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialValue {
    /// Start the period counter at zero.
    Zero,
    /// Start at the current Unix time in seconds.
    Now,
    /// Start at a fixed value.
    Fixed(i64),
}

impl InitialValue {
    /// Resolve to a concrete value given the current Unix time.
    #[must_use]
    pub const fn resolve(self, now_unix: i64) -> i64 {
        match self {
            Self::Zero => 0,
            Self::Now => now_unix,
            Self::Fixed(value) => value,
        }
    }
}

/// Ledger storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerConfig {
    /// Directory holding the durable journal; `None` keeps the ledger in memory.
    pub path: Option<PathBuf>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_addr: IpAddr,
    /// Port to bind; never zero.
    pub http_port: u16,
}

impl ServerConfig {
    /// Socket address the API listener binds.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.http_port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: defaults::BIND_ADDR,
            http_port: defaults::HTTP_PORT,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingSettings {
    /// Default level directive, overridden by `RUST_LOG`.
    pub level: String,
    /// `json`, `pretty`, or `auto`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: defaults::LOG_FORMAT.to_string(),
        }
    }
}
