//! YAML file plus environment backed configuration loading.
//!
//! # Design
//! - The file is optional; a missing default file yields built-in defaults.
//! - Environment overrides are captured once into [`EnvOverrides`] so tests can
//!   inject them without touching the process environment.
//! - Every value passes through `validate.rs` before a [`PeerConfig`] is returned.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{InitialValue, PeerConfig};
use crate::validate::{
    parse_bind_addr, parse_initial_value, parse_interval, parse_port, require_non_empty,
    validate_interval, validate_log_format, validate_port,
};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "VPERIOD_CONFIG";

const CHAINCODE_ID_ENV: &str = "VPERIOD_CHAINCODE_ID";
const UPDATE_INTERVAL_ENV: &str = "VPERIOD_UPDATE_INTERVAL_SECS";
const INITIAL_VALUE_ENV: &str = "VPERIOD_INITIAL_VALUE";
const LEDGER_PATH_ENV: &str = "VPERIOD_LEDGER_PATH";
const BIND_ADDR_ENV: &str = "VPERIOD_BIND_ADDR";
const HTTP_PORT_ENV: &str = "VPERIOD_HTTP_PORT";
const GATEWAY_URL_ENV: &str = "VPERIOD_GATEWAY_URL";
const LOG_LEVEL_ENV: &str = "VPERIOD_LOG_LEVEL";
const LOG_FORMAT_ENV: &str = "VPERIOD_LOG_FORMAT";

const SECTION_VALIDITY: &str = "validity_period";
const SECTION_LEDGER: &str = "ledger";
const SECTION_SERVER: &str = "server";
const SECTION_LOGGING: &str = "logging";

/// Raw environment overrides applied on top of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// `VPERIOD_CHAINCODE_ID`.
    pub chaincode_id: Option<String>,
    /// `VPERIOD_UPDATE_INTERVAL_SECS`.
    pub update_interval_secs: Option<String>,
    /// `VPERIOD_INITIAL_VALUE`.
    pub initial_value: Option<String>,
    /// `VPERIOD_LEDGER_PATH`.
    pub ledger_path: Option<String>,
    /// `VPERIOD_BIND_ADDR`.
    pub bind_addr: Option<String>,
    /// `VPERIOD_HTTP_PORT`.
    pub http_port: Option<String>,
    /// `VPERIOD_GATEWAY_URL`.
    pub gateway_url: Option<String>,
    /// `VPERIOD_LOG_LEVEL`.
    pub log_level: Option<String>,
    /// `VPERIOD_LOG_FORMAT`.
    pub log_format: Option<String>,
}

impl EnvOverrides {
    /// Capture overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Capture overrides through an arbitrary lookup function.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            chaincode_id: lookup(CHAINCODE_ID_ENV),
            update_interval_secs: lookup(UPDATE_INTERVAL_ENV),
            initial_value: lookup(INITIAL_VALUE_ENV),
            ledger_path: lookup(LEDGER_PATH_ENV),
            bind_addr: lookup(BIND_ADDR_ENV),
            http_port: lookup(HTTP_PORT_ENV),
            gateway_url: lookup(GATEWAY_URL_ENV),
            log_level: lookup(LOG_LEVEL_ENV),
            log_format: lookup(LOG_FORMAT_ENV),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    validity_period: RawValidityPeriod,
    ledger: RawLedger,
    server: RawServer,
    logging: RawLogging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawValidityPeriod {
    chaincode_id: Option<String>,
    update_interval_secs: Option<u64>,
    initial_value: Option<RawInitialValue>,
    invoker_token: Option<String>,
    gateway_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawInitialValue {
    Number(i64),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawLedger {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawServer {
    bind_addr: Option<String>,
    http_port: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawLogging {
    level: Option<String>,
    format: Option<String>,
}

/// Load configuration using `VPERIOD_CONFIG` and the process environment.
///
/// When `VPERIOD_CONFIG` is unset the default `vperiod.yaml` is consulted and
/// may be absent. An explicitly named file must exist.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed, or when any
/// value fails validation.
pub fn load_from_env() -> ConfigResult<PeerConfig> {
    load_from_lookup(|key| env::var(key).ok())
}

/// [`load_from_env`] with variables resolved through `lookup`.
///
/// # Errors
///
/// Same as [`load_from_env`].
pub fn load_from_lookup<F>(lookup: F) -> ConfigResult<PeerConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let overrides = EnvOverrides::from_lookup(&lookup);
    match lookup(CONFIG_PATH_ENV) {
        Some(path) if !path.trim().is_empty() => {
            load_with(Some(Path::new(path.trim())), &overrides)
        }
        _ => {
            let default_path = Path::new(defaults::CONFIG_FILE);
            if default_path.exists() {
                load_with(Some(default_path), &overrides)
            } else {
                debug!(path = %default_path.display(), "no configuration file; using defaults");
                load_with(None, &overrides)
            }
        }
    }
}

/// Load configuration from an optional YAML file and explicit overrides.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed, or when any
/// value fails validation.
pub fn load_with(path: Option<&Path>, overrides: &EnvOverrides) -> ConfigResult<PeerConfig> {
    let raw = match path {
        Some(path) => read_file(path)?,
        None => RawConfig::default(),
    };
    let config = resolve(raw, overrides)?;
    info!(
        chaincode_id = %config.validity_period.chaincode_id,
        update_interval_secs = config.validity_period.update_interval_secs,
        persistent = config.ledger.path.is_some(),
        "configuration loaded"
    );
    Ok(config)
}

fn read_file(path: &Path) -> ConfigResult<RawConfig> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(RawConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve(raw: RawConfig, overrides: &EnvOverrides) -> ConfigResult<PeerConfig> {
    let mut config = PeerConfig::default();

    let vp = &mut config.validity_period;
    if let Some(id) = overrides.chaincode_id.as_deref().or(raw.validity_period.chaincode_id.as_deref()) {
        vp.chaincode_id = require_non_empty(SECTION_VALIDITY, "chaincode_id", id)?;
    }
    vp.update_interval_secs = match overrides.update_interval_secs.as_deref() {
        Some(value) => parse_interval(SECTION_VALIDITY, value)?,
        None => validate_interval(
            SECTION_VALIDITY,
            raw.validity_period
                .update_interval_secs
                .unwrap_or(defaults::UPDATE_INTERVAL_SECS),
        )?,
    };
    vp.initial_value = match (overrides.initial_value.as_deref(), raw.validity_period.initial_value) {
        (Some(value), _) => parse_initial_value(SECTION_VALIDITY, value)?,
        (None, Some(RawInitialValue::Number(value))) => InitialValue::Fixed(value),
        (None, Some(RawInitialValue::Text(value))) => parse_initial_value(SECTION_VALIDITY, &value)?,
        (None, None) => InitialValue::Now,
    };
    if let Some(token) = raw.validity_period.invoker_token.as_deref() {
        vp.invoker_token = require_non_empty(SECTION_VALIDITY, "invoker_token", token)?;
    }
    if let Some(url) = overrides.gateway_url.as_deref().or(raw.validity_period.gateway_url.as_deref()) {
        vp.gateway_url = require_non_empty(SECTION_VALIDITY, "gateway_url", url)?;
    }

    config.ledger.path = match overrides.ledger_path.as_deref() {
        Some(path) => Some(PathBuf::from(require_non_empty(SECTION_LEDGER, "path", path)?)),
        None => raw.ledger.path,
    };

    if let Some(addr) = overrides.bind_addr.as_deref().or(raw.server.bind_addr.as_deref()) {
        config.server.bind_addr = parse_bind_addr(SECTION_SERVER, addr)?;
    }
    match (overrides.http_port.as_deref(), raw.server.http_port) {
        (Some(port), _) => config.server.http_port = parse_port(SECTION_SERVER, port)?,
        (None, Some(port)) => config.server.http_port = validate_port(SECTION_SERVER, port)?,
        (None, None) => {}
    }

    if let Some(level) = overrides.log_level.as_deref().or(raw.logging.level.as_deref()) {
        config.logging.level = require_non_empty(SECTION_LOGGING, "level", level)?;
    }
    if let Some(format) = overrides.log_format.as_deref().or(raw.logging.format.as_deref()) {
        config.logging.format = validate_log_format(SECTION_LOGGING, format)?;
    }

    Ok(config)
}
