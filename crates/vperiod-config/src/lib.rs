#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! File and environment backed configuration for the validity period peer.
//!
//! Layout: `model.rs` (typed config), `loader.rs` (YAML file + environment
//! overrides), `validate.rs` (field parsing), `defaults.rs` (default values).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_PATH_ENV, EnvOverrides, load_from_env, load_from_lookup, load_with};
pub use model::{
    InitialValue, LedgerConfig, LoggingSettings, PeerConfig, ServerConfig, ValidityPeriodConfig,
};
