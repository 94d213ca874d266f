//! Validation helpers and parsing utilities for configuration values.

use std::net::IpAddr;

use crate::defaults::MAX_UPDATE_INTERVAL_SECS;
use crate::error::{ConfigError, ConfigResult};
use crate::model::InitialValue;

/// Require a positive update interval no longer than a year.
pub(crate) fn validate_interval(section: &'static str, secs: u64) -> ConfigResult<u64> {
    if secs == 0 {
        return Err(ConfigError::invalid(
            section,
            "update_interval_secs",
            Some("0"),
            "must_be_positive",
        ));
    }
    if secs > MAX_UPDATE_INTERVAL_SECS {
        return Err(ConfigError::invalid(
            section,
            "update_interval_secs",
            Some(&secs.to_string()),
            "too_large",
        ));
    }
    Ok(secs)
}

/// Parse an update interval supplied as text (environment variables).
pub(crate) fn parse_interval(section: &'static str, value: &str) -> ConfigResult<u64> {
    let secs = value.trim().parse::<u64>().map_err(|_| {
        ConfigError::invalid(section, "update_interval_secs", Some(value), "not_an_integer")
    })?;
    validate_interval(section, secs)
}

/// Parse `zero`, `now`, or a decimal integer into an [`InitialValue`].
pub(crate) fn parse_initial_value(section: &'static str, value: &str) -> ConfigResult<InitialValue> {
    match value.trim().to_ascii_lowercase().as_str() {
        "zero" => Ok(InitialValue::Zero),
        "now" => Ok(InitialValue::Now),
        other => other.parse::<i64>().map(InitialValue::Fixed).map_err(|_| {
            ConfigError::invalid(section, "initial_value", Some(value), "unrecognised")
        }),
    }
}

/// Validate a TCP port, rejecting zero and out-of-range values.
pub(crate) fn validate_port(section: &'static str, port: i64) -> ConfigResult<u16> {
    let rendered = port.to_string();
    if port == 0 {
        return Err(ConfigError::invalid(
            section,
            "http_port",
            Some(&rendered),
            "zero",
        ));
    }
    u16::try_from(port)
        .map_err(|_| ConfigError::invalid(section, "http_port", Some(&rendered), "out_of_range"))
}

/// Parse a TCP port supplied as text.
pub(crate) fn parse_port(section: &'static str, value: &str) -> ConfigResult<u16> {
    let port = value
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::invalid(section, "http_port", Some(value), "not_an_integer"))?;
    validate_port(section, port)
}

/// Parse an IP address to bind.
pub(crate) fn parse_bind_addr(section: &'static str, value: &str) -> ConfigResult<IpAddr> {
    value
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::invalid(section, "bind_addr", Some(value), "invalid_ip"))
}

/// Require a non-blank string, returning it trimmed.
pub(crate) fn require_non_empty(
    section: &'static str,
    field: &'static str,
    value: &str,
) -> ConfigResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(section, field, None, "empty"));
    }
    Ok(trimmed.to_string())
}

/// Accept only the supported log format names.
pub(crate) fn validate_log_format(section: &'static str, value: &str) -> ConfigResult<String> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "json" | "pretty" | "auto" => Ok(normalized),
        _ => Err(ConfigError::invalid(
            section,
            "format",
            Some(value),
            "unsupported_format",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_must_be_positive_integer() {
        assert_eq!(parse_interval("vp", " 37 ").ok(), Some(37));
        assert!(matches!(
            parse_interval("vp", "0"),
            Err(ConfigError::InvalidField {
                reason: "must_be_positive",
                ..
            })
        ));
        assert!(matches!(
            parse_interval("vp", "-5"),
            Err(ConfigError::InvalidField {
                reason: "not_an_integer",
                ..
            })
        ));
    }

    #[test]
    fn interval_is_capped_at_one_year() {
        assert_eq!(
            validate_interval("vp", MAX_UPDATE_INTERVAL_SECS).ok(),
            Some(MAX_UPDATE_INTERVAL_SECS)
        );
        assert!(matches!(
            parse_interval("vp", &i64::MAX.to_string()),
            Err(ConfigError::InvalidField {
                field: "update_interval_secs",
                reason: "too_large",
                ..
            })
        ));
    }

    #[test]
    fn initial_value_keywords_and_numbers() {
        assert_eq!(parse_initial_value("vp", "NOW").ok(), Some(InitialValue::Now));
        assert_eq!(parse_initial_value("vp", "zero").ok(), Some(InitialValue::Zero));
        assert_eq!(
            parse_initial_value("vp", "1700000000").ok(),
            Some(InitialValue::Fixed(1_700_000_000))
        );
        assert!(parse_initial_value("vp", "tomorrow").is_err());
    }

    #[test]
    fn port_rejects_zero_and_overflow() {
        assert_eq!(parse_port("server", "7050").ok(), Some(7050));
        assert!(matches!(
            validate_port("server", 0),
            Err(ConfigError::InvalidField { reason: "zero", .. })
        ));
        assert!(matches!(
            validate_port("server", 70_000),
            Err(ConfigError::InvalidField {
                reason: "out_of_range",
                ..
            })
        ));
    }

    #[test]
    fn bind_addr_and_strings() {
        assert!(parse_bind_addr("server", "0.0.0.0").is_ok());
        assert!(parse_bind_addr("server", "localhost").is_err());
        assert_eq!(
            require_non_empty("vp", "chaincode_id", " abc ").ok(),
            Some("abc".to_string())
        );
        assert!(require_non_empty("vp", "chaincode_id", "   ").is_err());
        assert_eq!(validate_log_format("logging", "JSON").ok(), Some("json".to_string()));
        assert!(validate_log_format("logging", "xml").is_err());
    }
}
