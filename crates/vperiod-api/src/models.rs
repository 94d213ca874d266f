//! Response bodies served by the API.

use serde::{Deserialize, Serialize};
use vperiod_telemetry::MetricsSnapshot;

/// RFC 9457 problem document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    /// URI reference identifying the problem type.
    pub kind: String,
    /// Short, human-readable summary of the issue.
    pub title: String,
    /// HTTP status code associated with the error.
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    /// Detailed diagnostic message when available.
    pub detail: Option<String>,
}

/// Direct ledger read of one key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateResponse {
    /// Owning chaincode.
    pub chaincode_id: String,
    /// Key read.
    pub key: String,
    /// Stored bytes rendered as UTF-8.
    pub value: String,
}

/// One historical version of a key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Height of the commit that wrote this version.
    pub height: u64,
    /// Value rendered as UTF-8, `None` for deletes.
    pub value: Option<String>,
}

/// Current ledger height.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainResponse {
    /// Height of the last commit.
    pub height: u64,
}

/// Liveness and degradation summary.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: &'static str,
    /// Build revision.
    pub build: String,
    /// Current ledger height.
    pub ledger_height: u64,
    /// Deployed chaincode ids.
    pub chaincodes: Vec<String>,
    /// Components currently degraded.
    pub degraded: Vec<String>,
    /// Selected counters and gauges.
    pub metrics: MetricsSnapshot,
}
