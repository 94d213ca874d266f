//! Ledger records: keys, write sets, and committed history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Address of a value: the owning chaincode and the key within its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    /// Chaincode owning the namespace.
    pub chaincode_id: String,
    /// Key inside the namespace.
    pub key: String,
}

impl StateKey {
    /// Build a key from its parts.
    #[must_use]
    pub fn new(chaincode_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            chaincode_id: chaincode_id.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chaincode_id, self.key)
    }
}

/// A single put (`Some`) or delete (`None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateWrite {
    /// Target key.
    #[serde(flatten)]
    pub key: StateKey,
    /// New value, or `None` to delete.
    pub value: Option<Vec<u8>>,
}

/// Ordered writes applied atomically by one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    writes: Vec<StateWrite>,
}

impl WriteSet {
    /// Empty write set.
    #[must_use]
    pub const fn new() -> Self {
        Self { writes: Vec::new() }
    }

    /// Queue a put.
    pub fn put(
        &mut self,
        chaincode_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.writes.push(StateWrite {
            key: StateKey::new(chaincode_id, key),
            value: Some(value.into()),
        });
        self
    }

    /// Queue a delete.
    pub fn delete(&mut self, chaincode_id: impl Into<String>, key: impl Into<String>) -> &mut Self {
        self.writes.push(StateWrite {
            key: StateKey::new(chaincode_id, key),
            value: None,
        });
        self
    }

    /// Whether no writes are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Number of queued writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Queued writes in application order.
    #[must_use]
    pub fn writes(&self) -> &[StateWrite] {
        &self.writes
    }

    pub(crate) fn into_writes(self) -> Vec<StateWrite> {
        self.writes
    }
}

/// Append-only history record of one applied write set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Ledger height after this commit; the first commit is height 1.
    pub height: u64,
    /// Transaction identifier.
    pub tx_id: Uuid,
    /// Commit time.
    pub timestamp: DateTime<Utc>,
    /// Writes applied, in order.
    pub writes: Vec<StateWrite>,
}

/// A value as it stood after the commit at `height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionedValue {
    /// Height of the commit that wrote this version.
    pub height: u64,
    /// Value written, or `None` for a delete.
    pub value: Option<Vec<u8>>,
}
