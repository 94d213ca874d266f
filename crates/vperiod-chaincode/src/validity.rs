//! The validity period system chaincode.
//!
//! Owns a single key holding a decimal `i64`. `query` serves it as a
//! `{"Name","Value"}` document; `update` (driven by the scheduler, never
//! dispatched externally) advances it by the configured interval in one commit.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vperiod_ledger::StateStore;

use crate::error::{ChaincodeError, ChaincodeResult};
use crate::invocation::QUERY_FUNCTION;
use crate::runtime::{Chaincode, ChaincodeStub};

/// Ledger key owned by the validity period chaincode.
pub const VALIDITY_PERIOD_KEY: &str = "system.validity.period";

/// Query response document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityPeriodPayload {
    /// Always [`VALIDITY_PERIOD_KEY`].
    #[serde(rename = "Name")]
    pub name: String,
    /// Decimal rendering of the current value.
    #[serde(rename = "Value")]
    pub value: String,
}

impl ValidityPeriodPayload {
    /// Payload for `value`.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self {
            name: VALIDITY_PERIOD_KEY.to_string(),
            value: value.to_string(),
        }
    }
}

/// Outcome of one scheduled update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityUpdate {
    /// Value before the update.
    pub previous: i64,
    /// Committed value.
    pub value: i64,
    /// Ledger height of the commit.
    pub height: u64,
}

/// Validity period chaincode instance.
#[derive(Debug, Clone)]
pub struct ValidityPeriodChaincode {
    id: String,
    interval: i64,
    initial_value: i64,
}

impl ValidityPeriodChaincode {
    /// Chaincode deployed under `id`, advancing by `interval` per update and
    /// seeded with `initial_value` on first deployment.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::InvalidArguments`] when the interval is zero
    /// or does not fit in whole `i64` seconds.
    pub fn new(id: impl Into<String>, interval: Duration, initial_value: i64) -> ChaincodeResult<Self> {
        let secs = interval.as_secs();
        let interval = i64::try_from(secs)
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| ChaincodeError::InvalidArguments {
                reason: "interval_out_of_range",
                value: Some(secs.to_string()),
            })?;
        Ok(Self {
            id: id.into(),
            interval,
            initial_value,
        })
    }

    /// Seconds added per update.
    #[must_use]
    pub const fn interval_secs(&self) -> i64 {
        self.interval
    }

    /// Value written by `init` when the key is absent.
    #[must_use]
    pub const fn initial_value(&self) -> i64 {
        self.initial_value
    }

    /// Read the current value, add the interval, and commit the result.
    ///
    /// Returns only after the commit is visible to readers.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::NotFound`] when uninitialised,
    /// [`ChaincodeError::Corrupt`] for non-decimal state,
    /// [`ChaincodeError::Overflow`] when the sum overflows, and
    /// [`ChaincodeError::Ledger`] when the commit fails.
    pub fn update(&self, store: Arc<dyn StateStore>) -> ChaincodeResult<ValidityUpdate> {
        let mut stub = ChaincodeStub::new(self.id.clone(), store);
        let previous = read_current(&stub)?;
        let value = previous
            .checked_add(self.interval)
            .ok_or(ChaincodeError::Overflow {
                value: previous,
                interval: self.interval,
            })?;
        stub.put_state(VALIDITY_PERIOD_KEY, value.to_string());
        let commit = stub.commit()?;
        debug!(
            chaincode_id = %self.id,
            previous,
            value,
            height = commit.height,
            "validity period advanced"
        );
        Ok(ValidityUpdate {
            previous,
            value,
            height: commit.height,
        })
    }
}

#[async_trait]
impl Chaincode for ValidityPeriodChaincode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn init(&self, stub: &mut ChaincodeStub) -> ChaincodeResult<()> {
        match stub.get_state(VALIDITY_PERIOD_KEY)? {
            Some(existing) => {
                let value = parse_stored(VALIDITY_PERIOD_KEY, &existing)?;
                info!(chaincode_id = %self.id, value, "validity period already initialised");
            }
            None => {
                stub.put_state(VALIDITY_PERIOD_KEY, self.initial_value.to_string());
                info!(chaincode_id = %self.id, value = self.initial_value, "validity period initialised");
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        stub: &ChaincodeStub,
        function: &str,
        args: &[String],
    ) -> ChaincodeResult<Vec<u8>> {
        if function != QUERY_FUNCTION {
            return Err(ChaincodeError::UnknownFunction {
                function: function.to_string(),
            });
        }
        match args {
            [] => {}
            [key] if key == VALIDITY_PERIOD_KEY => {}
            [key] => {
                return Err(ChaincodeError::InvalidArguments {
                    reason: "unknown_key",
                    value: Some(key.clone()),
                });
            }
            _ => {
                return Err(ChaincodeError::InvalidArguments {
                    reason: "too_many_arguments",
                    value: Some(args.len().to_string()),
                });
            }
        }
        let value = read_current(stub)?;
        serde_json::to_vec(&ValidityPeriodPayload::new(value))
            .map_err(|source| ChaincodeError::Encode { source })
    }
}

fn read_current(stub: &ChaincodeStub) -> ChaincodeResult<i64> {
    let bytes = stub
        .get_state(VALIDITY_PERIOD_KEY)?
        .ok_or_else(|| ChaincodeError::NotFound {
            chaincode_id: stub.chaincode_id().to_string(),
            key: VALIDITY_PERIOD_KEY.to_string(),
        })?;
    parse_stored(VALIDITY_PERIOD_KEY, &bytes)
}

/// Decode the decimal ASCII encoding used for stored values.
pub(crate) fn parse_stored(key: &str, bytes: &[u8]) -> ChaincodeResult<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| ChaincodeError::Corrupt {
            key: key.to_string(),
            value: String::from_utf8_lossy(bytes).into_owned(),
        })
}
