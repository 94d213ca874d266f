//! Query gateway contract and the direct ledger read it must agree with.

use std::sync::Arc;

use async_trait::async_trait;
use vperiod_ledger::StateStore;

use crate::error::{ChaincodeError, ChaincodeResult, GatewayError, GatewayResult};
use crate::invocation::{ChaincodeInvocationSpec, SYSTEM_INVOKER};
use crate::runtime::ChaincodeSupport;
use crate::validity::{VALIDITY_PERIOD_KEY, ValidityPeriodPayload, parse_stored};

/// Reads the validity period through the chaincode `query` entry point.
#[async_trait]
pub trait QueryGateway: Send + Sync {
    /// Current validity period as seen by the chaincode.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] when the call fails in flight,
    /// [`GatewayError::Rejected`] when the chaincode refuses, and
    /// [`GatewayError::Parse`] for a malformed payload.
    async fn query_validity_period(&self) -> GatewayResult<i64>;
}

/// Decode a `{"Name","Value"}` payload into its integer value.
///
/// # Errors
///
/// Returns [`GatewayError::Parse`] when the payload is not the expected
/// document or `Value` is not a decimal `i64`.
pub fn decode_validity_period(payload: &[u8]) -> GatewayResult<i64> {
    let document: ValidityPeriodPayload =
        serde_json::from_slice(payload).map_err(|_| GatewayError::Parse {
            reason: "invalid_document",
            payload: Some(String::from_utf8_lossy(payload).into_owned()),
        })?;
    if document.name != VALIDITY_PERIOD_KEY {
        return Err(GatewayError::Parse {
            reason: "unexpected_name",
            payload: Some(document.name),
        });
    }
    document
        .value
        .parse::<i64>()
        .map_err(|_| GatewayError::Parse {
            reason: "invalid_value",
            payload: Some(document.value),
        })
}

/// Read the stored validity period directly, bypassing chaincode execution.
///
/// # Errors
///
/// Returns [`ChaincodeError::NotFound`] when the key is absent,
/// [`ChaincodeError::Corrupt`] when it is not decimal, and
/// [`ChaincodeError::Ledger`] when the store fails.
pub fn read_validity_period(store: &dyn StateStore, chaincode_id: &str) -> ChaincodeResult<i64> {
    let bytes = store
        .get_state(chaincode_id, VALIDITY_PERIOD_KEY)
        .map_err(ChaincodeError::ledger("direct.get_state"))?
        .ok_or_else(|| ChaincodeError::NotFound {
            chaincode_id: chaincode_id.to_string(),
            key: VALIDITY_PERIOD_KEY.to_string(),
        })?;
    parse_stored(VALIDITY_PERIOD_KEY, &bytes)
}

/// In-process gateway dispatching through [`ChaincodeSupport`].
#[derive(Debug, Clone)]
pub struct LocalGateway {
    support: Arc<ChaincodeSupport>,
    chaincode_id: String,
    invoker_token: String,
}

impl LocalGateway {
    /// Gateway querying `chaincode_id` with the system invoker token.
    #[must_use]
    pub fn new(support: Arc<ChaincodeSupport>, chaincode_id: impl Into<String>) -> Self {
        Self {
            support,
            chaincode_id: chaincode_id.into(),
            invoker_token: SYSTEM_INVOKER.to_string(),
        }
    }

    /// Present a different invoker token.
    #[must_use]
    pub fn with_invoker_token(mut self, token: impl Into<String>) -> Self {
        self.invoker_token = token.into();
        self
    }

    /// Chaincode this gateway queries.
    #[must_use]
    pub fn chaincode_id(&self) -> &str {
        &self.chaincode_id
    }
}

#[async_trait]
impl QueryGateway for LocalGateway {
    async fn query_validity_period(&self) -> GatewayResult<i64> {
        let spec = ChaincodeInvocationSpec::query(
            self.chaincode_id.clone(),
            vec![VALIDITY_PERIOD_KEY.to_string()],
        )
        .with_secure_context(self.invoker_token.clone());
        let payload = self.support.query(&spec).await?;
        decode_validity_period(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_accepts_reference_document() {
        let value =
            decode_validity_period(br#"{"Name":"system.validity.period","Value":"1700000000"}"#)
                .expect("decode");
        assert_eq!(value, 1_700_000_000);
    }

    #[test]
    fn decode_separates_parse_failures() {
        for (payload, reason) in [
            (&b"not json"[..], "invalid_document"),
            (br#"{"Name":"other","Value":"1"}"#, "unexpected_name"),
            (br#"{"Name":"system.validity.period","Value":"soon"}"#, "invalid_value"),
        ] {
            match decode_validity_period(payload) {
                Err(GatewayError::Parse { reason: got, .. }) => assert_eq!(got, reason),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }
}
