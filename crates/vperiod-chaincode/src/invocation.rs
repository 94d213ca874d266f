//! Invocation and response messages shared by the gateway, API, and CLI.

use serde::{Deserialize, Serialize};

/// Only externally dispatchable chaincode function.
pub const QUERY_FUNCTION: &str = "query";

/// Token presented by system components invoking system chaincodes.
pub const SYSTEM_INVOKER: &str = "system_chaincode_invoker";

/// Structured request to invoke a deployed chaincode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeInvocationSpec {
    /// Id (hash) of the target chaincode.
    pub chaincode_id: String,
    /// Function to dispatch.
    #[serde(default = "default_function")]
    pub function: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Invoker token.
    #[serde(default)]
    pub secure_context: String,
}

fn default_function() -> String {
    QUERY_FUNCTION.to_string()
}

impl ChaincodeInvocationSpec {
    /// Query invocation carrying the system invoker token.
    #[must_use]
    pub fn query(chaincode_id: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            chaincode_id: chaincode_id.into(),
            function: QUERY_FUNCTION.to_string(),
            args,
            secure_context: SYSTEM_INVOKER.to_string(),
        }
    }

    /// Replace the invoker token.
    #[must_use]
    pub fn with_secure_context(mut self, token: impl Into<String>) -> Self {
        self.secure_context = token.into();
        self
    }
}

/// Successful query response; `msg` carries the chaincode payload verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Always `ok` for successful responses.
    pub status: String,
    /// Chaincode payload as a UTF-8 string.
    pub msg: String,
}

impl QueryResponse {
    /// Wrap a chaincode payload.
    #[must_use]
    pub fn ok(payload: &[u8]) -> Self {
        Self {
            status: "ok".to_string(),
            msg: String::from_utf8_lossy(payload).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let spec: ChaincodeInvocationSpec =
            serde_json::from_str(r#"{"chaincode_id":"cc"}"#).expect("decode");
        assert_eq!(spec.function, QUERY_FUNCTION);
        assert!(spec.args.is_empty());
        assert!(spec.secure_context.is_empty());
    }

    #[test]
    fn query_builder_uses_system_invoker() {
        let spec = ChaincodeInvocationSpec::query("cc", vec!["system.validity.period".into()]);
        assert_eq!(spec.secure_context, SYSTEM_INVOKER);
        let spec = spec.with_secure_context("other");
        assert_eq!(spec.secure_context, "other");
        assert_eq!(QueryResponse::ok(b"{}").msg, "{}");
    }
}
