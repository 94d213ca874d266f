//! RFC9457-style API error wrapper.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::warn;
use vperiod_chaincode::ChaincodeError;

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_CONFLICT, PROBLEM_FORBIDDEN, PROBLEM_INTERNAL, PROBLEM_NOT_FOUND,
};
use crate::models::ProblemDetails;

/// Structured API error rendered as a problem document.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, PROBLEM_FORBIDDEN, "forbidden").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn conflict(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, PROBLEM_CONFLICT, "conflict").with_detail(detail)
    }
}

impl From<ChaincodeError> for ApiError {
    fn from(err: ChaincodeError) -> Self {
        match &err {
            ChaincodeError::UnknownChaincode { chaincode_id } => {
                Self::not_found(format!("chaincode '{chaincode_id}' is not deployed"))
            }
            ChaincodeError::NotFound { chaincode_id, key } => {
                Self::not_found(format!("key '{key}' of chaincode '{chaincode_id}' is not initialised"))
            }
            ChaincodeError::UnknownFunction { function } => {
                Self::bad_request(format!("function '{function}' is not dispatchable"))
            }
            ChaincodeError::InvalidArguments { reason, value } => Self::bad_request(match value {
                Some(value) => format!("invalid arguments ({reason}): {value}"),
                None => format!("invalid arguments ({reason})"),
            }),
            ChaincodeError::Unauthorized { chaincode_id } => {
                Self::forbidden(format!("invoker not accepted by chaincode '{chaincode_id}'"))
            }
            ChaincodeError::AlreadyDeployed { chaincode_id } => {
                Self::conflict(format!("chaincode '{chaincode_id}' is already deployed"))
            }
            ChaincodeError::Corrupt { .. }
            | ChaincodeError::Overflow { .. }
            | ChaincodeError::Ledger { .. }
            | ChaincodeError::Encode { .. } => {
                warn!(error = %err, detail = ?err, "chaincode query failed");
                Self::internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chaincode_errors_map_to_statuses() {
        let cases = [
            (
                ChaincodeError::UnknownChaincode {
                    chaincode_id: "cc".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                ChaincodeError::UnknownFunction {
                    function: "update".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                ChaincodeError::Unauthorized {
                    chaincode_id: "cc".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                ChaincodeError::Overflow {
                    value: i64::MAX,
                    interval: 1,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn problem_response_carries_kind() {
        let err = ApiError::not_found("missing");
        assert_eq!(err.kind, PROBLEM_NOT_FOUND);
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
