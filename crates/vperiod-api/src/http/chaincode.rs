//! Query gateway and direct ledger read handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;
use vperiod_chaincode::{ChaincodeInvocationSpec, QueryResponse};
use vperiod_ledger::StateStore;
use vperiod_telemetry::current_request_id;

use crate::http::errors::ApiError;
use crate::models::{ChainResponse, HistoryEntry, StateResponse};
use crate::state::ApiState;

pub(crate) async fn query_chaincode(
    State(state): State<Arc<ApiState>>,
    Json(spec): Json<ChaincodeInvocationSpec>,
) -> Result<Json<QueryResponse>, ApiError> {
    if spec.chaincode_id.trim().is_empty() {
        return Err(ApiError::bad_request("chaincode_id must not be empty"));
    }
    let payload = state.support.query(&spec).await?;
    let response = QueryResponse::ok(&payload);
    info!(
        request_id = current_request_id().as_deref().unwrap_or(""),
        chaincode_id = %spec.chaincode_id,
        function = %spec.function,
        msg = %response.msg,
        "chaincode query served"
    );
    Ok(Json(response))
}

pub(crate) async fn get_state(
    State(state): State<Arc<ApiState>>,
    Path((chaincode_id, key)): Path<(String, String)>,
) -> Result<Json<StateResponse>, ApiError> {
    let value = state
        .ledger
        .get_state(&chaincode_id, &key)
        .map_err(|err| ApiError::internal(err.to_string()))?
        .ok_or_else(|| {
            ApiError::not_found(format!("no state for key '{key}' of chaincode '{chaincode_id}'"))
        })?;
    Ok(Json(StateResponse {
        chaincode_id,
        key,
        value: String::from_utf8_lossy(&value).into_owned(),
    }))
}

pub(crate) async fn get_history(
    State(state): State<Arc<ApiState>>,
    Path((chaincode_id, key)): Path<(String, String)>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let history = state.ledger.history(&chaincode_id, &key);
    if history.is_empty() {
        return Err(ApiError::not_found(format!(
            "no history for key '{key}' of chaincode '{chaincode_id}'"
        )));
    }
    Ok(Json(
        history
            .into_iter()
            .map(|version| HistoryEntry {
                height: version.height,
                value: version
                    .value
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
            })
            .collect(),
    ))
}

pub(crate) async fn get_chain(State(state): State<Arc<ApiState>>) -> Json<ChainResponse> {
    let height = state.ledger.height();
    state.telemetry.set_ledger_height(height);
    Json(ChainResponse { height })
}
