//! HTTP request handlers.

use crate::api::response::{
    ApiError, AuthorizationResponse, HealthResponse, IntentResponse, StatusResponse, StrandedResponse,
};
use crate::api::AppState;
use crate::ledger::is_transaction_hash;
use crate::payment::{AuthorizationRequest, IntentRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Liveness and identity of the facilitator.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        facilitator_address: state.facilitator_address.to_string(),
        network: state.facilitator.settings().network.as_str(),
    })
}

/// Issue a payment intent, answered with `402 Payment Required`.
pub async fn request_intent(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IntentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IntentResponse>), ApiError> {
    let Json(request) = payload?;
    let intent = state.facilitator.issue_intent(&request)?;
    Ok((StatusCode::PAYMENT_REQUIRED, Json(IntentResponse::new(intent))))
}

/// Verify a signed authorization and execute it as a sponsored transaction.
pub async fn submit_authorization(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AuthorizationRequest>, JsonRejection>,
) -> Result<Json<AuthorizationResponse>, ApiError> {
    let Json(request) = payload?;
    let receipt = state.facilitator.submit_authorization(&request).await?;
    let explorer = state
        .facilitator
        .settings()
        .network
        .explorer_url(&receipt.transaction_hash);
    Ok(Json(AuthorizationResponse::new(receipt, explorer)))
}

/// Look up a submitted transaction.
pub async fn transaction_status(
    State(state): State<Arc<AppState>>,
    Path(tx_hash): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    if !is_transaction_hash(&tx_hash) {
        debug!(hash = %tx_hash, "Rejecting malformed transaction hash");
        return Err(ApiError::invalid_hash());
    }
    let status = state
        .facilitator
        .transaction_status(&tx_hash)
        .await
        .map_err(|e| {
            warn!(hash = %tx_hash, error = %e, "Transaction status lookup failed");
            ApiError::status_lookup(&e)
        })?;
    debug!(hash = %tx_hash, status = status.as_str(), "Transaction status");
    Ok(Json(StatusResponse::new(tx_hash, &status)))
}

/// Nonces awaiting reconciliation.
pub async fn stranded_nonces(State(state): State<Arc<AppState>>) -> Json<StrandedResponse> {
    Json(StrandedResponse {
        stranded: state.facilitator.stranded_nonces(),
    })
}
