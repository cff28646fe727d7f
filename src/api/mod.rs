//! HTTP API.
//!
//! | Method | Path                              | Success |
//! |--------|-----------------------------------|---------|
//! | POST   | `/api/auth/request-intent`        | 402     |
//! | POST   | `/api/auth/submit-authorization`  | 200     |
//! | GET    | `/api/auth/status/{txHash}`       | 200     |
//! | GET    | `/api/auth/stranded`              | 200     |
//! | GET    | `/health`                         | 200     |

mod handlers;
mod response;

pub use response::{
    ApiError, AuthorizationResponse, ErrorBody, HealthResponse, Instructions, IntentResponse, StatusResponse,
    StrandedResponse,
};

use crate::payment::{Address, AuthorizationFacilitator};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state for every handler.
pub struct AppState {
    /// The facilitator serving all payment routes.
    pub facilitator: Arc<AuthorizationFacilitator>,
    /// Account paying gas, reported by `/health`.
    pub facilitator_address: Address,
}

/// Create the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let auth = Router::new()
        .route("/request-intent", post(handlers::request_intent))
        .route("/submit-authorization", post(handlers::submit_authorization))
        .route("/status/{tx_hash}", get(handlers::transaction_status))
        .route("/stranded", get(handlers::stranded_nonces));

    Router::new()
        .nest("/api/auth", auth)
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
