//! Response bodies for the HTTP API.

use crate::ledger::{LedgerError, TransactionStatus};
use crate::payment::{AuthorizationError, PaymentIntent, RequestError, StrandedNonce, TransactionReceipt};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// `402 Payment Required` body carrying an intent to sign.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    /// Always `true`.
    pub payment_required: bool,
    /// The intent to sign.
    pub intent: PaymentIntent,
    /// Human-readable prompt.
    pub message: &'static str,
    /// Signing steps.
    pub instructions: Instructions,
}

/// Client-side signing steps.
#[derive(Debug, Serialize)]
pub struct Instructions {
    /// Build the message.
    pub step1: &'static str,
    /// Sign it.
    pub step2: &'static str,
    /// Submit it.
    pub step3: &'static str,
}

impl IntentResponse {
    /// Wrap an issued intent.
    pub fn new(intent: PaymentIntent) -> Self {
        Self {
            payment_required: true,
            intent,
            message: "Sign this payment authorization to proceed",
            instructions: Instructions {
                step1: "Construct authorization message from intent fields",
                step2: "Sign message with your Aptos wallet",
                step3: "Submit signed authorization to /api/auth/submit-authorization",
            },
        }
    }
}

/// Body returned for an executed authorization.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResponse {
    /// Always `true`.
    pub success: bool,
    /// Sponsored transaction hash.
    pub transaction_hash: String,
    /// Human-readable summary.
    pub message: &'static str,
    /// Explorer link for the transaction.
    pub explorer: String,
}

impl AuthorizationResponse {
    /// Body for an accepted authorization.
    pub fn new(receipt: TransactionReceipt, explorer: String) -> Self {
        Self {
            success: true,
            transaction_hash: receipt.transaction_hash,
            message: "Payment authorized and executed",
            explorer,
        }
    }
}

/// Body returned by the status endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Queried hash.
    pub transaction_hash: String,
    /// `pending`, `success`, `failed` or `not_found`.
    pub status: &'static str,
    /// VM status of a failed transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm_status: Option<String>,
}

impl StatusResponse {
    /// Body for a looked-up transaction.
    pub fn new(transaction_hash: String, status: &TransactionStatus) -> Self {
        let vm_status = match status {
            TransactionStatus::Failed { vm_status } => Some(vm_status.clone()),
            _ => None,
        };
        Self {
            transaction_hash,
            status: status.as_str(),
            vm_status,
        }
    }
}

/// Body returned by the health endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `ok`.
    pub status: &'static str,
    /// Current time, RFC 3339.
    pub timestamp: String,
    /// Account paying gas.
    pub facilitator_address: String,
    /// Target network.
    pub network: &'static str,
}

/// Body returned by the reconciliation endpoint.
#[derive(Debug, Serialize)]
pub struct StrandedResponse {
    /// Consumed nonces without a successful submission, oldest first.
    pub stranded: Vec<StrandedNonce>,
}

/// Error body. Only the fields relevant to the error kind are present.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error label.
    pub error: &'static str,
    /// Rejection reason for invalid authorizations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    /// Detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Required fields, when some were missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<&'static [&'static str]>,
}

impl ErrorBody {
    fn new(error: &'static str) -> Self {
        Self {
            error,
            reason: None,
            message: None,
            required: None,
        }
    }

    fn with_message(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(error)
        }
    }
}

/// An error ready to be turned into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    /// The response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub(crate) fn invalid_hash() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody::with_message("Invalid request", "Transaction hash must be 0x followed by 64 hex digits"),
        }
    }

    pub(crate) fn status_lookup(error: &LedgerError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody::with_message("Failed to check transaction status", error.to_string()),
        }
    }
}

impl From<AuthorizationError> for ApiError {
    fn from(error: AuthorizationError) -> Self {
        let (status, body) = match &error {
            AuthorizationError::InvalidRequest(RequestError::MissingFields { required }) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    required: Some(*required),
                    ..ErrorBody::new("Missing required fields")
                },
            ),
            AuthorizationError::InvalidRequest(e) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::with_message("Invalid request", e.to_string()),
            ),
            AuthorizationError::InvalidAuthorization { reason } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    reason: Some(reason.as_str()),
                    ..ErrorBody::new("Invalid authorization")
                },
            ),
            AuthorizationError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::with_message(
                    "Invalid signature",
                    "The provided signature does not match the authorization message",
                ),
            ),
            AuthorizationError::LedgerUnavailable(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody::with_message("Ledger unavailable", e.to_string()),
            ),
            AuthorizationError::SubmissionFailed(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::with_message("Failed to process authorization", e.to_string()),
            ),
        };
        Self { status, body }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody::with_message("Invalid JSON body", rejection.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
