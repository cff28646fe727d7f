//! Rejection taxonomy for the authorization protocol.

use crate::ledger::LedgerError;
use crate::payment::replay::RejectReason;
use crate::payment::types::AddressError;
use thiserror::Error;

/// Why a request could not be turned into an intent or authorization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// One or more required fields were absent or empty.
    #[error("Missing required fields")]
    MissingFields {
        /// The full list of fields the operation requires.
        required: &'static [&'static str],
    },

    /// An address field did not parse.
    #[error("Invalid {field} address: {source}")]
    InvalidAddress {
        /// Offending field.
        field: &'static str,
        /// Parse failure.
        source: AddressError,
    },

    /// A numeric field was not an unsigned 64-bit integer.
    #[error("Invalid {field}: expected an unsigned 64-bit integer")]
    InvalidNumber {
        /// Offending field.
        field: &'static str,
    },

    /// Amount was zero.
    #[error("Invalid amount: must be greater than zero")]
    ZeroAmount,
}

/// Typed rejection returned by the facilitator.
///
/// Every variant except [`SubmissionFailed`](Self::SubmissionFailed) and
/// [`LedgerUnavailable`](Self::LedgerUnavailable) is a client error with no
/// side effects.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// Malformed or missing input.
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),

    /// Expired or replayed authorization.
    #[error("Invalid authorization: {reason}")]
    InvalidAuthorization {
        /// User-visible reason.
        reason: RejectReason,
    },

    /// Signature did not verify for the claimed sender.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Ledger nonce query failed under the fail-closed policy.
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(#[source] LedgerError),

    /// Sponsored submission failed after the nonce was consumed.
    #[error("Submission failed: {0}")]
    SubmissionFailed(#[source] LedgerError),
}

impl From<RejectReason> for AuthorizationError {
    fn from(reason: RejectReason) -> Self {
        Self::InvalidAuthorization { reason }
    }
}

impl AuthorizationError {
    /// Short machine-checkable label for logs and events.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InvalidRequest(RequestError::MissingFields { .. }) => "Missing required fields",
            Self::InvalidRequest(_) => "Invalid request",
            Self::InvalidAuthorization { reason } => reason.as_str(),
            Self::InvalidSignature => "Invalid signature",
            Self::LedgerUnavailable(_) => "Ledger unavailable",
            Self::SubmissionFailed(_) => "Submission failed",
        }
    }
}
