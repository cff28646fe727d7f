//! Error types for gasless-facilitator.

use crate::ledger::LedgerError;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring, starting or running the facilitator.
///
/// Protocol rejections are not represented here; see
/// [`AuthorizationError`](crate::payment::AuthorizationError).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key material or signing error.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Ledger collaborator error.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// HTTP server error.
    #[error("Server error: {0}")]
    Server(String),
}
