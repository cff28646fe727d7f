//! External ledger collaborators.
//!
//! The facilitator never owns nonce state: the chain does. These traits are
//! the seams through which the core talks to it:
//!
//! - [`NonceLedger`] answers "has this nonce been consumed on-chain?"
//! - [`SponsoredSubmitter`] submits a verified authorization, paying gas
//! - [`TransactionLookup`] reports the state of a submitted transaction
//!
//! [`AptosLedger`] implements all three against an Aptos fullnode REST API;
//! [`InMemoryLedger`] implements them in-process for offline runs and tests.

mod aptos;
mod memory;

pub use aptos::AptosLedger;
pub use memory::InMemoryLedger;

use crate::payment::{Address, SignedAuthorization};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Errors reported by ledger collaborators.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The request did not complete within its deadline.
    #[error("Ledger request timed out: {0}")]
    Timeout(String),

    /// Transport-level failure.
    #[error("Ledger network error: {0}")]
    Network(String),

    /// The node answered with a non-success status.
    #[error("Ledger rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status returned by the node.
        status: u16,
        /// Body or summary returned by the node.
        message: String,
    },

    /// The transaction was committed but aborted on-chain.
    #[error("Transaction aborted: {0}")]
    Aborted(String),

    /// The requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The node's response could not be decoded.
    #[error("Unexpected ledger response: {0}")]
    Decode(String),
}

/// State of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum TransactionStatus {
    /// Accepted into the mempool, not yet committed.
    Pending,
    /// Committed and executed successfully.
    Success,
    /// Committed but execution failed.
    Failed {
        /// VM status reported by the chain.
        vm_status: String,
    },
    /// The ledger does not know this hash (yet).
    NotFound,
}

impl TransactionStatus {
    /// Short status label used in API responses.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed { .. } => "failed",
            Self::NotFound => "not_found",
        }
    }
}

/// Hex digits in a transaction hash.
const TRANSACTION_HASH_DIGITS: usize = 64;

/// Whether `hash` is a `0x`-prefixed 32-byte hex transaction hash.
#[must_use]
pub fn is_transaction_hash(hash: &str) -> bool {
    hash.strip_prefix("0x").is_some_and(|digits| {
        digits.len() == TRANSACTION_HASH_DIGITS && digits.bytes().all(|b| b.is_ascii_hexdigit())
    })
}

/// Read-only view of the on-chain nonce store.
#[async_trait]
pub trait NonceLedger: Send + Sync {
    /// Whether `nonce` has been consumed on-chain for `sender`.
    async fn is_nonce_used(&self, sender: &Address, nonce: u64) -> Result<bool, LedgerError>;
}

/// Submits sponsored transactions.
#[async_trait]
pub trait SponsoredSubmitter: Send + Sync {
    /// Submit `authorization`, paying gas, and return the transaction hash.
    ///
    /// Returns once the transaction is accepted as pending; it need not be
    /// finalized.
    async fn submit(&self, authorization: &SignedAuthorization) -> Result<String, LedgerError>;
}

/// Looks up submitted transactions.
#[async_trait]
pub trait TransactionLookup: Send + Sync {
    /// Current status of the transaction with `hash`.
    async fn transaction_status(&self, hash: &str) -> Result<TransactionStatus, LedgerError>;
}
