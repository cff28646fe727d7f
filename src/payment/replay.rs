//! Replay protection combining the local nonce cache and the on-chain ledger.
//!
//! This is the decision function behind every submission: an authorization
//! is acceptable only if it has not expired and its (sender, nonce) has not
//! been consumed.

use crate::ledger::{LedgerError, NonceLedger};
use crate::payment::cache::{CacheStats, NonceCache};
use crate::payment::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// How a failed ledger nonce query is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LedgerErrorPolicy {
    /// Treat the nonce as unused. Payments keep flowing during ledger
    /// outages; the chain's own nonce store is the remaining backstop.
    #[default]
    FailOpen,
    /// Refuse to decide; the request fails with `LedgerUnavailable`.
    FailClosed,
}

/// Why an authorization was refused by the replay guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Expiry is at or before the current time.
    Expired,
    /// The (sender, nonce) pair was already consumed.
    Replay,
}

impl RejectReason {
    /// User-visible reason string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Expired => "Authorization expired",
            Self::Replay => "Nonce already used (replay attack)",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`ReplayGuard::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Neither expired nor consumed.
    Valid,
    /// Refused for the given reason.
    Rejected(RejectReason),
}

impl Validation {
    /// Returns true if the authorization may proceed.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Rejection reason, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Valid => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}

/// Replay guard statistics for monitoring.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    /// Nonce cache statistics.
    pub cache: CacheStats,
    /// Queries sent to the ledger.
    pub ledger_queries: u64,
    /// Ledger queries that failed.
    pub ledger_errors: u64,
}

/// Cache-first, ledger-backed replay guard.
///
/// The cache only ever short-circuits towards rejection; acceptance always
/// implies the ledger was asked (or failed open).
pub struct ReplayGuard {
    cache: NonceCache,
    ledger: Arc<dyn NonceLedger>,
    policy: LedgerErrorPolicy,
    ledger_queries: AtomicU64,
    ledger_errors: AtomicU64,
}

impl ReplayGuard {
    /// Create a guard with an empty cache over `ledger`.
    #[must_use]
    pub fn new(ledger: Arc<dyn NonceLedger>, policy: LedgerErrorPolicy) -> Self {
        if policy == LedgerErrorPolicy::FailOpen {
            info!("Replay guard ledger error policy: fail-open (ledger errors treated as unused nonce)");
        }
        Self {
            cache: NonceCache::new(),
            ledger,
            policy,
            ledger_queries: AtomicU64::new(0),
            ledger_errors: AtomicU64::new(0),
        }
    }

    /// Whether (sender, nonce) has been consumed.
    ///
    /// A cache hit answers immediately. On a miss the ledger is queried and a
    /// positive answer is cached, so the same key is never queried twice.
    ///
    /// # Errors
    ///
    /// Returns the ledger error only under [`LedgerErrorPolicy::FailClosed`].
    pub async fn is_consumed(&self, sender: &Address, nonce: u64) -> Result<bool, LedgerError> {
        // Step 1: local cache (fast path)
        if self.cache.contains(sender, nonce) {
            debug!(sender = %sender, nonce, "Nonce found in cache (already used)");
            return Ok(true);
        }

        // Step 2: authoritative ledger
        self.ledger_queries.fetch_add(1, Ordering::Relaxed);
        match self.ledger.is_nonce_used(sender, nonce).await {
            Ok(true) => {
                self.cache.insert(*sender, nonce);
                info!(sender = %sender, nonce, "Nonce already used on-chain");
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                self.ledger_errors.fetch_add(1, Ordering::Relaxed);
                match self.policy {
                    LedgerErrorPolicy::FailOpen => {
                        warn!(sender = %sender, nonce, error = %e, "Ledger nonce query failed, treating nonce as unused");
                        Ok(false)
                    }
                    LedgerErrorPolicy::FailClosed => {
                        warn!(sender = %sender, nonce, error = %e, "Ledger nonce query failed, refusing to decide");
                        Err(e)
                    }
                }
            }
        }
    }

    /// Record (sender, nonce) as consumed. Idempotent.
    pub fn mark_consumed(&self, sender: Address, nonce: u64) {
        if self.cache.insert(sender, nonce) {
            debug!(sender = %sender, nonce, "Nonce marked as used in cache");
        }
    }

    /// Atomically record (sender, nonce) as consumed if it was not already.
    ///
    /// Returns `true` for exactly one caller per key; this is what serialises
    /// concurrent submissions of the same authorization.
    pub fn claim(&self, sender: Address, nonce: u64) -> bool {
        let claimed = self.cache.insert(sender, nonce);
        debug!(sender = %sender, nonce, claimed, "Nonce claim");
        claimed
    }

    /// Check expiry, then nonce state, against the current time.
    ///
    /// # Errors
    ///
    /// Returns the ledger error only under [`LedgerErrorPolicy::FailClosed`].
    pub async fn validate(&self, sender: &Address, nonce: u64, expiry: u64) -> Result<Validation, LedgerError> {
        self.validate_at(sender, nonce, expiry, unix_now()).await
    }

    /// [`validate`](Self::validate) with an explicit current time.
    ///
    /// Expiry is checked first and wins regardless of nonce state; it needs
    /// no I/O.
    ///
    /// # Errors
    ///
    /// Returns the ledger error only under [`LedgerErrorPolicy::FailClosed`].
    pub async fn validate_at(
        &self,
        sender: &Address,
        nonce: u64,
        expiry: u64,
        now: u64,
    ) -> Result<Validation, LedgerError> {
        if expiry <= now {
            return Ok(Validation::Rejected(RejectReason::Expired));
        }
        if self.is_consumed(sender, nonce).await? {
            return Ok(Validation::Rejected(RejectReason::Replay));
        }
        Ok(Validation::Valid)
    }

    /// Read-only access to the nonce cache.
    #[must_use]
    pub const fn cache(&self) -> &NonceCache {
        &self.cache
    }

    /// Configured ledger error policy.
    #[must_use]
    pub const fn policy(&self) -> LedgerErrorPolicy {
        self.policy
    }

    /// Get replay guard statistics.
    #[must_use]
    pub fn stats(&self) -> ReplayStats {
        ReplayStats {
            cache: self.cache.stats(),
            ledger_queries: self.ledger_queries.load(Ordering::Relaxed),
            ledger_errors: self.ledger_errors.load(Ordering::Relaxed),
        }
    }
}

/// Current Unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
