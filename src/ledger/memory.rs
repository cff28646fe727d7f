//! In-process ledger for offline runs and tests.
//!
//! Keeps an authoritative nonce store in memory and "submits" by recording
//! the authorization. Like the on-chain module, it rejects a second
//! submission of the same (sender, nonce).

use crate::ledger::{LedgerError, NonceLedger, SponsoredSubmitter, TransactionLookup, TransactionStatus};
use crate::payment::message;
use crate::payment::{Address, SignedAuthorization};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha3::{Digest, Sha3_256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// In-memory implementation of every ledger collaborator.
#[derive(Default)]
pub struct InMemoryLedger {
    used: Mutex<HashMap<Address, HashSet<u64>>>,
    transactions: Mutex<HashMap<String, TransactionStatus>>,
    submissions: Mutex<Vec<SignedAuthorization>>,
    queries: AtomicU64,
    fail_queries: AtomicBool,
    fail_submissions: AtomicBool,
    submit_delay: Mutex<Option<Duration>>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `nonce` as consumed on the ledger, as if by another relayer.
    pub fn mark_used(&self, sender: Address, nonce: u64) {
        self.used.lock().entry(sender).or_default().insert(nonce);
    }

    /// Number of nonce queries served so far.
    #[must_use]
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Authorizations submitted so far, in order.
    #[must_use]
    pub fn submissions(&self) -> Vec<SignedAuthorization> {
        self.submissions.lock().clone()
    }

    /// Make nonce queries fail until reset.
    pub fn set_query_failure(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::Relaxed);
    }

    /// Make submissions fail until reset.
    pub fn set_submit_failure(&self, fail: bool) {
        self.fail_submissions.store(fail, Ordering::Relaxed);
    }

    /// Delay every submission, to simulate a slow chain.
    pub fn set_submit_delay(&self, delay: Option<Duration>) {
        *self.submit_delay.lock() = delay;
    }

    fn transaction_hash(authorization: &SignedAuthorization) -> String {
        let mut hasher = Sha3_256::new();
        hasher.update(message::encode(authorization.intent()));
        hasher.update(authorization.signature().as_bytes());
        format!("0x{}", hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl NonceLedger for InMemoryLedger {
    async fn is_nonce_used(&self, sender: &Address, nonce: u64) -> Result<bool, LedgerError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        if self.fail_queries.load(Ordering::Relaxed) {
            return Err(LedgerError::Network("in-memory ledger unavailable".to_string()));
        }
        let used = self
            .used
            .lock()
            .get(sender)
            .is_some_and(|nonces| nonces.contains(&nonce));
        debug!(sender = %sender, nonce, used, "In-memory nonce query");
        Ok(used)
    }
}

#[async_trait]
impl SponsoredSubmitter for InMemoryLedger {
    async fn submit(&self, authorization: &SignedAuthorization) -> Result<String, LedgerError> {
        let delay = *self.submit_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_submissions.load(Ordering::Relaxed) {
            return Err(LedgerError::Network("in-memory ledger unavailable".to_string()));
        }

        let intent = authorization.intent();
        let fresh = self
            .used
            .lock()
            .entry(*intent.sender())
            .or_default()
            .insert(intent.nonce());
        if !fresh {
            return Err(LedgerError::Aborted("E_NONCE_ALREADY_USED".to_string()));
        }

        let hash = Self::transaction_hash(authorization);
        self.transactions
            .lock()
            .insert(hash.clone(), TransactionStatus::Success);
        self.submissions.lock().push(authorization.clone());

        info!(hash = %hash, sender = %intent.sender(), amount = intent.amount(), "In-memory sponsored transfer recorded");
        Ok(hash)
    }
}

#[async_trait]
impl TransactionLookup for InMemoryLedger {
    async fn transaction_status(&self, hash: &str) -> Result<TransactionStatus, LedgerError> {
        Ok(self
            .transactions
            .lock()
            .get(hash)
            .cloned()
            .unwrap_or(TransactionStatus::NotFound))
    }
}
