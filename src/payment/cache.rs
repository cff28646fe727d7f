//! In-process cache of consumed nonces.
//!
//! Holds, per sender, the set of nonces this process has seen consumed
//! (either accepted here or reported used by the ledger). It is a fast-path
//! rejection cache only: a miss says nothing, the ledger stays authoritative.
//! Entries are never evicted and are lost on restart.

use crate::payment::types::Address;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-sender consumed-nonce cache.
///
/// Backed by a sharded map so requests for different senders rarely
/// contend; each sender's set is mutated under its shard lock.
#[derive(Clone, Default)]
pub struct NonceCache {
    inner: Arc<DashMap<Address, HashSet<u64>>>,
    counters: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered "consumed" from the cache.
    pub hits: u64,
    /// Lookups that fell through.
    pub misses: u64,
    /// Nonces newly added.
    pub insertions: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl NonceCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache pre-sized for `senders` distinct senders.
    #[must_use]
    pub fn with_capacity(senders: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::with_capacity(senders)),
            counters: Arc::default(),
        }
    }

    /// Check if `nonce` is recorded as consumed for `sender`.
    pub fn contains(&self, sender: &Address, nonce: u64) -> bool {
        let found = self
            .inner
            .get(sender)
            .is_some_and(|nonces| nonces.contains(&nonce));

        if found {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Record `nonce` as consumed for `sender`.
    ///
    /// Check and insert happen under the sender's shard lock, so of several
    /// concurrent callers for the same key exactly one sees `true`.
    pub fn insert(&self, sender: Address, nonce: u64) -> bool {
        let inserted = self.inner.entry(sender).or_default().insert(nonce);
        if inserted {
            self.counters.insertions.fetch_add(1, Ordering::Relaxed);
        }
        inserted
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            insertions: self.counters.insertions.load(Ordering::Relaxed),
        }
    }

    /// Total number of cached nonces across all senders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.iter().map(|entry| entry.value().len()).sum()
    }

    /// Number of senders with at least one cached nonce.
    #[must_use]
    pub fn sender_count(&self) -> usize {
        self.inner.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
