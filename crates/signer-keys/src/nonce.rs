//! # Nonce Allocator
//!
//! Hands out strictly increasing nonces per (account, public key). The
//! counter is an atomic fetch-and-increment, so concurrent executor workers
//! can never receive the same nonce. A nonce consumed by a failed
//! submission is deliberately not returned to the pool: reusing it would
//! risk double-spend ambiguity if the chain later accepts the original, and
//! a skipped nonce costs nothing.
//!
//! On chain-reported drift the entry is refreshed from the chain with
//! `fetch_max`, so a refresh can only move the counter forward.

use dashmap::DashMap;
use parking_lot::Mutex;
use shared_types::{ChainRpc, GatewayError};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Nonce state for one access key.
struct KeyNonce {
    /// Next nonce to hand out.
    next: AtomicU64,
    /// Allocations not yet released.
    inflight: AtomicU32,
    /// Last time the entry was initialized or drift-refreshed.
    last_refreshed_at: Mutex<Instant>,
}

/// Per-(account, public key) nonce source for the executor.
pub struct NonceAllocator {
    chain: Arc<dyn ChainRpc>,
    entries: DashMap<(String, String), Arc<KeyNonce>>,
}

impl NonceAllocator {
    /// Creates an empty allocator backed by the given chain view.
    pub fn new(chain: Arc<dyn ChainRpc>) -> Self {
        Self {
            chain,
            entries: DashMap::new(),
        }
    }

    /// Initializes the entry for one key from its current on-chain nonce.
    /// Returns the first nonce that will be handed out.
    pub async fn initialize_key(
        &self,
        account_id: &str,
        public_key: &str,
    ) -> Result<u64, GatewayError> {
        let view = self.chain.view_access_key(account_id, public_key).await?;
        let first = view.nonce + 1;
        self.entries.insert(
            (account_id.to_owned(), public_key.to_owned()),
            Arc::new(KeyNonce {
                next: AtomicU64::new(first),
                inflight: AtomicU32::new(0),
                last_refreshed_at: Mutex::new(Instant::now()),
            }),
        );
        info!(account_id, public_key, chain_nonce = view.nonce, "nonce entry initialized");
        Ok(first)
    }

    /// Initializes entries for a set of keys, returning the public keys that
    /// succeeded. A key that fails here must not be used for signing.
    pub async fn initialize(&self, account_id: &str, public_keys: &[String]) -> Vec<String> {
        let mut ready = Vec::with_capacity(public_keys.len());
        for pk in public_keys {
            match self.initialize_key(account_id, pk).await {
                Ok(_) => ready.push(pk.clone()),
                Err(err) => {
                    warn!(account_id, public_key = %pk, error = %err, "access key query failed; key stays unusable");
                }
            }
        }
        ready
    }

    /// Atomically takes the next nonce for a key. Fails when the key was
    /// never successfully initialized.
    pub fn next(&self, account_id: &str, public_key: &str) -> Result<u64, GatewayError> {
        let entry = self
            .entries
            .get(&(account_id.to_owned(), public_key.to_owned()))
            .ok_or_else(|| {
                GatewayError::Transient(format!(
                    "nonce entry for {account_id}/{public_key} not initialized"
                ))
            })?;
        entry.inflight.fetch_add(1, Ordering::Relaxed);
        Ok(entry.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Releases an allocation.
    ///
    /// On drift (`chain_nonce` from the node's rejection, when available)
    /// the entry is re-synced from the chain; otherwise the consumed nonce
    /// is simply abandoned.
    pub async fn release(
        &self,
        account_id: &str,
        public_key: &str,
        success: bool,
        drift: bool,
    ) {
        let Some(entry) = self
            .entries
            .get(&(account_id.to_owned(), public_key.to_owned()))
            .map(|e| Arc::clone(&e))
        else {
            return;
        };

        let _ = entry
            .inflight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });

        if success || !drift {
            return;
        }

        match self.chain.view_access_key(account_id, public_key).await {
            Ok(view) => {
                let floor = view.nonce + 1;
                let before = entry.next.fetch_max(floor, Ordering::SeqCst);
                *entry.last_refreshed_at.lock() = Instant::now();
                info!(
                    account_id,
                    public_key,
                    chain_nonce = view.nonce,
                    local_next = before.max(floor),
                    "nonce entry refreshed after drift"
                );
            }
            Err(err) => {
                warn!(account_id, public_key, error = %err, "drift refresh failed; keeping local nonce");
            }
        }
    }

    /// Allocations handed out but not yet released, summed over all keys.
    pub fn total_inflight(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| e.inflight.load(Ordering::Relaxed))
            .sum()
    }

    /// Number of initialized keys.
    pub fn initialized_count(&self) -> usize {
        self.entries.len()
    }

    /// Peeks at the next nonce without consuming it. Test and diagnostics
    /// aid; racing callers must use [`next`](Self::next).
    pub fn peek(&self, account_id: &str, public_key: &str) -> Option<u64> {
        self.entries
            .get(&(account_id.to_owned(), public_key.to_owned()))
            .map(|e| e.next.load(Ordering::SeqCst))
    }
}

impl std::fmt::Debug for NonceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceAllocator")
            .field("initialized_keys", &self.entries.len())
            .finish()
    }
}
