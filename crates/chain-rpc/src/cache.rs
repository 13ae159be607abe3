//! Recent-block-hash cache.
//!
//! A stale hash makes the chain reject the transaction outright, so the TTL
//! stays below the chain's acceptance window by a wide margin and an
//! expired-transaction rejection invalidates the cache immediately.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// TTL-bounded cache of one block hash.
pub struct BlockHashCache {
    ttl: Duration,
    slot: Mutex<Option<(Instant, [u8; 32])>>,
}

impl BlockHashCache {
    /// Creates an empty cache. `ttl` must stay at or below one second.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ttl.min(Duration::from_secs(1)),
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached hash when it is still fresh.
    pub fn get(&self) -> Option<[u8; 32]> {
        let slot = self.slot.lock();
        match *slot {
            Some((at, hash)) if at.elapsed() < self.ttl => Some(hash),
            _ => None,
        }
    }

    /// Stores a freshly fetched hash.
    pub fn put(&self, hash: [u8; 32]) {
        *self.slot.lock() = Some((Instant::now(), hash));
    }

    /// Drops the cached hash, forcing the next read to hit the node.
    pub fn invalidate(&self) {
        *self.slot.lock() = None;
    }
}
