//! # Ingress Queue
//!
//! Bounded priority multiset of queued transfers.
//!
//! ## Data Structures
//!
//! - `ordered`: priority-ordered index (priority descending, acceptance
//!   order ascending within a priority)
//! - `items`: O(1) ownership of the queued transfers by id
//!
//! ## Invariants Enforced
//!
//! - Depth never exceeds the configured capacity (`enqueue` fails fast with
//!   `QueueFull`).
//! - `drain` is atomic with respect to `enqueue`: a transfer is observed by
//!   exactly one drain.
//! - After `close()`, no new transfer is ever accepted.

use dispatch_telemetry::metrics::QUEUE_DEPTH;
use parking_lot::Mutex;
use shared_types::{GatewayError, QueuedTransfer};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

/// Ordering key: priorities descend, ties break on acceptance order.
///
/// Priorities live in `[0.1, 10]`; storing millis as a negated integer keeps
/// the key totally ordered without a float `Ord` shim.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct OrderKey {
    neg_priority_millis: i64,
    seq: u64,
}

impl OrderKey {
    fn new(priority: f64, seq: u64) -> Self {
        Self {
            neg_priority_millis: -((priority * 1000.0).round() as i64),
            seq,
        }
    }
}

#[derive(Default)]
struct Inner {
    ordered: BTreeMap<OrderKey, Uuid>,
    items: HashMap<Uuid, (OrderKey, QueuedTransfer)>,
    seq: u64,
}

/// The bounded ingress queue.
pub struct TransferQueue {
    inner: Mutex<Inner>,
    capacity: usize,
    accepting: AtomicBool,
    depth: AtomicUsize,
}

impl TransferQueue {
    /// Creates an empty queue with a hard capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
            accepting: AtomicBool::new(true),
            depth: AtomicUsize::new(0),
        }
    }

    /// Accepts a transfer, returning its queue id.
    ///
    /// Fails `ShuttingDown` once the queue is closed and `QueueFull` at
    /// capacity. Holds the lock only for the two map inserts.
    pub fn enqueue(&self, transfer: QueuedTransfer) -> Result<Uuid, GatewayError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(GatewayError::ShuttingDown);
        }

        let mut inner = self.inner.lock();
        let depth = inner.items.len();
        if depth >= self.capacity {
            return Err(GatewayError::QueueFull {
                depth,
                capacity: self.capacity,
            });
        }

        let id = transfer.id;
        let key = OrderKey::new(transfer.priority, inner.seq);
        inner.seq += 1;
        inner.ordered.insert(key, id);
        inner.items.insert(id, (key, transfer));
        let depth = inner.items.len();
        drop(inner);

        self.depth.store(depth, Ordering::Release);
        QUEUE_DEPTH.set(depth as f64);
        Ok(id)
    }

    /// Removes up to `up_to` transfers, highest priority first, earliest
    /// first within a priority.
    pub fn drain(&self, up_to: usize) -> Vec<QueuedTransfer> {
        if up_to == 0 {
            return Vec::new();
        }

        let mut inner = self.inner.lock();
        let keys: Vec<OrderKey> = inner.ordered.keys().take(up_to).copied().collect();
        let mut drained = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(id) = inner.ordered.remove(&key) {
                if let Some((_, transfer)) = inner.items.remove(&id) {
                    drained.push(transfer);
                }
            }
        }
        let depth = inner.items.len();
        drop(inner);

        self.depth.store(depth, Ordering::Release);
        QUEUE_DEPTH.set(depth as f64);
        drained
    }

    /// Removes everything still queued. Used by the shutdown path to settle
    /// transfers that will never be dispatched.
    pub fn drain_all(&self) -> Vec<QueuedTransfer> {
        let mut inner = self.inner.lock();
        let drained: Vec<QueuedTransfer> = {
            let mut out: Vec<(OrderKey, QueuedTransfer)> =
                inner.items.drain().map(|(_, v)| v).collect();
            inner.ordered.clear();
            out.sort_by_key(|(key, _)| *key);
            out.into_iter().map(|(_, t)| t).collect()
        };
        drop(inner);

        self.depth.store(0, Ordering::Release);
        QUEUE_DEPTH.set(0.0);
        drained
    }

    /// Current depth, without taking the lock.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stops accepting new transfers. Irreversible.
    pub fn close(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    /// Whether `enqueue` is still admitting transfers.
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }
}
