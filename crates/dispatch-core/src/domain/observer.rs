//! # Dispatch Observers
//!
//! Typed fan-out for pipeline events. Listeners register once at wiring
//! time; every hook has a no-op default so an observer implements only what
//! it cares about.

use parking_lot::RwLock;
use shared_types::BatchMetrics;
use std::sync::Arc;
use uuid::Uuid;

/// Pipeline event listener.
pub trait DispatchObserver: Send + Sync {
    /// A transfer was accepted into the ingress queue.
    fn transfer_queued(&self, _id: Uuid, _priority: f64) {}

    /// A transfer reached a terminal failure.
    fn transfer_failed(&self, _id: Uuid, _kind: &'static str) {}

    /// A batch finished processing.
    fn batch_completed(&self, _metrics: &BatchMetrics) {}
}

/// Registered listeners, fanned out synchronously. Hooks must stay cheap;
/// anything slow belongs on the listener's own task.
#[derive(Default)]
pub struct ObserverSet {
    listeners: RwLock<Vec<Arc<dyn DispatchObserver>>>,
}

impl ObserverSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener.
    pub fn register(&self, observer: Arc<dyn DispatchObserver>) {
        self.listeners.write().push(observer);
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Fans out a queued event.
    pub fn notify_transfer_queued(&self, id: Uuid, priority: f64) {
        for listener in self.listeners.read().iter() {
            listener.transfer_queued(id, priority);
        }
    }

    /// Fans out a terminal failure event.
    pub fn notify_transfer_failed(&self, id: Uuid, kind: &'static str) {
        for listener in self.listeners.read().iter() {
            listener.transfer_failed(id, kind);
        }
    }

    /// Fans out a batch completion event.
    pub fn notify_batch_completed(&self, metrics: &BatchMetrics) {
        for listener in self.listeners.read().iter() {
            listener.batch_completed(metrics);
        }
    }
}
