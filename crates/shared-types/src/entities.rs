//! Core domain entities for the dispatch pipeline.
//!
//! Ownership rules:
//!
//! - A [`TransferRequest`] is immutable once constructed.
//! - A [`QueuedTransfer`] is owned exclusively by the ingress queue until it
//!   is drained into a batch, then exclusively by the executor. It appears in
//!   at most one batch.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// Lowest priority a client may assign to a transfer.
pub const MIN_PRIORITY: f64 = 0.1;
/// Highest priority a client may assign to a transfer.
pub const MAX_PRIORITY: f64 = 10.0;
/// Default priority when the client does not specify one.
pub const DEFAULT_PRIORITY: f64 = 1.0;

/// A single fungible-token transfer as submitted by a client.
///
/// `amount` is a decimal string in the token's base units; it is kept as a
/// string end to end so the `ft_transfer` args serialize byte-identically to
/// what the client sent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Receiving account id.
    pub receiver_id: String,
    /// Amount in base units, decimal string.
    pub amount: String,
    /// Optional printable memo, at most 256 bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// A transfer that has been accepted into the ingress queue.
#[derive(Clone, Debug)]
pub struct QueuedTransfer {
    /// Queue id returned to the client.
    pub id: Uuid,
    /// The immutable request.
    pub request: TransferRequest,
    /// Monotonic acceptance timestamp.
    pub enqueued_at: Instant,
    /// Drain priority, clamped to `[MIN_PRIORITY, MAX_PRIORITY]`.
    pub priority: f64,
    /// How many times a higher layer has re-enqueued this transfer.
    pub retry_count: u32,
}

impl QueuedTransfer {
    /// Wraps a request for queueing, assigning a fresh id and clamping the
    /// priority into the allowed band.
    pub fn new(request: TransferRequest, priority: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            enqueued_at: Instant::now(),
            priority: priority.clamp(MIN_PRIORITY, MAX_PRIORITY),
            retry_count: 0,
        }
    }
}

/// Outcome of a single drained batch, recorded by the executor.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct BatchMetrics {
    /// Number of transfers in the batch.
    pub size: usize,
    /// Transfers that reached the chain and succeeded.
    pub successful: usize,
    /// Transfers that terminally failed.
    pub failed: usize,
    /// Wall-clock duration of the whole batch.
    pub duration_ms: u64,
    /// Completion time, milliseconds since the UNIX epoch.
    pub timestamp_ms: u64,
}

impl BatchMetrics {
    /// True when every transfer in the batch succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.successful == self.size
    }
}

/// Milliseconds since the UNIX epoch.
pub fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_clamped_into_band() {
        let req = TransferRequest {
            receiver_id: "alice.testnet".into(),
            amount: "100".into(),
            memo: None,
        };
        assert_eq!(QueuedTransfer::new(req.clone(), 0.0).priority, MIN_PRIORITY);
        assert_eq!(QueuedTransfer::new(req.clone(), 99.0).priority, MAX_PRIORITY);
        assert_eq!(QueuedTransfer::new(req, 2.5).priority, 2.5);
    }

    #[test]
    fn queued_transfers_get_distinct_ids() {
        let req = TransferRequest {
            receiver_id: "alice.testnet".into(),
            amount: "1".into(),
            memo: None,
        };
        let a = QueuedTransfer::new(req.clone(), 1.0);
        let b = QueuedTransfer::new(req, 1.0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn memo_is_omitted_from_json_when_absent() {
        let req = TransferRequest {
            receiver_id: "alice.testnet".into(),
            amount: "100".into(),
            memo: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("memo"));
    }
}
