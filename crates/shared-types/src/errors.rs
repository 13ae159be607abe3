//! # Error Taxonomy
//!
//! Every failure in the gateway maps onto [`GatewayError`]. The `kind()`
//! string is stable: it is used as the `error` field of HTTP failure bodies
//! and as the metrics label, so renaming a variant is a wire change.

use thiserror::Error;

/// Why the chain rejected a transaction at the protocol level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidTxKind {
    /// Submitted nonce is at or below the access key's current nonce.
    /// Carries the chain's current nonce when the node reported it.
    NonceTooLow(Option<u64>),
    /// Submitted nonce is too far ahead of the access key's current nonce.
    NonceTooLarge,
    /// The referenced block hash fell out of the acceptance window.
    ExpiredBlockHash,
    /// Signature, gas, or format problem.
    Other,
}

impl InvalidTxKind {
    /// True when the rejection indicates local/chain nonce disagreement and
    /// the allocator should refresh from the chain.
    pub fn is_nonce_drift(&self) -> bool {
        matches!(self, Self::NonceTooLow(_) | Self::NonceTooLarge)
    }
}

/// The gateway-wide failure taxonomy.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Ingress queue is at capacity; the client should back off and retry.
    #[error("queue full: {depth} queued, capacity {capacity}")]
    QueueFull { depth: usize, capacity: usize },

    /// Request failed validation; permanent for this request.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No active signing key is available.
    #[error("no active signing keys available")]
    NoKeys,

    /// Network, timeout, or 5xx failure talking to the RPC node.
    #[error("transient rpc failure: {0}")]
    Transient(String),

    /// The node rejected the transaction itself.
    #[error("transaction rejected by node: {message}")]
    InvalidTx {
        kind: InvalidTxKind,
        message: String,
    },

    /// `ft_transfer` executed and panicked (insufficient balance,
    /// unregistered receiver, ...).
    #[error("contract error: {0}")]
    ContractError(String),

    /// The gateway is draining and no longer accepts work.
    #[error("gateway is shutting down")]
    ShuttingDown,
}

impl GatewayError {
    /// Stable machine-readable kind, used in response bodies and as a
    /// metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QueueFull { .. } => "QUEUE_FULL",
            Self::Validation(_) => "VALIDATION",
            Self::NoKeys => "NO_KEYS",
            Self::Transient(_) => "TRANSIENT",
            Self::InvalidTx { kind, .. } if kind.is_nonce_drift() => "NONCE_DRIFT",
            Self::InvalidTx { .. } => "INVALID_TX",
            Self::ContractError(_) => "CONTRACT_ERROR",
            Self::ShuttingDown => "SHUTTING_DOWN",
        }
    }

    /// True when the failing transfer's nonce allocator entry should be
    /// refreshed from the chain before the next allocation.
    pub fn is_nonce_drift(&self) -> bool {
        matches!(self, Self::InvalidTx { kind, .. } if kind.is_nonce_drift())
    }

    /// Chain-reported current nonce, when the node included one in its
    /// rejection.
    pub fn chain_nonce(&self) -> Option<u64> {
        match self {
            Self::InvalidTx {
                kind: InvalidTxKind::NonceTooLow(n),
                ..
            } => *n,
            _ => None,
        }
    }
}
