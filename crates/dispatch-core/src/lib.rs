//! # Dispatch Core
//!
//! The dispatch pipeline: ingress queue, adaptive batch collector,
//! semaphore-bounded transfer executor, metrics engine, and control plane.
//!
//! ## Data Flow
//!
//! ```text
//! HTTP ingress ──enqueue──→ TransferQueue
//!                                │ drain (tick / immediate flush)
//!                                ↓
//!                         BatchCollector ──batch──→ TransferExecutor
//!                                                        │ sign + submit
//!                                                        ↓
//!                                                    ChainRpc ──→ chain
//!                                                        │
//!                     KeyRegistry / NonceAllocator ←─────┘ outcome
//!                     MetricsEngine / observers    ←─────┘
//! ```
//!
//! ## Invariants Enforced
//!
//! - Per (account, public key), nonces are strictly increasing with no
//!   duplicates among in-flight transactions (delegated to `signer-keys`).
//! - In-flight submissions never exceed `max_parallel_transactions`.
//! - A drained transfer belongs to exactly one batch; every accepted
//!   transfer reaches exactly one terminal state (success, failure, or
//!   shutdown-cancelled).
//! - A batch never exceeds twice the configured base size.

pub mod config;
pub mod domain;
pub mod service;

pub use config::{ConfigError, DispatchConfig};
pub use domain::collector::{adaptive_batch_size, BatchCollector};
pub use domain::control::{ControlPlane, GatewayState, HealthReport};
pub use domain::executor::TransferExecutor;
pub use domain::observer::{DispatchObserver, ObserverSet};
pub use domain::queue::TransferQueue;
pub use domain::tracker::{BountyStatus, MetricsEngine, MetricsSnapshot};
pub use service::{DispatchPipeline, StatusReport};
