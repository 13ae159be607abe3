//! Prometheus metrics for the dispatch gateway.
//!
//! Naming convention: `ftgw_<component>_<metric>_<unit>`.
//!
//! ## Metric Types
//!
//! - **Counter**: monotonically increasing (e.g. transfers_succeeded_total)
//! - **Gauge**: goes up and down (e.g. queue_depth)
//! - **Histogram**: distribution (e.g. batch_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry.
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // INGRESS / QUEUE
    // =========================================================================

    /// Transfers accepted into the ingress queue.
    pub static ref TRANSFERS_ENQUEUED: Counter = Counter::new(
        "ftgw_queue_transfers_enqueued_total",
        "Transfers accepted into the ingress queue"
    ).expect("metric creation failed");

    /// Enqueue attempts rejected at the queue boundary, by error kind.
    pub static ref ENQUEUE_REJECTED: CounterVec = CounterVec::new(
        Opts::new("ftgw_queue_rejected_total", "Enqueue attempts rejected"),
        &["kind"]  // kind: QUEUE_FULL/VALIDATION/SHUTTING_DOWN
    ).expect("metric creation failed");

    /// Current ingress queue depth.
    pub static ref QUEUE_DEPTH: Gauge = Gauge::new(
        "ftgw_queue_depth",
        "Transfers currently waiting in the ingress queue"
    ).expect("metric creation failed");

    // =========================================================================
    // EXECUTOR
    // =========================================================================

    /// Transfers submitted and accepted by the chain.
    pub static ref TRANSFERS_SUCCEEDED: Counter = Counter::new(
        "ftgw_executor_transfers_succeeded_total",
        "Transfers whose submission reached a successful outcome"
    ).expect("metric creation failed");

    /// Transfers that terminally failed, by error kind.
    pub static ref TRANSFERS_FAILED: CounterVec = CounterVec::new(
        Opts::new("ftgw_executor_transfers_failed_total", "Transfers that terminally failed"),
        &["kind"]  // kind: TRANSIENT/INVALID_TX/NONCE_DRIFT/CONTRACT_ERROR/NO_KEYS
    ).expect("metric creation failed");

    /// Batches handed to the executor.
    pub static ref BATCHES_STARTED: Counter = Counter::new(
        "ftgw_executor_batches_started_total",
        "Batches drained from the queue and handed to the executor"
    ).expect("metric creation failed");

    /// Batches fully processed.
    pub static ref BATCHES_COMPLETED: Counter = Counter::new(
        "ftgw_executor_batches_completed_total",
        "Batches whose every transfer reached a terminal state"
    ).expect("metric creation failed");

    /// Batches currently being processed.
    pub static ref INFLIGHT_BATCHES: Gauge = Gauge::new(
        "ftgw_executor_inflight_batches",
        "Batches currently being processed"
    ).expect("metric creation failed");

    /// Wall-clock batch duration.
    pub static ref BATCH_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "ftgw_executor_batch_duration_seconds",
            "Wall-clock time to process one batch"
        ).buckets(exponential_buckets(0.005, 2.0, 12).expect("bucket layout"))
    ).expect("metric creation failed");

    // =========================================================================
    // KEYS / NONCES
    // =========================================================================

    /// Currently active signing keys.
    pub static ref ACTIVE_KEYS: Gauge = Gauge::new(
        "ftgw_keys_active",
        "Signing keys currently active"
    ).expect("metric creation failed");

    /// Nonce drift refreshes performed.
    pub static ref NONCE_REFRESHES: Counter = Counter::new(
        "ftgw_nonce_refreshes_total",
        "Nonce entries re-synced from the chain after drift"
    ).expect("metric creation failed");

    // =========================================================================
    // RPC
    // =========================================================================

    /// Transient RPC retries.
    pub static ref RPC_RETRIES: Counter = Counter::new(
        "ftgw_rpc_transient_retries_total",
        "RPC calls retried on another pooled connection"
    ).expect("metric creation failed");

    /// Block-hash cache refreshes.
    pub static ref BLOCK_HASH_REFRESHES: Counter = Counter::new(
        "ftgw_rpc_block_hash_refreshes_total",
        "Recent-block-hash cache fills"
    ).expect("metric creation failed");
}

/// Registers all metric families with [`struct@REGISTRY`].
///
/// Idempotent per process: duplicate registration (tests calling twice) is
/// reported as `MetricsInit`.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(TRANSFERS_ENQUEUED.clone()),
        Box::new(ENQUEUE_REJECTED.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(TRANSFERS_SUCCEEDED.clone()),
        Box::new(TRANSFERS_FAILED.clone()),
        Box::new(BATCHES_STARTED.clone()),
        Box::new(BATCHES_COMPLETED.clone()),
        Box::new(INFLIGHT_BATCHES.clone()),
        Box::new(BATCH_DURATION.clone()),
        Box::new(ACTIVE_KEYS.clone()),
        Box::new(NONCE_REFRESHES.clone()),
        Box::new(RPC_RETRIES.clone()),
        Box::new(BLOCK_HASH_REFRESHES.clone()),
    ];

    for collector in collectors {
        REGISTRY
            .register(collector)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }
    Ok(())
}

/// Encodes the registry in Prometheus text exposition format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        TRANSFERS_ENQUEUED.inc();
        assert!(TRANSFERS_ENQUEUED.get() >= 1.0);
    }

    #[test]
    fn failure_counter_partitions_by_kind() {
        TRANSFERS_FAILED.with_label_values(&["TRANSIENT"]).inc();
        TRANSFERS_FAILED.with_label_values(&["CONTRACT_ERROR"]).inc();
        assert!(TRANSFERS_FAILED.with_label_values(&["TRANSIENT"]).get() >= 1.0);
    }

    #[test]
    fn encode_produces_text_format() {
        let _ = register_metrics();
        QUEUE_DEPTH.set(7.0);
        let text = encode_metrics().unwrap();
        assert!(text.contains("ftgw_queue_depth"));
    }
}
