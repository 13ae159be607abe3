//! # Batch Collector
//!
//! Single producer of batches: a timer loop that drains the ingress queue
//! into size-bounded batches and hands them to the executor. The batch size
//! adapts to queue depth and recent batch latency, and an immediate-flush
//! signal short-circuits the tick when the queue builds up fast.
//!
//! The batch size never exceeds twice the configured base, whatever the
//! queue depth.

use crate::domain::executor::TransferExecutor;
use crate::domain::queue::TransferQueue;
use crate::domain::tracker::MetricsEngine;
use dispatch_telemetry::metrics::{BATCHES_STARTED, INFLIGHT_BATCHES};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{debug, trace};

/// Computes the batch size for one collection round.
///
/// Policy, in priority order:
///
/// 1. deep backlog (`depth > 3·base`) → grow to `2·base`, clamped to depth;
/// 2. trickle (`depth < base/2`) → shrink toward the depth itself;
/// 3. slow batches (avg > 2·interval) → shrink to 70% of base;
/// 4. fast batches (avg < interval/2) → grow to 150% of base;
/// 5. otherwise the base size.
pub fn adaptive_batch_size(
    base: usize,
    queue_depth: usize,
    avg_batch_ms: Option<f64>,
    interval_ms: u64,
) -> usize {
    if queue_depth > 3 * base {
        return (2 * base).min(queue_depth);
    }
    if queue_depth < base / 2 {
        return (base / 2).min(queue_depth).max(1);
    }
    match avg_batch_ms {
        Some(avg) if avg > 2.0 * interval_ms as f64 => ((base as f64) * 0.7).floor() as usize,
        Some(avg) if avg < interval_ms as f64 / 2.0 => ((base as f64) * 1.5).ceil() as usize,
        _ => base,
    }
}

/// Timer-driven batch producer.
pub struct BatchCollector {
    queue: Arc<TransferQueue>,
    executor: Arc<TransferExecutor>,
    metrics: Arc<MetricsEngine>,
    base_batch_size: usize,
    interval: Duration,
    max_concurrent_batches: usize,
    inflight_batches: Arc<AtomicUsize>,
    flush: Arc<Notify>,
}

impl BatchCollector {
    /// Wires a collector between the queue and the executor.
    pub fn new(
        queue: Arc<TransferQueue>,
        executor: Arc<TransferExecutor>,
        metrics: Arc<MetricsEngine>,
        base_batch_size: usize,
        interval: Duration,
        max_concurrent_batches: usize,
    ) -> Self {
        Self {
            queue,
            executor,
            metrics,
            base_batch_size,
            interval,
            max_concurrent_batches,
            inflight_batches: Arc::new(AtomicUsize::new(0)),
            flush: Arc::new(Notify::new()),
        }
    }

    /// Handle the ingress side uses to wake the collector immediately when
    /// the queue crosses the flush threshold.
    pub fn flush_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.flush)
    }

    /// Queue depth at which the ingress side should wake the collector
    /// rather than wait for the next tick.
    pub fn flush_threshold(&self) -> usize {
        2 * self.base_batch_size
    }

    /// Batches currently being executed.
    pub fn inflight_batches(&self) -> usize {
        self.inflight_batches.load(Ordering::SeqCst)
    }

    /// Runs the tick loop until `shutdown` flips to `true`. The final value
    /// of the loop drains nothing; shutdown-time draining is driven
    /// explicitly by the pipeline.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.flush.notified() => {
                    trace!("immediate flush requested");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("batch collector stopping");
                        return;
                    }
                    continue;
                }
            }
            self.collect_once();
        }
    }

    /// One collection round: skip when saturated or empty, otherwise drain
    /// an adaptively sized batch and spawn its execution.
    pub fn collect_once(&self) {
        if self.inflight_batches.load(Ordering::SeqCst) >= self.max_concurrent_batches {
            trace!("executor saturated; skipping tick");
            return;
        }
        let depth = self.queue.len();
        if depth == 0 {
            return;
        }

        let size = adaptive_batch_size(
            self.base_batch_size,
            depth,
            self.metrics.avg_batch_ms(),
            self.interval.as_millis() as u64,
        );
        let batch = self.queue.drain(size);
        if batch.is_empty() {
            return;
        }

        self.metrics.record_batch_started();
        BATCHES_STARTED.inc();
        self.inflight_batches.fetch_add(1, Ordering::SeqCst);
        INFLIGHT_BATCHES.inc();
        debug!(size = batch.len(), queue_depth = depth, "batch drained");

        let executor = Arc::clone(&self.executor);
        let inflight = Arc::clone(&self.inflight_batches);
        tokio::spawn(async move {
            executor.execute_batch(batch).await;
            inflight.fetch_sub(1, Ordering::SeqCst);
            INFLIGHT_BATCHES.dec();
        });
    }
}
