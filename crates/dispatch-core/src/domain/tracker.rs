//! # Metrics Engine
//!
//! Rolling performance view of the pipeline: monotonic totals, a 60-second
//! ring of one-second buckets, and a ten-minute list of per-batch samples
//! from which the sustained-throughput verdict is derived.
//!
//! Definitions:
//!
//! - `current_tps`: successful transfers summed over the most recent five
//!   one-second buckets, divided by five.
//! - `sustained`: at least 80% of the one-second intervals in the last 600
//!   seconds saw ≥ `SUSTAINED_TPS_FLOOR` successful transfers.
//! - compliant: `current_tps ≥ 100` and success rate ≥ 95%.

use parking_lot::Mutex;
use serde::Serialize;
use shared_types::entities::{epoch_millis, BatchMetrics};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ring width in seconds.
const WINDOW_SECS: usize = 60;
/// Width of the `current_tps` view, seconds.
const CURRENT_TPS_SECS: u64 = 5;
/// Sustained-compliance observation window, seconds.
const SUSTAINED_WINDOW_SECS: u64 = 600;
/// Successful transfers a second needs to count toward sustained compliance.
const SUSTAINED_TPS_FLOOR: u64 = 100;
/// Fraction of qualifying seconds required for the sustained verdict.
const SUSTAINED_RATIO: f64 = 0.8;
/// Throughput floor for the instantaneous compliance verdict.
const COMPLIANT_TPS: f64 = 100.0;
/// Success-rate floor for the compliance verdicts.
const COMPLIANT_SUCCESS_RATE: f64 = 0.95;

#[derive(Clone, Copy, Default)]
struct SecondBucket {
    epoch_sec: u64,
    enqueued: u64,
    successful: u64,
    failed: u64,
}

#[derive(Default)]
struct ProcessingAgg {
    sum_ms: u64,
    max_ms: u64,
    min_ms: u64,
    count: u64,
}

#[derive(Clone, Copy)]
struct TpsSample {
    timestamp_ms: u64,
    successful: u64,
}

/// Aggregated pipeline counters and derived views.
#[derive(Serialize, Clone, Debug)]
pub struct MetricsSnapshot {
    /// Transfers accepted into the queue since startup.
    pub transfers_enqueued: u64,
    /// Transfers that reached the chain successfully.
    pub transfers_succeeded: u64,
    /// Transfers that terminally failed.
    pub transfers_failed: u64,
    /// Transfers cancelled by shutdown before dispatch.
    pub transfers_cancelled: u64,
    /// Batches handed to the executor.
    pub batches_started: u64,
    /// Batches fully processed.
    pub batches_completed: u64,
    /// Batches containing at least one failure.
    pub batch_errors: u64,
    /// Mean batch duration, milliseconds.
    pub avg_batch_ms: f64,
    /// Slowest batch, milliseconds.
    pub max_batch_ms: u64,
    /// Fastest batch, milliseconds.
    pub min_batch_ms: u64,
    /// Transfers enqueued in the last 60 seconds.
    pub window_enqueued: u64,
    /// Transfers succeeded in the last 60 seconds.
    pub window_successful: u64,
    /// Transfers failed in the last 60 seconds.
    pub window_failed: u64,
    /// Successful transfers per second over the last five seconds.
    pub current_tps: f64,
    /// Lifetime success rate in `[0, 1]`.
    pub success_rate: f64,
    /// Instantaneous compliance verdict.
    pub compliant: bool,
}

/// Sustained-throughput verdict for the bounty endpoint.
#[derive(Serialize, Clone, Copy, Debug)]
pub struct BountyStatus {
    /// Successful transfers per second over the last five seconds.
    pub current_tps: f64,
    /// Whether the 600-second sustained condition currently holds.
    pub sustained: bool,
    /// Sustained throughput with a compliant success rate.
    pub achieved: bool,
}

/// Pipeline metrics aggregator. All write paths are atomic or take a
/// short-held mutex; safe to share behind `Arc` across the executor pool.
pub struct MetricsEngine {
    transfers_enqueued: AtomicU64,
    transfers_succeeded: AtomicU64,
    transfers_failed: AtomicU64,
    transfers_cancelled: AtomicU64,
    batches_started: AtomicU64,
    batches_completed: AtomicU64,
    batch_errors: AtomicU64,
    processing: Mutex<ProcessingAgg>,
    ring: Mutex<[SecondBucket; WINDOW_SECS]>,
    samples: Mutex<VecDeque<TpsSample>>,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsEngine {
    /// Creates a zeroed engine.
    pub fn new() -> Self {
        Self {
            transfers_enqueued: AtomicU64::new(0),
            transfers_succeeded: AtomicU64::new(0),
            transfers_failed: AtomicU64::new(0),
            transfers_cancelled: AtomicU64::new(0),
            batches_started: AtomicU64::new(0),
            batches_completed: AtomicU64::new(0),
            batch_errors: AtomicU64::new(0),
            processing: Mutex::new(ProcessingAgg::default()),
            ring: Mutex::new([SecondBucket::default(); WINDOW_SECS]),
            samples: Mutex::new(VecDeque::new()),
        }
    }

    // =========================================================================
    // RECORDING
    // =========================================================================

    /// Counts an accepted transfer.
    pub fn record_enqueued(&self) {
        self.record_enqueued_at(epoch_millis());
    }

    fn record_enqueued_at(&self, now_ms: u64) {
        self.transfers_enqueued.fetch_add(1, Ordering::Relaxed);
        self.bump_bucket(now_ms, |b| b.enqueued += 1);
    }

    /// Counts a successful submission.
    pub fn record_success(&self) {
        self.record_success_at(epoch_millis());
    }

    fn record_success_at(&self, now_ms: u64) {
        self.transfers_succeeded.fetch_add(1, Ordering::Relaxed);
        self.bump_bucket(now_ms, |b| b.successful += 1);
    }

    /// Counts a terminal failure.
    pub fn record_failure(&self) {
        self.record_failure_at(epoch_millis());
    }

    fn record_failure_at(&self, now_ms: u64) {
        self.transfers_failed.fetch_add(1, Ordering::Relaxed);
        self.bump_bucket(now_ms, |b| b.failed += 1);
    }

    /// Counts transfers cancelled by shutdown before dispatch.
    pub fn record_cancelled(&self, count: u64) {
        self.transfers_cancelled.fetch_add(count, Ordering::Relaxed);
    }

    /// Counts a batch handed to the executor.
    pub fn record_batch_started(&self) {
        self.batches_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Folds a completed batch into the aggregates and the sample list.
    pub fn record_batch(&self, batch: &BatchMetrics) {
        self.record_batch_at(batch, epoch_millis());
    }

    fn record_batch_at(&self, batch: &BatchMetrics, now_ms: u64) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
        if batch.failed > 0 {
            self.batch_errors.fetch_add(1, Ordering::Relaxed);
        }

        {
            let mut agg = self.processing.lock();
            agg.sum_ms += batch.duration_ms;
            agg.max_ms = agg.max_ms.max(batch.duration_ms);
            agg.min_ms = if agg.count == 0 {
                batch.duration_ms
            } else {
                agg.min_ms.min(batch.duration_ms)
            };
            agg.count += 1;
        }

        let mut samples = self.samples.lock();
        samples.push_back(TpsSample {
            timestamp_ms: now_ms,
            successful: batch.successful as u64,
        });
        let horizon = now_ms.saturating_sub(SUSTAINED_WINDOW_SECS * 1000);
        while samples.front().is_some_and(|s| s.timestamp_ms < horizon) {
            samples.pop_front();
        }
    }

    fn bump_bucket(&self, now_ms: u64, update: impl FnOnce(&mut SecondBucket)) {
        let sec = now_ms / 1000;
        let mut ring = self.ring.lock();
        let bucket = &mut ring[(sec as usize) % WINDOW_SECS];
        if bucket.epoch_sec != sec {
            *bucket = SecondBucket {
                epoch_sec: sec,
                ..SecondBucket::default()
            };
        }
        update(bucket);
    }

    // =========================================================================
    // DERIVED READS
    // =========================================================================

    /// Average batch duration, when any batch has completed.
    pub fn avg_batch_ms(&self) -> Option<f64> {
        let agg = self.processing.lock();
        (agg.count > 0).then(|| agg.sum_ms as f64 / agg.count as f64)
    }

    /// Successful transfers per second over the last five seconds.
    pub fn current_tps(&self) -> f64 {
        self.current_tps_at(epoch_millis())
    }

    fn current_tps_at(&self, now_ms: u64) -> f64 {
        let now_sec = now_ms / 1000;
        let ring = self.ring.lock();
        let successful: u64 = ring
            .iter()
            .filter(|b| now_sec.saturating_sub(b.epoch_sec) < CURRENT_TPS_SECS)
            .map(|b| b.successful)
            .sum();
        successful as f64 / CURRENT_TPS_SECS as f64
    }

    /// Lifetime success rate; 1.0 before any terminal outcome.
    pub fn success_rate(&self) -> f64 {
        let ok = self.transfers_succeeded.load(Ordering::Relaxed);
        let failed = self.transfers_failed.load(Ordering::Relaxed);
        if ok + failed == 0 {
            1.0
        } else {
            ok as f64 / (ok + failed) as f64
        }
    }

    /// Whether the sustained-throughput condition held over the last 600
    /// seconds.
    pub fn sustained(&self) -> bool {
        self.sustained_at(epoch_millis())
    }

    fn sustained_at(&self, now_ms: u64) -> bool {
        use std::collections::HashMap;

        let now_sec = now_ms / 1000;
        let window_start = now_sec.saturating_sub(SUSTAINED_WINDOW_SECS - 1);

        let samples = self.samples.lock();
        let mut per_second: HashMap<u64, u64> = HashMap::new();
        for sample in samples.iter() {
            let sec = sample.timestamp_ms / 1000;
            if sec >= window_start && sec <= now_sec {
                *per_second.entry(sec).or_default() += sample.successful;
            }
        }

        let qualifying = per_second
            .values()
            .filter(|&&n| n >= SUSTAINED_TPS_FLOOR)
            .count() as f64;
        qualifying >= SUSTAINED_RATIO * SUSTAINED_WINDOW_SECS as f64
    }

    /// Full snapshot for the metrics endpoint.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.snapshot_at(epoch_millis())
    }

    fn snapshot_at(&self, now_ms: u64) -> MetricsSnapshot {
        let now_sec = now_ms / 1000;
        let (window_enqueued, window_successful, window_failed) = {
            let ring = self.ring.lock();
            ring.iter()
                .filter(|b| now_sec.saturating_sub(b.epoch_sec) < WINDOW_SECS as u64)
                .fold((0, 0, 0), |(e, s, f), b| {
                    (e + b.enqueued, s + b.successful, f + b.failed)
                })
        };

        let (avg_batch_ms, max_batch_ms, min_batch_ms) = {
            let agg = self.processing.lock();
            if agg.count == 0 {
                (0.0, 0, 0)
            } else {
                (agg.sum_ms as f64 / agg.count as f64, agg.max_ms, agg.min_ms)
            }
        };

        let current_tps = self.current_tps_at(now_ms);
        let success_rate = self.success_rate();

        MetricsSnapshot {
            transfers_enqueued: self.transfers_enqueued.load(Ordering::Relaxed),
            transfers_succeeded: self.transfers_succeeded.load(Ordering::Relaxed),
            transfers_failed: self.transfers_failed.load(Ordering::Relaxed),
            transfers_cancelled: self.transfers_cancelled.load(Ordering::Relaxed),
            batches_started: self.batches_started.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            batch_errors: self.batch_errors.load(Ordering::Relaxed),
            avg_batch_ms,
            max_batch_ms,
            min_batch_ms,
            window_enqueued,
            window_successful,
            window_failed,
            current_tps,
            success_rate,
            compliant: current_tps >= COMPLIANT_TPS && success_rate >= COMPLIANT_SUCCESS_RATE,
        }
    }

    /// Sustained-throughput verdict for the bounty endpoint.
    pub fn bounty(&self) -> BountyStatus {
        self.bounty_at(epoch_millis())
    }

    fn bounty_at(&self, now_ms: u64) -> BountyStatus {
        let sustained = self.sustained_at(now_ms);
        BountyStatus {
            current_tps: self.current_tps_at(now_ms),
            sustained,
            achieved: sustained && self.success_rate() >= COMPLIANT_SUCCESS_RATE,
        }
    }
}
