//! Throughput compliance runs against a cooperative stub.
//!
//! The always-on test drives the pipeline hard for a few seconds and checks
//! the instantaneous compliance verdict. The full ten-minute sustained run
//! is ignored by default; run it explicitly with
//! `cargo test -p integration-tests -- --ignored ten_minute`.

use crate::stub::StubChain;
use crate::test_pipeline_with;
use dispatch_core::DispatchConfig;
use shared_types::TransferRequest;
use std::time::{Duration, Instant};

fn request(i: usize) -> TransferRequest {
    TransferRequest {
        receiver_id: format!("bench-{}.testnet", i % 50),
        amount: "100".into(),
        memo: None,
    }
}

fn compliance_pipeline(
    stub: std::sync::Arc<StubChain>,
) -> std::sync::Arc<dispatch_core::DispatchPipeline> {
    // Plenty of keys so per-key submission concurrency stays at one even
    // with a wide executor.
    test_pipeline_with(stub, 64, 0, |config| DispatchConfig {
        max_parallel_transactions: 64,
        batch_interval_ms: 50,
        ..config
    })
}

/// Drives `rate_per_sec` transfers per second for `duration`.
async fn drive(
    pipeline: &dispatch_core::DispatchPipeline,
    rate_per_sec: usize,
    duration: Duration,
) -> usize {
    let started = Instant::now();
    let mut sent = 0usize;
    let tick = Duration::from_millis(50);
    let per_tick = rate_per_sec.div_ceil(20);

    while started.elapsed() < duration {
        for _ in 0..per_tick {
            if pipeline.enqueue_transfer(request(sent), None).is_ok() {
                sent += 1;
            }
        }
        tokio::time::sleep(tick).await;
    }
    sent
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sustains_compliant_throughput_for_several_seconds() {
    let stub = StubChain::with_latency(Duration::from_millis(5));
    let pipeline = compliance_pipeline(stub);
    pipeline.start().await.unwrap();

    drive(&pipeline, 160, Duration::from_secs(7)).await;

    let snapshot = pipeline.metrics_snapshot();
    assert!(
        snapshot.current_tps >= 100.0,
        "current tps {} below the compliance floor",
        snapshot.current_tps
    );
    assert!(
        snapshot.success_rate >= 0.95,
        "success rate {} below 95%",
        snapshot.success_rate
    );
    assert!(snapshot.compliant);

    pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "ten-minute wall-clock run; execute explicitly"]
async fn ten_minute_sustained_run_achieves_the_bounty() {
    let stub = StubChain::with_latency(Duration::from_millis(5));
    let pipeline = compliance_pipeline(stub);
    pipeline.start().await.unwrap();

    // 110/s for 660 s: the 600-second window is fully covered with margin.
    drive(&pipeline, 110, Duration::from_secs(660)).await;

    let bounty = pipeline.bounty_status();
    assert!(bounty.current_tps >= 100.0, "tps {}", bounty.current_tps);
    assert!(bounty.sustained, "sustained flag did not hold");
    assert!(bounty.achieved);

    let snapshot = pipeline.metrics_snapshot();
    assert!(snapshot.success_rate >= 0.95);

    pipeline.shutdown().await;
}
