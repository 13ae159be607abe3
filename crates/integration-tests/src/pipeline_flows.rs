//! Queue → collector → executor flows against the stub chain.

use crate::stub::{StubChain, SubmitScript};
use crate::{test_pipeline, test_pipeline_with};
use chain_wire::Action;
use shared_types::TransferRequest;
use std::time::Duration;

fn request(receiver: &str, amount: &str, memo: Option<&str>) -> TransferRequest {
    TransferRequest {
        receiver_id: receiver.into(),
        amount: amount.into(),
        memo: memo.map(String::from),
    }
}

async fn settle(pipeline: &dispatch_core::DispatchPipeline, expected_terminal: u64) {
    for _ in 0..400 {
        let snapshot = pipeline.metrics_snapshot();
        if snapshot.transfers_succeeded + snapshot.transfers_failed >= expected_terminal {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("transfers did not settle in time");
}

// =============================================================================
// HAPPY PATH
// =============================================================================

#[tokio::test]
async fn accepted_transfer_reaches_the_chain_within_a_second() {
    let stub = StubChain::accepting();
    let pipeline = test_pipeline(stub.clone(), 4, 0);
    pipeline.start().await.unwrap();

    pipeline
        .enqueue_transfer(request("alice.testnet", "100", Some("t")), None)
        .unwrap();
    settle(&pipeline, 1).await;

    let snapshot = pipeline.metrics_snapshot();
    assert_eq!(snapshot.transfers_succeeded, 1);
    assert_eq!(snapshot.transfers_failed, 0);
    pipeline.shutdown().await;
}

#[tokio::test]
async fn signed_args_are_byte_identical_to_the_request() {
    let stub = StubChain::accepting();
    let pipeline = test_pipeline(stub.clone(), 1, 0);
    pipeline.start().await.unwrap();

    pipeline
        .enqueue_transfer(request("alice.testnet", "250", Some("inv 9")), None)
        .unwrap();
    settle(&pipeline, 1).await;

    let submitted = stub.submitted();
    assert_eq!(submitted.len(), 1);
    let tx = &submitted[0].transaction;
    assert_eq!(tx.signer_id, "gateway.testnet");
    assert_eq!(tx.receiver_id, "token.testnet");

    let Action::FunctionCall(call) = &tx.actions[0] else {
        panic!("expected a function call action");
    };
    assert_eq!(call.method_name, "ft_transfer");
    assert_eq!(call.deposit, 1);
    assert_eq!(
        call.args,
        br#"{"receiver_id":"alice.testnet","amount":"250","memo":"inv 9"}"#.to_vec()
    );
    pipeline.shutdown().await;
}

// =============================================================================
// NONCE DRIFT RECOVERY
// =============================================================================

#[tokio::test]
async fn nonce_drift_is_refreshed_and_the_next_transfer_succeeds() {
    let stub = StubChain::accepting();
    stub.push_script([SubmitScript::InvalidNonce { chain_nonce: 42 }]);
    let pipeline = test_pipeline(stub.clone(), 1, 0);
    pipeline.start().await.unwrap();

    pipeline
        .enqueue_transfer(request("alice.testnet", "1", None), None)
        .unwrap();
    settle(&pipeline, 1).await;

    pipeline
        .enqueue_transfer(request("alice.testnet", "2", None), None)
        .unwrap();
    settle(&pipeline, 2).await;

    let snapshot = pipeline.metrics_snapshot();
    assert_eq!(snapshot.transfers_failed, 1);
    assert_eq!(snapshot.transfers_succeeded, 1);

    // First submission carried the locally allocated nonce; after the
    // drift refresh the second one continued from the chain's counter.
    assert_eq!(stub.submitted_nonces(), vec![1, 43]);
    pipeline.shutdown().await;
}

// =============================================================================
// BACKPRESSURE
// =============================================================================

#[tokio::test]
async fn queue_overflow_rejects_exactly_the_excess() {
    let stub = StubChain::with_latency(Duration::from_millis(200));
    // Not started: the collector never drains, so the cap is authoritative.
    let pipeline = test_pipeline(stub, 1, 10);

    let outcomes: Vec<_> = (0..20)
        .map(|_| pipeline.enqueue_transfer(request("alice.testnet", "1", None), None))
        .collect();

    let accepted = outcomes.iter().filter(|o| o.is_ok()).count();
    let rejected = outcomes
        .iter()
        .filter(|o| matches!(o, Err(e) if e.kind() == "QUEUE_FULL"))
        .count();
    assert_eq!(accepted, 10);
    assert_eq!(rejected, 10);
}

// =============================================================================
// CONCURRENCY CEILING
// =============================================================================

#[tokio::test]
async fn parallel_submissions_stay_under_the_configured_ceiling() {
    let stub = StubChain::with_latency(Duration::from_millis(5));
    let pipeline = test_pipeline_with(stub.clone(), 16, 0, |config| {
        dispatch_core::DispatchConfig {
            max_parallel_transactions: 8,
            ..config
        }
    });
    pipeline.start().await.unwrap();

    for _ in 0..200 {
        pipeline
            .enqueue_transfer(request("alice.testnet", "1", None), None)
            .unwrap();
    }
    settle(&pipeline, 200).await;

    assert!(
        stub.max_concurrent_submits() <= 8,
        "observed {} concurrent submits",
        stub.max_concurrent_submits()
    );
    pipeline.shutdown().await;
}

// =============================================================================
// SHUTDOWN DRAIN
// =============================================================================

#[tokio::test]
async fn shutdown_settles_every_accepted_transfer() {
    let stub = StubChain::accepting();
    let pipeline = test_pipeline(stub, 4, 0);
    pipeline.start().await.unwrap();

    for _ in 0..500 {
        pipeline
            .enqueue_transfer(request("alice.testnet", "1", None), None)
            .unwrap();
    }
    pipeline.shutdown().await;

    let snapshot = pipeline.metrics_snapshot();
    let settled = snapshot.transfers_succeeded
        + snapshot.transfers_failed
        + snapshot.transfers_cancelled;
    assert_eq!(settled, 500, "every accepted transfer reached a terminal state");

    let err = pipeline
        .enqueue_transfer(request("alice.testnet", "1", None), None)
        .unwrap_err();
    assert_eq!(err.kind(), "SHUTTING_DOWN");
}

// =============================================================================
// QUEUE CONSERVATION UNDER MIXED OUTCOMES
// =============================================================================

#[tokio::test]
async fn mixed_outcomes_conserve_the_queue() {
    let stub = StubChain::accepting();
    stub.push_script([
        SubmitScript::ContractPanic("not registered".into()),
        SubmitScript::Ok,
        SubmitScript::Transient("connection reset".into()),
    ]);
    let pipeline = test_pipeline(stub, 2, 0);
    pipeline.start().await.unwrap();

    for i in 0..30 {
        pipeline
            .enqueue_transfer(request("alice.testnet", &(i + 1).to_string(), None), None)
            .unwrap();
    }
    settle(&pipeline, 30).await;

    let snapshot = pipeline.metrics_snapshot();
    assert_eq!(snapshot.transfers_succeeded + snapshot.transfers_failed, 30);
    assert_eq!(snapshot.transfers_failed, 2);
    pipeline.shutdown().await;
}
