//! HTTP surface contracts, driven through the router without a socket.

use crate::stub::StubChain;
use crate::{test_pipeline, test_router};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

async fn post(router: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

async fn get(router: &Router, path: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    send(router, request).await
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, body)
}

async fn started_router() -> (Router, std::sync::Arc<dispatch_core::DispatchPipeline>) {
    let stub = StubChain::accepting();
    let pipeline = test_pipeline(stub, 4, 0);
    pipeline.start().await.unwrap();
    (test_router(pipeline.clone()), pipeline)
}

// =============================================================================
// TRANSFER
// =============================================================================

#[tokio::test]
async fn transfer_returns_a_queue_id() {
    let (router, pipeline) = started_router().await;
    let (status, body) = post(
        &router,
        "/transfer",
        json!({ "receiver_id": "alice.testnet", "amount": "100", "memo": "t" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let queue_id = body["queue_id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(queue_id).is_ok());
    pipeline.shutdown().await;
}

#[tokio::test]
async fn camel_case_field_names_are_accepted() {
    let (router, pipeline) = started_router().await;
    let (status, body) = post(
        &router,
        "/transfer",
        json!({ "receiverId": "alice.testnet", "amount": "100" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    pipeline.shutdown().await;
}

// =============================================================================
// VALIDATION MATRIX
// =============================================================================

#[tokio::test]
async fn invalid_requests_fail_with_400_validation() {
    let (router, pipeline) = started_router().await;

    let cases = [
        json!({ "receiver_id": "UPPER.TESTNET", "amount": "10" }),
        json!({ "receiver_id": "a.testnet", "amount": "-1" }),
        json!({ "receiver_id": "a.testnet" }),
        json!({ "receiver_id": ".foo.near", "amount": "1" }),
        json!({ "receiver_id": "a.testnet", "amount": "0" }),
        json!({ "receiver_id": "a.testnet", "amount": "1e13" }),
        json!({ "receiver_id": "a.testnet", "amount": "1", "memo": "bad\u{0000}byte" }),
    ];

    for case in cases {
        let (status, body) = post(&router, "/transfer", case.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "case: {case}");
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "VALIDATION");
        assert!(body["details"].is_string());
        assert!(body["timestamp"].is_u64());
    }
    pipeline.shutdown().await;
}

// =============================================================================
// BACKPRESSURE
// =============================================================================

#[tokio::test]
async fn saturated_queue_returns_503_with_a_retry_hint() {
    let stub = StubChain::with_latency(Duration::from_millis(200));
    // Not started: nothing drains, so the third request overflows.
    let pipeline = test_pipeline(stub, 1, 2);
    let router = test_router(pipeline);

    for _ in 0..2 {
        let (status, _) = post(
            &router,
            "/transfer",
            json!({ "receiver_id": "a.testnet", "amount": "1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let request = Request::builder()
        .method("POST")
        .uri("/transfer")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "receiver_id": "a.testnet", "amount": "1" }).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "1");
}

// =============================================================================
// BULK TRANSFER
// =============================================================================

#[tokio::test]
async fn bulk_transfer_settles_items_independently() {
    let (router, pipeline) = started_router().await;
    let (status, body) = post(
        &router,
        "/bulk-transfer",
        json!({
            "batch_id": "batch-7",
            "priority": 2.0,
            "transfers": [
                { "receiver_id": "alice.testnet", "amount": "10" },
                { "receiver_id": "BAD", "amount": "10" },
                { "receiver_id": "bob.testnet", "amount": "20" },
            ],
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["batch_id"], "batch-7");
    assert_eq!(body["accepted"], 2);
    assert_eq!(body["rejected"], 1);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[1]["error"], "VALIDATION");
    assert_eq!(results[2]["success"], true);
    pipeline.shutdown().await;
}

#[tokio::test]
async fn bulk_transfer_enforces_the_item_cap() {
    let (router, pipeline) = started_router().await;
    let items: Vec<Value> = (0..1001)
        .map(|_| json!({ "receiver_id": "a.testnet", "amount": "1" }))
        .collect();
    let (status, body) = post(&router, "/bulk-transfer", json!({ "transfers": items })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION");
    pipeline.shutdown().await;
}

// =============================================================================
// DIRECT TRANSFER
// =============================================================================

#[tokio::test]
async fn direct_transfer_returns_the_transaction_hash() {
    let (router, pipeline) = started_router().await;
    let (status, body) = post(
        &router,
        "/direct-transfer",
        json!({ "receiver_id": "alice.testnet", "amount": "5" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["transaction_hash"].as_str().is_some_and(|h| !h.is_empty()));
    pipeline.shutdown().await;
}

// =============================================================================
// OBSERVABILITY SURFACES
// =============================================================================

#[tokio::test]
async fn health_reflects_lifecycle() {
    let stub = StubChain::accepting();
    let pipeline = test_pipeline(stub, 1, 0);
    let router = test_router(pipeline.clone());

    // Before start: unhealthy.
    let (status, body) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["healthy"], false);

    pipeline.start().await.unwrap();
    let (status, body) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["healthy"], true);
    assert_eq!(body["state"], "running");
    assert!(body["active_keys"].as_u64().unwrap() >= 1);

    pipeline.shutdown().await;
    let (status, _) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn status_and_metrics_expose_totals() {
    let (router, pipeline) = started_router().await;
    post(
        &router,
        "/transfer",
        json!({ "receiver_id": "alice.testnet", "amount": "1" }),
    )
    .await;

    let (status, body) = get(&router, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "running");
    assert!(body["queue_capacity"].as_u64().unwrap() > 0);
    assert_eq!(body["metrics"]["transfers_enqueued"], 1);

    let (status, body) = get(&router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["current_tps"].is_number());
    assert!(body["success_rate"].is_number());
    assert!(body["compliant"].is_boolean());

    let (status, body) = get(&router, "/bounty-status").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["sustained"].is_boolean());
    assert!(body["achieved"].is_boolean());

    // Registration normally happens in telemetry init; tests do it here.
    let _ = dispatch_telemetry::register_metrics();
    let (status, body) = get(&router, "/metrics/prometheus").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("ftgw_"));

    pipeline.shutdown().await;
}
