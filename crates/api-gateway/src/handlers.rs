//! Request handlers.
//!
//! Handlers translate between HTTP and the pipeline; every body field also
//! accepts its camelCase spelling so both client conventions work.

use crate::domain::error::ApiFailure;
use crate::service::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use shared_types::entities::epoch_millis;
use shared_types::{GatewayError, TransferRequest};
use std::time::Instant;

/// Body of `/transfer` and `/direct-transfer`.
#[derive(Debug, Deserialize)]
pub struct TransferBody {
    /// Missing fields surface as VALIDATION failures rather than
    /// deserialization rejections, so they are optional here.
    #[serde(default, alias = "receiverId")]
    pub receiver_id: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub priority: Option<f64>,
}

impl TransferBody {
    fn into_request(self) -> (TransferRequest, Option<f64>) {
        (
            TransferRequest {
                receiver_id: self.receiver_id.unwrap_or_default(),
                amount: self.amount.unwrap_or_default(),
                memo: self.memo,
            },
            self.priority,
        )
    }
}

/// Body of `/bulk-transfer`.
#[derive(Debug, Deserialize)]
pub struct BulkTransferBody {
    pub transfers: Vec<TransferBody>,
    #[serde(default)]
    pub priority: Option<f64>,
    #[serde(default, alias = "batchId")]
    pub batch_id: Option<String>,
}

/// POST `/transfer`: enqueue one transfer.
pub async fn transfer(
    State(state): State<AppState>,
    Json(body): Json<TransferBody>,
) -> Response {
    let started = Instant::now();
    let (request, priority) = body.into_request();

    match state.pipeline.enqueue_transfer(request, priority) {
        Ok(queue_id) => Json(json!({
            "success": true,
            "queue_id": queue_id,
            "processing_time_ms": started.elapsed().as_millis() as u64,
            "timestamp": epoch_millis(),
        }))
        .into_response(),
        Err(err) => ApiFailure::new(err, started).into_response(),
    }
}

/// POST `/bulk-transfer`: enqueue up to the configured item cap, each item
/// succeeding or failing on its own.
pub async fn bulk_transfer(
    State(state): State<AppState>,
    Json(body): Json<BulkTransferBody>,
) -> Response {
    let started = Instant::now();

    if body.transfers.is_empty() {
        return ApiFailure::new(
            GatewayError::Validation("transfers must not be empty".into()),
            started,
        )
        .into_response();
    }
    if body.transfers.len() > state.config.max_bulk_items {
        return ApiFailure::new(
            GatewayError::Validation(format!(
                "{} transfers exceed the {} item cap",
                body.transfers.len(),
                state.config.max_bulk_items
            )),
            started,
        )
        .into_response();
    }

    let priority = body.priority;
    let requests: Vec<TransferRequest> = body
        .transfers
        .into_iter()
        .map(|item| item.into_request().0)
        .collect();

    let results: Vec<serde_json::Value> = state
        .pipeline
        .enqueue_bulk(requests, priority)
        .into_iter()
        .map(|outcome| match outcome {
            Ok(queue_id) => json!({ "success": true, "queue_id": queue_id }),
            Err(err) => json!({
                "success": false,
                "error": err.kind(),
                "details": err.to_string(),
            }),
        })
        .collect();

    let accepted = results.iter().filter(|r| r["success"] == true).count();
    Json(json!({
        "success": accepted > 0,
        "batch_id": body.batch_id,
        "accepted": accepted,
        "rejected": results.len() - accepted,
        "results": results,
        "processing_time_ms": started.elapsed().as_millis() as u64,
        "timestamp": epoch_millis(),
    }))
    .into_response()
}

/// POST `/direct-transfer`: run one transfer through the executor now and
/// return its transaction hash.
pub async fn direct_transfer(
    State(state): State<AppState>,
    Json(body): Json<TransferBody>,
) -> Response {
    let started = Instant::now();
    let (request, _) = body.into_request();

    match state.pipeline.direct_transfer(request).await {
        Ok(outcome) => Json(json!({
            "success": true,
            "transaction_hash": outcome.hash,
            "processing_time_ms": started.elapsed().as_millis() as u64,
            "timestamp": epoch_millis(),
        }))
        .into_response(),
        Err(err) => ApiFailure::new(err, started).into_response(),
    }
}

/// GET `/health`: 200 when healthy, 503 otherwise, details either way.
pub async fn health(State(state): State<AppState>) -> Response {
    let report = state.pipeline.health();
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

/// GET `/metrics`: pipeline metrics snapshot.
pub async fn metrics(State(state): State<AppState>) -> Response {
    Json(state.pipeline.metrics_snapshot()).into_response()
}

/// GET `/metrics/prometheus`: Prometheus text exposition.
pub async fn prometheus_metrics() -> Response {
    match dispatch_telemetry::encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encoding failed: {err}"),
        )
            .into_response(),
    }
}

/// GET `/status`: lifecycle, queue, and totals.
pub async fn status(State(state): State<AppState>) -> Response {
    Json(state.pipeline.status()).into_response()
}

/// GET `/bounty-status`: sustained-throughput verdict.
pub async fn bounty_status(State(state): State<AppState>) -> Response {
    Json(state.pipeline.bounty_status()).into_response()
}
