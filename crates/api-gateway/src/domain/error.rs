//! Error-to-HTTP mapping.
//!
//! Every failure leaves the gateway as
//! `{success:false, error:<kind>, details, processing_time_ms, timestamp}`
//! with a status derived from the error kind. The `error` strings are the
//! stable kinds from the shared taxonomy.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shared_types::entities::epoch_millis;
use shared_types::GatewayError;
use std::time::Instant;

/// A failed request, carrying its start time for the latency field.
pub struct ApiFailure {
    error: GatewayError,
    started: Instant,
}

impl ApiFailure {
    /// Wraps a pipeline error for response rendering.
    pub fn new(error: GatewayError, started: Instant) -> Self {
        Self { error, started }
    }

    /// HTTP status for an error kind.
    pub fn status_for(error: &GatewayError) -> StatusCode {
        match error {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::QueueFull { .. }
            | GatewayError::NoKeys
            | GatewayError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Transient(_) | GatewayError::InvalidTx { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::ContractError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = Self::status_for(&self.error);
        let body = Json(json!({
            "success": false,
            "error": self.error.kind(),
            "details": self.error.to_string(),
            "processing_time_ms": self.started.elapsed().as_millis() as u64,
            "timestamp": epoch_millis(),
        }));

        let mut response = (status, body).into_response();
        // Back-pressure rejections carry an explicit retry hint.
        if matches!(self.error, GatewayError::QueueFull { .. }) {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
        }
        response
    }
}
