//! Per-IP rate limiting middleware.
//!
//! One token bucket per client IP, held in a concurrent map. A request
//! consumes one token; when the bucket is dry the request is rejected with
//! 429 and a retry hint before it touches a handler. Idle buckets are
//! swept periodically so the map does not grow with one entry per client
//! ever seen.

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use serde_json::json;
use shared_types::entities::epoch_millis;
use shared_types::TokenBucket;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::domain::config::RateLimitConfig;

struct BucketEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Shared limiter state: one bucket per client IP.
pub struct RateLimitState {
    buckets: DashMap<IpAddr, BucketEntry>,
    config: RateLimitConfig,
}

impl RateLimitState {
    /// Creates the limiter.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
        }
    }

    /// Admits or rejects one request from `ip`.
    pub fn check(&self, ip: IpAddr) -> bool {
        if !self.config.enabled || self.config.whitelist.contains(&ip) {
            return true;
        }

        let mut entry = self.buckets.entry(ip).or_insert_with(|| {
            debug!(ip = %ip, "creating rate limit bucket");
            BucketEntry {
                bucket: TokenBucket::new(
                    self.config.burst_size,
                    self.config.requests_per_second,
                ),
                last_seen: Instant::now(),
            }
        });
        entry.last_seen = Instant::now();
        entry.bucket.try_acquire()
    }

    /// Drops buckets idle longer than `max_idle`.
    pub fn sweep_idle(&self, max_idle: Duration) {
        self.buckets
            .retain(|_, entry| entry.last_seen.elapsed() < max_idle);
    }

    /// Number of tracked client IPs.
    pub fn tracked_ips(&self) -> usize {
        self.buckets.len()
    }
}

/// Tower layer installing the per-IP limiter.
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimitState>,
}

impl RateLimitLayer {
    /// Wraps shared limiter state.
    pub fn new(state: Arc<RateLimitState>) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

/// The limiter service.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<RateLimitState>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let ip = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip())
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

            if !state.check(ip) {
                warn!(ip = %ip, "request rate limited");
                let body = axum::Json(json!({
                    "success": false,
                    "error": "RATE_LIMITED",
                    "details": "too many requests from this address",
                    "timestamp": epoch_millis(),
                }));
                let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
                return Ok(response);
            }

            inner.call(req).await
        })
    }
}
