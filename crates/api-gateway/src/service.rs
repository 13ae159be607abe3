//! Router assembly and the serve loop.

use crate::domain::config::HttpConfig;
use crate::handlers;
use crate::middleware::{create_cors_layer, RateLimitLayer, RateLimitState};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use dispatch_core::DispatchPipeline;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tracing::info;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The dispatch pipeline.
    pub pipeline: Arc<DispatchPipeline>,
    /// HTTP surface configuration.
    pub config: Arc<HttpConfig>,
}

/// Builds the gateway router with its middleware stack.
pub fn build_router(pipeline: Arc<DispatchPipeline>, config: HttpConfig) -> Router {
    let config = Arc::new(config);
    let limiter = Arc::new(RateLimitState::new(config.rate_limit.clone()));

    // Idle rate-limit buckets are swept in the background.
    {
        let limiter = Arc::clone(&limiter);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                ticker.tick().await;
                limiter.sweep_idle(Duration::from_secs(300));
            }
        });
    }

    let middleware = ServiceBuilder::new()
        .layer(create_cors_layer(config.cors_enabled))
        .layer(RateLimitLayer::new(limiter))
        .layer(DefaultBodyLimit::max(config.max_body_bytes));

    let state = AppState {
        pipeline,
        config,
    };

    Router::new()
        .route("/transfer", post(handlers::transfer))
        .route("/bulk-transfer", post(handlers::bulk_transfer))
        .route("/direct-transfer", post(handlers::direct_transfer))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/metrics/prometheus", get(handlers::prometheus_metrics))
        .route("/status", get(handlers::status))
        .route("/bounty-status", get(handlers::bounty_status))
        .layer(middleware)
        .with_state(state)
}

/// Binds and serves the router until `shutdown` resolves.
pub async fn serve(
    router: Router,
    config: &HttpConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "http server listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}
