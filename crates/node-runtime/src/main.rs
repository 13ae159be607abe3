//! Gateway binary: telemetry, configuration, bootstrap, serve, drain.

use dispatch_telemetry::{init_telemetry, TelemetryConfig};
use node_runtime::{GatewayConfig, ServiceContainer};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    let telemetry = TelemetryConfig::from_env();
    let _guard = match init_telemetry(&telemetry) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("telemetry initialization failed: {err}");
            return 1;
        }
    };

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "configuration invalid");
            return 1;
        }
    };

    let container = match ServiceContainer::bootstrap(config) {
        Ok(container) => container,
        Err(err) => {
            error!(error = %err, "container bootstrap failed");
            return 1;
        }
    };

    if let Err(err) = container.start().await {
        error!(error = %err, "startup failed");
        return 1;
    }

    let router = api_gateway::build_router(container.pipeline(), container.config().http.clone());
    let serve_result = api_gateway::serve(router, &container.config().http, shutdown_signal()).await;

    // The listener has stopped accepting; settle everything in flight.
    container.shutdown().await;

    match serve_result {
        Ok(()) => {
            info!("gateway exited cleanly");
            0
        }
        Err(err) => {
            error!(error = %err, "http server failed");
            1
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT; draining"),
        _ = terminate => info!("received SIGTERM; draining"),
    }
}
