//! Structured logging setup.
//!
//! One global `tracing` subscriber: env-filtered, compact by default, JSON
//! when `GATEWAY_LOG_JSON` is set (for log shippers that want structured
//! lines).

use crate::{TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, EnvFilter};

/// Keeps the subscriber installed. Held by the runtime for process lifetime.
pub struct LoggingGuard {
    _private: (),
}

/// Installs the global tracing subscriber.
///
/// Safe to call once per process; a second call reports `LoggingInit`.
pub fn init_logging(config: &TelemetryConfig) -> Result<LoggingGuard, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    let result = if config.json_logs {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .try_init()
    } else {
        fmt().with_env_filter(filter).compact().try_init()
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    tracing::info!(service = %config.service_name, "logging initialized");
    Ok(LoggingGuard { _private: () })
}
