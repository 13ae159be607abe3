//! # Dispatch Telemetry
//!
//! Observability plumbing for the gateway: structured logging via `tracing`
//! and a Prometheus registry for the scrape endpoint.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dispatch_telemetry::{TelemetryConfig, init_telemetry};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(&config).expect("telemetry init");
//!     // counters in `metrics` are live from here on
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LOG` | `info` | tracing env-filter directive |
//! | `GATEWAY_LOG_JSON` | `false` | emit JSON log lines |

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::LoggingGuard;
pub use metrics::{encode_metrics, register_metrics};

use thiserror::Error;

/// Telemetry initialization errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The tracing subscriber could not be installed.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Prometheus registration failed.
    #[error("failed to initialize metrics: {0}")]
    MetricsInit(String),
}

/// Initializes logging and registers all Prometheus metric families.
///
/// Returns a guard that must be held for the lifetime of the process.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<LoggingGuard, TelemetryError> {
    register_metrics()?;
    logging::init_logging(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_info_level() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_filter, "info");
        assert!(!config.json_logs);
    }
}
