//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name stamped on log lines.
    pub service_name: String,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
    /// Emit JSON-formatted log lines instead of the compact format.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "ft-dispatch-gateway".to_string(),
            log_filter: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Reads `GATEWAY_LOG` and `GATEWAY_LOG_JSON`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: defaults.service_name,
            log_filter: env::var("GATEWAY_LOG").unwrap_or(defaults.log_filter),
            json_logs: env::var("GATEWAY_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.json_logs),
        }
    }
}
