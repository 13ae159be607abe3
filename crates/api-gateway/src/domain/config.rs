//! HTTP surface configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum HttpConfigError {
    /// A limit that must be positive is zero.
    #[error("{0} cannot be 0")]
    ZeroLimit(&'static str),
}

/// Per-IP rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Master switch.
    pub enabled: bool,
    /// Steady-state tokens per second per IP.
    pub requests_per_second: u64,
    /// Burst size per IP.
    pub burst_size: u64,
    /// IPs exempt from limiting.
    pub whitelist: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 500,
            burst_size: 1000,
            whitelist: vec![],
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address.
    pub host: IpAddr,
    /// Bind port.
    pub port: u16,
    /// Per-IP rate limiting.
    pub rate_limit: RateLimitConfig,
    /// Enable permissive CORS.
    pub cors_enabled: bool,
    /// Request body size cap in bytes.
    pub max_body_bytes: usize,
    /// Item cap for one `/bulk-transfer` call.
    pub max_bulk_items: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            rate_limit: RateLimitConfig::default(),
            cors_enabled: true,
            max_body_bytes: 1024 * 1024,
            max_bulk_items: 1000,
        }
    }
}

impl HttpConfig {
    /// Validates limits.
    pub fn validate(&self) -> Result<(), HttpConfigError> {
        if self.max_body_bytes == 0 {
            return Err(HttpConfigError::ZeroLimit("max_body_bytes"));
        }
        if self.max_bulk_items == 0 {
            return Err(HttpConfigError::ZeroLimit("max_bulk_items"));
        }
        if self.rate_limit.enabled && self.rate_limit.requests_per_second == 0 {
            return Err(HttpConfigError::ZeroLimit("rate_limit.requests_per_second"));
        }
        Ok(())
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(HttpConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let config = HttpConfig {
            max_bulk_items: 0,
            ..HttpConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HttpConfig {
            rate_limit: RateLimitConfig {
                requests_per_second: 0,
                ..RateLimitConfig::default()
            },
            ..HttpConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn disabled_rate_limit_skips_the_rps_check() {
        let config = HttpConfig {
            rate_limit: RateLimitConfig {
                enabled: false,
                requests_per_second: 0,
                ..RateLimitConfig::default()
            },
            ..HttpConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
