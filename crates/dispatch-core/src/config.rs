//! Pipeline configuration with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One teragas.
pub const TGAS: u64 = 1_000_000_000_000;
/// Minimum prepaid gas per `ft_transfer` call.
pub const MIN_FUNCTION_CALL_GAS: u64 = 10 * TGAS;
/// Maximum prepaid gas per `ft_transfer` call.
pub const MAX_FUNCTION_CALL_GAS: u64 = 50 * TGAS;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric field is outside its allowed range.
    #[error("{field} out of range: {detail}")]
    OutOfRange {
        field: &'static str,
        detail: String,
    },
    /// A required field is empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Tunables for the dispatch pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Chain identifier, carried in logs and status reports.
    pub network_id: String,
    /// Master signing account.
    pub master_account_id: String,
    /// Fungible-token contract every transfer calls.
    pub contract_id: String,
    /// Base batch target.
    pub batch_size: usize,
    /// Collector tick period in milliseconds.
    pub batch_interval_ms: u64,
    /// Executor semaphore capacity.
    pub max_parallel_transactions: usize,
    /// Collector in-flight batch cap.
    pub max_concurrent_batches: usize,
    /// Ingress queue capacity; 0 means derive
    /// `10 * batch_size * max_concurrent_batches`.
    pub queue_capacity: usize,
    /// Prepaid gas per call.
    pub function_call_gas: u64,
    /// Attached deposit in yocto; the FT standard requires exactly 1.
    pub attached_deposit: u128,
    /// Upper bound for any single RPC call, milliseconds.
    pub rpc_timeout_ms: u64,
    /// How long a shutdown waits for outstanding work, seconds.
    pub drain_deadline_secs: u64,
    /// Health probe period, seconds.
    pub probe_interval_secs: u64,
    /// A probe older than this makes the gateway unhealthy, seconds.
    pub probe_grace_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            network_id: "testnet".to_string(),
            master_account_id: String::new(),
            contract_id: String::new(),
            batch_size: 75,
            batch_interval_ms: 300,
            max_parallel_transactions: 30,
            max_concurrent_batches: 15,
            queue_capacity: 0,
            function_call_gas: 30 * TGAS,
            attached_deposit: 1,
            rpc_timeout_ms: 30_000,
            drain_deadline_secs: 30,
            probe_interval_secs: 10,
            probe_grace_secs: 30,
        }
    }
}

impl DispatchConfig {
    /// Validates field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.master_account_id.is_empty() {
            return Err(ConfigError::Empty("master_account_id"));
        }
        if self.contract_id.is_empty() {
            return Err(ConfigError::Empty("contract_id"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::OutOfRange {
                field: "batch_size",
                detail: "must be at least 1".into(),
            });
        }
        if self.batch_interval_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "batch_interval_ms",
                detail: "must be at least 1".into(),
            });
        }
        if self.max_parallel_transactions == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_parallel_transactions",
                detail: "must be at least 1".into(),
            });
        }
        if self.max_concurrent_batches == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_concurrent_batches",
                detail: "must be at least 1".into(),
            });
        }
        if !(MIN_FUNCTION_CALL_GAS..=MAX_FUNCTION_CALL_GAS).contains(&self.function_call_gas) {
            return Err(ConfigError::OutOfRange {
                field: "function_call_gas",
                detail: format!(
                    "{} not in [{MIN_FUNCTION_CALL_GAS}, {MAX_FUNCTION_CALL_GAS}]",
                    self.function_call_gas
                ),
            });
        }
        if self.attached_deposit != 1 {
            return Err(ConfigError::OutOfRange {
                field: "attached_deposit",
                detail: "the FT standard requires exactly 1 yocto".into(),
            });
        }
        if self.rpc_timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "rpc_timeout_ms",
                detail: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Effective queue capacity, deriving the default when unset.
    pub fn effective_queue_capacity(&self) -> usize {
        if self.queue_capacity > 0 {
            self.queue_capacity
        } else {
            10 * self.batch_size * self.max_concurrent_batches
        }
    }

    /// Collector tick period.
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    /// Per-call RPC bound.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Shutdown drain bound.
    pub fn drain_deadline(&self) -> Duration {
        Duration::from_secs(self.drain_deadline_secs)
    }
}
