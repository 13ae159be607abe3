//! Environment-driven gateway configuration.
//!
//! | Variable | Default | Effect |
//! |----------|---------|--------|
//! | `NETWORK_ID` | `testnet` | chain identifier for logs and status |
//! | `NODE_URL` | `http://localhost:3030` | RPC endpoint |
//! | `MASTER_ACCOUNT_ID` | — (required) | signer account |
//! | `MASTER_PRIVATE_KEY` | — (required) | `ed25519:<base58>` secret |
//! | `ADDITIONAL_PRIVATE_KEYS` | empty | comma-separated extra secrets, already registered on chain |
//! | `GENERATED_KEY_COUNT` | `0` | fresh keys generated at startup; stay inactive until their on-chain registration is confirmed |
//! | `CONTRACT_ID` | — (required) | FT contract |
//! | `BATCH_SIZE` | `75` | base batch target |
//! | `BATCH_INTERVAL_MS` | `300` | collector tick |
//! | `MAX_PARALLEL_TRANSACTIONS` | `30` | executor semaphore |
//! | `MAX_CONCURRENT_BATCHES` | `15` | collector in-flight cap |
//! | `QUEUE_CAPACITY` | derived | ingress queue cap |
//! | `QUEUE_CONCURRENCY` | `500` | ingress admission rate hint (per-IP tokens/second) |
//! | `FUNCTION_CALL_GAS` | `30000000000000` | prepaid gas (10–50 TGas) |
//! | `ATTACHED_DEPOSIT` | `1` | yocto per call; the FT standard requires 1 |
//! | `RPC_POOL_SIZE` | `4` | RPC connection pool |
//! | `RPC_TIMEOUT_MS` | `30000` | per-call RPC bound |
//! | `HTTP_HOST` / `HTTP_PORT` | `0.0.0.0` / `3000` | bind address |

use api_gateway::{HttpConfig, RateLimitConfig};
use chain_rpc::RpcClientConfig;
use chain_wire::KeyPair;
use dispatch_core::DispatchConfig;
use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is absent.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    /// A variable did not parse.
    #[error("invalid value for {key}: {detail}")]
    Parse { key: &'static str, detail: String },
    /// Cross-field validation failed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Fully resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Pipeline tunables.
    pub dispatch: DispatchConfig,
    /// RPC client tunables.
    pub rpc: RpcClientConfig,
    /// HTTP surface tunables.
    pub http: HttpConfig,
    /// Master secret key text.
    pub master_private_key: String,
    /// Extra registered secret key texts.
    pub additional_private_keys: Vec<String>,
    /// Fresh keys to generate at startup.
    pub generated_key_count: usize,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Parse {
            key,
            detail: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

impl GatewayConfig {
    /// Reads and validates the whole configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dispatch_defaults = DispatchConfig::default();

        let dispatch = DispatchConfig {
            network_id: parsed("NETWORK_ID", dispatch_defaults.network_id)?,
            master_account_id: required("MASTER_ACCOUNT_ID")?,
            contract_id: required("CONTRACT_ID")?,
            batch_size: parsed("BATCH_SIZE", dispatch_defaults.batch_size)?,
            batch_interval_ms: parsed("BATCH_INTERVAL_MS", dispatch_defaults.batch_interval_ms)?,
            max_parallel_transactions: parsed(
                "MAX_PARALLEL_TRANSACTIONS",
                dispatch_defaults.max_parallel_transactions,
            )?,
            max_concurrent_batches: parsed(
                "MAX_CONCURRENT_BATCHES",
                dispatch_defaults.max_concurrent_batches,
            )?,
            queue_capacity: parsed("QUEUE_CAPACITY", dispatch_defaults.queue_capacity)?,
            function_call_gas: parsed("FUNCTION_CALL_GAS", dispatch_defaults.function_call_gas)?,
            attached_deposit: parsed("ATTACHED_DEPOSIT", dispatch_defaults.attached_deposit)?,
            rpc_timeout_ms: parsed("RPC_TIMEOUT_MS", dispatch_defaults.rpc_timeout_ms)?,
            ..dispatch_defaults
        };

        let rpc_defaults = RpcClientConfig::default();
        let rpc = RpcClientConfig {
            node_url: parsed("NODE_URL", rpc_defaults.node_url)?,
            pool_size: parsed("RPC_POOL_SIZE", rpc_defaults.pool_size)?,
            timeout_ms: dispatch.rpc_timeout_ms,
            ..rpc_defaults
        };

        let http_defaults = HttpConfig::default();
        let queue_concurrency: u64 =
            parsed("QUEUE_CONCURRENCY", http_defaults.rate_limit.requests_per_second)?;
        let http = HttpConfig {
            host: parsed::<IpAddr>("HTTP_HOST", http_defaults.host)?,
            port: parsed("HTTP_PORT", http_defaults.port)?,
            rate_limit: RateLimitConfig {
                requests_per_second: queue_concurrency,
                burst_size: queue_concurrency * 2,
                ..http_defaults.rate_limit
            },
            ..http_defaults
        };

        let master_private_key = required("MASTER_PRIVATE_KEY")?;
        let additional_private_keys = env::var("ADDITIONAL_PRIVATE_KEYS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let generated_key_count = parsed("GENERATED_KEY_COUNT", 0usize)?;

        let config = Self {
            dispatch,
            rpc,
            http,
            master_private_key,
            additional_private_keys,
            generated_key_count,
        };
        config.validate()?;
        Ok(config)
    }

    /// Cross-field validation, including key parseability.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dispatch
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.http
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        KeyPair::from_secret_str(&self.master_private_key)
            .map_err(|e| ConfigError::Invalid(format!("MASTER_PRIVATE_KEY: {e}")))?;
        for (i, key) in self.additional_private_keys.iter().enumerate() {
            KeyPair::from_secret_str(key)
                .map_err(|e| ConfigError::Invalid(format!("ADDITIONAL_PRIVATE_KEYS[{i}]: {e}")))?;
        }
        Ok(())
    }

    /// Parses every configured signing key: the master first, then the
    /// additional registered keys.
    pub fn signing_keys(&self) -> Result<Vec<KeyPair>, ConfigError> {
        let mut keys = vec![KeyPair::from_secret_str(&self.master_private_key)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?];
        for key in &self.additional_private_keys {
            keys.push(
                KeyPair::from_secret_str(key).map_err(|e| ConfigError::Invalid(e.to_string()))?,
            );
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> GatewayConfig {
        let master = KeyPair::from_seed([1; 32]);
        GatewayConfig {
            dispatch: DispatchConfig {
                master_account_id: "gateway.testnet".into(),
                contract_id: "token.testnet".into(),
                ..DispatchConfig::default()
            },
            rpc: RpcClientConfig::default(),
            http: HttpConfig::default(),
            master_private_key: master.secret_key_str(),
            additional_private_keys: vec![],
            generated_key_count: 0,
        }
    }

    #[test]
    fn well_formed_config_validates() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn garbage_master_key_is_rejected() {
        let config = GatewayConfig {
            master_private_key: "ed25519:not-base58-!!".into(),
            ..base_config()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn signing_keys_lists_master_first() {
        let extra = KeyPair::from_seed([2; 32]);
        let config = GatewayConfig {
            additional_private_keys: vec![extra.secret_key_str()],
            ..base_config()
        };
        let keys = config.signing_keys().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].public_key_str(), extra.public_key_str());
    }

    #[test]
    fn bad_deposit_fails_cross_validation() {
        let config = GatewayConfig {
            dispatch: DispatchConfig {
                attached_deposit: 0,
                master_account_id: "gateway.testnet".into(),
                contract_id: "token.testnet".into(),
                ..DispatchConfig::default()
            },
            ..base_config()
        };
        assert!(config.validate().is_err());
    }
}
