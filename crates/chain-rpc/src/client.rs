//! JSON-RPC client with a bounded round-robin connection pool.

use crate::cache::BlockHashCache;
use crate::classify::{classify_failure_status, classify_rpc_error};
use async_trait::async_trait;
use base64::Engine as _;
use dispatch_telemetry::metrics::{BLOCK_HASH_REFRESHES, RPC_RETRIES};
use serde_json::{json, Value};
use shared_types::chain::{AccessKeyView, ChainRpc, TxOutcome};
use shared_types::{GatewayError, InvalidTxKind};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Client tunables.
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    /// Node base URL.
    pub node_url: String,
    /// Number of pooled HTTP clients.
    pub pool_size: usize,
    /// Per-call timeout, milliseconds.
    pub timeout_ms: u64,
    /// Transport-failure retries across the pool per call.
    pub max_transient_retries: u32,
    /// Block-hash cache TTL, milliseconds (clamped to one second).
    pub block_hash_ttl_ms: u64,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            node_url: "http://localhost:3030".to_string(),
            pool_size: 4,
            timeout_ms: 30_000,
            max_transient_retries: 2,
            block_hash_ttl_ms: 800,
        }
    }
}

/// Pooled JSON-RPC 2.0 client for the chain node.
pub struct JsonRpcClient {
    config: RpcClientConfig,
    pool: Vec<reqwest::Client>,
    cursor: AtomicUsize,
    request_id: AtomicU64,
    block_hash: BlockHashCache,
}

impl JsonRpcClient {
    /// Builds the client pool.
    pub fn new(config: RpcClientConfig) -> Result<Self, GatewayError> {
        let pool_size = config.pool_size.max(1);
        let mut pool = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_millis(config.timeout_ms))
                .build()
                .map_err(|e| GatewayError::Transient(format!("http client build: {e}")))?;
            pool.push(client);
        }
        let block_hash = BlockHashCache::new(Duration::from_millis(config.block_hash_ttl_ms));
        Ok(Self {
            config,
            pool,
            cursor: AtomicUsize::new(0),
            request_id: AtomicU64::new(1),
            block_hash,
        })
    }

    fn next_client(&self) -> &reqwest::Client {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        &self.pool[index]
    }

    /// One JSON-RPC call. Transport failures and 5xx responses rotate to
    /// the next pooled client up to the retry budget; node-reported errors
    /// are classified and returned without retry.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let mut last_transport_error = String::new();
        for attempt in 0..=self.config.max_transient_retries {
            if attempt > 0 {
                RPC_RETRIES.inc();
                debug!(method, attempt, "retrying rpc call on next pooled client");
            }

            let response = match self
                .next_client()
                .post(self.config.node_url.as_str())
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    last_transport_error = err.to_string();
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() {
                last_transport_error = format!("node returned {status}");
                continue;
            }

            let payload: Value = response
                .json()
                .await
                .map_err(|e| GatewayError::Transient(format!("malformed rpc response: {e}")))?;

            if let Some(error) = payload.get("error") {
                warn!(method, error = %error, "rpc call rejected by node");
                return Err(classify_rpc_error(error));
            }
            return payload
                .get("result")
                .cloned()
                .ok_or_else(|| GatewayError::Transient("rpc response without result".into()));
        }

        Err(GatewayError::Transient(format!(
            "{method} failed after {} attempts: {last_transport_error}",
            self.config.max_transient_retries + 1
        )))
    }
}

#[async_trait]
impl ChainRpc for JsonRpcClient {
    async fn submit(&self, signed_tx: Vec<u8>) -> Result<TxOutcome, GatewayError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(signed_tx);
        let result = match self.call("broadcast_tx_commit", json!([encoded])).await {
            Ok(result) => result,
            Err(err) => {
                // A rejected block hash means our cache went stale; the
                // next transfer must fetch a fresh one.
                if matches!(
                    &err,
                    GatewayError::InvalidTx {
                        kind: InvalidTxKind::ExpiredBlockHash,
                        ..
                    }
                ) {
                    self.block_hash.invalidate();
                }
                return Err(err);
            }
        };

        if let Some(status) = result.get("status") {
            if let Some(failure) = status.get("Failure") {
                return Err(classify_failure_status(failure));
            }
        }

        let hash = result
            .pointer("/transaction/hash")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Transient("outcome without transaction hash".into()))?;
        Ok(TxOutcome {
            hash: hash.to_owned(),
        })
    }

    async fn view_access_key(
        &self,
        account_id: &str,
        public_key: &str,
    ) -> Result<AccessKeyView, GatewayError> {
        let result = self
            .call(
                "query",
                json!({
                    "request_type": "view_access_key",
                    "finality": "final",
                    "account_id": account_id,
                    "public_key": public_key,
                }),
            )
            .await?;

        // Older nodes report query misses inside the result body.
        if let Some(error) = result.get("error").and_then(Value::as_str) {
            return Err(GatewayError::InvalidTx {
                kind: InvalidTxKind::Other,
                message: error.to_owned(),
            });
        }

        let nonce = result
            .get("nonce")
            .and_then(Value::as_u64)
            .ok_or_else(|| GatewayError::Transient("access key view without nonce".into()))?;
        Ok(AccessKeyView {
            nonce,
            permission: result.get("permission").cloned().unwrap_or(Value::Null),
        })
    }

    async fn recent_block_hash(&self) -> Result<[u8; 32], GatewayError> {
        if let Some(hash) = self.block_hash.get() {
            return Ok(hash);
        }

        let result = self.call("block", json!({ "finality": "final" })).await?;
        let encoded = result
            .pointer("/header/hash")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Transient("block response without header hash".into()))?;

        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| GatewayError::Transient(format!("undecodable block hash: {e}")))?;
        let hash: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| GatewayError::Transient("block hash is not 32 bytes".into()))?;

        self.block_hash.put(hash);
        BLOCK_HASH_REFRESHES.inc();
        Ok(hash)
    }

    async fn view_function(
        &self,
        contract_id: &str,
        method: &str,
        args: Value,
    ) -> Result<Value, GatewayError> {
        let args_base64 = base64::engine::general_purpose::STANDARD.encode(args.to_string());
        let result = self
            .call(
                "query",
                json!({
                    "request_type": "call_function",
                    "finality": "final",
                    "account_id": contract_id,
                    "method_name": method,
                    "args_base64": args_base64,
                }),
            )
            .await?;

        let bytes = result
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| GatewayError::Transient("call_function without result bytes".into()))?
            .iter()
            .map(|v| v.as_u64().unwrap_or(0) as u8)
            .collect::<Vec<u8>>();

        serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::ContractError(format!("non-JSON view result: {e}")))
    }
}
