//! # Outbound Chain Port
//!
//! The narrow contract the pipeline holds against the blockchain RPC.
//! The real implementation lives in `chain-rpc`; tests substitute stubs.
//!
//! Every method is a suspension point with an upper time bound enforced by
//! the implementation. Implementations classify failures into the
//! [`GatewayError`](crate::GatewayError) taxonomy: `Transient` for transport
//! problems, `InvalidTx` for node-side rejections, `ContractError` for
//! method panics.

use crate::errors::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Final outcome of a successfully submitted transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxOutcome {
    /// Base58 transaction hash as reported by the node.
    pub hash: String,
}

/// Current on-chain view of an access key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessKeyView {
    /// The key's current nonce on the chain.
    pub nonce: u64,
    /// Permission descriptor as reported by the node.
    pub permission: serde_json::Value,
}

/// RPC operations the dispatch pipeline depends on.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Sends a Borsh-serialized signed transaction and awaits the final
    /// execution outcome.
    async fn submit(&self, signed_tx: Vec<u8>) -> Result<TxOutcome, GatewayError>;

    /// Queries the current nonce and permission of an access key.
    ///
    /// `public_key` is in the chain's `ed25519:<base58>` text form.
    async fn view_access_key(
        &self,
        account_id: &str,
        public_key: &str,
    ) -> Result<AccessKeyView, GatewayError>;

    /// Most recent finalized block hash. May be served from a cache no older
    /// than one second.
    async fn recent_block_hash(&self) -> Result<[u8; 32], GatewayError>;

    /// Calls a view method on a contract and returns its JSON result.
    async fn view_function(
        &self,
        contract_id: &str,
        method: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError>;
}
