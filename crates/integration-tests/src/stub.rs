//! Scriptable in-process chain stub.
//!
//! Accepts every submission by default; a script queue injects failures in
//! submission order. Every accepted transaction is parsed and retained so
//! tests can assert on the exact signed bytes the pipeline produced.

use async_trait::async_trait;
use chain_wire::SignedTransaction;
use parking_lot::Mutex;
use shared_types::chain::{AccessKeyView, ChainRpc, TxOutcome};
use shared_types::{GatewayError, InvalidTxKind};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Outcome to serve for one submission.
#[derive(Clone, Debug)]
pub enum SubmitScript {
    /// Accept and advance the key's chain nonce.
    Ok,
    /// Reject with a nonce mismatch, reporting `chain_nonce` as current.
    InvalidNonce { chain_nonce: u64 },
    /// Reject as a contract panic.
    ContractPanic(String),
    /// Reject as a transport-level failure.
    Transient(String),
}

/// The stub chain.
pub struct StubChain {
    latency: Duration,
    script: Mutex<VecDeque<SubmitScript>>,
    /// Current chain-side nonce per public key string.
    nonces: Mutex<HashMap<String, u64>>,
    /// Every transaction that reached `submit`, in arrival order.
    submitted: Mutex<Vec<SignedTransaction>>,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl StubChain {
    /// A stub that accepts everything after `latency`.
    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            script: Mutex::new(VecDeque::new()),
            nonces: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        })
    }

    /// A fast accepting stub.
    pub fn accepting() -> Arc<Self> {
        Self::with_latency(Duration::from_millis(1))
    }

    /// Queues scripted outcomes, served in submission order before the
    /// default accept.
    pub fn push_script(&self, outcomes: impl IntoIterator<Item = SubmitScript>) {
        self.script.lock().extend(outcomes);
    }

    /// Sets the chain-side nonce for a key, as an external signer would.
    pub fn set_chain_nonce(&self, public_key: &str, nonce: u64) {
        self.nonces.lock().insert(public_key.to_owned(), nonce);
    }

    /// Transactions accepted or rejected by `submit`, in arrival order.
    pub fn submitted(&self) -> Vec<SignedTransaction> {
        self.submitted.lock().clone()
    }

    /// Nonces seen on the wire, in arrival order.
    pub fn submitted_nonces(&self) -> Vec<u64> {
        self.submitted
            .lock()
            .iter()
            .map(|tx| tx.transaction.nonce)
            .collect()
    }

    /// Highest number of concurrent `submit` calls observed.
    pub fn max_concurrent_submits(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    fn public_key_str(tx: &SignedTransaction) -> String {
        tx.transaction.public_key.to_account_string()
    }
}

#[async_trait]
impl ChainRpc for StubChain {
    async fn submit(&self, signed_tx: Vec<u8>) -> Result<TxOutcome, GatewayError> {
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.concurrent.fetch_sub(1, Ordering::SeqCst);

        let tx: SignedTransaction = borsh::from_slice(&signed_tx)
            .map_err(|e| GatewayError::Transient(format!("unparseable submission: {e}")))?;
        let key = Self::public_key_str(&tx);
        let hash = tx.hash_str();
        self.submitted.lock().push(tx.clone());

        match self.script.lock().pop_front() {
            Some(SubmitScript::InvalidNonce { chain_nonce }) => {
                self.nonces.lock().insert(key, chain_nonce);
                Err(GatewayError::InvalidTx {
                    kind: InvalidTxKind::NonceTooLow(Some(chain_nonce)),
                    message: format!(
                        "InvalidNonce {{ tx_nonce: {}, ak_nonce: {chain_nonce} }}",
                        tx.transaction.nonce
                    ),
                })
            }
            Some(SubmitScript::ContractPanic(message)) => {
                Err(GatewayError::ContractError(message))
            }
            Some(SubmitScript::Transient(message)) => Err(GatewayError::Transient(message)),
            Some(SubmitScript::Ok) | None => {
                self.nonces.lock().insert(key, tx.transaction.nonce);
                Ok(TxOutcome { hash })
            }
        }
    }

    async fn view_access_key(
        &self,
        _account_id: &str,
        public_key: &str,
    ) -> Result<AccessKeyView, GatewayError> {
        let nonce = self.nonces.lock().get(public_key).copied().unwrap_or(0);
        Ok(AccessKeyView {
            nonce,
            permission: serde_json::json!("FullAccess"),
        })
    }

    async fn recent_block_hash(&self) -> Result<[u8; 32], GatewayError> {
        Ok([9; 32])
    }

    async fn view_function(
        &self,
        _contract_id: &str,
        method: &str,
        _args: serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        match method {
            "ft_metadata" => Ok(serde_json::json!({
                "spec": "ft-1.0.0",
                "name": "Test Token",
                "symbol": "TT",
                "decimals": 18,
            })),
            "ft_balance_of" => Ok(serde_json::json!("1000000000000")),
            other => Err(GatewayError::ContractError(format!(
                "method {other} not stubbed"
            ))),
        }
    }
}
