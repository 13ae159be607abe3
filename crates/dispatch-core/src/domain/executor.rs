//! # Transfer Executor
//!
//! Consumes batches of queued transfers and turns each into a signed
//! `ft_transfer` submission. Parallelism is bounded by one semaphore whose
//! capacity is the hard ceiling on in-flight submissions; key selection is
//! hinted with the transfer's index inside its batch so a batch spreads
//! across access keys and per-key submission concurrency stays at one.
//!
//! A batch never fails as a unit: each transfer reaches its own terminal
//! state and the batch completes when all of them have.

use crate::domain::observer::ObserverSet;
use crate::domain::tracker::MetricsEngine;
use chain_wire::{build_ft_transfer, ft_transfer_args};
use dispatch_telemetry::metrics::{
    BATCHES_COMPLETED, BATCH_DURATION, NONCE_REFRESHES, TRANSFERS_FAILED, TRANSFERS_SUCCEEDED,
};
use shared_types::entities::epoch_millis;
use shared_types::{BatchMetrics, ChainRpc, GatewayError, QueuedTransfer, TxOutcome};
use signer_keys::{KeyLease, KeyRegistry, NonceAllocator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Bounded-parallelism transfer executor.
pub struct TransferExecutor {
    chain: Arc<dyn ChainRpc>,
    registry: Arc<KeyRegistry>,
    nonces: Arc<NonceAllocator>,
    metrics: Arc<MetricsEngine>,
    observers: Arc<ObserverSet>,
    permits: Arc<Semaphore>,
    contract_id: String,
    gas: u64,
    deposit: u128,
    rpc_timeout: Duration,
    inflight: AtomicUsize,
}

struct InflightGuard<'a>(&'a AtomicUsize);

impl<'a> InflightGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TransferExecutor {
    /// Wires an executor against its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        registry: Arc<KeyRegistry>,
        nonces: Arc<NonceAllocator>,
        metrics: Arc<MetricsEngine>,
        observers: Arc<ObserverSet>,
        max_parallel_transactions: usize,
        contract_id: String,
        gas: u64,
        deposit: u128,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            registry,
            nonces,
            metrics,
            observers,
            permits: Arc::new(Semaphore::new(max_parallel_transactions)),
            contract_id,
            gas,
            deposit,
            rpc_timeout,
            inflight: AtomicUsize::new(0),
        }
    }

    /// Processes a whole batch, all transfers in parallel up to the
    /// semaphore bound, and reports the aggregate.
    pub async fn execute_batch(&self, batch: Vec<QueuedTransfer>) -> BatchMetrics {
        let started = Instant::now();
        let size = batch.len();

        let results = futures::future::join_all(
            batch
                .iter()
                .enumerate()
                .map(|(index, transfer)| self.execute_one(transfer, Some(index))),
        )
        .await;

        let successful = results.iter().filter(|r| r.is_ok()).count();
        let metrics = BatchMetrics {
            size,
            successful,
            failed: size - successful,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp_ms: epoch_millis(),
        };

        self.metrics.record_batch(&metrics);
        BATCHES_COMPLETED.inc();
        BATCH_DURATION.observe(metrics.duration_ms as f64 / 1000.0);
        self.observers.notify_batch_completed(&metrics);
        debug!(
            size,
            successful,
            failed = metrics.failed,
            duration_ms = metrics.duration_ms,
            "batch completed"
        );
        metrics
    }

    /// Runs one transfer through acquire-sign-submit-settle. Used by the
    /// batch path and, with no hint, by the direct-transfer path.
    pub async fn execute_one(
        &self,
        transfer: &QueuedTransfer,
        hint: Option<usize>,
    ) -> Result<TxOutcome, GatewayError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GatewayError::ShuttingDown)?;
        let _inflight = InflightGuard::new(&self.inflight);

        let result = self.submit_with_key(transfer, hint).await;
        match &result {
            Ok(outcome) => {
                self.metrics.record_success();
                TRANSFERS_SUCCEEDED.inc();
                debug!(queue_id = %transfer.id, tx_hash = %outcome.hash, "transfer succeeded");
            }
            Err(err) => {
                self.metrics.record_failure();
                TRANSFERS_FAILED.with_label_values(&[err.kind()]).inc();
                self.observers.notify_transfer_failed(transfer.id, err.kind());
                warn!(queue_id = %transfer.id, kind = err.kind(), error = %err, "transfer failed");
            }
        }
        result
    }

    async fn submit_with_key(
        &self,
        transfer: &QueuedTransfer,
        hint: Option<usize>,
    ) -> Result<TxOutcome, GatewayError> {
        let lease = self
            .registry
            .acquire(hint)
            .map_err(|_| GatewayError::NoKeys)?;
        let public_key_str = lease.key.public_key_str().to_owned();

        let nonce = match self.nonces.next(&lease.account_id, &public_key_str) {
            Ok(nonce) => nonce,
            Err(err) => {
                let _ = self.registry.mark_failure(lease.index);
                return Err(err);
            }
        };

        // The nonce is consumed from here on; both settle paths release it
        // and a failed submission never returns it to the pool.
        let result = self.sign_and_submit(transfer, &lease, nonce).await;
        match &result {
            Ok(_) => {
                let _ = self.registry.mark_success(lease.index);
                self.nonces
                    .release(&lease.account_id, &public_key_str, true, false)
                    .await;
            }
            Err(err) => {
                let _ = self.registry.mark_failure(lease.index);
                let drift = err.is_nonce_drift();
                if drift {
                    NONCE_REFRESHES.inc();
                }
                self.nonces
                    .release(&lease.account_id, &public_key_str, false, drift)
                    .await;
            }
        }
        result
    }

    async fn sign_and_submit(
        &self,
        transfer: &QueuedTransfer,
        lease: &KeyLease,
        nonce: u64,
    ) -> Result<TxOutcome, GatewayError> {
        let block_hash = self.chain.recent_block_hash().await?;
        let args = ft_transfer_args(
            &transfer.request.receiver_id,
            &transfer.request.amount,
            transfer.request.memo.as_deref(),
        );
        let tx = build_ft_transfer(
            &lease.account_id,
            lease.key.key_pair().public_key().clone(),
            nonce,
            &self.contract_id,
            block_hash,
            args,
            self.gas,
            self.deposit,
        );
        let signed = tx.sign(lease.key.key_pair());

        match tokio::time::timeout(self.rpc_timeout, self.chain.submit(signed.to_bytes())).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Transient(format!(
                "rpc submit exceeded {} ms",
                self.rpc_timeout.as_millis()
            ))),
        }
    }

    /// Transfers currently holding a permit.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    /// True when no transfer is in flight.
    pub fn is_idle(&self) -> bool {
        self.inflight() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chain_wire::KeyPair;
    use shared_types::chain::AccessKeyView;
    use shared_types::{InvalidTxKind, TransferRequest};
    use std::collections::HashSet;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex as StdMutex;

    /// Scriptable chain stub that records every submission it sees.
    struct StubChain {
        chain_nonce: AtomicU64,
        submit_delay: Duration,
        /// Outcomes to serve before switching to unconditional success.
        scripted: StdMutex<Vec<Result<(), GatewayError>>>,
        submitted_nonces: StdMutex<Vec<([u8; 32], u64)>>,
        concurrent: AtomicUsize,
        max_concurrent: AtomicUsize,
    }

    impl StubChain {
        fn accepting() -> Arc<Self> {
            Self::scripted(vec![])
        }

        fn scripted(outcomes: Vec<Result<(), GatewayError>>) -> Arc<Self> {
            Arc::new(Self {
                chain_nonce: AtomicU64::new(0),
                submit_delay: Duration::from_millis(2),
                scripted: StdMutex::new(outcomes),
                submitted_nonces: StdMutex::new(Vec::new()),
                concurrent: AtomicUsize::new(0),
                max_concurrent: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChainRpc for StubChain {
        async fn submit(&self, signed_tx: Vec<u8>) -> Result<TxOutcome, GatewayError> {
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.submit_delay).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);

            let parsed: chain_wire::SignedTransaction =
                borsh::from_slice(&signed_tx).expect("executor emits canonical bytes");
            self.submitted_nonces
                .lock()
                .unwrap()
                .push((*parsed.transaction.public_key.as_bytes(), parsed.transaction.nonce));

            let scripted = self.scripted.lock().unwrap().pop();
            match scripted {
                Some(Err(err)) => Err(err),
                _ => Ok(TxOutcome {
                    hash: parsed.hash_str(),
                }),
            }
        }

        async fn view_access_key(
            &self,
            _account_id: &str,
            _public_key: &str,
        ) -> Result<AccessKeyView, GatewayError> {
            Ok(AccessKeyView {
                nonce: self.chain_nonce.load(Ordering::SeqCst),
                permission: serde_json::json!("FullAccess"),
            })
        }

        async fn recent_block_hash(&self) -> Result<[u8; 32], GatewayError> {
            Ok([1; 32])
        }

        async fn view_function(
            &self,
            _contract_id: &str,
            _method: &str,
            _args: serde_json::Value,
        ) -> Result<serde_json::Value, GatewayError> {
            Ok(serde_json::Value::Null)
        }
    }

    async fn executor_with(
        chain: Arc<StubChain>,
        key_count: usize,
        max_parallel: usize,
    ) -> (TransferExecutor, Arc<KeyRegistry>, Arc<NonceAllocator>) {
        let keys = (0..key_count)
            .map(|i| KeyPair::from_seed([i as u8 + 1; 32]))
            .collect();
        let registry = Arc::new(KeyRegistry::new("gateway.testnet", keys, vec![]));
        let nonces = Arc::new(NonceAllocator::new(
            Arc::clone(&chain) as Arc<dyn ChainRpc>
        ));
        nonces
            .initialize("gateway.testnet", &registry.public_keys())
            .await;

        let executor = TransferExecutor::new(
            chain,
            Arc::clone(&registry),
            Arc::clone(&nonces),
            Arc::new(MetricsEngine::new()),
            Arc::new(ObserverSet::new()),
            max_parallel,
            "token.testnet".into(),
            30_000_000_000_000,
            1,
            Duration::from_secs(5),
        );
        (executor, registry, nonces)
    }

    fn batch_of(n: usize) -> Vec<QueuedTransfer> {
        (0..n)
            .map(|i| {
                QueuedTransfer::new(
                    TransferRequest {
                        receiver_id: format!("r{i}.testnet"),
                        amount: "100".into(),
                        memo: None,
                    },
                    1.0,
                )
            })
            .collect()
    }

    // =========================================================================
    // HAPPY PATH
    // =========================================================================

    #[tokio::test]
    async fn clean_batch_reports_all_successful() {
        let chain = StubChain::accepting();
        let (executor, _, _) = executor_with(Arc::clone(&chain), 4, 8).await;

        let metrics = executor.execute_batch(batch_of(20)).await;
        assert_eq!(metrics.size, 20);
        assert_eq!(metrics.successful, 20);
        assert_eq!(metrics.failed, 0);
        assert!(metrics.is_clean());
        assert!(executor.is_idle());
    }

    #[tokio::test]
    async fn submitted_nonces_are_unique_per_key() {
        let chain = StubChain::accepting();
        let (executor, registry, _) = executor_with(Arc::clone(&chain), 4, 16).await;

        executor.execute_batch(batch_of(40)).await;
        executor.execute_batch(batch_of(40)).await;

        let submitted = chain.submitted_nonces.lock().unwrap();
        assert_eq!(submitted.len(), 80);

        let mut per_key: std::collections::HashMap<[u8; 32], HashSet<u64>> =
            std::collections::HashMap::new();
        for (pk, nonce) in submitted.iter() {
            assert!(
                per_key.entry(*pk).or_default().insert(*nonce),
                "nonce {nonce} reused within one key"
            );
        }
        assert_eq!(per_key.len(), registry.len(), "batch spread over every key");
    }

    // =========================================================================
    // CONCURRENCY BOUND
    // =========================================================================

    #[tokio::test]
    async fn inflight_submissions_never_exceed_the_semaphore() {
        let chain = StubChain::accepting();
        let (executor, _, _) = executor_with(Arc::clone(&chain), 8, 5).await;

        executor.execute_batch(batch_of(50)).await;
        assert!(
            chain.max_concurrent.load(Ordering::SeqCst) <= 5,
            "observed {} concurrent submits",
            chain.max_concurrent.load(Ordering::SeqCst)
        );
    }

    // =========================================================================
    // FAILURE SETTLEMENT
    // =========================================================================

    #[tokio::test]
    async fn contract_error_fails_one_transfer_not_the_batch() {
        let chain = StubChain::scripted(vec![Err(GatewayError::ContractError(
            "The account bob.testnet is not registered".into(),
        ))]);
        let (executor, _, _) = executor_with(chain, 2, 4).await;

        let metrics = executor.execute_batch(batch_of(3)).await;
        assert_eq!(metrics.successful, 2);
        assert_eq!(metrics.failed, 1);
    }

    #[tokio::test]
    async fn failed_submission_consumes_its_nonce() {
        let chain = StubChain::scripted(vec![Err(GatewayError::Transient("reset".into()))]);
        let (executor, _, nonces) = executor_with(chain, 1, 1).await;

        let transfers = batch_of(2);
        let metrics = executor.execute_batch(transfers).await;
        assert_eq!(metrics.failed, 1);

        // Two allocations happened; the next nonce moved past both.
        let pk = executor.registry.snapshot()[0].1.clone();
        assert_eq!(nonces.peek("gateway.testnet", &pk), Some(3));
    }

    #[tokio::test]
    async fn nonce_drift_triggers_refresh_from_chain() {
        let chain = StubChain::scripted(vec![Err(GatewayError::InvalidTx {
            kind: InvalidTxKind::NonceTooLow(Some(42)),
            message: "InvalidNonce".into(),
        })]);
        let (executor, _, nonces) = executor_with(Arc::clone(&chain), 1, 1).await;
        // The key advanced on chain after initialization.
        chain.chain_nonce.store(42, Ordering::SeqCst);

        let metrics = executor.execute_batch(batch_of(1)).await;
        assert_eq!(metrics.failed, 1);

        let pk = executor.registry.snapshot()[0].1.clone();
        assert_eq!(
            nonces.peek("gateway.testnet", &pk),
            Some(43),
            "allocator re-synced to chain nonce + 1"
        );
    }

    #[tokio::test]
    async fn repeated_failures_degrade_the_key() {
        let chain = StubChain::scripted(
            (0..12)
                .map(|_| Err(GatewayError::Transient("reset".into())))
                .collect(),
        );
        let (executor, registry, _) = executor_with(chain, 1, 1).await;

        for _ in 0..12 {
            executor.execute_batch(batch_of(1)).await;
        }
        assert_eq!(registry.active_count(), 0, "key deactivated after sustained failures");

        // With every key inactive, the next transfer fails NO_KEYS.
        let result = executor
            .execute_one(&batch_of(1).pop().unwrap(), None)
            .await;
        assert!(matches!(result, Err(GatewayError::NoKeys)));
    }
}
