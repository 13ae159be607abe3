//! # Dispatch Pipeline
//!
//! Root-owned composition of the queue, collector, executor, metrics
//! engine, and control plane. Built once at startup and handed by reference
//! to the HTTP surface; torn down by the runtime in reverse dependency
//! order.

use crate::config::DispatchConfig;
use crate::domain::collector::BatchCollector;
use crate::domain::control::{ControlPlane, GatewayState, HealthReport};
use crate::domain::executor::TransferExecutor;
use crate::domain::observer::{DispatchObserver, ObserverSet};
use crate::domain::queue::TransferQueue;
use crate::domain::tracker::{BountyStatus, MetricsEngine, MetricsSnapshot};
use dispatch_telemetry::metrics::{ACTIVE_KEYS, ENQUEUE_REJECTED, TRANSFERS_ENQUEUED};
use serde::Serialize;
use shared_types::entities::DEFAULT_PRIORITY;
use shared_types::validation::validate_transfer_request;
use shared_types::{ChainRpc, GatewayError, QueuedTransfer, TransferRequest, TxOutcome};
use signer_keys::{KeyRegistry, NonceAllocator};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Lifecycle plus queue and throughput summary for the status endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    /// Current lifecycle state.
    pub state: GatewayState,
    /// Chain identifier the gateway signs for.
    pub network_id: String,
    /// Transfers currently queued.
    pub queue_depth: usize,
    /// Queue capacity.
    pub queue_capacity: usize,
    /// Whether the queue still admits transfers.
    pub accepting: bool,
    /// Batches currently executing.
    pub inflight_batches: usize,
    /// Signing keys currently active.
    pub active_keys: usize,
    /// Full metrics snapshot.
    pub metrics: MetricsSnapshot,
}

/// The assembled dispatch pipeline.
pub struct DispatchPipeline {
    config: DispatchConfig,
    chain: Arc<dyn ChainRpc>,
    registry: Arc<KeyRegistry>,
    nonces: Arc<NonceAllocator>,
    queue: Arc<TransferQueue>,
    collector: Arc<BatchCollector>,
    executor: Arc<TransferExecutor>,
    metrics: Arc<MetricsEngine>,
    observers: Arc<ObserverSet>,
    control: Arc<ControlPlane>,
    shutdown_tx: watch::Sender<bool>,
}

impl DispatchPipeline {
    /// Wires the pipeline. Nothing runs until [`start`](Self::start).
    pub fn new(
        config: DispatchConfig,
        chain: Arc<dyn ChainRpc>,
        registry: Arc<KeyRegistry>,
    ) -> Self {
        let metrics = Arc::new(MetricsEngine::new());
        let observers = Arc::new(ObserverSet::new());
        let queue = Arc::new(TransferQueue::new(config.effective_queue_capacity()));
        let nonces = Arc::new(NonceAllocator::new(Arc::clone(&chain)));

        let executor = Arc::new(TransferExecutor::new(
            Arc::clone(&chain),
            Arc::clone(&registry),
            Arc::clone(&nonces),
            Arc::clone(&metrics),
            Arc::clone(&observers),
            config.max_parallel_transactions,
            config.contract_id.clone(),
            config.function_call_gas,
            config.attached_deposit,
            config.rpc_timeout(),
        ));

        let collector = Arc::new(BatchCollector::new(
            Arc::clone(&queue),
            Arc::clone(&executor),
            Arc::clone(&metrics),
            config.batch_size,
            config.batch_interval(),
            config.max_concurrent_batches,
        ));

        let control = Arc::new(ControlPlane::new(
            Arc::clone(&chain),
            Arc::clone(&registry),
            config.contract_id.clone(),
            Duration::from_secs(config.probe_grace_secs),
        ));

        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            chain,
            registry,
            nonces,
            queue,
            collector,
            executor,
            metrics,
            observers,
            control,
            shutdown_tx,
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Bootstraps against the chain and starts the background loops.
    ///
    /// Initialization requires: a reachable node, fetchable token metadata,
    /// and at least one access key whose on-chain nonce query succeeds.
    /// Failure leaves the pipeline `Stopped`.
    pub async fn start(&self) -> Result<(), GatewayError> {
        self.control.transition(GatewayState::Initializing);

        if let Err(err) = self.bootstrap().await {
            error!(error = %err, "bootstrap failed");
            self.control.transition(GatewayState::Stopped);
            return Err(err);
        }

        let collector = Arc::clone(&self.collector);
        tokio::spawn(collector.run(self.shutdown_tx.subscribe()));

        let control = Arc::clone(&self.control);
        let master_account_id = self.config.master_account_id.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let probe_interval = Duration::from_secs(self.config.probe_interval_secs);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            return;
                        }
                    }
                    _ = tokio::time::sleep(probe_interval) => {
                        control.probe(&master_account_id).await;
                    }
                }
            }
        });

        self.control.transition(GatewayState::Running);
        info!(
            network_id = %self.config.network_id,
            contract_id = %self.config.contract_id,
            keys = self.registry.active_count(),
            queue_capacity = self.queue.capacity(),
            "dispatch pipeline running"
        );
        Ok(())
    }

    async fn bootstrap(&self) -> Result<(), GatewayError> {
        // Node reachability.
        self.chain.recent_block_hash().await?;

        // The token contract must exist and expose FT metadata.
        let metadata = self
            .chain
            .view_function(&self.config.contract_id, "ft_metadata", serde_json::json!({}))
            .await?;
        info!(
            contract_id = %self.config.contract_id,
            symbol = metadata.get("symbol").and_then(|s| s.as_str()).unwrap_or("?"),
            "token contract metadata fetched"
        );

        // Nonce entries for every key whose on-chain registration checks
        // out; the rest stay (or become) inactive.
        let ready = self
            .nonces
            .initialize(self.registry.account_id(), &self.registry.public_keys())
            .await;
        for (index, public_key, _, _, _) in self.registry.snapshot() {
            if ready.contains(&public_key) {
                self.registry.activate(index).map_err(to_no_keys)?;
            } else {
                warn!(index, public_key = %public_key, "access key not usable on chain; deactivating");
                self.registry.deactivate(index).map_err(to_no_keys)?;
            }
        }
        ACTIVE_KEYS.set(self.registry.active_count() as f64);

        if self.registry.active_count() == 0 {
            return Err(GatewayError::NoKeys);
        }

        // Seed the probe so the gateway is healthy as soon as it is Running.
        self.control.probe(&self.config.master_account_id).await;
        Ok(())
    }

    /// Graceful shutdown: stop admitting, drain outstanding work within the
    /// configured deadline, cancel the rest, stop the loops.
    pub async fn shutdown(&self) {
        match self.control.state() {
            GatewayState::Draining | GatewayState::Stopped => return,
            _ => {}
        }

        self.control.transition(GatewayState::Draining);
        self.queue.close();

        let deadline = Instant::now() + self.config.drain_deadline();
        while Instant::now() < deadline {
            if self.queue.is_empty()
                && self.collector.inflight_batches() == 0
                && self.executor.is_idle()
            {
                break;
            }
            // Keep the collector moving in case ticks are sparse.
            self.collector.collect_once();
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        let _ = self.shutdown_tx.send(true);

        let cancelled = self.queue.drain_all();
        if !cancelled.is_empty() {
            warn!(count = cancelled.len(), "drain deadline reached; cancelling queued transfers");
            self.metrics.record_cancelled(cancelled.len() as u64);
        }

        self.control.transition(GatewayState::Stopped);
        info!("dispatch pipeline stopped");
    }

    // =========================================================================
    // INGRESS
    // =========================================================================

    /// Validates and enqueues one transfer, returning its queue id.
    pub fn enqueue_transfer(
        &self,
        request: TransferRequest,
        priority: Option<f64>,
    ) -> Result<Uuid, GatewayError> {
        let result = self.admit(request, priority);
        if let Err(err) = &result {
            ENQUEUE_REJECTED.with_label_values(&[err.kind()]).inc();
        }
        result
    }

    fn admit(
        &self,
        request: TransferRequest,
        priority: Option<f64>,
    ) -> Result<Uuid, GatewayError> {
        validate_transfer_request(&request)?;

        let transfer = QueuedTransfer::new(request, priority.unwrap_or(DEFAULT_PRIORITY));
        let priority = transfer.priority;
        let id = self.queue.enqueue(transfer)?;

        self.metrics.record_enqueued();
        TRANSFERS_ENQUEUED.inc();
        self.observers.notify_transfer_queued(id, priority);

        if self.queue.len() >= self.collector.flush_threshold() {
            self.collector.flush_handle().notify_one();
        }
        Ok(id)
    }

    /// Enqueues a client batch item by item; each item succeeds or fails on
    /// its own.
    pub fn enqueue_bulk(
        &self,
        requests: Vec<TransferRequest>,
        priority: Option<f64>,
    ) -> Vec<Result<Uuid, GatewayError>> {
        requests
            .into_iter()
            .map(|request| self.enqueue_transfer(request, priority))
            .collect()
    }

    /// Runs one transfer through the executor immediately, bypassing the
    /// queue and collector. Best-effort: it competes for the same executor
    /// permits as batched work.
    pub async fn direct_transfer(
        &self,
        request: TransferRequest,
    ) -> Result<TxOutcome, GatewayError> {
        validate_transfer_request(&request)?;
        match self.control.state() {
            GatewayState::Running => {}
            GatewayState::Draining | GatewayState::Stopped => {
                return Err(GatewayError::ShuttingDown)
            }
            _ => {
                return Err(GatewayError::Transient(
                    "pipeline not yet running".into(),
                ))
            }
        }

        let transfer = QueuedTransfer::new(request, DEFAULT_PRIORITY);
        self.executor.execute_one(&transfer, None).await
    }

    // =========================================================================
    // OBSERVABILITY
    // =========================================================================

    /// Registers a pipeline observer.
    pub fn register_observer(&self, observer: Arc<dyn DispatchObserver>) {
        self.observers.register(observer);
    }

    /// Full metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Sustained-throughput verdict.
    pub fn bounty_status(&self) -> BountyStatus {
        self.metrics.bounty()
    }

    /// Composed health view.
    pub fn health(&self) -> HealthReport {
        self.control.health()
    }

    /// Lifecycle and queue summary.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            state: self.control.state(),
            network_id: self.config.network_id.clone(),
            queue_depth: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            accepting: self.queue.is_accepting(),
            inflight_batches: self.collector.inflight_batches(),
            active_keys: self.registry.active_count(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// The metrics engine, for collaborators that record directly.
    pub fn metrics(&self) -> Arc<MetricsEngine> {
        Arc::clone(&self.metrics)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GatewayState {
        self.control.state()
    }
}

fn to_no_keys(_: signer_keys::RegistryError) -> GatewayError {
    GatewayError::NoKeys
}
