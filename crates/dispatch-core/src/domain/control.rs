//! # Control Plane
//!
//! Lifecycle state machine and composed health view.
//!
//! ```text
//! Created ──start()──→ Initializing ──bootstrap ok──→ Running
//!                            │                           │ shutdown()
//!                            └──bootstrap failed──→ Stopped
//!                                                        ↓
//!                                                    Draining ──→ Stopped
//! ```
//!
//! Health is the conjunction of: state is `Running`, at least one signing
//! key is active, and the most recent chain probe succeeded within the
//! grace period.

use serde::Serialize;
use shared_types::ChainRpc;
use parking_lot::Mutex;
use signer_keys::KeyRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

/// Gateway lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayState {
    /// Constructed, not yet started.
    Created,
    /// Bootstrapping against the chain.
    Initializing,
    /// Accepting and dispatching transfers.
    Running,
    /// Rejecting new work, finishing outstanding transfers.
    Draining,
    /// Fully stopped.
    Stopped,
}

impl GatewayState {
    /// Stable lowercase name for logs and status bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Composed health view for the health endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    /// Overall verdict.
    pub healthy: bool,
    /// Current lifecycle state.
    pub state: GatewayState,
    /// Signing keys currently active.
    pub active_keys: usize,
    /// Whether the last chain probe succeeded.
    pub last_probe_ok: bool,
    /// Age of the last probe in milliseconds, when one has run.
    pub last_probe_age_ms: Option<u64>,
    /// Master account's token balance, as of the last successful probe.
    pub ft_balance: Option<String>,
}

struct ProbeState {
    at: Instant,
    ok: bool,
    ft_balance: Option<String>,
}

/// Lifecycle and health state, shared across the pipeline and the HTTP
/// surface.
pub struct ControlPlane {
    state_tx: watch::Sender<GatewayState>,
    chain: Arc<dyn ChainRpc>,
    registry: Arc<KeyRegistry>,
    contract_id: String,
    probe_grace: Duration,
    last_probe: Mutex<Option<ProbeState>>,
}

impl ControlPlane {
    /// Creates the control plane in `Created`.
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        registry: Arc<KeyRegistry>,
        contract_id: String,
        probe_grace: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(GatewayState::Created);
        Self {
            state_tx,
            chain,
            registry,
            contract_id,
            probe_grace,
            last_probe: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GatewayState {
        *self.state_tx.borrow()
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<GatewayState> {
        self.state_tx.subscribe()
    }

    /// Moves to a new state, logging the transition.
    pub fn transition(&self, next: GatewayState) {
        let previous = self.state();
        if previous != next {
            info!(from = previous.as_str(), to = next.as_str(), "lifecycle transition");
            let _ = self.state_tx.send(next);
        }
    }

    /// Queries the master account's token balance as a liveness probe and
    /// records the outcome.
    pub async fn probe(&self, master_account_id: &str) {
        let args = serde_json::json!({ "account_id": master_account_id });
        let result = self
            .chain
            .view_function(&self.contract_id, "ft_balance_of", args)
            .await;

        let (ok, balance) = match result {
            Ok(value) => {
                let balance = value.as_str().map(str::to_owned);
                (true, balance)
            }
            Err(err) => {
                warn!(error = %err, "health probe failed");
                (false, None)
            }
        };

        *self.last_probe.lock() = Some(ProbeState {
            at: Instant::now(),
            ok,
            ft_balance: balance,
        });
    }

    /// Composes the health verdict.
    pub fn health(&self) -> HealthReport {
        let state = self.state();
        let active_keys = self.registry.active_count();

        let (last_probe_ok, last_probe_age_ms, ft_balance) = match &*self.last_probe.lock() {
            Some(probe) => (
                probe.ok && probe.at.elapsed() <= self.probe_grace,
                Some(probe.at.elapsed().as_millis() as u64),
                probe.ft_balance.clone(),
            ),
            None => (false, None, None),
        };

        HealthReport {
            healthy: state == GatewayState::Running && active_keys >= 1 && last_probe_ok,
            state,
            active_keys,
            last_probe_ok,
            last_probe_age_ms,
            ft_balance,
        }
    }
}
