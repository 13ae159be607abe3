//! Service container: root-owned singletons wired in dependency order.

use crate::config::GatewayConfig;
use anyhow::Context;
use chain_rpc::JsonRpcClient;
use chain_wire::KeyPair;
use dispatch_core::DispatchPipeline;
use shared_types::ChainRpc;
use signer_keys::KeyRegistry;
use std::sync::Arc;
use tracing::info;

/// Owns every long-lived service of the process.
pub struct ServiceContainer {
    config: GatewayConfig,
    pipeline: Arc<DispatchPipeline>,
}

impl ServiceContainer {
    /// Builds the object graph bottom-up: RPC client, key registry,
    /// pipeline. Nothing talks to the chain yet; that happens in
    /// [`start`](Self::start).
    pub fn bootstrap(config: GatewayConfig) -> anyhow::Result<Self> {
        let chain: Arc<dyn ChainRpc> = Arc::new(
            JsonRpcClient::new(config.rpc.clone()).context("building rpc client pool")?,
        );

        let configured_keys = config.signing_keys().context("parsing signing keys")?;
        let generated: Vec<KeyPair> = (0..config.generated_key_count)
            .map(|_| KeyPair::generate())
            .collect();
        if !generated.is_empty() {
            info!(
                count = generated.len(),
                "generated signing keys; they stay inactive until registered on chain"
            );
        }
        let registry = Arc::new(KeyRegistry::new(
            config.dispatch.master_account_id.clone(),
            configured_keys,
            generated,
        ));

        let pipeline = Arc::new(DispatchPipeline::new(
            config.dispatch.clone(),
            chain,
            registry,
        ));

        Ok(Self { config, pipeline })
    }

    /// Bootstraps the pipeline against the chain.
    pub async fn start(&self) -> anyhow::Result<()> {
        self.pipeline
            .start()
            .await
            .context("pipeline bootstrap failed")
    }

    /// Drains and stops the pipeline.
    pub async fn shutdown(&self) {
        self.pipeline.shutdown().await;
    }

    /// The pipeline, for the HTTP surface.
    pub fn pipeline(&self) -> Arc<DispatchPipeline> {
        Arc::clone(&self.pipeline)
    }

    /// Resolved configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
