//! # Integration Tests Crate
//!
//! Cross-crate scenarios for the dispatch gateway, driven end to end
//! against an in-process chain stub.
//!
//! ## Structure
//!
//! ```text
//! integration-tests/
//! └── src/
//!     ├── lib.rs           # This file: the chain stub and harness
//!     ├── pipeline_flows.rs # Queue → collector → executor flows
//!     ├── http_api.rs       # HTTP surface contracts
//!     └── compliance.rs     # Throughput compliance runs
//! ```

pub mod stub;

#[cfg(test)]
mod compliance;
#[cfg(test)]
mod http_api;
#[cfg(test)]
mod pipeline_flows;

pub use stub::{StubChain, SubmitScript};

use api_gateway::HttpConfig;
use chain_wire::KeyPair;
use dispatch_core::{DispatchConfig, DispatchPipeline};
use shared_types::ChainRpc;
use signer_keys::KeyRegistry;
use std::sync::Arc;

/// Builds a pipeline over a stub chain with `key_count` active keys.
///
/// `queue_capacity` of 0 keeps the derived default. The batch interval is
/// tightened so tests settle quickly.
pub fn test_pipeline(
    stub: Arc<StubChain>,
    key_count: usize,
    queue_capacity: usize,
) -> Arc<DispatchPipeline> {
    test_pipeline_with(stub, key_count, queue_capacity, |config| config)
}

/// [`test_pipeline`] with a configuration hook.
pub fn test_pipeline_with(
    stub: Arc<StubChain>,
    key_count: usize,
    queue_capacity: usize,
    tweak: impl FnOnce(DispatchConfig) -> DispatchConfig,
) -> Arc<DispatchPipeline> {
    let config = tweak(DispatchConfig {
        master_account_id: "gateway.testnet".into(),
        contract_id: "token.testnet".into(),
        queue_capacity,
        batch_interval_ms: 20,
        ..DispatchConfig::default()
    });

    let keys: Vec<KeyPair> = (0..key_count)
        .map(|i| KeyPair::from_seed([i as u8 + 1; 32]))
        .collect();
    let registry = Arc::new(KeyRegistry::new("gateway.testnet", keys, vec![]));

    Arc::new(DispatchPipeline::new(
        config,
        stub as Arc<dyn ChainRpc>,
        registry,
    ))
}

/// Builds the HTTP router over a pipeline, with rate limiting off so
/// request-level tests control admission themselves.
pub fn test_router(pipeline: Arc<DispatchPipeline>) -> axum::Router {
    let config = HttpConfig {
        rate_limit: api_gateway::RateLimitConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    api_gateway::build_router(pipeline, config)
}
