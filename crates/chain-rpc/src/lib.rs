//! # Chain RPC Client
//!
//! JSON-RPC 2.0 client for the blockchain node, implementing the pipeline's
//! [`ChainRpc`](shared_types::ChainRpc) port.
//!
//! ## Shape
//!
//! - a bounded pool of HTTP clients picked round-robin per call, so hot
//!   callers do not serialize behind one connection;
//! - transient transport failures (connect/reset/timeout/5xx) retry on the
//!   next pooled client up to a small budget; logical node errors never
//!   retry;
//! - the most recent finalized block hash is cached with a sub-second TTL
//!   and force-refreshed when the node reports an expired transaction.

pub mod cache;
pub mod classify;
pub mod client;

pub use cache::BlockHashCache;
pub use client::{JsonRpcClient, RpcClientConfig};
