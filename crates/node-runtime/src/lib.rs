//! # Node Runtime
//!
//! Composition root of the dispatch gateway: environment-driven
//! configuration, service container wiring, and process lifecycle.
//!
//! ## Process flow
//!
//! 1. telemetry up (logging + metric registration);
//! 2. configuration from environment, exit code 1 when invalid;
//! 3. container bootstrap (RPC client, key registry, pipeline), exit code 1
//!    when the chain bootstrap fails;
//! 4. HTTP server until SIGINT/SIGTERM;
//! 5. graceful drain, exit code 0.
//!
//! Services are singletons owned by the container and passed by reference;
//! teardown happens here, in reverse dependency order.

pub mod config;
pub mod container;

pub use config::{ConfigError, GatewayConfig};
pub use container::ServiceContainer;
