//! # API Gateway
//!
//! HTTP surface of the dispatch gateway.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | POST | `/transfer` | enqueue one transfer |
//! | POST | `/bulk-transfer` | enqueue up to 1000 transfers |
//! | POST | `/direct-transfer` | synchronous single transfer |
//! | GET | `/health` | composed health verdict |
//! | GET | `/metrics` | pipeline metrics snapshot (JSON) |
//! | GET | `/metrics/prometheus` | Prometheus text exposition |
//! | GET | `/status` | lifecycle + queue summary |
//! | GET | `/bounty-status` | sustained-throughput verdict |
//!
//! The router applies, outermost first: CORS, a per-IP token-bucket rate
//! limit, and a request body size cap. Handlers validate and translate;
//! all pipeline semantics live in `dispatch-core`.

pub mod domain;
pub mod handlers;
pub mod middleware;
pub mod service;

pub use domain::config::{HttpConfig, RateLimitConfig};
pub use domain::error::ApiFailure;
pub use service::{build_router, serve, AppState};
