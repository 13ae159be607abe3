//! # Signer Keys
//!
//! Key management for the master account: the registry of signing keys with
//! health tracking and round-robin selection, and the per-key nonce
//! allocator.
//!
//! ## Invariants Enforced
//!
//! - For any (account, public key), allocated nonces are strictly increasing
//!   and never handed out twice, even across concurrent workers.
//! - A consumed nonce is never reused after a failed submission; drift
//!   refreshes only ever move the counter forward.
//! - A key whose on-chain access-key query never succeeded stays inactive
//!   and is never selected.

pub mod nonce;
pub mod registry;

pub use nonce::NonceAllocator;
pub use registry::{KeyLease, KeyRegistry, ManagedKey, RegistryError};

/// A key stops being preferred for selection once it accumulates this many
/// consecutive errors.
pub const PREFERRED_ERROR_CEILING: u32 = 5;
/// A key is deactivated outright once its consecutive errors exceed this.
pub const DEACTIVATION_THRESHOLD: u32 = 10;
