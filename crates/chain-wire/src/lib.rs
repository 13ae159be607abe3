//! # Chain Wire Format
//!
//! The chain's canonical binary transaction format and the Ed25519 signing
//! flow over it.
//!
//! ## Layout rules
//!
//! The chain serializes transactions with Borsh: struct fields in
//! declaration order, little-endian integers, `u32`-length-prefixed strings
//! and vectors, and a `u8` tag for enum variants. The enums in
//! [`types`] therefore declare **every** protocol variant in protocol order,
//! even the ones this gateway never emits, so the tags stay bit-exact.
//! Conformance vectors in the tests pin the layout.
//!
//! ## Signing
//!
//! A transaction is signed by hashing its Borsh serialization with SHA-256
//! and signing the 32-byte digest with the access key's Ed25519 secret key.

pub mod keys;
pub mod tx;
pub mod types;

pub use keys::{KeyPair, KeyParseError};
pub use tx::{build_ft_transfer, ft_transfer_args, FT_TRANSFER_METHOD};
pub use types::{
    AccessKey, AccessKeyPermission, Action, FunctionCallAction, PublicKey, Signature,
    SignedTransaction, Transaction, TransferAction,
};
