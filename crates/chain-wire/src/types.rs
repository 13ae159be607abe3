//! Canonical transaction types.
//!
//! Field order and enum variant order are the chain's wire contract; do not
//! reorder anything here without new conformance vectors.

use borsh::{BorshDeserialize, BorshSerialize};

/// An on-chain public key. Variant order fixes the key-type tag.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum PublicKey {
    /// Tag 0: Ed25519, 32 bytes.
    Ed25519([u8; 32]),
}

impl PublicKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        match self {
            Self::Ed25519(bytes) => bytes,
        }
    }

    /// Text form understood by the RPC node: `ed25519:<base58>`.
    pub fn to_account_string(&self) -> String {
        format!("ed25519:{}", bs58::encode(self.as_bytes()).into_string())
    }
}

/// A transaction signature. Variant order fixes the signature-type tag.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Signature {
    /// Tag 0: Ed25519, 64 bytes.
    Ed25519([u8; 64]),
}

/// What an access key is allowed to sign.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum AccessKeyPermission {
    /// Tag 0: restricted to specific contract calls.
    FunctionCall(FunctionCallPermission),
    /// Tag 1: full account access.
    FullAccess,
}

/// Restriction descriptor for a function-call access key.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FunctionCallPermission {
    /// Remaining allowance in yocto, if capped.
    pub allowance: Option<u128>,
    /// Contract the key may call.
    pub receiver_id: String,
    /// Permitted method names; empty means any.
    pub method_names: Vec<String>,
}

/// An access key as stored on chain.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AccessKey {
    /// Current nonce of the key.
    pub nonce: u64,
    /// What the key may do.
    pub permission: AccessKeyPermission,
}

/// Deploys contract code to the signer's account.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DeployContractAction {
    /// WASM blob.
    pub code: Vec<u8>,
}

/// Calls a method on the receiver contract.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FunctionCallAction {
    /// Method to invoke.
    pub method_name: String,
    /// UTF-8 JSON argument blob.
    pub args: Vec<u8>,
    /// Prepaid gas.
    pub gas: u64,
    /// Attached deposit in yocto.
    pub deposit: u128,
}

/// Transfers native tokens to the receiver.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TransferAction {
    /// Amount in yocto.
    pub deposit: u128,
}

/// Stakes native tokens with a validator key.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct StakeAction {
    /// Amount in yocto.
    pub stake: u128,
    /// Validator public key.
    pub public_key: PublicKey,
}

/// Registers a new access key on the signer's account.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AddKeyAction {
    /// Key being added.
    pub public_key: PublicKey,
    /// Its permission and starting nonce.
    pub access_key: AccessKey,
}

/// Removes an access key from the signer's account.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DeleteKeyAction {
    /// Key being removed.
    pub public_key: PublicKey,
}

/// Deletes the signer's account.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DeleteAccountAction {
    /// Account receiving the remaining balance.
    pub beneficiary_id: String,
}

/// A transaction action. The gateway only ever emits `FunctionCall`, but
/// every protocol variant is declared so the `u8` tags match the chain.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Action {
    /// Tag 0.
    CreateAccount,
    /// Tag 1.
    DeployContract(DeployContractAction),
    /// Tag 2.
    FunctionCall(FunctionCallAction),
    /// Tag 3.
    Transfer(TransferAction),
    /// Tag 4.
    Stake(StakeAction),
    /// Tag 5.
    AddKey(AddKeyAction),
    /// Tag 6.
    DeleteKey(DeleteKeyAction),
    /// Tag 7.
    DeleteAccount(DeleteAccountAction),
}

/// An unsigned transaction in canonical field order.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Transaction {
    /// Signing account.
    pub signer_id: String,
    /// Access key used to sign.
    pub public_key: PublicKey,
    /// Access-key nonce for this transaction.
    pub nonce: u64,
    /// Receiving account (the token contract for `ft_transfer`).
    pub receiver_id: String,
    /// Recent finalized block hash anchoring the transaction's validity
    /// window.
    pub block_hash: [u8; 32],
    /// Actions to apply, in order.
    pub actions: Vec<Action>,
}

/// A transaction plus its signature, ready for broadcast.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedTransaction {
    /// The signed payload.
    pub transaction: Transaction,
    /// Ed25519 signature over the SHA-256 digest of the payload.
    pub signature: Signature,
}
