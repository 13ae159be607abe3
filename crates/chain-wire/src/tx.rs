//! Transaction construction and signing.

use crate::keys::KeyPair;
use crate::types::{Action, FunctionCallAction, PublicKey, Signature, SignedTransaction, Transaction};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Method name of the fungible-token transfer standard.
pub const FT_TRANSFER_METHOD: &str = "ft_transfer";

#[derive(Serialize)]
struct FtTransferArgs<'a> {
    receiver_id: &'a str,
    amount: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    memo: Option<&'a str>,
}

/// Serializes `ft_transfer` arguments as the UTF-8 JSON blob the contract
/// parses. The receiver, amount, and memo strings pass through verbatim so
/// the blob is byte-identical to the client's values.
pub fn ft_transfer_args(receiver_id: &str, amount: &str, memo: Option<&str>) -> Vec<u8> {
    serde_json::to_vec(&FtTransferArgs {
        receiver_id,
        amount,
        memo,
    })
    .expect("ft_transfer args are plain strings")
}

/// Builds an unsigned `ft_transfer` call from the signer to the token
/// contract.
#[allow(clippy::too_many_arguments)]
pub fn build_ft_transfer(
    signer_id: &str,
    public_key: PublicKey,
    nonce: u64,
    contract_id: &str,
    block_hash: [u8; 32],
    args: Vec<u8>,
    gas: u64,
    deposit: u128,
) -> Transaction {
    Transaction {
        signer_id: signer_id.to_owned(),
        public_key,
        nonce,
        receiver_id: contract_id.to_owned(),
        block_hash,
        actions: vec![Action::FunctionCall(FunctionCallAction {
            method_name: FT_TRANSFER_METHOD.to_owned(),
            args,
            gas,
            deposit,
        })],
    }
}

impl Transaction {
    /// SHA-256 digest of the canonical serialization. This is both the
    /// signing payload and the chain's transaction id.
    pub fn hash(&self) -> [u8; 32] {
        let bytes = borsh::to_vec(self).expect("transaction serialization is infallible");
        Sha256::digest(&bytes).into()
    }

    /// Signs the transaction with an access key.
    pub fn sign(self, key: &KeyPair) -> SignedTransaction {
        let signature = key.sign(&self.hash());
        SignedTransaction {
            transaction: self,
            signature: Signature::Ed25519(signature),
        }
    }
}

impl SignedTransaction {
    /// Canonical bytes for broadcast.
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("transaction serialization is infallible")
    }

    /// Base58 transaction hash, as block explorers display it.
    pub fn hash_str(&self) -> String {
        bs58::encode(self.transaction.hash()).into_string()
    }
}
