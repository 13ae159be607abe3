//! Node error classification.
//!
//! Maps the node's JSON-RPC error payloads and execution failure statuses
//! onto the gateway taxonomy. The node nests its error causes several
//! levels deep and the exact shape has shifted across releases, so the
//! matchers look for the stable discriminant names anywhere in the payload
//! rather than pinning one layout.

use serde_json::Value;
use shared_types::{GatewayError, InvalidTxKind};

/// Classifies a JSON-RPC `error` object from the node.
pub fn classify_rpc_error(error: &Value) -> GatewayError {
    let text = error.to_string();

    if let Some(invalid) = find_key(error, "InvalidNonce") {
        let chain_nonce = invalid.get("ak_nonce").and_then(Value::as_u64);
        return GatewayError::InvalidTx {
            kind: InvalidTxKind::NonceTooLow(chain_nonce),
            message: text,
        };
    }
    if find_key(error, "NonceTooLarge").is_some() {
        return GatewayError::InvalidTx {
            kind: InvalidTxKind::NonceTooLarge,
            message: text,
        };
    }
    if contains_discriminant(error, "Expired") {
        return GatewayError::InvalidTx {
            kind: InvalidTxKind::ExpiredBlockHash,
            message: text,
        };
    }
    if find_key(error, "InvalidTxError").is_some() || has_cause(error, "INVALID_TRANSACTION") {
        return GatewayError::InvalidTx {
            kind: InvalidTxKind::Other,
            message: text,
        };
    }
    if has_cause(error, "TIMEOUT_ERROR") {
        return GatewayError::Transient(text);
    }

    // Anything unrecognized from the node is treated as transient: the
    // request may succeed against another connection or a later block.
    GatewayError::Transient(text)
}

/// Classifies a `Failure` execution status from a final outcome.
pub fn classify_failure_status(status: &Value) -> GatewayError {
    let text = status.to_string();

    if let Some(call_error) = find_key(status, "FunctionCallError") {
        let detail = find_key(call_error, "ExecutionError")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| call_error.to_string());
        return GatewayError::ContractError(detail);
    }
    if find_key(status, "InvalidTxError").is_some() {
        return classify_rpc_error(status);
    }

    GatewayError::InvalidTx {
        kind: InvalidTxKind::Other,
        message: text,
    }
}

/// Depth-first search for an object key, returning its value.
fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key) {
                return Some(found);
            }
            map.values().find_map(|v| find_key(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

/// True when the payload carries `name` as an object key or a bare string
/// discriminant (unit enum variants serialize as strings).
fn contains_discriminant(value: &Value, name: &str) -> bool {
    match value {
        Value::String(s) => s == name,
        Value::Object(map) => {
            map.contains_key(name) || map.values().any(|v| contains_discriminant(v, name))
        }
        Value::Array(items) => items.iter().any(|v| contains_discriminant(v, name)),
        _ => false,
    }
}

fn has_cause(error: &Value, cause: &str) -> bool {
    error
        .get("cause")
        .and_then(|c| c.get("name"))
        .and_then(Value::as_str)
        .map(|name| name == cause)
        .unwrap_or(false)
}
