//! # Request Validation
//!
//! Ingress-side checks enforced before a transfer may enter the queue.
//! All failures map to [`GatewayError::Validation`].
//!
//! The account-id grammar is the chain's: 2–64 characters, dot-separated
//! segments of lowercase alphanumerics with interior `_` or `-`, where a
//! segment neither starts nor ends with a separator.

use crate::entities::TransferRequest;
use crate::errors::GatewayError;

/// Minimum account id length.
pub const MIN_ACCOUNT_LEN: usize = 2;
/// Maximum account id length.
pub const MAX_ACCOUNT_LEN: usize = 64;
/// Maximum transfer amount in base units.
pub const MAX_AMOUNT_BASE_UNITS: u64 = 1_000_000_000_000;
/// Maximum fractional digits accepted in an amount string.
pub const MAX_FRACTIONAL_DIGITS: usize = 24;
/// Maximum memo length in bytes.
pub const MAX_MEMO_BYTES: usize = 256;

/// Validates a full transfer request.
pub fn validate_transfer_request(req: &TransferRequest) -> Result<(), GatewayError> {
    validate_account_id(&req.receiver_id)?;
    validate_amount(&req.amount)?;
    if let Some(memo) = &req.memo {
        validate_memo(memo)?;
    }
    Ok(())
}

/// Checks an account id against the chain grammar.
pub fn validate_account_id(account_id: &str) -> Result<(), GatewayError> {
    let len = account_id.len();
    if len < MIN_ACCOUNT_LEN || len > MAX_ACCOUNT_LEN {
        return Err(GatewayError::Validation(format!(
            "account id must be {MIN_ACCOUNT_LEN}-{MAX_ACCOUNT_LEN} chars, got {len}"
        )));
    }

    for segment in account_id.split('.') {
        if segment.is_empty() {
            return Err(GatewayError::Validation(
                "account id has an empty segment (leading, trailing, or doubled dot)".into(),
            ));
        }
        let bytes = segment.as_bytes();
        if !bytes.iter().all(|b| is_account_char(*b)) {
            return Err(GatewayError::Validation(format!(
                "account id segment '{segment}' contains invalid characters"
            )));
        }
        if is_separator(bytes[0]) || is_separator(bytes[bytes.len() - 1]) {
            return Err(GatewayError::Validation(format!(
                "account id segment '{segment}' starts or ends with a separator"
            )));
        }
    }
    Ok(())
}

fn is_account_char(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit() || is_separator(b)
}

fn is_separator(b: u8) -> bool {
    b == b'_' || b == b'-'
}

/// Checks an amount string: positive decimal, at most 10^12 base units,
/// at most 24 fractional digits. No sign, no exponent.
pub fn validate_amount(amount: &str) -> Result<(), GatewayError> {
    if amount.is_empty() {
        return Err(GatewayError::Validation("amount must not be empty".into()));
    }

    let (int_part, frac_part) = match amount.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (amount, None),
    };

    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GatewayError::Validation(format!(
            "amount '{amount}' is not a decimal number"
        )));
    }
    if let Some(frac) = frac_part {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(GatewayError::Validation(format!(
                "amount '{amount}' has a malformed fractional part"
            )));
        }
        if frac.len() > MAX_FRACTIONAL_DIGITS {
            return Err(GatewayError::Validation(format!(
                "amount has {} fractional digits, max {MAX_FRACTIONAL_DIGITS}",
                frac.len()
            )));
        }
    }

    let has_value = int_part.bytes().any(|b| b != b'0')
        || frac_part.is_some_and(|f| f.bytes().any(|b| b != b'0'));
    if !has_value {
        return Err(GatewayError::Validation("amount must be positive".into()));
    }

    let trimmed = int_part.trim_start_matches('0');
    if trimmed.len() > 13 {
        return Err(GatewayError::Validation(format!(
            "amount exceeds {MAX_AMOUNT_BASE_UNITS} base units"
        )));
    }
    if let Ok(int_value) = trimmed.parse::<u64>() {
        let frac_nonzero = frac_part.is_some_and(|f| f.bytes().any(|b| b != b'0'));
        if int_value > MAX_AMOUNT_BASE_UNITS
            || (int_value == MAX_AMOUNT_BASE_UNITS && frac_nonzero)
        {
            return Err(GatewayError::Validation(format!(
                "amount exceeds {MAX_AMOUNT_BASE_UNITS} base units"
            )));
        }
    } else if !trimmed.is_empty() {
        return Err(GatewayError::Validation(format!(
            "amount exceeds {MAX_AMOUNT_BASE_UNITS} base units"
        )));
    }

    Ok(())
}

/// Checks a memo: printable ASCII plus tab/CR/LF, at most 256 bytes.
pub fn validate_memo(memo: &str) -> Result<(), GatewayError> {
    if memo.len() > MAX_MEMO_BYTES {
        return Err(GatewayError::Validation(format!(
            "memo is {} bytes, max {MAX_MEMO_BYTES}",
            memo.len()
        )));
    }
    for b in memo.bytes() {
        let printable = (0x20..=0x7E).contains(&b) || b == b'\t' || b == b'\r' || b == b'\n';
        if !printable {
            return Err(GatewayError::Validation(format!(
                "memo contains non-printable byte 0x{b:02x}"
            )));
        }
    }
    Ok(())
}
