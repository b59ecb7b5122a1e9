//! # HMAC-SHA256 Signatures
//!
//! Keyed MACs over a sequence of byte slices, verified in constant time.

use crate::CryptoError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 output length in bytes.
pub const MAC_LEN: usize = 32;

fn keyed(key: &[u8], parts: &[&[u8]]) -> Result<HmacSha256, CryptoError> {
    if key.is_empty() {
        return Err(CryptoError::InvalidInput("empty MAC key".into()));
    }
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac)
}

/// Compute HMAC-SHA256 over the concatenation of `parts`.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<[u8; MAC_LEN], CryptoError> {
    Ok(keyed(key, parts)?.finalize().into_bytes().into())
}

/// Verify an HMAC-SHA256 over the concatenation of `parts`.
///
/// # Errors
///
/// Returns `CryptoError::SignatureVerificationFailed` on any mismatch,
/// including a wrong-length `expected`.
pub fn verify_hmac_sha256(key: &[u8], parts: &[&[u8]], expected: &[u8]) -> Result<(), CryptoError> {
    keyed(key, parts)?
        .verify_slice(expected)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}

/// Constant-time byte comparison.
///
/// Lengths are compared too; only the length itself can leak.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}
