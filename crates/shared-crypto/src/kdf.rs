//! # Key Derivation
//!
//! PBKDF2-HMAC-SHA256 for salted, work-factor derivations and a bare
//! SHA-256 digest kept for compatibility with early clients.

use crate::hashing::sha256;
use crate::symmetric::{SecretKey, KEY_LEN};
use crate::CryptoError;
use sha2::Sha256;
use zeroize::Zeroize;

/// Default PBKDF2 work factor.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Upper bound on caller-supplied iteration counts.
///
/// Legacy envelopes carry their own work factor; anything above this is
/// treated as hostile input rather than honoured.
pub const MAX_ITERATIONS: u32 = 10_000_000;

/// Derive a 256-bit key with PBKDF2-HMAC-SHA256.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKdfParams` for an empty password, an empty
/// salt or an iteration count outside `1..=MAX_ITERATIONS`.
pub fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> Result<SecretKey, CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::InvalidKdfParams("empty password".into()));
    }
    if salt.is_empty() {
        return Err(CryptoError::InvalidKdfParams("empty salt".into()));
    }
    if iterations == 0 || iterations > MAX_ITERATIONS {
        return Err(CryptoError::InvalidKdfParams(format!(
            "iterations {} outside 1..={}",
            iterations, MAX_ITERATIONS
        )));
    }

    let mut out = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    let key = SecretKey::from_bytes(out);
    out.zeroize();
    Ok(key)
}

/// Derive a key as the SHA-256 digest of the secret alone.
///
/// INSECURE: no salt and no work factor. Every caller using the same secret
/// ends up with the same key.
pub fn sha256_key(secret: &[u8]) -> Result<SecretKey, CryptoError> {
    if secret.is_empty() {
        return Err(CryptoError::InvalidKdfParams("empty secret".into()));
    }
    let mut digest = sha256(secret);
    let key = SecretKey::from_bytes(digest);
    digest.zeroize();
    Ok(key)
}
