//! Session key derivation.
//!
//! ## Modes
//!
//! | Mode | Construction | Keys per session |
//! |------|--------------|------------------|
//! | `Secure` (default) | PBKDF2-HMAC-SHA256(master, salt = session token) | distinct |
//! | `Fast` (deprecated) | SHA-256(master) | one key for everyone |
//!
//! Keys are derived on every call and dropped (zeroized) right after use.

use crate::domain::{EnvelopeError, MasterSecret, SessionToken};
use shared_crypto::{SecretKey, DEFAULT_ITERATIONS, KEY_LEN, MAX_ITERATIONS};

/// Key derivation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfMode {
    /// PBKDF2 with the session token as salt.
    Secure {
        /// PBKDF2 work factor
        iterations: u32,
    },
    /// INSECURE legacy mode: SHA-256 of the master secret, ignoring the
    /// session. Collapses every session onto one key. Kept only so old
    /// clients keep working while they migrate.
    Fast,
}

impl Default for KdfMode {
    fn default() -> Self {
        Self::Secure {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl KdfMode {
    /// Secure mode with a custom work factor.
    pub fn secure(iterations: u32) -> Self {
        Self::Secure { iterations }
    }

    /// Whether this is the deprecated single-key mode.
    pub fn is_insecure(&self) -> bool {
        matches!(self, Self::Fast)
    }

    /// Label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secure { .. } => "secure",
            Self::Fast => "fast",
        }
    }
}

/// Derive the per-session key.
///
/// # Errors
///
/// `EnvelopeError::Configuration` for an empty master secret,
/// `EnvelopeError::Cipher` for rejected KDF parameters.
pub fn derive_key(
    master: &MasterSecret,
    session: &SessionToken,
    mode: KdfMode,
) -> Result<SecretKey, EnvelopeError> {
    if master.is_empty() {
        return Err(EnvelopeError::Configuration(
            "master secret is required".into(),
        ));
    }

    let key = match mode {
        KdfMode::Secure { iterations } => {
            shared_crypto::pbkdf2_sha256(master.as_bytes(), session.as_bytes(), iterations)?
        }
        KdfMode::Fast => shared_crypto::sha256_key(master.as_bytes())?,
    };
    Ok(key)
}

/// Derive a key from a per-message salt carried by the envelope itself.
///
/// Used only for the message-salted legacy format. Kept separate from
/// [`derive_key`] so the two trust models never share a code path.
pub fn derive_salted_key(
    master: &MasterSecret,
    salt: &[u8],
    iterations: u32,
    key_length: usize,
) -> Result<SecretKey, EnvelopeError> {
    if master.is_empty() {
        return Err(EnvelopeError::Configuration(
            "master secret is required".into(),
        ));
    }
    if key_length != KEY_LEN {
        return Err(EnvelopeError::Cipher(format!(
            "unsupported key length {} (expected {})",
            key_length, KEY_LEN
        )));
    }
    if iterations == 0 || iterations > MAX_ITERATIONS {
        return Err(EnvelopeError::Cipher(format!(
            "iteration count {} out of range",
            iterations
        )));
    }

    Ok(shared_crypto::pbkdf2_sha256(
        master.as_bytes(),
        salt,
        iterations,
    )?)
}
