//! Envelope sealing.
//!
//! 1. Serialize the payload (strings pass through verbatim)
//! 2. Fresh random 96-bit nonce
//! 3. Derive the session key
//! 4. AES-256-GCM with detached tag
//! 5. Timestamp
//! 6. HMAC-SHA256 over every field, keyed with the master secret

use crate::domain::{Algorithm, Envelope, EnvelopeError, EnvelopeResult, MasterSecret, SessionToken};
use crate::kdf::{derive_key, KdfMode};
use crate::ports::{Clock, SystemClock};
use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

/// Seals payloads into canonical envelopes.
#[derive(Clone)]
pub struct Encryptor {
    secret: Arc<MasterSecret>,
    mode: KdfMode,
    clock: Arc<dyn Clock>,
}

impl Encryptor {
    /// Create an encryptor on the system clock.
    pub fn new(secret: Arc<MasterSecret>, mode: KdfMode) -> Self {
        Self {
            secret,
            mode,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Key derivation mode in use.
    pub fn mode(&self) -> KdfMode {
        self.mode
    }

    /// Encrypt `payload` for `session`.
    ///
    /// # Errors
    ///
    /// `EnvelopeError::Serialization` if the payload cannot be encoded,
    /// `EnvelopeError::Cipher` if a primitive fails.
    pub fn encrypt<T>(&self, payload: &T, session: &SessionToken) -> EnvelopeResult<Envelope>
    where
        T: Serialize + ?Sized,
    {
        let plaintext = payload_text(payload)?;

        let key = derive_key(&self.secret, session, self.mode)?;
        let sealed = shared_crypto::seal(&key, plaintext.as_bytes())?;
        drop(key);

        let mut envelope = Envelope {
            data: hex::encode(&sealed.ciphertext),
            iv: hex::encode(&sealed.nonce),
            tag: hex::encode(sealed.tag),
            timestamp: self.clock.now_ms(),
            signature: String::new(),
            session_id: Some(session.as_str().to_string()),
            algorithm: Algorithm::Aes256Gcm,
        };

        let input = envelope.signing_input(session.as_str());
        let mac = shared_crypto::hmac_sha256(self.secret.as_bytes(), &[input.as_bytes()])?;
        envelope.signature = hex::encode(mac);

        trace!(
            session = %session,
            bytes = plaintext.len(),
            kdf = self.mode.as_str(),
            "Sealed payload"
        );

        Ok(envelope)
    }
}

/// Serialize a payload to the text that gets encrypted.
///
/// A JSON string is used as-is (no surrounding quotes); anything else is
/// compact JSON.
pub fn payload_text<T>(payload: &T) -> EnvelopeResult<String>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(payload)
        .map_err(|e| EnvelopeError::Serialization(e.to_string()))?;
    match value {
        serde_json::Value::String(text) => Ok(text),
        other => serde_json::to_string(&other)
            .map_err(|e| EnvelopeError::Serialization(e.to_string())),
    }
}
