//! Envelope verification and decryption.
//!
//! Check order is fixed: freshness, session binding and signature all run
//! before any key is derived or any cipher is touched, so a forged or
//! replayed envelope never reaches a decryption primitive.

use crate::domain::{
    Algorithm, Envelope, EnvelopeError, EnvelopeResult, LegacyCipherEnvelope, MasterSecret,
    SaltedEnvelope, SessionToken,
};
use crate::kdf::{derive_key, derive_salted_key, KdfMode};
use crate::negotiator::EnvelopeFormat;
use crate::ports::{Clock, SystemClock};
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// Default replay window (5 minutes).
pub const DEFAULT_REPLAY_WINDOW_MS: u64 = 300_000;

/// Default ceiling on the PBKDF2 work factor a salted envelope may request.
pub const DEFAULT_MAX_SALTED_ITERATIONS: u32 = shared_crypto::DEFAULT_ITERATIONS;

/// Verifies and opens envelopes.
#[derive(Clone)]
pub struct Decryptor {
    secret: Arc<MasterSecret>,
    mode: KdfMode,
    replay_window_ms: u64,
    max_salted_iterations: u32,
    clock: Arc<dyn Clock>,
}

impl Decryptor {
    /// Create a decryptor on the system clock.
    pub fn new(secret: Arc<MasterSecret>, mode: KdfMode, replay_window_ms: u64) -> Self {
        Self {
            secret,
            mode,
            replay_window_ms,
            max_salted_iterations: DEFAULT_MAX_SALTED_ITERATIONS,
            clock: Arc::new(SystemClock),
        }
    }

    /// Cap the work factor salted envelopes may request.
    pub fn with_max_salted_iterations(mut self, max: u32) -> Self {
        self.max_salted_iterations = max;
        self
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configured replay window.
    pub fn replay_window_ms(&self) -> u64 {
        self.replay_window_ms
    }

    /// Decrypt any negotiated envelope shape.
    pub fn decrypt(&self, format: &EnvelopeFormat, session: &SessionToken) -> EnvelopeResult<Value> {
        match format {
            EnvelopeFormat::Canonical(envelope) => self.decrypt_envelope(envelope, session),
            EnvelopeFormat::Wrapped(inner) => self.decrypt(inner, session),
            EnvelopeFormat::MessageSalted(envelope) => self.decrypt_salted(envelope),
            EnvelopeFormat::LegacyUnauthenticatedCipher(envelope) => {
                self.decrypt_legacy_cipher(envelope, session)
            }
        }
    }

    /// Decrypt a canonical AES-256-GCM envelope.
    pub fn decrypt_envelope(
        &self,
        envelope: &Envelope,
        session: &SessionToken,
    ) -> EnvelopeResult<Value> {
        self.check_freshness(envelope.timestamp)?;
        check_session_binding(envelope.session_id.as_deref(), session)?;
        self.verify_signature(&envelope.signing_input(session.as_str()), &envelope.signature)?;

        if envelope.algorithm != Algorithm::Aes256Gcm {
            return Err(EnvelopeError::Cipher(format!(
                "canonical envelope cannot use {}",
                envelope.algorithm
            )));
        }

        let ciphertext = decode_field("data", &envelope.data)?;
        let nonce = decode_field("iv", &envelope.iv)?;
        let tag = decode_field("tag", &envelope.tag)?;

        let key = derive_key(&self.secret, session, self.mode)?;
        let plaintext = shared_crypto::open(&key, &nonce, &ciphertext, &tag)?;

        trace!(session = %session, format = "canonical", "Opened envelope");
        parse_plaintext(plaintext)
    }

    /// Decrypt a message-salted legacy envelope.
    ///
    /// The key comes from the embedded salt, never from the session token.
    /// The sender picks the work factor, so it is capped before anything else.
    /// Timestamp and signature are optional in this shape; each is enforced
    /// when present.
    pub fn decrypt_salted(&self, envelope: &SaltedEnvelope) -> EnvelopeResult<Value> {
        if envelope.iterations > self.max_salted_iterations {
            return Err(EnvelopeError::UnsupportedFormat(format!(
                "salted envelope requests {} iterations (max {})",
                envelope.iterations, self.max_salted_iterations
            )));
        }
        if envelope.signature.is_some() && envelope.timestamp.is_none() {
            return Err(EnvelopeError::UnsupportedFormat(
                "salted envelope signature requires a timestamp".into(),
            ));
        }
        if let Some(timestamp) = envelope.timestamp {
            self.check_freshness(timestamp)?;
            if let Some(signature) = &envelope.signature {
                self.verify_signature(&envelope.signing_input(timestamp), signature)?;
            }
        }

        if !envelope.algorithm.is_aead() {
            return Err(EnvelopeError::Cipher(format!(
                "salted envelope cannot use {}",
                envelope.algorithm
            )));
        }

        let ciphertext = decode_field("data", &envelope.data)?;
        let nonce = decode_field("iv", &envelope.iv)?;
        let tag = decode_field("tag", &envelope.tag)?;
        let salt = decode_field("salt", &envelope.salt)?;

        let key = derive_salted_key(
            &self.secret,
            &salt,
            envelope.iterations,
            envelope.key_length,
        )?;
        let plaintext = shared_crypto::open(&key, &nonce, &ciphertext, &tag)?;

        trace!(format = "message_salted", "Opened envelope");
        parse_plaintext(plaintext)
    }

    /// Decrypt a legacy envelope whose cipher has no tag of its own.
    ///
    /// Every failure after the signature check (bad IV, bad padding, bytes
    /// that are not text) is reported as `SignatureMismatch` so padding
    /// validity never leaks.
    pub fn decrypt_legacy_cipher(
        &self,
        envelope: &LegacyCipherEnvelope,
        session: &SessionToken,
    ) -> EnvelopeResult<Value> {
        self.check_freshness(envelope.timestamp)?;
        check_session_binding(envelope.session_id.as_deref(), session)?;
        self.verify_signature(&envelope.signing_input(session.as_str()), &envelope.signature)?;

        if envelope.algorithm != Algorithm::Aes256Cbc {
            return Err(EnvelopeError::Cipher(format!(
                "legacy envelope cannot use {}",
                envelope.algorithm
            )));
        }

        let ciphertext =
            hex::decode(&envelope.data).map_err(|_| EnvelopeError::SignatureMismatch)?;
        let iv = hex::decode(&envelope.iv).map_err(|_| EnvelopeError::SignatureMismatch)?;

        let key = derive_key(&self.secret, session, self.mode)?;
        let plaintext = shared_crypto::cbc_decrypt(&key, &iv, &ciphertext)
            .map_err(|_| EnvelopeError::SignatureMismatch)?;

        trace!(session = %session, format = "legacy_unauthenticated_cipher", "Opened envelope");
        parse_plaintext(plaintext).map_err(|_| EnvelopeError::SignatureMismatch)
    }

    fn check_freshness(&self, timestamp: i64) -> EnvelopeResult<()> {
        let skew_ms = self.clock.now_ms().abs_diff(timestamp);
        if skew_ms > self.replay_window_ms {
            return Err(EnvelopeError::ReplayOrExpired {
                skew_ms,
                window_ms: self.replay_window_ms,
            });
        }
        Ok(())
    }

    fn verify_signature(&self, input: &str, signature_hex: &str) -> EnvelopeResult<()> {
        let signature = hex::decode(signature_hex).map_err(|_| EnvelopeError::SignatureMismatch)?;
        shared_crypto::verify_hmac_sha256(self.secret.as_bytes(), &[input.as_bytes()], &signature)
            .map_err(|_| EnvelopeError::SignatureMismatch)
    }
}

/// A session id named inside the envelope must match the resolved token.
fn check_session_binding(claimed: Option<&str>, session: &SessionToken) -> EnvelopeResult<()> {
    match claimed {
        Some(claimed) if !shared_crypto::constant_time_eq(claimed.as_bytes(), session.as_bytes()) => {
            Err(EnvelopeError::SignatureMismatch)
        }
        _ => Ok(()),
    }
}

fn decode_field(name: &str, value: &str) -> EnvelopeResult<Vec<u8>> {
    hex::decode(value).map_err(|e| EnvelopeError::Cipher(format!("{} is not valid hex: {}", name, e)))
}

/// Turn decrypted bytes back into a payload.
///
/// Structured JSON when it parses, otherwise the raw text as a string.
pub fn parse_plaintext(plaintext: Vec<u8>) -> EnvelopeResult<Value> {
    let text = String::from_utf8(plaintext)
        .map_err(|_| EnvelopeError::Serialization("decrypted payload is not UTF-8".into()))?;
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => Ok(value),
        Err(_) => Ok(Value::String(text)),
    }
}
