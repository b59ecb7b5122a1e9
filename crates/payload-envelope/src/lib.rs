//! # Payload Envelope - Application-Layer Payload Encryption
//!
//! Seals JSON payloads into signed, timestamped envelopes and opens them
//! again, independent of transport encryption.
//!
//! ## Pipeline
//!
//! ```text
//! encrypt:  payload ─▶ serialize ─▶ derive key ─▶ AES-256-GCM ─▶ timestamp ─▶ HMAC ─▶ Envelope
//!
//! decrypt:  JSON ─▶ negotiate ─▶ freshness ─▶ HMAC ─▶ derive key ─▶ AEAD open ─▶ parse
//! ```
//!
//! ## Components
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `kdf` | Session key derivation (`Secure` PBKDF2, deprecated `Fast`) |
//! | `encryptor` | Payload → canonical envelope |
//! | `decryptor` | Envelope → payload, in a fixed check order |
//! | `negotiator` | Historical wire shapes → closed `EnvelopeFormat` union |
//! | `ports` | Clock abstraction |
//!
//! ## Usage
//!
//! ```ignore
//! use payload_envelope::{Decryptor, Encryptor, KdfMode, MasterSecret, SessionToken};
//!
//! let secret = Arc::new(MasterSecret::new(secret_bytes)?);
//! let encryptor = Encryptor::new(Arc::clone(&secret), KdfMode::default());
//! let decryptor = Decryptor::new(secret, KdfMode::default(), DEFAULT_REPLAY_WINDOW_MS);
//!
//! let session = SessionToken::new("sess_1");
//! let envelope = encryptor.encrypt(&payload, &session)?;
//! let format = negotiate(&serde_json::to_value(envelope.into_wire())?)?;
//! let plain = decryptor.decrypt(&format, &session)?;
//! ```
//!
//! Every operation is a pure function of its inputs plus the clock: no
//! shared mutable state, safe to run concurrently from any thread.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod decryptor;
pub mod domain;
pub mod encryptor;
pub mod kdf;
pub mod negotiator;
pub mod ports;

// Re-exports for public API
pub use decryptor::{
    parse_plaintext, Decryptor, DEFAULT_MAX_SALTED_ITERATIONS, DEFAULT_REPLAY_WINDOW_MS,
};
pub use domain::*;
pub use encryptor::{payload_text, Encryptor};
pub use kdf::{derive_key, derive_salted_key, KdfMode};
pub use negotiator::{is_envelope_shaped, negotiate, EnvelopeFormat, MAX_WRAP_DEPTH};
pub use ports::{Clock, FixedClock, SystemClock};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version advertised in response headers.
pub const PROTOCOL_VERSION: &str = "1";
