//! Envelope format negotiation.
//!
//! Clients from different generations send different envelope shapes.
//! [`negotiate`] classifies an inbound JSON value into exactly one variant
//! of [`EnvelopeFormat`] and deserializes it into the matching typed
//! struct. No cryptographic checks happen here.
//!
//! Discrimination order:
//!
//! 1. `payload` object → `Wrapped` (recursive, bounded depth)
//! 2. `salt` field → `MessageSalted`
//! 3. non-AEAD `algorithm` and no `tag` → `LegacyUnauthenticatedCipher`
//! 4. `data, iv, tag, timestamp, signature` → `Canonical`
//! 5. anything else → `UnsupportedFormat`

use crate::domain::{
    Algorithm, Envelope, EnvelopeError, EnvelopeResult, LegacyCipherEnvelope, SaltedEnvelope,
    ENCRYPTED_MARKER, PAYLOAD_FIELD,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Deepest accepted nesting of wrapper objects.
pub const MAX_WRAP_DEPTH: usize = 4;

const CANONICAL_FIELDS: [&str; 5] = ["data", "iv", "tag", "timestamp", "signature"];

/// Every envelope shape the decryptor understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeFormat {
    /// `{data, iv, tag, timestamp, signature}` with AES-256-GCM
    Canonical(Envelope),
    /// `{encrypted: true, payload: <variant>}`
    Wrapped(Box<EnvelopeFormat>),
    /// `{data, iv, salt, tag, algorithm, iterations, keyLength}`; key from the
    /// per-message salt
    MessageSalted(SaltedEnvelope),
    /// `{data, iv, timestamp, signature, algorithm}` with a non-AEAD cipher
    LegacyUnauthenticatedCipher(LegacyCipherEnvelope),
}

impl EnvelopeFormat {
    /// Label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Canonical(_) => "canonical",
            Self::Wrapped(_) => "wrapped",
            Self::MessageSalted(_) => "message_salted",
            Self::LegacyUnauthenticatedCipher(_) => "legacy_unauthenticated_cipher",
        }
    }

    /// The variant inside any number of wrappers.
    pub fn innermost(&self) -> &EnvelopeFormat {
        match self {
            Self::Wrapped(inner) => inner.innermost(),
            other => other,
        }
    }
}

/// Classify an inbound value.
pub fn negotiate(value: &Value) -> EnvelopeResult<EnvelopeFormat> {
    negotiate_at(value, 0)
}

/// Cheap check used to decide whether a body should be negotiated at all.
///
/// True for an object carrying `encrypted: true`, or carrying both `data`
/// and `iv`.
pub fn is_envelope_shaped(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) => {
            obj.get(ENCRYPTED_MARKER) == Some(&Value::Bool(true))
                || (obj.contains_key("data") && obj.contains_key("iv"))
        }
        None => false,
    }
}

fn negotiate_at(value: &Value, depth: usize) -> EnvelopeResult<EnvelopeFormat> {
    let obj = value
        .as_object()
        .ok_or_else(|| EnvelopeError::UnsupportedFormat("envelope is not an object".into()))?;

    if let Some(inner) = obj.get(PAYLOAD_FIELD) {
        return negotiate_wrapped(obj, inner, depth);
    }

    if obj.contains_key("salt") {
        return typed(value, "message_salted").map(EnvelopeFormat::MessageSalted);
    }

    let algorithm = match obj.get("algorithm") {
        Some(Value::String(name)) => Some(Algorithm::parse(name)?),
        Some(_) => {
            return Err(EnvelopeError::UnsupportedFormat(
                "algorithm is not a string".into(),
            ))
        }
        None => None,
    };

    if let Some(algorithm) = algorithm {
        if !algorithm.is_aead() && !obj.contains_key("tag") {
            return typed(value, "legacy_unauthenticated_cipher")
                .map(EnvelopeFormat::LegacyUnauthenticatedCipher);
        }
    }

    let missing: Vec<&str> = CANONICAL_FIELDS
        .iter()
        .copied()
        .filter(|field| !obj.contains_key(*field))
        .collect();
    if missing.is_empty() {
        return typed(value, "canonical").map(EnvelopeFormat::Canonical);
    }

    Err(EnvelopeError::UnsupportedFormat(format!(
        "unrecognized envelope shape (missing {})",
        missing.join(", ")
    )))
}

fn negotiate_wrapped(
    outer: &Map<String, Value>,
    inner: &Value,
    depth: usize,
) -> EnvelopeResult<EnvelopeFormat> {
    if depth >= MAX_WRAP_DEPTH {
        return Err(EnvelopeError::UnsupportedFormat(
            "envelope wrappers nested too deeply".into(),
        ));
    }
    match outer.get(ENCRYPTED_MARKER) {
        None | Some(Value::Bool(true)) => {}
        Some(_) => {
            return Err(EnvelopeError::UnsupportedFormat(
                "wrapper marker must be true".into(),
            ))
        }
    }
    if !inner.is_object() {
        return Err(EnvelopeError::UnsupportedFormat(
            "wrapper payload is not an object".into(),
        ));
    }

    let inner = negotiate_at(inner, depth + 1)?;
    Ok(EnvelopeFormat::Wrapped(Box::new(inner)))
}

fn typed<T: DeserializeOwned>(value: &Value, shape: &str) -> EnvelopeResult<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| EnvelopeError::UnsupportedFormat(format!("malformed {} envelope: {}", shape, e)))
}
