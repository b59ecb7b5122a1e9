//! Envelope wire types.
//!
//! Binary fields travel as lowercase hex, timestamps as integer
//! milliseconds since the Unix epoch.
//!
//! ```text
//! { "encrypted": true,
//!   "payload": { "data": "<hex>", "iv": "<hex>", "tag": "<hex>",
//!                "timestamp": <int64 ms>, "signature": "<hex>",
//!                "sessionId": "<token>", "algorithm": "aes-256-gcm" } }
//! ```

use super::error::EnvelopeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker field on the outer wrapper object.
pub const ENCRYPTED_MARKER: &str = "encrypted";
/// Field holding the inner envelope in the wrapper object.
pub const PAYLOAD_FIELD: &str = "payload";

/// Cipher named by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// AES-256-GCM, authenticated
    Aes256Gcm,
    /// AES-256-CBC with PKCS#7 padding, unauthenticated (legacy)
    Aes256Cbc,
}

impl Algorithm {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "aes-256-gcm",
            Self::Aes256Cbc => "aes-256-cbc",
        }
    }

    /// Parse a wire name, case-insensitively.
    pub fn parse(name: &str) -> Result<Self, EnvelopeError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "aes-256-gcm" | "aes256gcm" => Ok(Self::Aes256Gcm),
            "aes-256-cbc" | "aes256cbc" => Ok(Self::Aes256Cbc),
            other => Err(EnvelopeError::Cipher(format!(
                "unsupported algorithm: {}",
                other
            ))),
        }
    }

    /// Whether the cipher authenticates its own ciphertext.
    pub fn is_aead(&self) -> bool {
        matches!(self, Self::Aes256Gcm)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Algorithm {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Algorithm::parse(&name).map_err(serde::de::Error::custom)
    }
}

fn default_gcm() -> Algorithm {
    Algorithm::Aes256Gcm
}

/// Canonical envelope: AES-256-GCM plus a whole-envelope HMAC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Ciphertext (hex)
    pub data: String,
    /// Nonce (hex)
    pub iv: String,
    /// GCM authentication tag (hex)
    pub tag: String,
    /// Creation time, ms since epoch
    pub timestamp: i64,
    /// HMAC-SHA256 over every other field (hex)
    pub signature: String,
    /// Session the envelope was sealed for
    #[serde(
        rename = "sessionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
    /// Cipher tag; absent on older canonical clients
    #[serde(default = "default_gcm")]
    pub algorithm: Algorithm,
}

impl Envelope {
    /// Signing input, each field as `<len>:<value>`: `data ‖ iv ‖ tag ‖ timestamp ‖ sessionId ‖ algorithm`.
    pub fn signing_input(&self, session: &str) -> String {
        signing_input(
            &self.data,
            &self.iv,
            &self.tag,
            self.timestamp,
            session,
            self.algorithm,
        )
    }

    /// Wrap into the outer `{ "encrypted": true, "payload": ... }` object.
    pub fn into_wire(self) -> WireEnvelope {
        WireEnvelope {
            encrypted: true,
            payload: self,
        }
    }
}

/// Outer wrapper sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// Always `true`
    pub encrypted: bool,
    /// Inner canonical envelope
    pub payload: Envelope,
}

/// Legacy envelope whose key is derived from a per-message salt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaltedEnvelope {
    /// Ciphertext (hex)
    pub data: String,
    /// Nonce (hex)
    pub iv: String,
    /// PBKDF2 salt for this message (hex)
    pub salt: String,
    /// GCM authentication tag (hex)
    pub tag: String,
    /// Declared cipher
    pub algorithm: Algorithm,
    /// PBKDF2 work factor
    pub iterations: u32,
    /// Derived key length in bytes
    #[serde(rename = "keyLength")]
    pub key_length: usize,
    /// Optional creation time; checked against the replay window when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Optional HMAC; verified when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl SaltedEnvelope {
    /// Signing input, each field as `<len>:<value>`: `data ‖ iv ‖ tag ‖ timestamp ‖ salt ‖ algorithm`.
    pub fn signing_input(&self, timestamp: i64) -> String {
        signing_input(
            &self.data,
            &self.iv,
            &self.tag,
            timestamp,
            &self.salt,
            self.algorithm,
        )
    }
}

/// Legacy envelope using an unauthenticated block cipher.
///
/// Integrity rests entirely on the outer signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCipherEnvelope {
    /// Ciphertext (hex)
    pub data: String,
    /// CBC initialization vector (hex)
    pub iv: String,
    /// Creation time, ms since epoch
    pub timestamp: i64,
    /// HMAC-SHA256 over every other field (hex)
    pub signature: String,
    /// Declared cipher
    pub algorithm: Algorithm,
    /// Session the envelope was sealed for
    #[serde(
        rename = "sessionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
}

impl LegacyCipherEnvelope {
    /// Signing input, each field as `<len>:<value>`: `data ‖ iv ‖ "" ‖ timestamp ‖ sessionId ‖ algorithm`.
    pub fn signing_input(&self, session: &str) -> String {
        signing_input(
            &self.data,
            &self.iv,
            "",
            self.timestamp,
            session,
            self.algorithm,
        )
    }
}

fn signing_input(
    data: &str,
    iv: &str,
    tag: &str,
    timestamp: i64,
    binding: &str,
    algorithm: Algorithm,
) -> String {
    let timestamp = timestamp.to_string();
    let fields = [data, iv, tag, timestamp.as_str(), binding, algorithm.as_str()];
    let mut input = String::with_capacity(fields.iter().map(|f| f.len() + 4).sum());
    // Length prefix per field so bytes cannot shift across a boundary.
    for field in fields {
        input.push_str(&field.len().to_string());
        input.push(':');
        input.push_str(field);
    }
    input
}
