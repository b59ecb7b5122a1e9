//! Master secret handling.

use super::error::EnvelopeError;
use serde::{Deserialize, Deserializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secrets shorter than this are accepted but logged as weak.
pub const RECOMMENDED_SECRET_LEN: usize = 32;

/// Process-wide master secret.
///
/// Keys both the PBKDF2 session derivation and the envelope HMAC. Wiped on
/// drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret(Vec<u8>);

impl MasterSecret {
    /// Wrap raw secret bytes.
    ///
    /// # Errors
    ///
    /// `EnvelopeError::Configuration` if the secret is empty.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, EnvelopeError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(EnvelopeError::Configuration(
                "master secret is required".into(),
            ));
        }
        Ok(Self(bytes))
    }

    /// Raw secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Secret length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed secret.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the secret meets the recommended length.
    pub fn is_strong(&self) -> bool {
        self.0.len() >= RECOMMENDED_SECRET_LEN
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterSecret([REDACTED; {}])", self.0.len())
    }
}

impl std::str::FromStr for MasterSecret {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.as_bytes().to_vec())
    }
}

impl<'de> Deserialize<'de> for MasterSecret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut raw = String::deserialize(deserializer)?;
        let secret = raw.parse::<MasterSecret>().map_err(serde::de::Error::custom);
        raw.zeroize();
        secret
    }
}
