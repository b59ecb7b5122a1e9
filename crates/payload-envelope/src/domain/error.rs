//! Envelope error taxonomy.
//!
//! Every variant carries enough detail for server-side logs, while
//! [`EnvelopeError::client_message`] collapses all of them into one
//! string so responses never reveal which check failed.

use shared_crypto::CryptoError;

/// The only message a client ever sees for a failed envelope.
pub const CLIENT_ERROR_MESSAGE: &str = "invalid encrypted payload";

/// Envelope processing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// Missing or invalid master secret (fatal at startup)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Payload could not be encoded or decrypted bytes are not text
    #[error("serialization error: {0}")]
    Serialization(String),

    /// AEAD failure, malformed cipher field or unsupported algorithm
    #[error("cipher error: {0}")]
    Cipher(String),

    /// Envelope signature did not verify
    #[error("signature mismatch")]
    SignatureMismatch,

    /// Envelope timestamp outside the replay window
    #[error("envelope expired or replayed: skew {skew_ms}ms exceeds window {window_ms}ms")]
    ReplayOrExpired {
        /// Absolute distance between envelope timestamp and now
        skew_ms: u64,
        /// Configured replay window
        window_ms: u64,
    },

    /// Inbound value matches no known envelope shape
    #[error("unsupported envelope format: {0}")]
    UnsupportedFormat(String),
}

impl EnvelopeError {
    /// Short stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Serialization(_) => "serialization",
            Self::Cipher(_) => "cipher",
            Self::SignatureMismatch => "signature_mismatch",
            Self::ReplayOrExpired { .. } => "replay_or_expired",
            Self::UnsupportedFormat(_) => "unsupported_format",
        }
    }

    /// Client-facing message, identical for every variant.
    pub fn client_message(&self) -> &'static str {
        CLIENT_ERROR_MESSAGE
    }
}

impl From<CryptoError> for EnvelopeError {
    fn from(e: CryptoError) -> Self {
        match e {
            // Padding failures must look exactly like a bad signature.
            CryptoError::SignatureVerificationFailed | CryptoError::InvalidPadding => {
                Self::SignatureMismatch
            }
            other => Self::Cipher(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for envelope operations
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;
