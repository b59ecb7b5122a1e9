//! Session correlation tokens.

use std::fmt;

/// Sentinel used when nothing better identifies the caller.
pub const ANONYMOUS_SESSION: &str = "anonymous";

/// Longest accepted caller-supplied token, in bytes.
pub const MAX_SESSION_TOKEN_LEN: usize = 256;

/// Opaque correlation token used to diversify session keys.
///
/// Not an identity and not authenticated on its own; envelopes bind it
/// through their signature. Never empty: blank input becomes
/// [`ANONYMOUS_SESSION`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Create a token, trimming whitespace.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Self::anonymous()
        } else if trimmed.len() == value.len() {
            Self(value)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// The constant fallback token.
    pub fn anonymous() -> Self {
        Self(ANONYMOUS_SESSION.to_string())
    }

    /// Whether this is the anonymous sentinel.
    pub fn is_anonymous(&self) -> bool {
        self.0 == ANONYMOUS_SESSION
    }

    /// Token as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Token as bytes (PBKDF2 salt).
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
