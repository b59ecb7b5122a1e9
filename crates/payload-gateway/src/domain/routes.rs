//! Route classification: which paths get encryption, and how strictly.

use super::config::ConfigError;
use std::fmt;

/// Treatment of a route by the encryption layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutePolicy {
    /// Never decrypted or encrypted
    Excluded,
    /// Plaintext requests rejected, responses always encrypted
    Forced,
    /// Encrypted when the client sends an envelope or advertises support
    Negotiated,
}

impl RoutePolicy {
    /// Label for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutePolicy::Excluded => "excluded",
            RoutePolicy::Forced => "forced",
            RoutePolicy::Negotiated => "negotiated",
        }
    }
}

impl fmt::Display for RoutePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when encrypting a response fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Fail the request with a generic 500
    Strict,
    /// Send the plaintext response and log a warning (never on Forced routes)
    PermissiveFallback,
}

/// Path pattern where `*` matches any run of characters, `/` included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern(String);

impl RoutePattern {
    /// Parse a pattern; it must be non-empty and start with `/` or `*`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::InvalidRoutePattern("empty pattern".into()));
        }
        if !raw.starts_with('/') && !raw.starts_with('*') {
            return Err(ConfigError::InvalidRoutePattern(format!(
                "{:?} must start with '/'",
                raw
            )));
        }
        Ok(Self(normalize_path(raw).to_string()))
    }

    /// Pattern text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `path` matches this pattern
    pub fn matches(&self, path: &str) -> bool {
        wildcard_match(self.0.as_bytes(), normalize_path(path).as_bytes())
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Drop a trailing slash so `/health/` and `/health` classify the same.
fn normalize_path(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Glob match with backtracking over the last `*` seen.
fn wildcard_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}
