//! Session identifier resolution.
//!
//! Order of preference:
//! 1. `X-Session-Id` header (trimmed, at most 256 bytes)
//! 2. [`ServerSession`] extension set by an upstream session layer
//! 3. Fingerprint of client IP and user agent (`anon_<32 hex>`)
//! 4. `anonymous`
//!
//! Resolution is deterministic: the same request metadata always yields the
//! same token, so both ends derive the same key.

use crate::domain::headers::SESSION_HEADER;
use axum::{extract::ConnectInfo, http::header::USER_AGENT, http::Request};
use payload_envelope::{SessionToken, MAX_SESSION_TOKEN_LEN};
use shared_crypto::sha256_many;
use std::net::{IpAddr, SocketAddr};

/// Prefix of fingerprint-derived session tokens.
pub const FINGERPRINT_PREFIX: &str = "anon_";

/// Hex characters of the fingerprint digest kept in the token.
const FINGERPRINT_HEX_LEN: usize = 32;

/// Server-side session identifier, inserted into request extensions by the
/// application's session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSession(pub String);

/// Where a session token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    /// `X-Session-Id` header
    Header,
    /// Server-side session
    ServerSession,
    /// IP and user agent fingerprint
    ClientFingerprint,
    /// Nothing identifying was available
    Anonymous,
}

impl SessionSource {
    /// Label for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionSource::Header => "header",
            SessionSource::ServerSession => "server_session",
            SessionSource::ClientFingerprint => "fingerprint",
            SessionSource::Anonymous => "anonymous",
        }
    }
}

/// Session token resolved for a request. Also inserted into request
/// extensions so handlers can read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    /// Token used for key derivation
    pub token: SessionToken,
    /// Source of the token
    pub source: SessionSource,
}

/// Request inputs that feed session resolution
#[derive(Debug, Clone, Default)]
pub struct RequestMetadata {
    /// Raw `X-Session-Id` header
    pub session_header: Option<String>,
    /// Server-side session id
    pub server_session: Option<String>,
    /// Peer address of the connection
    pub remote_ip: Option<IpAddr>,
    /// `User-Agent` header
    pub user_agent: Option<String>,
}

impl RequestMetadata {
    /// Collect metadata from an HTTP request
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            session_header: header(SESSION_HEADER),
            server_session: req
                .extensions()
                .get::<ServerSession>()
                .map(|s| s.0.clone()),
            remote_ip: req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip()),
            user_agent: header(USER_AGENT.as_str()),
        }
    }
}

/// Resolve the session token for a request
pub fn resolve_session(meta: &RequestMetadata) -> ResolvedSession {
    if let Some(token) = usable(meta.session_header.as_deref()) {
        return ResolvedSession {
            token: SessionToken::new(token),
            source: SessionSource::Header,
        };
    }

    if let Some(token) = usable(meta.server_session.as_deref()) {
        return ResolvedSession {
            token: SessionToken::new(token),
            source: SessionSource::ServerSession,
        };
    }

    let user_agent = meta.user_agent.as_deref().map(str::trim).unwrap_or("");
    if meta.remote_ip.is_some() || !user_agent.is_empty() {
        let ip = meta.remote_ip.map(|ip| ip.to_string()).unwrap_or_default();
        let digest = sha256_many(&[ip.as_bytes(), "|".as_bytes(), user_agent.as_bytes()]);
        let mut fingerprint = hex::encode(digest);
        fingerprint.truncate(FINGERPRINT_HEX_LEN);
        return ResolvedSession {
            token: SessionToken::new(format!("{}{}", FINGERPRINT_PREFIX, fingerprint)),
            source: SessionSource::ClientFingerprint,
        };
    }

    ResolvedSession {
        token: SessionToken::anonymous(),
        source: SessionSource::Anonymous,
    }
}

fn usable(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_SESSION_TOKEN_LEN)
}
