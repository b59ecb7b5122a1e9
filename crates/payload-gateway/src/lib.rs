//! # Payload Gateway
//!
//! HTTP middleware that decrypts enveloped request bodies and encrypts JSON
//! responses, per route.
//!
//! ## Route Policies
//!
//! | Policy | Request | Response |
//! |--------|---------|----------|
//! | Excluded | untouched | untouched |
//! | Forced | must be an envelope | always encrypted |
//! | Negotiated | decrypted if an envelope | encrypted if `X-Encryption-Supported: true` |
//!
//! ## Protocol Headers
//!
//! | Header | Direction | Meaning |
//! |--------|-----------|---------|
//! | `X-Encryption-Supported` | request | client can open encrypted responses |
//! | `X-Session-Id` | both | session token for key derivation |
//! | `X-Encrypted` | response | body is an envelope |
//! | `X-Encryption-Version` | response | protocol version |
//!
//! ## Failure Handling
//!
//! Bad client envelopes always get `400 {"error":"invalid encrypted payload"}`.
//! Response encryption failures get a generic 500, or plaintext when
//! `allow_plaintext_fallback` is on and the route is not Forced.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod logging;
pub mod middleware;
pub mod service;

pub use domain::config::{ConfigError, EncryptionConfig, GatewayConfig, ServerConfig};
pub use domain::error::{GatewayError, Rejection};
pub use domain::routes::{FailureMode, RoutePattern, RoutePolicy};
pub use middleware::{
    EncryptionLayer, EncryptionMetrics, PolicyEngine, ResolvedSession, ServerSession,
    SessionSource,
};
pub use service::GatewayService;
