//! Per-route encryption policy.
//!
//! [`PolicyEngine`] is synchronous and transport-agnostic: it classifies
//! paths and turns raw bodies into plaintext values (inbound) or wire
//! envelopes (outbound). The tower layer in `encryption.rs` drives it.

use crate::domain::config::{ConfigError, EncryptionConfig};
use crate::domain::error::Rejection;
use crate::domain::routes::{FailureMode, RoutePattern, RoutePolicy};
use payload_envelope::{
    is_envelope_shaped, negotiate, Clock, Decryptor, EnvelopeError, EnvelopeResult, Encryptor,
    SessionToken,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Result of inbound processing
#[derive(Debug, Clone, PartialEq)]
pub enum InboundOutcome {
    /// Body forwarded as received
    Passthrough,
    /// Envelope opened; body replaced by this value
    Decrypted(Value),
}

/// Result of outbound processing
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundOutcome {
    /// Response forwarded as produced
    Passthrough,
    /// Serialized wire envelope replacing the response body
    Encrypted(Vec<u8>),
    /// Encryption failed; plaintext sent under `PermissiveFallback`
    Fallback(EnvelopeError),
}

/// Route classification plus the encrypt/decrypt collaborators
pub struct PolicyEngine {
    enabled: bool,
    force_all: bool,
    excluded: Vec<RoutePattern>,
    forced: Vec<RoutePattern>,
    failure_mode: FailureMode,
    debug: bool,
    max_body_bytes: usize,
    max_response_bytes: usize,
    encryptor: Encryptor,
    decryptor: Decryptor,
}

impl PolicyEngine {
    /// Build from validated configuration
    pub fn from_config(config: &EncryptionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let secret = config
            .master_secret
            .clone()
            .ok_or(ConfigError::MissingMasterSecret)?;
        let secret = Arc::new(secret);
        let mode = config.kdf_mode();

        if mode.is_insecure() {
            warn!("Legacy fast key mode enabled: every session shares one key");
        }

        Ok(Self {
            enabled: config.enabled,
            force_all: config.force_encryption,
            excluded: config.excluded_patterns()?,
            forced: config.forced_patterns()?,
            failure_mode: config.failure_mode(),
            debug: config.debug,
            max_body_bytes: config.max_body_bytes,
            max_response_bytes: config.max_response_bytes,
            encryptor: Encryptor::new(Arc::clone(&secret), mode),
            decryptor: Decryptor::new(secret, mode, config.replay_window_ms)
                .with_max_salted_iterations(config.max_legacy_iterations),
        })
    }

    /// Replace the clock used for timestamps and freshness checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.encryptor = self.encryptor.with_clock(Arc::clone(&clock));
        self.decryptor = self.decryptor.with_clock(clock);
        self
    }

    /// Classify a request path. Exclusion wins over everything.
    pub fn classify(&self, path: &str) -> RoutePolicy {
        if !self.enabled || self.excluded.iter().any(|p| p.matches(path)) {
            RoutePolicy::Excluded
        } else if self.force_all || self.forced.iter().any(|p| p.matches(path)) {
            RoutePolicy::Forced
        } else {
            RoutePolicy::Negotiated
        }
    }

    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn max_response_bytes(&self) -> usize {
        self.max_response_bytes
    }

    /// Whether the response on this route gets encrypted
    pub fn should_encrypt_response(&self, policy: RoutePolicy, client_supports: bool) -> bool {
        match policy {
            RoutePolicy::Excluded => false,
            RoutePolicy::Forced => true,
            RoutePolicy::Negotiated => client_supports,
        }
    }

    /// Open an envelope body and return the plaintext value.
    pub fn decrypt_inbound(&self, raw_body: &[u8], session: &SessionToken) -> EnvelopeResult<Value> {
        let value: Value = serde_json::from_slice(raw_body)
            .map_err(|e| EnvelopeError::UnsupportedFormat(format!("body is not JSON: {}", e)))?;
        self.decrypt_value(&value, session)
    }

    /// Open an already-parsed envelope.
    pub fn decrypt_value(&self, value: &Value, session: &SessionToken) -> EnvelopeResult<Value> {
        let format = negotiate(value)?;
        self.decryptor.decrypt(&format, session)
    }

    /// Seal a plaintext value and return the wire body.
    pub fn encrypt_outbound<T>(&self, plain: &T, session: &SessionToken) -> EnvelopeResult<Value>
    where
        T: Serialize + ?Sized,
    {
        let envelope = self.encryptor.encrypt(plain, session)?;
        Ok(serde_json::to_value(envelope.into_wire())?)
    }

    /// Inbound step: decrypt envelopes, enforce Forced routes.
    ///
    /// Empty bodies pass on every route: there is nothing to protect.
    pub fn process_inbound(
        &self,
        policy: RoutePolicy,
        raw_body: &[u8],
        session: &SessionToken,
    ) -> Result<InboundOutcome, Rejection> {
        if policy == RoutePolicy::Excluded || raw_body.iter().all(u8::is_ascii_whitespace) {
            return Ok(InboundOutcome::Passthrough);
        }

        if let Ok(value) = serde_json::from_slice::<Value>(raw_body) {
            if is_envelope_shaped(&value) {
                return self
                    .decrypt_value(&value, session)
                    .map(InboundOutcome::Decrypted)
                    .map_err(Rejection::from);
            }
        }

        match policy {
            RoutePolicy::Forced => Err(Rejection::EncryptionRequired),
            _ => Ok(InboundOutcome::Passthrough),
        }
    }

    /// Outbound step: encrypt a JSON response body when policy says so.
    ///
    /// A body that is not valid JSON is encrypted as a string; one that is not
    /// UTF-8 either cannot be sealed and fails like any encryption error.
    pub fn process_outbound(
        &self,
        policy: RoutePolicy,
        client_supports: bool,
        body: &[u8],
        session: &SessionToken,
    ) -> Result<OutboundOutcome, Rejection> {
        if !self.should_encrypt_response(policy, client_supports) {
            return Ok(OutboundOutcome::Passthrough);
        }

        let sealed = match serde_json::from_slice::<Value>(body) {
            Ok(value) => self.encrypt_outbound(&value, session),
            Err(_) => std::str::from_utf8(body)
                .map_err(|e| {
                    EnvelopeError::Serialization(format!("response body is not UTF-8: {}", e))
                })
                .and_then(|text| self.encrypt_outbound(text, session)),
        }
        .and_then(|wire| Ok(serde_json::to_vec(&wire)?));

        match sealed {
            Ok(bytes) => Ok(OutboundOutcome::Encrypted(bytes)),
            Err(err)
                if self.failure_mode == FailureMode::PermissiveFallback
                    && policy != RoutePolicy::Forced =>
            {
                Ok(OutboundOutcome::Fallback(err))
            }
            Err(err) => Err(Rejection::Internal(err.to_string())),
        }
    }
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("enabled", &self.enabled)
            .field("force_all", &self.force_all)
            .field("excluded", &self.excluded)
            .field("forced", &self.forced)
            .field("failure_mode", &self.failure_mode)
            .field("kdf", &self.encryptor.mode().as_str())
            .finish_non_exhaustive()
    }
}
