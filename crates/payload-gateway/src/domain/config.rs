//! Encryption policy configuration with validation.
//!
//! Loaded once at startup (JSON file, then environment overrides), validated,
//! and never mutated afterwards. Field names accept both snake_case and the
//! camelCase spelling used by older deployments.

use payload_envelope::{
    KdfMode, MasterSecret, DEFAULT_MAX_SALTED_ITERATIONS, DEFAULT_REPLAY_WINDOW_MS,
};
use serde::Deserialize;
use shared_crypto::{DEFAULT_ITERATIONS, MAX_ITERATIONS};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use tracing::warn;

use super::routes::{FailureMode, RoutePattern};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "PAYLOAD_ENC_";

/// Environment variable naming an optional JSON config file.
pub const CONFIG_FILE_ENV: &str = "PAYLOAD_ENC_CONFIG";

/// Lowest PBKDF2 work factor accepted for session keys.
pub const MIN_KDF_ITERATIONS: u32 = 1_000;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Demo HTTP server
    pub server: ServerConfig,
    /// Payload encryption policy
    pub encryption: EncryptionConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
    /// Emit JSON formatted logs
    #[serde(alias = "jsonLogs")]
    pub json_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            json_logs: false,
        }
    }
}

impl ServerConfig {
    /// Bind address
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Payload encryption policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Master switch; when off every route is left untouched
    pub enabled: bool,
    /// Treat every non-excluded route as Forced
    #[serde(alias = "forceEncryption")]
    pub force_encryption: bool,
    /// Send plaintext instead of failing when response encryption breaks
    #[serde(alias = "allowPlaintextFallback")]
    pub allow_plaintext_fallback: bool,
    /// INSECURE: derive one key for all sessions (old clients only)
    #[serde(alias = "legacyFastKeyMode")]
    pub legacy_fast_key_mode: bool,
    /// Log failure detail and session tokens
    pub debug: bool,
    /// Routes never touched (health checks, third-party webhooks)
    #[serde(alias = "excludedRoutePatterns")]
    pub excluded_route_patterns: Vec<String>,
    /// Routes that must be encrypted both ways
    #[serde(alias = "forcedRoutePatterns")]
    pub forced_route_patterns: Vec<String>,
    /// Maximum envelope age (and future skew) in milliseconds
    #[serde(alias = "replayWindowMs")]
    pub replay_window_ms: u64,
    /// PBKDF2 work factor for session keys
    #[serde(alias = "kdfIterations")]
    pub kdf_iterations: u32,
    /// Highest PBKDF2 work factor a message-salted envelope may request
    #[serde(alias = "maxLegacyIterations")]
    pub max_legacy_iterations: u32,
    /// Max request body size in bytes (default: 1MB)
    #[serde(alias = "maxBodyBytes")]
    pub max_body_bytes: usize,
    /// Max response body size in bytes buffered for encryption (default: 10MB)
    #[serde(alias = "maxResponseBytes")]
    pub max_response_bytes: usize,
    /// Shared secret for key derivation and envelope signatures (required)
    #[serde(alias = "masterSecret")]
    pub master_secret: Option<MasterSecret>,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            force_encryption: false,
            allow_plaintext_fallback: false,
            legacy_fast_key_mode: false,
            debug: false,
            excluded_route_patterns: vec![
                "/health".to_string(),
                "/metrics".to_string(),
                "/webhooks/*".to_string(),
            ],
            forced_route_patterns: Vec::new(),
            replay_window_ms: DEFAULT_REPLAY_WINDOW_MS,
            kdf_iterations: DEFAULT_ITERATIONS,
            max_legacy_iterations: DEFAULT_MAX_SALTED_ITERATIONS,
            max_body_bytes: 1024 * 1024,           // 1MB
            max_response_bytes: 10 * 1024 * 1024, // 10MB
            master_secret: None,
        }
    }
}

impl EncryptionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret = self
            .master_secret
            .as_ref()
            .ok_or(ConfigError::MissingMasterSecret)?;
        if !secret.is_strong() {
            warn!(
                length = secret.len(),
                "Master secret is shorter than 32 bytes"
            );
        }

        if self.replay_window_ms == 0 {
            return Err(ConfigError::InvalidReplayWindow(
                "replay_window_ms cannot be 0".into(),
            ));
        }

        if !self.legacy_fast_key_mode
            && !(MIN_KDF_ITERATIONS..=MAX_ITERATIONS).contains(&self.kdf_iterations)
        {
            return Err(ConfigError::InvalidKdf(format!(
                "kdf_iterations must be within {}..={}",
                MIN_KDF_ITERATIONS, MAX_ITERATIONS
            )));
        }

        if !(1..=MAX_ITERATIONS).contains(&self.max_legacy_iterations) {
            return Err(ConfigError::InvalidKdf(format!(
                "max_legacy_iterations must be within 1..={}",
                MAX_ITERATIONS
            )));
        }

        if self.max_body_bytes == 0 || self.max_response_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "body size limits cannot be 0".into(),
            ));
        }

        self.excluded_patterns()?;
        self.forced_patterns()?;

        Ok(())
    }

    /// Parsed excluded route patterns
    pub fn excluded_patterns(&self) -> Result<Vec<RoutePattern>, ConfigError> {
        self.excluded_route_patterns
            .iter()
            .map(|p| RoutePattern::parse(p))
            .collect()
    }

    /// Parsed forced route patterns
    pub fn forced_patterns(&self) -> Result<Vec<RoutePattern>, ConfigError> {
        self.forced_route_patterns
            .iter()
            .map(|p| RoutePattern::parse(p))
            .collect()
    }

    /// Key derivation mode implied by the configuration
    pub fn kdf_mode(&self) -> KdfMode {
        if self.legacy_fast_key_mode {
            KdfMode::Fast
        } else {
            KdfMode::secure(self.kdf_iterations)
        }
    }

    /// Failure handling implied by the configuration
    pub fn failure_mode(&self) -> FailureMode {
        if self.allow_plaintext_fallback {
            FailureMode::PermissiveFallback
        } else {
            FailureMode::Strict
        }
    }
}

impl GatewayConfig {
    /// Load from the optional JSON file, apply environment overrides, validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.encryption.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `PAYLOAD_ENC_*` overrides from `lookup`.
    ///
    /// # Environment Variables
    ///
    /// - `PAYLOAD_ENC_HOST`, `PAYLOAD_ENC_PORT`, `PAYLOAD_ENC_JSON_LOGS`
    /// - `PAYLOAD_ENC_ENABLED`, `PAYLOAD_ENC_FORCE`, `PAYLOAD_ENC_ALLOW_PLAINTEXT_FALLBACK`
    /// - `PAYLOAD_ENC_LEGACY_FAST_KEY_MODE`, `PAYLOAD_ENC_DEBUG`
    /// - `PAYLOAD_ENC_EXCLUDED_ROUTES`, `PAYLOAD_ENC_FORCED_ROUTES` (comma separated)
    /// - `PAYLOAD_ENC_REPLAY_WINDOW_MS`, `PAYLOAD_ENC_KDF_ITERATIONS`,
    ///   `PAYLOAD_ENC_MAX_LEGACY_ITERATIONS`
    /// - `PAYLOAD_ENC_MAX_BODY_BYTES`, `PAYLOAD_ENC_MASTER_SECRET`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = var("HOST") {
            self.server.host = parse_value("HOST", &v)?;
        }
        if let Some(v) = var("PORT") {
            self.server.port = parse_value("PORT", &v)?;
        }
        if let Some(v) = var("JSON_LOGS") {
            self.server.json_logs = parse_flag(&v);
        }

        let enc = &mut self.encryption;
        if let Some(v) = var("ENABLED") {
            enc.enabled = parse_flag(&v);
        }
        if let Some(v) = var("FORCE") {
            enc.force_encryption = parse_flag(&v);
        }
        if let Some(v) = var("ALLOW_PLAINTEXT_FALLBACK") {
            enc.allow_plaintext_fallback = parse_flag(&v);
        }
        if let Some(v) = var("LEGACY_FAST_KEY_MODE") {
            enc.legacy_fast_key_mode = parse_flag(&v);
        }
        if let Some(v) = var("DEBUG") {
            enc.debug = parse_flag(&v);
        }
        if let Some(v) = var("EXCLUDED_ROUTES") {
            enc.excluded_route_patterns = parse_list(&v);
        }
        if let Some(v) = var("FORCED_ROUTES") {
            enc.forced_route_patterns = parse_list(&v);
        }
        if let Some(v) = var("REPLAY_WINDOW_MS") {
            enc.replay_window_ms = parse_value("REPLAY_WINDOW_MS", &v)?;
        }
        if let Some(v) = var("KDF_ITERATIONS") {
            enc.kdf_iterations = parse_value("KDF_ITERATIONS", &v)?;
        }
        if let Some(v) = var("MAX_LEGACY_ITERATIONS") {
            enc.max_legacy_iterations = parse_value("MAX_LEGACY_ITERATIONS", &v)?;
        }
        if let Some(v) = var("MAX_BODY_BYTES") {
            enc.max_body_bytes = parse_value("MAX_BODY_BYTES", &v)?;
        }
        if let Some(v) = var("MASTER_SECRET") {
            enc.master_secret = Some(
                v.parse()
                    .map_err(|_| ConfigError::MissingMasterSecret)?,
            );
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{}{}: cannot parse {:?}", ENV_PREFIX, name, value)))
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Master secret absent or empty
    #[error("master secret is required")]
    MissingMasterSecret,
    /// Invalid replay window
    #[error("invalid replay window: {0}")]
    InvalidReplayWindow(String),
    /// Invalid key derivation settings
    #[error("invalid key derivation settings: {0}")]
    InvalidKdf(String),
    /// Invalid size limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Malformed route pattern
    #[error("invalid route pattern: {0}")]
    InvalidRoutePattern(String),
    /// Config file could not be read
    #[error("cannot read config file: {0}")]
    Io(String),
    /// Config file could not be parsed
    #[error("cannot parse config file: {0}")]
    Parse(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
