//! Gateway error types and client-facing rejections.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use payload_envelope::EnvelopeError;

use super::config::ConfigError;

/// Body for plaintext requests on Forced routes.
pub const ENCRYPTION_REQUIRED_MESSAGE: &str = "encrypted payload required";

/// Body for internal failures; never carries detail.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Body for oversize requests.
pub const PAYLOAD_TOO_LARGE_MESSAGE: &str = "payload too large";

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Logging could not be initialised
    #[error("logging init error: {0}")]
    Logging(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Request rejected by the encryption layer.
///
/// Carries the real cause for logging; the response body only ever holds
/// one of the fixed messages above.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// Inbound envelope failed negotiation, verification or decryption
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(EnvelopeError),

    /// Plaintext body on a Forced route
    #[error("plaintext body on a forced route")]
    EncryptionRequired,

    /// Request body over the configured limit
    #[error("request body over {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit
        limit: usize,
    },

    /// Response encryption or buffering failed
    #[error("internal failure: {0}")]
    Internal(String),
}

impl Rejection {
    /// HTTP status
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::InvalidEnvelope(_) | Rejection::EncryptionRequired => {
                StatusCode::BAD_REQUEST
            }
            Rejection::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Rejection::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Generic message safe to send to the client
    pub fn client_message(&self) -> &'static str {
        match self {
            Rejection::InvalidEnvelope(e) => e.client_message(),
            Rejection::EncryptionRequired => ENCRYPTION_REQUIRED_MESSAGE,
            Rejection::PayloadTooLarge { .. } => PAYLOAD_TOO_LARGE_MESSAGE,
            Rejection::Internal(_) => INTERNAL_ERROR_MESSAGE,
        }
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::InvalidEnvelope(e) => e.kind(),
            Rejection::EncryptionRequired => "encryption_required",
            Rejection::PayloadTooLarge { .. } => "payload_too_large",
            Rejection::Internal(_) => "internal",
        }
    }
}

impl From<EnvelopeError> for Rejection {
    fn from(err: EnvelopeError) -> Self {
        Rejection::InvalidEnvelope(err)
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.client_message() }).to_string();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = self.status();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}
