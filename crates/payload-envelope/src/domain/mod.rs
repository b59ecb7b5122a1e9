//! Domain types for the envelope protocol.
//!
//! Wire shapes, session tokens, the master secret and the error taxonomy.
//! Nothing here performs cryptography.

pub mod envelope;
pub mod error;
pub mod secret;
pub mod session;

// Re-exports for convenience
pub use envelope::{
    Algorithm, Envelope, LegacyCipherEnvelope, SaltedEnvelope, WireEnvelope, ENCRYPTED_MARKER,
    PAYLOAD_FIELD,
};
pub use error::{EnvelopeError, EnvelopeResult, CLIENT_ERROR_MESSAGE};
pub use secret::{MasterSecret, RECOMMENDED_SECRET_LEN};
pub use session::{SessionToken, ANONYMOUS_SESSION, MAX_SESSION_TOKEN_LEN};
