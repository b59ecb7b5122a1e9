//! # Shared Crypto - Primitives for Payload Encryption
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `symmetric` | AES-256-GCM, AES-256-CBC | Envelope encryption (current / legacy) |
//! | `kdf` | PBKDF2-HMAC-SHA256, SHA-256 | Session and message key derivation |
//! | `signatures` | HMAC-SHA256 | Whole-envelope signatures |
//! | `hashing` | SHA-256 | Digests |
//!
//! ## Security Properties
//!
//! - **AES-256-GCM**: authenticated; tag checked before plaintext is returned
//! - **AES-256-CBC**: unauthenticated, padding errors carry no detail
//! - **HMAC verification**: constant time via `hmac`/`subtle`
//! - **Keys**: zeroized on drop, redacted in `Debug`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod kdf;
pub mod signatures;
pub mod symmetric;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{sha256, sha256_many};
pub use kdf::{pbkdf2_sha256, sha256_key, DEFAULT_ITERATIONS, MAX_ITERATIONS};
pub use signatures::{constant_time_eq, hmac_sha256, verify_hmac_sha256, MAC_LEN};
pub use symmetric::{
    cbc_decrypt, cbc_encrypt, generate_nonce, open, seal, seal_with_nonce, Sealed, SecretKey,
    CBC_IV_LEN, GCM_LONG_NONCE_LEN, GCM_NONCE_LEN, GCM_TAG_LEN, KEY_LEN,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
