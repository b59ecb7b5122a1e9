//! HTTP header names used by the encryption protocol.

use axum::http::HeaderValue;

/// Client advertises that it can open encrypted responses.
pub const CAPABILITY_HEADER: &str = "x-encryption-supported";

/// Client-supplied session identifier; echoed on encrypted responses.
pub const SESSION_HEADER: &str = "x-session-id";

/// Set to `true` on encrypted responses.
pub const ENCRYPTED_HEADER: &str = "x-encrypted";

/// Protocol version of encrypted responses.
pub const VERSION_HEADER: &str = "x-encryption-version";

/// `true`/`1` (any case, surrounding whitespace ignored)
pub fn is_truthy(value: Option<&HeaderValue>) -> bool {
    value
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            let v = v.trim();
            v == "1" || v.eq_ignore_ascii_case("true")
        })
        .unwrap_or(false)
}
