//! # Legacy Compatibility
//!
//! Envelopes from older clients must still open:
//!
//! - **Message-salted**: key from a per-message PBKDF2 salt, 16-byte GCM
//!   nonce, timestamp and signature optional
//! - **Legacy CBC**: AES-256-CBC with no tag, integrity only from the outer
//!   HMAC; padding failures never surface as a distinct error

#[cfg(test)]
mod tests {
    use crate::fixtures::{
        flip_hex, legacy_cbc_envelope, salted_envelope, Pair, NOW_MS, TEST_ITERATIONS,
    };
    use payload_envelope::{negotiate, EnvelopeError, EnvelopeFormat, KdfMode, SessionToken};
    use serde_json::{json, Value};

    fn open(pair: &Pair, wire: &Value, session: &SessionToken) -> Result<Value, EnvelopeError> {
        let format = negotiate(wire)?;
        pair.decryptor.decrypt(&format, session)
    }

    // =============================================================================
    // MESSAGE-SALTED
    // =============================================================================

    #[test]
    fn test_unsigned_salted_envelope_opens() {
        let pair = Pair::secure();
        let wire = serde_json::to_value(salted_envelope(r#"{"amount":10}"#, None)).unwrap();

        assert!(matches!(
            negotiate(&wire).unwrap(),
            EnvelopeFormat::MessageSalted(_)
        ));
        // The salt, not the session, selects the key.
        assert_eq!(
            open(&pair, &wire, &SessionToken::anonymous()).unwrap(),
            json!({"amount": 10})
        );
    }

    #[test]
    fn test_signed_salted_envelope_opens_inside_wrapper() {
        let pair = Pair::secure();
        let inner = serde_json::to_value(salted_envelope("ok", Some(NOW_MS))).unwrap();
        let wire = json!({"encrypted": true, "payload": inner});

        assert_eq!(
            open(&pair, &wire, &SessionToken::new("sess_1")).unwrap(),
            json!("ok")
        );
    }

    #[test]
    fn test_signed_salted_envelope_checks_freshness() {
        let pair = Pair::secure();
        let wire = serde_json::to_value(salted_envelope("ok", Some(NOW_MS - 600_000))).unwrap();
        assert!(matches!(
            open(&pair, &wire, &SessionToken::anonymous()),
            Err(EnvelopeError::ReplayOrExpired { .. })
        ));
    }

    #[test]
    fn test_signed_salted_envelope_tamper_evident() {
        let pair = Pair::secure();
        let mut envelope = salted_envelope("ok", Some(NOW_MS));
        envelope.salt = flip_hex(&envelope.salt);
        let wire = serde_json::to_value(envelope).unwrap();
        assert_eq!(
            open(&pair, &wire, &SessionToken::anonymous()),
            Err(EnvelopeError::SignatureMismatch)
        );
    }

    #[test]
    fn test_unsigned_salted_envelope_relies_on_gcm_tag() {
        let pair = Pair::secure();
        let mut envelope = salted_envelope("ok", None);
        envelope.data = flip_hex(&envelope.data);
        let wire = serde_json::to_value(envelope).unwrap();
        assert!(matches!(
            open(&pair, &wire, &SessionToken::anonymous()),
            Err(EnvelopeError::Cipher(_))
        ));
    }

    #[test]
    fn test_salted_signature_without_timestamp_rejected() {
        let pair = Pair::secure();
        let mut envelope = salted_envelope("ok", Some(NOW_MS));
        envelope.timestamp = None;
        let wire = serde_json::to_value(envelope).unwrap();
        assert!(matches!(
            open(&pair, &wire, &SessionToken::anonymous()),
            Err(EnvelopeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_salted_unsupported_key_length_rejected() {
        let pair = Pair::secure();
        let mut envelope = salted_envelope("ok", None);
        envelope.key_length = 16;
        let wire = serde_json::to_value(envelope).unwrap();
        assert!(matches!(
            open(&pair, &wire, &SessionToken::anonymous()),
            Err(EnvelopeError::Cipher(_))
        ));
    }

    #[test]
    fn test_salted_iterations_above_cap_rejected() {
        let pair = Pair::secure();
        let mut envelope = salted_envelope("ok", None);
        envelope.iterations = 10_000_000;
        let wire = serde_json::to_value(envelope).unwrap();
        assert!(matches!(
            open(&pair, &wire, &SessionToken::anonymous()),
            Err(EnvelopeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_salted_envelope_at_cap_still_opens() {
        let mut pair = Pair::secure();
        pair.decryptor = pair.decryptor.with_max_salted_iterations(TEST_ITERATIONS);
        let wire = serde_json::to_value(salted_envelope(r#"{"a":1}"#, None)).unwrap();
        assert_eq!(open(&pair, &wire, &SessionToken::anonymous()).unwrap(), json!({"a": 1}));

        pair.decryptor = pair.decryptor.with_max_salted_iterations(TEST_ITERATIONS - 1);
        assert!(matches!(
            open(&pair, &wire, &SessionToken::anonymous()),
            Err(EnvelopeError::UnsupportedFormat(_))
        ));
    }

    // =============================================================================
    // LEGACY CBC
    // =============================================================================

    #[test]
    fn test_legacy_cbc_envelope_opens() {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let envelope = legacy_cbc_envelope(r#"{"amount":10}"#, &session, pair.mode, NOW_MS);
        let wire = json!({"encrypted": true, "payload": envelope});

        assert!(matches!(
            negotiate(&wire).unwrap().innermost(),
            EnvelopeFormat::LegacyUnauthenticatedCipher(_)
        ));
        assert_eq!(open(&pair, &wire, &session).unwrap(), json!({"amount": 10}));
    }

    #[test]
    fn test_legacy_cbc_fast_mode_opens() {
        let pair = Pair::new(KdfMode::Fast);
        let session = SessionToken::new("sess_1");
        let envelope = legacy_cbc_envelope("legacy", &session, KdfMode::Fast, NOW_MS);
        let wire = serde_json::to_value(envelope).unwrap();
        assert_eq!(open(&pair, &wire, &session).unwrap(), json!("legacy"));
    }

    #[test]
    fn test_legacy_cbc_ciphertext_tamper_is_signature_mismatch() {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let mut envelope = legacy_cbc_envelope("legacy", &session, pair.mode, NOW_MS);
        envelope.data = flip_hex(&envelope.data);
        let wire = serde_json::to_value(envelope).unwrap();
        assert_eq!(
            open(&pair, &wire, &session),
            Err(EnvelopeError::SignatureMismatch)
        );
    }

    #[test]
    fn test_legacy_cbc_key_mismatch_hides_padding_error() {
        // Signed correctly but sealed under a different KDF mode: decryption
        // garbles the padding, which must look like any other auth failure.
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let envelope = legacy_cbc_envelope("legacy padding probe", &session, KdfMode::Fast, NOW_MS);
        let wire = serde_json::to_value(envelope).unwrap();

        match open(&pair, &wire, &session) {
            Err(EnvelopeError::SignatureMismatch) => {}
            // Valid padding under the wrong key is rare and yields garbage.
            Ok(value) => assert_ne!(value, json!("legacy padding probe")),
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
}
