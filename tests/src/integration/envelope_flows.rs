//! # Envelope Flows
//!
//! Client seals with `Encryptor`, the wire JSON goes through `negotiate`,
//! the server opens with `Decryptor`. Covers:
//!
//! 1. Round trip for structured and string payloads
//! 2. Tamper detection on every signed field
//! 3. Replay window in both directions
//! 4. Per-session key diversity (and its absence in fast mode)

#[cfg(test)]
mod tests {
    use crate::fixtures::{flip_hex, Pair, NOW_MS};
    use payload_envelope::{
        derive_key, negotiate, Algorithm, Envelope, EnvelopeError, EnvelopeFormat, KdfMode,
        SessionToken, DEFAULT_REPLAY_WINDOW_MS,
    };
    use serde_json::{json, Value};

    fn to_wire(envelope: Envelope) -> Value {
        serde_json::to_value(envelope.into_wire()).unwrap()
    }

    fn open(pair: &Pair, wire: &Value, session: &SessionToken) -> Result<Value, EnvelopeError> {
        let format = negotiate(wire)?;
        pair.decryptor.decrypt(&format, session)
    }

    // =============================================================================
    // ROUND TRIP
    // =============================================================================

    #[test]
    fn test_transfer_scenario_roundtrip() {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let payload = json!({"amount": 10});

        let envelope = pair.encryptor.encrypt(&payload, &session).unwrap();
        assert_eq!(envelope.timestamp, NOW_MS);
        assert_eq!(envelope.session_id.as_deref(), Some("sess_1"));
        assert_eq!(envelope.algorithm, Algorithm::Aes256Gcm);

        let wire = to_wire(envelope);
        assert_eq!(wire["encrypted"], json!(true));
        assert!(matches!(negotiate(&wire).unwrap(), EnvelopeFormat::Wrapped(_)));

        pair.clock.advance(1_000);
        assert_eq!(open(&pair, &wire, &session).unwrap(), payload);
    }

    #[test]
    fn test_login_payload_roundtrip_ignores_key_order() {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let payload = json!({"email": "a@b.com", "senha": "x"});

        let wire = to_wire(pair.encryptor.encrypt(&payload, &session).unwrap());
        let plain = open(&pair, &wire, &session).unwrap();

        assert_eq!(plain, payload);
        assert_eq!(plain, serde_json::from_str::<Value>(r#"{"senha":"x","email":"a@b.com"}"#).unwrap());
    }

    #[test]
    fn test_bare_canonical_envelope_accepted() {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let envelope = pair.encryptor.encrypt(&json!([1, 2, 3]), &session).unwrap();
        let bare = serde_json::to_value(&envelope).unwrap();

        assert!(matches!(negotiate(&bare).unwrap(), EnvelopeFormat::Canonical(_)));
        assert_eq!(open(&pair, &bare, &session).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_string_payload_roundtrip() {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let wire = to_wire(pair.encryptor.encrypt("hello there", &session).unwrap());
        assert_eq!(open(&pair, &wire, &session).unwrap(), json!("hello there"));
    }

    #[test]
    fn test_each_encryption_uses_fresh_nonce() {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let a = pair.encryptor.encrypt(&json!({"amount": 10}), &session).unwrap();
        let b = pair.encryptor.encrypt(&json!({"amount": 10}), &session).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.data, b.data);
    }

    // =============================================================================
    // TAMPER DETECTION
    // =============================================================================

    fn tampered(field: &str) -> Result<Value, EnvelopeError> {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let mut wire = to_wire(pair.encryptor.encrypt(&json!({"amount": 10}), &session).unwrap());

        let inner = &mut wire["payload"];
        match field {
            "timestamp" => inner["timestamp"] = json!(NOW_MS + 1),
            "sessionId" => inner["sessionId"] = json!("sess_2"),
            "algorithm" => inner["algorithm"] = json!("aes-256-cbc"),
            hex_field => {
                let flipped = flip_hex(inner[hex_field].as_str().unwrap());
                inner[hex_field] = json!(flipped);
            }
        }
        open(&pair, &wire, &session)
    }

    #[test]
    fn test_every_signed_field_is_tamper_evident() {
        for field in ["data", "iv", "tag", "signature", "timestamp", "sessionId"] {
            assert_eq!(
                tampered(field),
                Err(EnvelopeError::SignatureMismatch),
                "tampering with {} went unnoticed",
                field
            );
        }
    }

    #[test]
    fn test_hex_shifted_between_data_and_iv_rejected() {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let mut wire = to_wire(pair.encryptor.encrypt(&json!({"amount": 10}), &session).unwrap());

        let data = wire["payload"]["data"].as_str().unwrap().to_string();
        let iv = wire["payload"]["iv"].as_str().unwrap().to_string();
        let (head, moved) = data.split_at(data.len() - 8);
        wire["payload"]["data"] = json!(head);
        wire["payload"]["iv"] = json!(format!("{}{}", moved, iv));

        assert_eq!(open(&pair, &wire, &session), Err(EnvelopeError::SignatureMismatch));
    }

    #[test]
    fn test_algorithm_downgrade_rejected() {
        // A canonical envelope relabelled as CBC still carries a tag, so it is
        // negotiated as canonical and fails the signature.
        assert_eq!(tampered("algorithm"), Err(EnvelopeError::SignatureMismatch));
    }

    #[test]
    fn test_wrong_session_cannot_open() {
        let pair = Pair::secure();
        let wire = to_wire(
            pair.encryptor
                .encrypt(&json!({"amount": 10}), &SessionToken::new("sess_1"))
                .unwrap(),
        );
        assert_eq!(
            open(&pair, &wire, &SessionToken::new("sess_2")),
            Err(EnvelopeError::SignatureMismatch)
        );
    }

    #[test]
    fn test_wrapper_marker_false_rejected() {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let mut wire = to_wire(pair.encryptor.encrypt(&json!({"a": 1}), &session).unwrap());
        wire["encrypted"] = json!(false);
        assert!(matches!(
            open(&pair, &wire, &session),
            Err(EnvelopeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_deep_wrapping_rejected() {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let mut wire = to_wire(pair.encryptor.encrypt(&json!({"a": 1}), &session).unwrap());
        for _ in 0..4 {
            wire = json!({"encrypted": true, "payload": wire});
        }
        assert!(matches!(
            open(&pair, &wire, &session),
            Err(EnvelopeError::UnsupportedFormat(_))
        ));
    }

    // =============================================================================
    // REPLAY WINDOW
    // =============================================================================

    #[test]
    fn test_replay_window_edges() {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let wire = to_wire(pair.encryptor.encrypt(&json!({"a": 1}), &session).unwrap());
        let window = DEFAULT_REPLAY_WINDOW_MS as i64;

        pair.clock.set(NOW_MS + window);
        assert!(open(&pair, &wire, &session).is_ok());

        pair.clock.set(NOW_MS + window + 1);
        assert_eq!(
            open(&pair, &wire, &session),
            Err(EnvelopeError::ReplayOrExpired {
                skew_ms: DEFAULT_REPLAY_WINDOW_MS + 1,
                window_ms: DEFAULT_REPLAY_WINDOW_MS,
            })
        );
    }

    #[test]
    fn test_future_dated_envelope_rejected() {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let wire = to_wire(pair.encryptor.encrypt(&json!({"a": 1}), &session).unwrap());

        pair.clock.set(NOW_MS - DEFAULT_REPLAY_WINDOW_MS as i64 - 1);
        assert!(matches!(
            open(&pair, &wire, &session),
            Err(EnvelopeError::ReplayOrExpired { .. })
        ));
    }

    #[test]
    fn test_expiry_checked_before_signature() {
        let pair = Pair::secure();
        let session = SessionToken::new("sess_1");
        let mut wire = to_wire(pair.encryptor.encrypt(&json!({"a": 1}), &session).unwrap());
        wire["payload"]["signature"] = json!("00");

        pair.clock.advance(DEFAULT_REPLAY_WINDOW_MS as i64 + 1);
        assert!(matches!(
            open(&pair, &wire, &session),
            Err(EnvelopeError::ReplayOrExpired { .. })
        ));
    }

    // =============================================================================
    // KEY DIVERSITY
    // =============================================================================

    #[test]
    fn test_secure_mode_keys_differ_per_session() {
        let pair = Pair::secure();
        let a = derive_key(&pair.secret, &SessionToken::new("sess_1"), pair.mode).unwrap();
        let b = derive_key(&pair.secret, &SessionToken::new("sess_2"), pair.mode).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_fast_mode_shares_one_key() {
        let pair = Pair::new(KdfMode::Fast);
        let a = derive_key(&pair.secret, &SessionToken::new("sess_1"), pair.mode).unwrap();
        let b = derive_key(&pair.secret, &SessionToken::new("sess_2"), pair.mode).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_fast_mode_still_binds_session() {
        // Same key, but the signature and sessionId still pin the session.
        let pair = Pair::new(KdfMode::Fast);
        let wire = to_wire(
            pair.encryptor
                .encrypt(&json!({"a": 1}), &SessionToken::new("sess_1"))
                .unwrap(),
        );
        assert_eq!(
            open(&pair, &wire, &SessionToken::new("sess_2")),
            Err(EnvelopeError::SignatureMismatch)
        );
        assert_eq!(
            open(&pair, &wire, &SessionToken::new("sess_1")).unwrap(),
            json!({"a": 1})
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn any_hex_change_in_signed_fields_is_rejected(
                field in prop::sample::select(vec!["data", "iv", "tag"]),
                position in any::<prop::sample::Index>(),
                replacement in prop::sample::select("0123456789abcdef".chars().collect::<Vec<_>>()),
            ) {
                let pair = Pair::secure();
                let session = SessionToken::new("sess_1");
                let mut wire = to_wire(pair.encryptor.encrypt(&json!({"amount": 10}), &session).unwrap());

                let original = wire["payload"][field].as_str().unwrap().to_string();
                let index = position.index(original.len());
                prop_assume!(original.as_bytes()[index] as char != replacement);

                let mut changed: Vec<char> = original.chars().collect();
                changed[index] = replacement;
                wire["payload"][field] = json!(changed.into_iter().collect::<String>());

                prop_assert_eq!(open(&pair, &wire, &session), Err(EnvelopeError::SignatureMismatch));
            }
        }
    }
}
