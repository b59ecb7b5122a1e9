//! Shared fixtures for integration tests and benchmarks.

use payload_envelope::{
    derive_key, Algorithm, Decryptor, Encryptor, FixedClock, KdfMode, LegacyCipherEnvelope,
    MasterSecret, SaltedEnvelope, SessionToken, DEFAULT_REPLAY_WINDOW_MS,
};
use std::sync::Arc;

/// Fixed "now" for deterministic timestamps
pub const NOW_MS: i64 = 1_700_000_000_000;

/// Master secret shared by client and server in tests
pub const MASTER_SECRET: &str = "integration-master-secret-0123456789abcdef";

/// Low work factor to keep the suite fast
pub const TEST_ITERATIONS: u32 = 1_000;

/// Client and server halves sharing one secret and one clock
pub struct Pair {
    pub secret: Arc<MasterSecret>,
    pub clock: Arc<FixedClock>,
    pub mode: KdfMode,
    pub encryptor: Encryptor,
    pub decryptor: Decryptor,
}

impl Pair {
    pub fn new(mode: KdfMode) -> Self {
        let secret = Arc::new(secret());
        let clock = Arc::new(FixedClock::new(NOW_MS));
        let encryptor = Encryptor::new(Arc::clone(&secret), mode).with_clock(clock.clone());
        let decryptor = Decryptor::new(Arc::clone(&secret), mode, DEFAULT_REPLAY_WINDOW_MS)
            .with_clock(clock.clone());
        Self {
            secret,
            clock,
            mode,
            encryptor,
            decryptor,
        }
    }

    pub fn secure() -> Self {
        Self::new(KdfMode::secure(TEST_ITERATIONS))
    }
}

pub fn secret() -> MasterSecret {
    MasterSecret::new(MASTER_SECRET.as_bytes().to_vec()).unwrap()
}

fn sign(input: &str) -> String {
    hex::encode(shared_crypto::hmac_sha256(MASTER_SECRET.as_bytes(), &[input.as_bytes()]).unwrap())
}

/// Message-salted envelope as produced by older clients (16-byte nonce).
pub fn salted_envelope(plaintext: &str, signed_at: Option<i64>) -> SaltedEnvelope {
    let salt = [0x5au8; 16];
    let nonce = [0x11u8; 16];
    let key = shared_crypto::pbkdf2_sha256(MASTER_SECRET.as_bytes(), &salt, TEST_ITERATIONS).unwrap();
    let sealed = shared_crypto::seal_with_nonce(&key, &nonce, plaintext.as_bytes()).unwrap();

    let mut envelope = SaltedEnvelope {
        data: hex::encode(&sealed.ciphertext),
        iv: hex::encode(&sealed.nonce),
        salt: hex::encode(salt),
        tag: hex::encode(sealed.tag),
        algorithm: Algorithm::Aes256Gcm,
        iterations: TEST_ITERATIONS,
        key_length: 32,
        timestamp: None,
        signature: None,
    };
    if let Some(timestamp) = signed_at {
        envelope.timestamp = Some(timestamp);
        envelope.signature = Some(sign(&envelope.signing_input(timestamp)));
    }
    envelope
}

/// AES-256-CBC envelope authenticated only by its outer signature.
pub fn legacy_cbc_envelope(
    plaintext: &str,
    session: &SessionToken,
    mode: KdfMode,
    timestamp: i64,
) -> LegacyCipherEnvelope {
    let iv = [0x22u8; 16];
    let key = derive_key(&secret(), session, mode).unwrap();
    let ciphertext = shared_crypto::cbc_encrypt(&key, &iv, plaintext.as_bytes()).unwrap();

    let mut envelope = LegacyCipherEnvelope {
        data: hex::encode(ciphertext),
        iv: hex::encode(iv),
        timestamp,
        signature: String::new(),
        algorithm: Algorithm::Aes256Cbc,
        session_id: Some(session.as_str().to_string()),
    };
    envelope.signature = sign(&envelope.signing_input(session.as_str()));
    envelope
}

/// Flip the lowest bit of the first hex digit.
pub fn flip_hex(value: &str) -> String {
    let mut chars: Vec<char> = value.chars().collect();
    chars[0] = match chars[0] {
        c if c.is_ascii_digit() => ((c as u8) ^ 1) as char,
        'a' => 'b',
        'b' => 'a',
        'c' => 'd',
        'd' => 'c',
        'e' => 'f',
        _ => 'e',
    };
    chars.into_iter().collect()
}
