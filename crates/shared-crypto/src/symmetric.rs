//! # Symmetric Encryption
//!
//! AES-256-GCM with a detached 128-bit tag for the current envelope format,
//! plus AES-256-CBC/PKCS#7 for envelopes produced by older clients.
//!
//! ## Security Properties
//!
//! - **AES-256-GCM**: 96-bit random nonce, tag verified before any plaintext is released
//! - **AES-256-CBC**: no integrity of its own; callers must authenticate the
//!   ciphertext before decrypting and must not distinguish padding failures

use crate::CryptoError;
use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray, AeadInPlace, KeyInit},
    Aes256Gcm, AesGcm,
};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// GCM nonce length in bytes.
pub const GCM_NONCE_LEN: usize = 12;
/// Longer GCM nonce accepted from older clients.
pub const GCM_LONG_NONCE_LEN: usize = 16;
/// GCM authentication tag length in bytes.
pub const GCM_TAG_LEN: usize = 16;
/// CBC initialization vector length in bytes.
pub const CBC_IV_LEN: usize = 16;

type Aes256GcmLongNonce = AesGcm<aes::Aes256, U16>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Secret key (256-bit), wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: KEY_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// Generate a random 96-bit GCM nonce.
///
/// Keys are derived per session, so the collision bound of a 96-bit
/// random nonce applies per session key rather than globally.
pub fn generate_nonce() -> [u8; GCM_NONCE_LEN] {
    let mut bytes = [0u8; GCM_NONCE_LEN];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    bytes
}

/// Output of a detached AEAD encryption.
#[derive(Clone, Debug)]
pub struct Sealed {
    /// Ciphertext, same length as the plaintext
    pub ciphertext: Vec<u8>,
    /// Nonce used for this message
    pub nonce: Vec<u8>,
    /// Authentication tag
    pub tag: [u8; GCM_TAG_LEN],
}

/// Encrypt plaintext with AES-256-GCM under a fresh random 96-bit nonce.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if the primitive fails.
pub fn seal(key: &SecretKey, plaintext: &[u8]) -> Result<Sealed, CryptoError> {
    seal_with_nonce(key, &generate_nonce(), plaintext)
}

/// Encrypt plaintext with AES-256-GCM under a caller-chosen nonce.
///
/// Accepts 96-bit and 128-bit nonces. The caller is responsible for never
/// reusing a nonce under the same key.
pub fn seal_with_nonce(
    key: &SecretKey,
    nonce: &[u8],
    plaintext: &[u8],
) -> Result<Sealed, CryptoError> {
    let mut buffer = plaintext.to_vec();
    let tag = match nonce.len() {
        GCM_NONCE_LEN => seal_detached::<Aes256Gcm>(key, nonce, &mut buffer)?,
        GCM_LONG_NONCE_LEN => seal_detached::<Aes256GcmLongNonce>(key, nonce, &mut buffer)?,
        actual => {
            return Err(CryptoError::InvalidNonceLength {
                expected: GCM_NONCE_LEN,
                actual,
            })
        }
    };

    Ok(Sealed {
        ciphertext: buffer,
        nonce: nonce.to_vec(),
        tag,
    })
}

/// Decrypt AES-256-GCM ciphertext and verify its detached tag.
///
/// Accepts 96-bit nonces and the 128-bit nonces some older clients emit.
///
/// # Errors
///
/// Returns a length error for a malformed nonce or tag and
/// `CryptoError::DecryptionFailed` if authentication fails.
pub fn open(
    key: &SecretKey,
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if tag.len() != GCM_TAG_LEN {
        return Err(CryptoError::InvalidTagLength {
            expected: GCM_TAG_LEN,
            actual: tag.len(),
        });
    }

    let mut buffer = ciphertext.to_vec();
    match nonce.len() {
        GCM_NONCE_LEN => open_detached::<Aes256Gcm>(key, nonce, &mut buffer, tag)?,
        GCM_LONG_NONCE_LEN => open_detached::<Aes256GcmLongNonce>(key, nonce, &mut buffer, tag)?,
        actual => {
            return Err(CryptoError::InvalidNonceLength {
                expected: GCM_NONCE_LEN,
                actual,
            })
        }
    }

    Ok(buffer)
}

fn seal_detached<C: AeadInPlace + KeyInit>(
    key: &SecretKey,
    nonce: &[u8],
    buffer: &mut [u8],
) -> Result<[u8; GCM_TAG_LEN], CryptoError> {
    let cipher = C::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::InvalidKeyLength {
        expected: KEY_LEN,
        actual: key.as_bytes().len(),
    })?;

    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(nonce), b"", buffer)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    tag.as_slice()
        .try_into()
        .map_err(|_| CryptoError::EncryptionFailed("unexpected tag size".into()))
}

fn open_detached<C: AeadInPlace + KeyInit>(
    key: &SecretKey,
    nonce: &[u8],
    buffer: &mut [u8],
    tag: &[u8],
) -> Result<(), CryptoError> {
    let cipher = C::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::InvalidKeyLength {
        expected: KEY_LEN,
        actual: key.as_bytes().len(),
    })?;

    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            b"",
            buffer,
            GenericArray::from_slice(tag),
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// Encrypt with AES-256-CBC and PKCS#7 padding.
///
/// Only used to produce fixtures for the legacy unauthenticated format.
pub fn cbc_encrypt(key: &SecretKey, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let iv = cbc_iv(iv)?;
    Ok(Aes256CbcEnc::new(key.as_bytes().into(), (&iv).into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt AES-256-CBC with PKCS#7 padding.
///
/// # Errors
///
/// Every padding or block-alignment failure collapses into
/// `CryptoError::InvalidPadding` with no further detail.
pub fn cbc_decrypt(key: &SecretKey, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let iv = cbc_iv(iv)?;
    Aes256CbcDec::new(key.as_bytes().into(), (&iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::InvalidPadding)
}

fn cbc_iv(iv: &[u8]) -> Result<[u8; CBC_IV_LEN], CryptoError> {
    iv.try_into().map_err(|_| CryptoError::InvalidNonceLength {
        expected: CBC_IV_LEN,
        actual: iv.len(),
    })
}
