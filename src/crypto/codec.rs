//! Field-level encryption for secrets stored in the pinned state message.
//!
//! Only scalar string fields go through this codec (the Anki password).
//! The rest of the conversation state stays readable JSON.
//!
//! ## Token layout
//!
//! ```text
//! hex( nonce[12] || AES-256-GCM ciphertext || tag[16] )
//! ```
//!
//! The AES key is derived from the operator pepper key via HKDF-SHA256 with
//! a versioned salt, so the raw pepper never touches the cipher directly.
//!
//! Decryption never fails loudly: blank, malformed, truncated or foreign
//! tokens decode to an empty string, which the state machine treats as
//! "no password stored" and asks the user to log in again.

use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

/// Length of the operator pepper key in bytes.
pub const PEPPER_KEY_LEN: usize = 32;

/// Domain separation salt for the field key (versioned for rotation).
const FIELD_KEY_SALT: &[u8] = b"anker-field-encryption-v1";

/// HKDF info string for the AES-256-GCM field key.
const FIELD_KEY_INFO: &[u8] = b"aes-256-gcm-field-key";

/// Errors raised while building a codec. Encryption of a single field can
/// only fail if the system RNG or the cipher itself is broken.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Pepper key is missing")]
    MissingKey,

    #[error("Pepper key must be {expected} hex-encoded bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Pepper key is not valid hex: {0}")]
    InvalidKeyEncoding(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
}

/// Symmetric codec for secret fields.
///
/// Built once at startup and shared read-only (`Arc<FieldCodec>`) by every
/// chat worker. There is no per-session key material.
pub struct FieldCodec {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl std::fmt::Debug for FieldCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCodec").finish_non_exhaustive()
    }
}

impl FieldCodec {
    /// Build a codec from the raw 32-byte pepper key.
    pub fn new(pepper: &[u8]) -> Result<Self, CodecError> {
        if pepper.len() != PEPPER_KEY_LEN {
            return Err(CodecError::InvalidKeyLength {
                expected: PEPPER_KEY_LEN,
                actual: pepper.len(),
            });
        }

        let field_key = derive_field_key(pepper)?;
        let unbound = UnboundKey::new(&AES_256_GCM, &field_key[..])
            .map_err(|e| CodecError::KeyDerivationFailed(format!("Key creation failed: {}", e)))?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Build a codec from the hex form used in `ANKER_PEPPER_KEY`.
    ///
    /// Surrounding whitespace is ignored so keys pasted from files work.
    pub fn from_hex(encoded: &str) -> Result<Self, CodecError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(CodecError::MissingKey);
        }

        let raw = Zeroizing::new(
            hex::decode(encoded).map_err(|e| CodecError::InvalidKeyEncoding(e.to_string()))?,
        );
        Self::new(&raw)
    }

    /// Encrypt a secret into a printable token.
    ///
    /// An empty secret stays empty: no ciphertext is produced, so a blank
    /// field does not advertise that "something" is stored.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CodecError::EncryptionFailed("RNG failure".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut sealed = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut sealed)
            .map_err(|e| CodecError::EncryptionFailed(e.to_string()))?;

        let mut token = Vec::with_capacity(NONCE_LEN + sealed.len());
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&sealed);
        Ok(hex::encode(token))
    }

    /// Decrypt a token produced by [`FieldCodec::encrypt`].
    ///
    /// Returns an empty string for blank, malformed or key-mismatched input.
    pub fn decrypt(&self, token: &str) -> String {
        let token = token.trim();
        if token.is_empty() {
            return String::new();
        }

        let Ok(bytes) = hex::decode(token) else {
            return String::new();
        };
        if bytes.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return String::new();
        }

        let (nonce_bytes, sealed) = bytes.split_at(NONCE_LEN);
        let Ok(nonce) = Nonce::try_assume_unique_for_key(nonce_bytes) else {
            return String::new();
        };

        let mut buffer = sealed.to_vec();
        match self.key.open_in_place(nonce, Aad::empty(), &mut buffer) {
            Ok(plaintext) => String::from_utf8(plaintext.to_vec()).unwrap_or_default(),
            Err(_) => String::new(),
        }
    }
}

/// Generate a fresh random pepper key, hex-encoded.
pub fn generate_pepper_key() -> Result<String, CodecError> {
    let rng = SystemRandom::new();
    let mut key = Zeroizing::new([0u8; PEPPER_KEY_LEN]);
    rng.fill(&mut key[..])
        .map_err(|_| CodecError::EncryptionFailed("RNG failure".to_string()))?;
    Ok(hex::encode(&key[..]))
}

/// Derive the AES-256 field key from the pepper via HKDF.
fn derive_field_key(pepper: &[u8]) -> Result<Zeroizing<[u8; 32]>, CodecError> {
    let hkdf = Hkdf::<Sha256>::new(Some(FIELD_KEY_SALT), pepper);
    let mut key = Zeroizing::new([0u8; 32]);
    hkdf.expand(FIELD_KEY_INFO, &mut key[..])
        .map_err(|e| CodecError::KeyDerivationFailed(format!("HKDF expand failed: {}", e)))?;
    Ok(key)
}
