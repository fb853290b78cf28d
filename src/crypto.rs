//! Per-document envelope encryption.
//!
//! Every document gets a fresh symmetric key; the serialized index is sealed
//! with AES-GCM under that key. The encrypted payload is laid out as a
//! 12-byte random IV followed by ciphertext with a 128-bit authentication
//! tag. Keys have no relation to any master key and round-trip to raw bytes
//! unchanged.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// AES-GCM IV length in bytes (96 bits per NIST recommendation).
pub const GCM_IV_LENGTH: usize = 12;

/// AES-GCM tag length in bytes (128 bits).
pub const GCM_TAG_LENGTH: usize = 16;

/// Errors from key handling and the AEAD cipher.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("unsupported encryption key size: {0} bits (expected 128 or 256)")]
    UnsupportedKeySize(u32),

    #[error("encryption key has invalid length: {0} bytes")]
    InvalidKeyLength(usize),

    #[error("encrypted payload is shorter than its IV")]
    TruncatedPayload,

    #[error("encryption failed")]
    Encryption,

    #[error("decryption failed: authentication tag mismatch or wrong key")]
    Authentication,
}

/// Raw symmetric key material for one document.
///
/// Conversion to and from bytes is the identity transform; no wrapping or
/// derivation is applied before the key is persisted.
pub struct EncryptionKey(Vec<u8>);

impl EncryptionKey {
    /// Generate a fresh key of `bits` size from the OS random source.
    pub fn generate(bits: u32) -> Result<Self, CryptoError> {
        let len = match bits {
            128 => 16,
            256 => 32,
            other => return Err(CryptoError::UnsupportedKeySize(other)),
        };
        let mut bytes = vec![0u8; len];
        OsRng.fill_bytes(&mut bytes);
        Ok(Self(bytes))
    }

    /// Reconstruct a key from persisted bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        match bytes.len() {
            16 | 32 => Ok(Self(bytes)),
            other => Err(CryptoError::InvalidKeyLength(other)),
        }
    }

    /// The raw key material, exactly as persisted.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Encrypt `plaintext` under `key`, prepending a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> Result<Vec<u8>, CryptoError> {
    let mut iv = [0u8; GCM_IV_LENGTH];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = match key.0.len() {
        16 => Aes128Gcm::new_from_slice(&key.0)
            .map_err(|_| CryptoError::InvalidKeyLength(key.0.len()))?
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|_| CryptoError::Encryption)?,
        32 => Aes256Gcm::new_from_slice(&key.0)
            .map_err(|_| CryptoError::InvalidKeyLength(key.0.len()))?
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|_| CryptoError::Encryption)?,
        other => return Err(CryptoError::InvalidKeyLength(other)),
    };

    let mut out = Vec::with_capacity(GCM_IV_LENGTH + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt an `IV ‖ ciphertext‖tag` payload under `key`.
///
/// Fails with [`CryptoError::Authentication`] when the tag does not verify,
/// including under a wrong key; a wrong plaintext is never returned silently.
pub fn decrypt(payload: &[u8], key: &EncryptionKey) -> Result<Vec<u8>, CryptoError> {
    if payload.len() < GCM_IV_LENGTH {
        return Err(CryptoError::TruncatedPayload);
    }
    let (iv, ciphertext) = payload.split_at(GCM_IV_LENGTH);

    match key.0.len() {
        16 => Aes128Gcm::new_from_slice(&key.0)
            .map_err(|_| CryptoError::InvalidKeyLength(key.0.len()))?
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| CryptoError::Authentication),
        32 => Aes256Gcm::new_from_slice(&key.0)
            .map_err(|_| CryptoError::InvalidKeyLength(key.0.len()))?
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| CryptoError::Authentication),
        other => Err(CryptoError::InvalidKeyLength(other)),
    }
}
