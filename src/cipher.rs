//! Symmetric encryption of frames with AES-256-GCM
//!
//! Each call builds a fresh cipher context from the key and its own random
//! IV; nothing is retained between calls. The 16-byte GCM tag is appended
//! to the ciphertext, so a wrong key or any tampering fails decryption
//! instead of yielding garbage.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use crate::kdf::SecretKey;

/// Length of the AES-GCM IV in bytes (96 bits)
pub const IV_LEN: usize = 12;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Per-encryption initialization vector.
pub type Iv = [u8; IV_LEN];

/// Encrypt `plaintext` under `key` with a fresh random IV.
pub fn encrypt(key: &SecretKey, plaintext: &[u8]) -> Result<(Iv, Vec<u8>)> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = encrypt_with_iv(key, &iv, plaintext)?;
    Ok((iv, ciphertext))
}

/// Encrypt `plaintext` under `key` with a caller-provided IV.
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates a random IV.
pub fn encrypt_with_iv(key: &SecretKey, iv: &Iv, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|e| {
            NotecryptError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::EncryptionFailed,
                format!("encryption failed: {e}"),
            )
        })
}

/// Decrypt `ciphertext` (with its trailing tag) under `key` and `iv`.
pub fn decrypt(key: &SecretKey, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != IV_LEN {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::MalformedFrame,
            format!("IV must be {IV_LEN} bytes, got {}", iv.len()),
        ));
    }
    if ciphertext.len() < TAG_LEN {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::FrameTooShort,
            "input likely truncated: ciphertext shorter than the authentication tag",
        ));
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| {
            NotecryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::DecryptionFailed,
                "corrupt input, tampered-with data, or bad passphrase",
            )
        })
}
