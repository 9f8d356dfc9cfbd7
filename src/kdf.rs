//! Passphrase to key derivation using scrypt
//!
//! Work parameters are fixed: N = 16384, r = 8, p = 1, 32-byte output.
//! Every call re-derives; nothing is memoized.

use scrypt::{Params, scrypt};
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};

/// Length of derived key in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// Number of salt bytes consumed by scrypt
pub const KDF_SALT_LEN: usize = 32;

/// scrypt log2(N) parameter (CPU/memory cost)
const SCRYPT_LOG_N: u8 = 14;

/// scrypt r parameter (block size)
const SCRYPT_R: u32 = 8;

/// scrypt p parameter (parallelization)
const SCRYPT_P: u32 = 1;

/// Symmetric key derived from a passphrase. Zeroized on drop and never
/// printed.
pub struct SecretKey(Zeroizing<[u8; KEY_LEN]>);

impl SecretKey {
    /// Wrap raw key bytes, e.g. for test vectors.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// Derive a key from `password` and `salt`.
///
/// `password` must be non-empty and `salt` exactly [`KDF_SALT_LEN`] bytes;
/// anything else is rejected with `InvalidInput` rather than padded or
/// truncated.
pub fn derive(password: &str, salt: &[u8]) -> Result<SecretKey> {
    if password.is_empty() {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidInput,
            "passphrase must not be empty",
        ));
    }
    if salt.len() != KDF_SALT_LEN {
        return Err(NotecryptError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InvalidInput,
            format!(
                "salt must be exactly {KDF_SALT_LEN} bytes, got {}",
                salt.len()
            ),
        ));
    }

    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::DerivationFailed,
            "failed to create scrypt params",
            e,
        )
    })?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt(password.as_bytes(), salt, &params, &mut key[..]).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::DerivationFailed,
            "scrypt key derivation failed",
            e,
        )
    })?;

    Ok(SecretKey(key))
}
