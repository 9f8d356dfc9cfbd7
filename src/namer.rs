//! Content-addressed naming for envelopes
//!
//! A basename maps to a self-describing identifier:
//!
//! - SHA-256 over the UTF-8 basename bytes
//! - tagged multihash-style: `0x12` (sha2-256), `0x20` (32-byte length), digest
//! - encoded multibase-style: `U` (base64url, padded) followed by the encoding
//!
//! The identifier depends on the basename only, never on the payload, so
//! re-encrypting an updated note lands on the same filename. Observers of
//! the encrypted store learn which envelopes share a basename; contents stay
//! hidden.

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE};
use sha2::{Digest, Sha256};

use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};

/// Multibase prefix for padded base64url.
const MULTIBASE_BASE64URLPAD: char = 'U';

/// Multihash code for sha2-256.
const MULTIHASH_SHA2_256: u8 = 0x12;

/// Length of a sha2-256 digest in bytes.
const SHA2_256_LEN: usize = 32;

/// Length of the tagged hash (code + length + digest).
const TAGGED_LEN: usize = 2 + SHA2_256_LEN;

/// Filename-safe, self-describing identifier of a basename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DigestId(String);

impl DigestId {
    /// The identifier as it appears on disk.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The raw 32-byte sha2-256 hash this identifier wraps.
    pub fn hash(&self) -> Result<[u8; SHA2_256_LEN]> {
        let tagged = decode_tagged(&self.0)?;
        let mut out = [0u8; SHA2_256_LEN];
        out.copy_from_slice(&tagged[2..]);
        Ok(out)
    }
}

impl fmt::Display for DigestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DigestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for DigestId {
    type Err = NotecryptError;

    /// Parse an identifier, e.g. an envelope filename, validating both the
    /// multibase prefix and the multihash tag.
    fn from_str(s: &str) -> Result<Self> {
        decode_tagged(s)?;
        Ok(Self(s.to_string()))
    }
}

/// Compute the identifier for `basename`.
pub fn digest(basename: &str) -> DigestId {
    let hash = Sha256::digest(basename.as_bytes());

    let mut tagged = Vec::with_capacity(TAGGED_LEN);
    tagged.push(MULTIHASH_SHA2_256);
    tagged.push(SHA2_256_LEN as u8);
    tagged.extend_from_slice(&hash);

    let mut encoded = String::with_capacity(1 + TAGGED_LEN.div_ceil(3) * 4);
    encoded.push(MULTIBASE_BASE64URLPAD);
    URL_SAFE.encode_string(&tagged, &mut encoded);
    DigestId(encoded)
}

fn decode_tagged(s: &str) -> Result<Vec<u8>> {
    let Some(encoded) = s.strip_prefix(MULTIBASE_BASE64URLPAD) else {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::DigestMismatch,
            format!("{s:?} does not carry the base64url multibase prefix"),
        ));
    };
    let tagged = URL_SAFE.decode(encoded).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::DigestMismatch,
            format!("{s:?} is not valid base64url: {e}"),
            e,
        )
    })?;
    if tagged.len() != TAGGED_LEN
        || tagged[0] != MULTIHASH_SHA2_256
        || tagged[1] as usize != SHA2_256_LEN
    {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::DigestMismatch,
            format!("{s:?} is not a sha2-256 multihash"),
        ));
    }
    Ok(tagged)
}
