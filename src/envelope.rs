//! Binary framing of deciphered and ciphered objects
//!
//! Deciphered frame (exists only in memory, it is what gets encrypted):
//!
//! ```text
//! [1 byte: basename length N] [N bytes: UTF-8 basename] [payload ...]
//! ```
//!
//! Ciphered frame (the only thing ever written to disk):
//!
//! ```text
//! [1 byte: IV length M] [M bytes: IV] [ciphertext ...]
//! ```
//!
//! The digest of a ciphered object is its filename and is never embedded
//! in the frame.

use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use crate::namer::{self, DigestId};

/// Largest basename, in bytes, that fits the one-byte length prefix.
pub const MAX_BASENAME_LEN: usize = 254;

/// Plaintext note plus its content-addressed name. In-memory only.
#[derive(Clone, PartialEq, Eq)]
pub struct DecipheredObject {
    basename: String,
    digest: DigestId,
    payload: Vec<u8>,
}

impl DecipheredObject {
    /// Build an object, computing its digest once.
    ///
    /// Fails with `NameTooLong` if the basename does not fit the length
    /// prefix.
    pub fn new(basename: impl Into<String>, payload: Vec<u8>) -> Result<Self> {
        let basename = basename.into();
        check_basename_len(&basename)?;
        let digest = namer::digest(&basename);
        Ok(Self {
            basename,
            digest,
            payload,
        })
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn digest(&self) -> &DigestId {
        &self.digest
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.basename, self.payload)
    }

    /// The deciphered frame for this object.
    pub fn to_frame(&self) -> Vec<u8> {
        let name = self.basename.as_bytes();
        let mut frame = Vec::with_capacity(1 + name.len() + self.payload.len());
        // check_basename_len() ran in new(), so the length fits in a u8.
        frame.push(name.len() as u8);
        frame.extend_from_slice(name);
        frame.extend_from_slice(&self.payload);
        frame
    }
}

// Payloads are note contents; keep them out of debug output.
impl std::fmt::Debug for DecipheredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecipheredObject")
            .field("basename", &self.basename)
            .field("digest", &self.digest)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Encrypted envelope: filename digest plus ciphered frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipheredObject {
    digest: DigestId,
    ciphertext: Vec<u8>,
}

impl CipheredObject {
    /// Pair a digest with a ciphered frame as produced by [`wrap_ciphertext`].
    pub fn new(digest: DigestId, ciphertext: Vec<u8>) -> Self {
        Self { digest, ciphertext }
    }

    pub fn digest(&self) -> &DigestId {
        &self.digest
    }

    /// The ciphered frame, exactly as stored on disk.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn into_parts(self) -> (DigestId, Vec<u8>) {
        (self.digest, self.ciphertext)
    }
}

/// Build the deciphered object for `basename` and `payload`.
pub fn encode(basename: &str, payload: &[u8]) -> Result<DecipheredObject> {
    DecipheredObject::new(basename, payload.to_vec())
}

/// Split a deciphered frame back into basename and payload.
pub fn decode(frame: &[u8]) -> Result<(String, Vec<u8>)> {
    let Some((&name_len, rest)) = frame.split_first() else {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::FrameTooShort,
            "deciphered frame is empty; missing basename length",
        ));
    };
    let name_len = name_len as usize;
    if name_len > MAX_BASENAME_LEN {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::MalformedFrame,
            format!("declared basename length {name_len} exceeds {MAX_BASENAME_LEN}"),
        ));
    }
    if name_len > rest.len() {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::FrameTooShort,
            format!(
                "declared basename length {name_len} exceeds the {} bytes available",
                rest.len()
            ),
        ));
    }
    let (name, payload) = rest.split_at(name_len);
    let basename = std::str::from_utf8(name).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Utf8,
            "recovered basename is not valid UTF-8",
            e,
        )
    })?;
    Ok((basename.to_string(), payload.to_vec()))
}

/// Build a ciphered frame from an IV and cipher output.
pub fn wrap_ciphertext(iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let iv_len = u8::try_from(iv.len()).map_err(|_| {
        NotecryptError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InvalidInput,
            format!("IV of {} bytes does not fit the length prefix", iv.len()),
        )
    })?;
    let mut frame = Vec::with_capacity(1 + iv.len() + ciphertext.len());
    frame.push(iv_len);
    frame.extend_from_slice(iv);
    frame.extend_from_slice(ciphertext);
    Ok(frame)
}

/// Split a ciphered frame into IV and cipher output.
pub fn unwrap_ciphertext(frame: &[u8]) -> Result<(&[u8], &[u8])> {
    let Some((&iv_len, rest)) = frame.split_first() else {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::FrameTooShort,
            "ciphered frame is empty; missing IV length",
        ));
    };
    let iv_len = iv_len as usize;
    if iv_len > rest.len() {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::FrameTooShort,
            format!(
                "input likely truncated: IV length {iv_len} exceeds the {} bytes available",
                rest.len()
            ),
        ));
    }
    Ok(rest.split_at(iv_len))
}

fn check_basename_len(basename: &str) -> Result<()> {
    if basename.len() > MAX_BASENAME_LEN {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::NameTooLong,
            format!(
                "basename is {} bytes; at most {MAX_BASENAME_LEN} are supported",
                basename.len()
            ),
        ));
    }
    Ok(())
}
