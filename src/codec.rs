//! The encrypt/decrypt pipeline for single objects
//!
//! [`Notecrypt`] glues the envelope framing, content naming, key derivation
//! and cipher together. It holds no mutable state besides its logger, so one
//! instance can serve many files, and many threads, with one derived key.

use crate::cipher;
use crate::envelope::{self, CipheredObject, DecipheredObject};
use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use crate::kdf::{self, SecretKey};
use crate::log::{self, Level, SharedLogger};
use crate::namer::{self, DigestId};
use crate::passphrase::PassphraseReader;
use crate::salt::SaltBuffer;

const TARGET: &str = "notecrypt::codec";

#[derive(Clone)]
pub struct Notecrypt {
    logger: SharedLogger,
}

impl Default for Notecrypt {
    fn default() -> Self {
        Self::new(log::noop())
    }
}

impl Notecrypt {
    pub fn new(logger: SharedLogger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &SharedLogger {
        &self.logger
    }

    /// Derive the run's key from a passphrase and the salt file contents.
    ///
    /// Slow on purpose. Derive once per passphrase entry and reuse the key
    /// for every file.
    pub fn derive_key(&self, password: &[u8], salt: &SaltBuffer) -> Result<SecretKey> {
        let password = std::str::from_utf8(password).map_err(|e| {
            NotecryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::InvalidInput,
                "passphrase must be valid UTF-8",
                e,
            )
        })?;
        self.logger.log(Level::Debug, TARGET, "deriving key");
        let key = kdf::derive(password, salt.kdf_salt())?;
        self.logger.log(Level::Debug, TARGET, "key derived");
        Ok(key)
    }

    /// Read a passphrase once and derive the run's key from it.
    pub fn read_key(
        &self,
        reader: &mut dyn PassphraseReader,
        salt: &SaltBuffer,
    ) -> Result<SecretKey> {
        let passphrase = reader.read_passphrase()?;
        self.derive_key(&passphrase, salt)
    }

    /// Encrypt one deciphered object into its envelope.
    pub fn encrypt_one(&self, key: &SecretKey, object: &DecipheredObject) -> Result<CipheredObject> {
        let frame = zeroize::Zeroizing::new(object.to_frame());
        let (iv, ciphertext) = cipher::encrypt(key, &frame)?;
        let wrapped = envelope::wrap_ciphertext(&iv, &ciphertext)?;
        self.logger.log(
            Level::Trace,
            TARGET,
            &format!(
                "sealed {} ({} payload bytes, {} envelope bytes)",
                object.digest(),
                object.payload().len(),
                wrapped.len()
            ),
        );
        Ok(CipheredObject::new(object.digest().clone(), wrapped))
    }

    /// Decrypt one envelope back into its deciphered object.
    ///
    /// The recovered basename must hash to the envelope's digest; an
    /// envelope renamed to another note's filename is rejected.
    pub fn decrypt_one(&self, key: &SecretKey, object: &CipheredObject) -> Result<DecipheredObject> {
        let (iv, ciphertext) = envelope::unwrap_ciphertext(object.ciphertext())?;
        let frame = zeroize::Zeroizing::new(cipher::decrypt(key, iv, ciphertext)?);
        let (basename, payload) = envelope::decode(&frame)?;
        let deciphered = DecipheredObject::new(basename, payload)?;
        if deciphered.digest() != object.digest() {
            return Err(NotecryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::DigestMismatch,
                format!(
                    "envelope {} holds a note whose name hashes to {}",
                    object.digest(),
                    deciphered.digest()
                ),
            ));
        }
        self.logger.log(
            Level::Trace,
            TARGET,
            &format!(
                "opened {} ({} payload bytes)",
                object.digest(),
                deciphered.payload().len()
            ),
        );
        Ok(deciphered)
    }

    /// Encrypt an in-memory note, returning its filename and envelope bytes.
    pub fn encrypt_bytes(
        &self,
        key: &SecretKey,
        basename: &str,
        payload: &[u8],
    ) -> Result<(DigestId, Vec<u8>)> {
        let object = envelope::encode(basename, payload)?;
        Ok(self.encrypt_one(key, &object)?.into_parts())
    }

    /// Decrypt in-memory envelope bytes stored under `digest`.
    pub fn decrypt_bytes(
        &self,
        key: &SecretKey,
        digest: &str,
        envelope_bytes: Vec<u8>,
    ) -> Result<(String, Vec<u8>)> {
        let digest: DigestId = digest.parse()?;
        let object = CipheredObject::new(digest, envelope_bytes);
        Ok(self.decrypt_one(key, &object)?.into_parts())
    }

    /// The filename an envelope for `basename` is stored under.
    pub fn digest(&self, basename: &str) -> DigestId {
        namer::digest(basename)
    }
}
