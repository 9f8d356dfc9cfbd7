//! Salt file creation and loading
//!
//! The salt file is 1024 random bytes, owner read/write only. Only the
//! first [`KDF_SALT_LEN`] bytes feed key derivation; the rest is reserved.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use crate::kdf::KDF_SALT_LEN;

/// Exact size of a salt file in bytes.
pub const SALT_FILE_LEN: usize = 1024;

/// Default salt file name under `~/.ssh`.
const DEFAULT_SALT_NAME: &str = "enc-notes-salt";

/// Contents of a salt file. Always exactly [`SALT_FILE_LEN`] bytes.
pub struct SaltBuffer(Zeroizing<Vec<u8>>);

impl SaltBuffer {
    pub fn from_bytes(bytes: [u8; SALT_FILE_LEN]) -> Self {
        Self(Zeroizing::new(bytes.to_vec()))
    }

    /// Validate and wrap raw salt file contents.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SALT_FILE_LEN {
            return Err(NotecryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::SaltInvalid,
                format!(
                    "salt must be exactly {SALT_FILE_LEN} bytes, got {}",
                    bytes.len()
                ),
            ));
        }
        Ok(Self(Zeroizing::new(bytes.to_vec())))
    }

    fn random() -> Self {
        let mut bytes = Zeroizing::new(vec![0u8; SALT_FILE_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }

    /// The part of the salt consumed by key derivation.
    pub fn kdf_salt(&self) -> &[u8] {
        &self.0[..KDF_SALT_LEN]
    }
}

impl std::fmt::Debug for SaltBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SaltBuffer([REDACTED])")
    }
}

/// `~/.ssh/enc-notes-salt`, if a home directory can be determined.
pub fn default_salt_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh").join(DEFAULT_SALT_NAME))
}

/// Create a new salt file at `path`.
///
/// Never overwrites: replacing a salt makes every envelope encrypted under
/// the old one unrecoverable. The salt is written to a temporary file in the
/// same directory and moved into place only once complete, so a failed write
/// leaves no partial salt behind.
pub fn create(path: &Path) -> Result<SaltBuffer> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to create directory {}", dir.display()),
            e,
        )
    })?;
    if path.exists() {
        return Err(already_exists(path, None));
    }

    let salt = SaltBuffer::random();
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to create tempfile in {}", dir.display()),
            e,
        )
    })?;
    temp_file
        .write_all(salt.as_bytes())
        .and_then(|_| temp_file.as_file().sync_all())
        .map_err(|e| {
            NotecryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write salt for {}", path.display()),
                e,
            )
        })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                NotecryptError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }

    temp_file.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            already_exists(path, Some(e.error))
        } else {
            NotecryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to move salt into place at {}", path.display()),
                e.error,
            )
        }
    })?;
    Ok(salt)
}

fn already_exists(path: &Path, source: Option<io::Error>) -> NotecryptError {
    let msg = format!("salt file {} already exists", path.display());
    match source {
        Some(e) => NotecryptError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::SaltInvalid,
            msg,
            e,
        ),
        None => NotecryptError::with_kind(ErrorCategory::User, ErrorKind::SaltInvalid, msg),
    }
}

/// Load the salt file at `path`, checking its exact size.
pub fn load(path: &Path) -> Result<SaltBuffer> {
    let bytes = Zeroizing::new(fs::read(path).map_err(|e| {
        let (category, kind) = if e.kind() == io::ErrorKind::NotFound {
            (ErrorCategory::User, ErrorKind::SaltInvalid)
        } else {
            (ErrorCategory::Internal, ErrorKind::Io)
        };
        NotecryptError::with_kind_and_source(
            category,
            kind,
            format!("failed to read salt file {}", path.display()),
            e,
        )
    })?);
    SaltBuffer::from_slice(&bytes)
        .map_err(|e| e.with_context(format!("invalid salt file {}", path.display())))
}
