use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee that the error is not, for
    /// example, due to a user error - merely that it cannot be confidently
    /// determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A caller violated an argument contract (wrong length, empty passphrase, ...).
    InvalidInput,
    /// Basename does not fit in the one-byte length prefix.
    NameTooLong,
    /// A frame ended before a declared field could be read.
    FrameTooShort,
    /// A frame was structurally readable but its contents are not acceptable.
    MalformedFrame,
    /// A recovered basename is not valid UTF-8.
    Utf8,
    /// A digest string could not be parsed or does not match its envelope.
    DigestMismatch,
    /// scrypt key derivation failed.
    DerivationFailed,
    /// The cipher refused to seal data.
    EncryptionFailed,
    /// Authentication failed due to an incorrect passphrase, tampering or
    /// corruption.
    DecryptionFailed,
    /// The salt file is missing, has the wrong size, or already exists.
    SaltInvalid,
    /// Passphrase could not be obtained from the configured reader.
    PassphraseUnavailable,
    /// Configuration file could not be read or parsed.
    Config,
    /// Two inputs of one batch map to the same output name.
    DuplicateName,
    /// Unexpected state reached within notecrypt logic.
    InternalInvariant,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct NotecryptError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl NotecryptError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that retains the originating source error.
    pub fn with_source(
        category: ErrorCategory,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: None,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }

    /// Whether this failure should stop a whole batch rather than just the
    /// file it occurred on.
    ///
    /// Derivation failures and contract violations point at a systemic
    /// problem; every other kind is local to one file.
    pub fn is_fatal_for_batch(&self) -> bool {
        matches!(
            self.kind,
            Some(ErrorKind::DerivationFailed) | Some(ErrorKind::InvalidInput)
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, NotecryptError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_context_preserves_kind_and_category() {
        let inner = NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::NameTooLong,
            "basename is 300 bytes",
        );
        let outer = inner.with_context("failed to encode todo.txt");

        assert_eq!(outer.category, ErrorCategory::User);
        assert_eq!(outer.kind, Some(ErrorKind::NameTooLong));
        assert_eq!(outer.message(), "failed to encode todo.txt");
        assert_eq!(
            outer.source_error().unwrap().to_string(),
            "basename is 300 bytes"
        );
    }

    #[test]
    fn test_source_is_exposed_through_std_error() {
        let err = NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to read salt",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let source = StdError::source(&err).unwrap();
        assert_eq!(source.to_string(), "denied");
    }

    #[test]
    fn test_fatal_for_batch() {
        let fatal = NotecryptError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::DerivationFailed,
            "scrypt failed",
        );
        let per_file = NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::DecryptionFailed,
            "bad passphrase",
        );
        let untagged = NotecryptError::new(ErrorCategory::Internal, "something");

        assert!(fatal.is_fatal_for_batch());
        assert!(!per_file.is_fatal_for_batch());
        assert!(!untagged.is_fatal_for_batch());
    }
}
