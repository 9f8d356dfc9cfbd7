//! notecrypt - passphrase-based encryption of notes into content-addressed envelopes
//!
//! A note `(basename, payload)` is framed, encrypted with AES-256-GCM under a
//! key derived by scrypt from a passphrase and a salt file, and stored under
//! a filename derived from the basename alone.

#![forbid(unsafe_code)]

pub mod cipher;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod log;
pub mod namer;
pub mod passphrase;
pub mod salt;

pub use codec::Notecrypt;
pub use envelope::{CipheredObject, DecipheredObject};
pub use error::{ErrorCategory, ErrorKind, NotecryptError, Result};
pub use kdf::SecretKey;
pub use namer::DigestId;
pub use salt::SaltBuffer;
