//! Passphrase reading functionality

use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Trait for reading passphrases from various sources
pub trait PassphraseReader {
    /// Read a passphrase as raw bytes.
    ///
    /// Returns the passphrase wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped. UTF-8 validation happens at key
    /// derivation.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed passphrase (for testing)
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<Vec<u8>>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: Vec<u8>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.passphrase).clone()))
    }
}

/// Reads passphrase from any io::Read source
///
/// A single trailing newline (`\n` or `\r\n`) is stripped, so
/// `echo secret | notecrypt --passphrase-stdin ...` does what it looks like.
pub struct ReaderPassphraseReader {
    reader: Box<dyn Read>,
}

impl ReaderPassphraseReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PassphraseReader for ReaderPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            NotecryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading passphrase: {}", e),
                e,
            )
        })?;
        if data.last() == Some(&b'\n') {
            data.pop();
            if data.last() == Some(&b'\r') {
                data.pop();
            }
        }
        Ok(data)
    }
}

/// Reads passphrase from terminal with no echo
pub struct TerminalPassphraseReader {
    confirm: bool,
}

impl TerminalPassphraseReader {
    pub fn new() -> Self {
        Self { confirm: false }
    }

    /// Ask twice and fail unless both entries match. Used when encrypting,
    /// where a typo would silently produce envelopes nobody can open.
    pub fn confirming() -> Self {
        Self { confirm: true }
    }
}

impl Default for TerminalPassphraseReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    /// Read passphrase from terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library constraints.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(NotecryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "cannot read passphrase from terminal - stdin is not a terminal",
            ));
        }

        let passphrase = prompt("Passphrase (notecrypt): ")?;
        if self.confirm {
            let again = prompt("Repeat passphrase: ")?;
            if again != passphrase {
                return Err(NotecryptError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::PassphraseUnavailable,
                    "passphrases do not match",
                ));
            }
        }
        Ok(passphrase)
    }
}

fn prompt(text: &str) -> Result<Zeroizing<Vec<u8>>> {
    io::stderr().write_all(text.as_bytes()).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to write prompt: {}", e),
            e,
        )
    })?;
    io::stderr().flush().map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to flush prompt: {}", e),
            e,
        )
    })?;

    // Read password *without echo*
    // Note: rpassword returns String (UTF-8 only), not zeroized
    let passphrase = rpassword::read_password().map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::PassphraseUnavailable,
            format!("failure reading passphrase: {}", e),
            e,
        )
    })?;

    Ok(Zeroizing::new(passphrase.into_bytes()))
}
