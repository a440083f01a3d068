//! Passphrase sources
//!
//! Every reader hands out the passphrase in a [`Zeroizing`] buffer so it is
//! wiped when the caller drops it. Nothing here keeps a passphrase beyond
//! the reader's own lifetime.

use crate::error::{CryptpadError, ErrorCategory, ErrorKind, Result};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

const INITIAL_CAPACITY: usize = 128;
const CHUNK_LEN: usize = 64;

/// Trait for reading passphrases from various sources
pub trait PassphraseReader {
    /// Read a passphrase as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the passphrase wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
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
        let mut data = Zeroizing::new(Vec::with_capacity(INITIAL_CAPACITY));
        let mut chunk = Zeroizing::new([0u8; CHUNK_LEN]);
        loop {
            let n = match self.reader.read(chunk.as_mut_slice()) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(CryptpadError::with_kind_and_source(
                        ErrorCategory::Internal,
                        ErrorKind::Io,
                        format!("error reading passphrase: {}", e),
                        e,
                    ));
                }
            };
            if data.len() + n > data.capacity() {
                // Grow by hand: the replaced buffer is wiped on drop instead
                // of being released by a reallocation.
                let mut grown = Zeroizing::new(Vec::with_capacity((data.len() + n) * 2));
                grown.extend_from_slice(&data);
                data = grown;
            }
            data.extend_from_slice(&chunk[..n]);
        }
        Ok(data)
    }
}

/// Reads passphrase from terminal with no echo
///
/// With confirmation enabled the passphrase is asked for twice and both
/// entries must match, as when choosing the passphrase for a new file.
pub struct TerminalPassphraseReader {
    confirm: bool,
}

impl TerminalPassphraseReader {
    pub fn new() -> Self {
        Self { confirm: false }
    }

    pub fn with_confirmation() -> Self {
        Self { confirm: true }
    }
}

impl Default for TerminalPassphraseReader {
    fn default() -> Self {
        Self::new()
    }
}

fn prompt(text: &str) -> Result<Zeroizing<Vec<u8>>> {
    let mut stderr = io::stderr();
    stderr.write_all(text.as_bytes()).map_err(|e| {
        CryptpadError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to write prompt: {}", e),
            e,
        )
    })?;
    stderr.flush().map_err(|e| {
        CryptpadError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to flush prompt: {}", e),
            e,
        )
    })?;

    // rpassword returns a plain String; move it straight into a zeroizing buffer.
    let passphrase = rpassword::read_password().map_err(|e| {
        CryptpadError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::PassphraseUnavailable,
            format!("failure reading passphrase: {}", e),
            e,
        )
    })?;
    Ok(Zeroizing::new(passphrase.into_bytes()))
}

impl PassphraseReader for TerminalPassphraseReader {
    /// Read passphrase from terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library constraints.
    /// For non-UTF-8 passphrases, use --passphrase-stdin instead.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(CryptpadError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "cannot read passphrase from terminal - stdin is not a terminal",
            ));
        }

        let passphrase = prompt("Passphrase (cryptpad): ")?;
        if self.confirm {
            let again = prompt("Repeat passphrase: ")?;
            if *again != *passphrase {
                return Err(CryptpadError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::PassphraseUnavailable,
                    "passphrases do not match",
                ));
            }
        }
        Ok(passphrase)
    }
}

/// Wraps another PassphraseReader and caches the result
///
/// Provides "at most once" semantics - the upstream reader is called
/// only on the first invocation, and subsequent calls return the cached value.
/// The cached passphrase is wrapped in `Zeroizing` and will be securely wiped
/// when this reader is dropped.
pub struct CachingPassphraseReader {
    upstream: Box<dyn PassphraseReader>,
    cached: Option<Zeroizing<Vec<u8>>>,
}

impl CachingPassphraseReader {
    pub fn new(upstream: Box<dyn PassphraseReader>) -> Self {
        Self {
            upstream,
            cached: None,
        }
    }
}

impl PassphraseReader for CachingPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if let Some(cached) = &self.cached {
            return Ok(Zeroizing::new(cached.to_vec()));
        }
        let passphrase = self.upstream.read_passphrase()?;
        let copy = Zeroizing::new(passphrase.to_vec());
        self.cached = Some(passphrase);
        Ok(copy)
    }
}
