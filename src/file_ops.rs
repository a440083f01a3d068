//! Document and text file operations
//!
//! Documents live in `*.cryptpad` files. The older `*.jcryptpad` extension
//! is accepted when opening, never when saving: [`save_path_for`] maps it to
//! the current one.
//!
//! Saves replace the whole file atomically (tempfile in the same
//! directory, fsync, rename), so a crash leaves either the old file or the
//! new one, never a partial write.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::codec::{Codec, Decoded};
use crate::config::CodecConfig;
use crate::document::Document;
use crate::error::{CryptpadError, ErrorCategory, ErrorKind, Result};
use crate::passphrase::PassphraseReader;
use crate::secretcrypt::CipherScheme;

/// Extension written on save.
pub const EXTENSION: &str = "cryptpad";

/// Extension of files from older releases; read only.
pub const LEGACY_EXTENSION: &str = "jcryptpad";

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether `path` names a file [`open_document`] will read.
pub fn is_document_path(path: &Path) -> bool {
    matches!(extension_of(path).as_deref(), Some(EXTENSION | LEGACY_EXTENSION))
}

/// Where a document opened from or named `path` gets saved.
///
/// `x.cryptpad` stays as is, `x.jcryptpad` becomes `x.cryptpad`, and any
/// other name gets `.cryptpad` appended.
pub fn save_path_for(path: &Path) -> PathBuf {
    match extension_of(path).as_deref() {
        Some(EXTENSION) => path.to_path_buf(),
        Some(LEGACY_EXTENSION) => path.with_extension(EXTENSION),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".");
            name.push(EXTENSION);
            PathBuf::from(name)
        }
    }
}

/// Open and decrypt a document file.
pub fn open_document(
    path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
    config: &CodecConfig,
) -> Result<Decoded> {
    if !is_document_path(path) {
        return Err(CryptpadError::with_kind(
            ErrorCategory::User,
            ErrorKind::UnsupportedExtension,
            format!(
                "{} is not a .{} or .{} file",
                path.display(),
                EXTENSION,
                LEGACY_EXTENSION
            ),
        ));
    }

    let armored = read_text(path)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let decoded = Codec::new(config.clone())
        .decrypt_document(&armored, &passphrase)
        .map_err(|e| e.with_context(format!("failed to open {}", path.display())))?;

    if decoded.scheme == CipherScheme::LegacyInsecure {
        info!(path = %path.display(), "document uses the legacy cipher; saving will upgrade it");
    }
    debug!(path = %path.display(), entries = decoded.document.len(), "document opened");
    Ok(decoded)
}

/// Encrypt `doc` and save it under [`save_path_for`]`(path)`.
///
/// Returns the path actually written.
pub fn save_document(
    path: &Path,
    doc: &Document,
    passphrase_reader: &mut dyn PassphraseReader,
    config: &CodecConfig,
) -> Result<PathBuf> {
    let target = save_path_for(path);
    let passphrase = passphrase_reader.read_passphrase()?;
    let armored = Codec::new(config.clone())
        .encrypt_document(doc, &passphrase)
        .map_err(|e| e.with_context("encryption failed"))?;
    write_atomic(&target, armored.as_bytes())?;
    debug!(path = %target.display(), entries = doc.len(), "document saved");
    Ok(target)
}

/// Encrypt a UTF-8 text file into message armor.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encrypt_text_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
    config: &CodecConfig,
) -> Result<()> {
    let plaintext = read_text(input_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let armored = Codec::new(config.clone())
        .encrypt_text(&plaintext, &passphrase)
        .map_err(|e| e.with_context("encryption failed"))?;
    write_file_secure(output_path, armored.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))
}

/// Decrypt message (or file) armor back into a text file.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn decrypt_text_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
    config: &CodecConfig,
) -> Result<()> {
    let armored = read_text(input_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let plaintext = Codec::new(config.clone())
        .decrypt_text(&armored, &passphrase)
        .map_err(|e| e.with_context("failed to decrypt"))?;
    write_file_secure(output_path, plaintext.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))
}

/// Read a whole file as UTF-8 text.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    String::from_utf8(bytes).map_err(|e| {
        CryptpadError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} is not valid UTF-8", path.display()),
            e,
        )
    })
}

fn io_error(msg: impl Into<String>, err: io::Error) -> CryptpadError {
    CryptpadError::with_kind_and_source(ErrorCategory::Internal, ErrorKind::Io, msg, err)
}

/// Replace `path` with `contents` atomically, mode 0o600 on Unix.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| io_error(format!("failed to create tempfile in {}", dir.display()), e))?;

    temp_file
        .write_all(contents)
        .map_err(|e| io_error("failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| io_error("failed to flush tempfile", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| io_error("failed to sync file prior to rename", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| io_error("failed to get tempfile metadata", e))?
            .permissions();
        perms.set_mode(0o600);
        temp_file
            .as_file()
            .set_permissions(perms)
            .map_err(|e| io_error("failed to set tempfile permissions", e))?;
    }

    temp_file.persist(path).map_err(|e| {
        CryptpadError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                CryptpadError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        file.write_all(contents)
            .map_err(|e| io_error(format!("failed to write {}", path.display()), e))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            CryptpadError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

fn read_error(path: &Path, err: io::Error) -> CryptpadError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    CryptpadError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
