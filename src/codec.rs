//! Whole-document and free-text encryption
//!
//! Documents are serialized to markup and armored as [`ArmorKind::File`];
//! free text is armored as [`ArmorKind::Message`]. Both go through the same
//! container and the same legacy fallback rules.

use tracing::debug;

use crate::config::CodecConfig;
use crate::document::Document;
use crate::error::{CryptpadError, ErrorCategory, ErrorKind, Result};
use crate::markup;
use crate::secretcrypt::{self, CipherScheme, Opened};
use crate::varmor::{self, ArmorKind};

/// A document read back from armored text.
#[derive(Debug)]
pub struct Decoded {
    pub document: Document,
    /// `LegacyInsecure` means the next save will upgrade the file.
    pub scheme: CipherScheme,
}

#[derive(Debug, Clone, Default)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn seal(&self, kind: ArmorKind, plaintext: &[u8], passphrase: &[u8]) -> Result<String> {
        let container = secretcrypt::encrypt(passphrase, plaintext)?;
        Ok(varmor::frame(kind, &container.serialize(), self.config.wrap_width))
    }

    fn open(&self, armored: &str, passphrase: &[u8]) -> Result<Opened> {
        let payload = varmor::extract(armored)?;
        secretcrypt::open_payload(passphrase, &payload, self.config.legacy_fallback)
    }

    /// Serialize and encrypt a document into the text stored on disk.
    pub fn encrypt_document(&self, doc: &Document, passphrase: &[u8]) -> Result<String> {
        let text = markup::to_text(doc)?;
        let armored = self.seal(ArmorKind::File, text.as_bytes(), passphrase)?;
        debug!(entries = doc.len(), "document encrypted");
        Ok(armored)
    }

    /// Decrypt and parse stored document text.
    pub fn decrypt_document(&self, armored: &str, passphrase: &[u8]) -> Result<Decoded> {
        let opened = self.open(armored, passphrase)?;
        let text = utf8(opened.plaintext)?;
        let document = markup::from_text(&text)?;
        Ok(Decoded {
            document,
            scheme: opened.scheme,
        })
    }

    pub fn encrypt_text(&self, plaintext: &str, passphrase: &[u8]) -> Result<String> {
        self.seal(ArmorKind::Message, plaintext.as_bytes(), passphrase)
    }

    pub fn decrypt_text(&self, armored: &str, passphrase: &[u8]) -> Result<String> {
        let opened = self.open(armored, passphrase)?;
        utf8(opened.plaintext)
    }
}

fn utf8(plaintext: Vec<u8>) -> Result<String> {
    String::from_utf8(plaintext).map_err(|e| {
        CryptpadError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::MarkupInvalid,
            "decrypted data is not valid UTF-8 text",
            e,
        )
    })
}

/// [`Codec::encrypt_document`] with the default configuration.
pub fn encrypt_document(doc: &Document, passphrase: &[u8]) -> Result<String> {
    Codec::default().encrypt_document(doc, passphrase)
}

/// [`Codec::decrypt_document`] with the default configuration.
pub fn decrypt_document(armored: &str, passphrase: &[u8]) -> Result<Document> {
    Ok(Codec::default().decrypt_document(armored, passphrase)?.document)
}

pub fn encrypt_text(plaintext: &str, passphrase: &[u8]) -> Result<String> {
    Codec::default().encrypt_text(plaintext, passphrase)
}

pub fn decrypt_text(armored: &str, passphrase: &[u8]) -> Result<String> {
    Codec::default().decrypt_text(armored, passphrase)
}
