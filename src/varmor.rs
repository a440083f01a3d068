//! ASCII armor around the Base64 container
//!
//! The armored format is:
//!
//! ```text
//! -----BEGIN ENCRYPTED FILE-----        (or ... MESSAGE-----)
//! Version: DA-CryptPad <version>
//!
//! -----BEGIN-----
//! <base64 container, optionally hard-wrapped>
//! -----END ENCRYPTED MESSAGE-----
//! ```
//!
//! The banner strings are wire format: files written years ago must still
//! unwrap. Reading only looks for the kind-independent begin-content marker
//! and the end banner, so a `File` armor and a `Message` armor decode alike.

use crate::error::{CryptpadError, ErrorKind, Result};
use crate::secretcrypt;

const BEGIN_MESSAGE: &str = "-----BEGIN ENCRYPTED MESSAGE-----";
const BEGIN_FILE: &str = "-----BEGIN ENCRYPTED FILE-----";
const BEGIN_CONTENT: &str = "-----BEGIN-----";
const END_MARKER: &str = "-----END ENCRYPTED MESSAGE-----";

/// Product name written on the version line.
pub const PRODUCT_NAME: &str = "DA-CryptPad";

/// What the armored payload holds. Only affects the first banner line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmorKind {
    /// Free text encrypted outside any document.
    Message,
    /// A whole serialized document.
    File,
}

impl ArmorKind {
    fn banner(self) -> &'static str {
        match self {
            ArmorKind::Message => BEGIN_MESSAGE,
            ArmorKind::File => BEGIN_FILE,
        }
    }

    /// Best-effort guess of the kind from the banner. Informational only;
    /// [`extract`] never consults it.
    pub fn detect(armored: &str) -> Option<ArmorKind> {
        let file = armored.find(BEGIN_FILE);
        let message = armored.find(BEGIN_MESSAGE);
        match (file, message) {
            (Some(f), Some(m)) if m < f => Some(ArmorKind::Message),
            (Some(_), _) => Some(ArmorKind::File),
            (None, Some(_)) => Some(ArmorKind::Message),
            (None, None) => None,
        }
    }
}

fn version_line() -> String {
    format!("Version: {} {}", PRODUCT_NAME, env!("CARGO_PKG_VERSION"))
}

/// Frame a Base64 payload in armor.
///
/// `wrap_width` of 0 keeps the payload on a single line.
pub fn frame(kind: ArmorKind, payload: &str, wrap_width: usize) -> String {
    let mut out = String::with_capacity(payload.len() + 160);
    out.push_str(kind.banner());
    out.push('\n');
    out.push_str(&version_line());
    out.push_str("\n\n");
    out.push_str(BEGIN_CONTENT);
    out.push('\n');

    if wrap_width == 0 {
        out.push_str(payload);
        out.push('\n');
    } else {
        // Base64 is pure ASCII so byte chunks are char boundaries.
        for line in payload.as_bytes().chunks(wrap_width) {
            out.push_str(&String::from_utf8_lossy(line));
            out.push('\n');
        }
    }

    out.push_str(END_MARKER);
    out
}

/// Pull the Base64 payload out of armored text, all whitespace removed.
pub fn extract(armored: &str) -> Result<String> {
    let start = armored.find(BEGIN_CONTENT).ok_or_else(|| {
        CryptpadError::format(
            ErrorKind::ArmoringInvalid,
            "input unrecognized as encrypted data: begin marker missing",
        )
    })?;
    let end = armored.find(END_MARKER).ok_or_else(|| {
        CryptpadError::format(
            ErrorKind::ArmoringInvalid,
            "encrypted data is incomplete: end marker missing",
        )
    })?;

    let body_start = start + BEGIN_CONTENT.len();
    if end < body_start {
        return Err(CryptpadError::format(
            ErrorKind::ArmoringInvalid,
            "end marker precedes begin marker",
        ));
    }

    let payload: String = armored[body_start..end]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if payload.is_empty() {
        return Err(CryptpadError::format(
            ErrorKind::ArmoringInvalid,
            "encrypted data contains no content",
        ));
    }
    Ok(payload)
}

/// Encrypt `plaintext` and armor it.
pub fn wrap(kind: ArmorKind, plaintext: &[u8], passphrase: &[u8]) -> Result<String> {
    let container = secretcrypt::encrypt(passphrase, plaintext)?;
    Ok(frame(kind, &container.serialize(), 0))
}

/// Unarmor and decrypt text produced by [`wrap`] with either kind.
///
/// Legacy payloads are accepted too; see [`secretcrypt::open_payload`].
pub fn unwrap(armored: &str, passphrase: &[u8]) -> Result<Vec<u8>> {
    let payload = extract(armored)?;
    let opened = secretcrypt::open_payload(passphrase, &payload, true)?;
    Ok(opened.plaintext)
}
