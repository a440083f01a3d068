//! Versioned binary container and its Base64 presentation
//!
//! Layout (format version 1):
//!   version[1] || salt[16] || nonce[12] || ciphertext || tag[16]
//!
//! The tag is not split off here; it travels with the ciphertext and is
//! consumed by the AEAD in [`crate::secretcrypt`].

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::error::{CryptpadError, ErrorCategory, ErrorKind, Result};
use crate::kdf::SALT_LEN;

/// The only container version this codec reads or writes.
pub const FORMAT_VERSION: u8 = 1;

/// AES-GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Fixed-size prefix: version + salt + nonce
pub const HEADER_LEN: usize = 1 + SALT_LEN + NONCE_LEN; // 29

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub version: u8,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the trailing authentication tag.
    pub sealed: Vec<u8>,
}

impl Container {
    pub fn new(salt: [u8; SALT_LEN], nonce: [u8; NONCE_LEN], sealed: Vec<u8>) -> Self {
        Self {
            version: FORMAT_VERSION,
            salt,
            nonce,
            sealed,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.sealed.len());
        out.push(self.version);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.sealed);
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(CryptpadError::format(
                ErrorKind::TruncatedInput,
                format!(
                    "container is {} bytes, shorter than the {} byte header; likely truncated",
                    data.len(),
                    HEADER_LEN
                ),
            ));
        }

        let version = data[0];
        if version != FORMAT_VERSION {
            return Err(CryptpadError::format(
                ErrorKind::UnsupportedVersion,
                format!("unsupported container version {}", version),
            ));
        }

        let mut pos = 1;
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&data[pos..pos + SALT_LEN]);
        pos += SALT_LEN;

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&data[pos..pos + NONCE_LEN]);
        pos += NONCE_LEN;

        Ok(Self {
            version,
            salt,
            nonce,
            sealed: data[pos..].to_vec(),
        })
    }

    /// Standard (padded) Base64 of the binary layout.
    pub fn serialize(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn parse(encoded: &str) -> Result<Self> {
        let data = decode_base64(encoded)?;
        Self::from_bytes(&data)
    }
}

pub(crate) fn decode_base64(encoded: &str) -> Result<Vec<u8>> {
    STANDARD.decode(encoded).map_err(|e| {
        CryptpadError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::ArmoringDecode,
            format!("base64 decoding failed: {}", e),
            e,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Container {
        Container::new([0x42; SALT_LEN], [0x24; NONCE_LEN], vec![0xAB; 20])
    }

    #[test]
    fn test_layout_order() {
        let bytes = sample().to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN + 20);
        assert_eq!(bytes[0], FORMAT_VERSION);
        assert_eq!(&bytes[1..17], &[0x42; 16]);
        assert_eq!(&bytes[17..29], &[0x24; 12]);
        assert_eq!(&bytes[29..], &[0xAB; 20]);
    }

    #[test]
    fn test_parse_serialize() {
        let container = sample();
        let parsed = Container::parse(&container.serialize()).unwrap();
        assert_eq!(parsed, container);
    }

    #[test]
    fn test_header_only_is_accepted() {
        let container = Container::new([1; SALT_LEN], [2; NONCE_LEN], Vec::new());
        let parsed = Container::from_bytes(&container.to_bytes()).unwrap();
        assert!(parsed.sealed.is_empty());
    }

    #[test]
    fn test_truncated() {
        let bytes = sample().to_bytes();
        let err = Container::from_bytes(&bytes[..HEADER_LEN - 1]).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_empty_input() {
        let err = Container::parse("").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
    }

    #[test]
    fn test_version_99_rejected() {
        let mut container = sample();
        container.version = 99;
        let err = Container::parse(&container.serialize()).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::UnsupportedVersion));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_bad_base64() {
        let err = Container::parse("not$base64!").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::ArmoringDecode));
    }

    #[test]
    fn test_known_encoding() {
        let container = Container::new([0; SALT_LEN], [0; NONCE_LEN], vec![0xFF; 3]);
        // 0x01 followed by 28 zero bytes and ff ff ff
        assert_eq!(
            container.serialize(),
            "AQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAD///8="
        );
    }
}
