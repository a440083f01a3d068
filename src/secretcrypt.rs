//! Encryption/decryption using PBKDF2-HMAC-SHA256 + AES-256-GCM
//!
//! This module implements passphrase-based authenticated encryption using:
//! - PBKDF2 for key derivation from passphrase (see [`crate::kdf`])
//! - AES-256 in Galois/Counter Mode with a 128-bit tag
//!
//! Every call samples a fresh salt and nonce, so encrypting the same
//! plaintext twice under the same passphrase yields unlinkable containers.
//! Reading files from before the GCM format goes through
//! [`CipherScheme::LegacyInsecure`]; writing always uses
//! [`CipherScheme::Modern`].

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::{debug, warn};

use crate::container::{self, Container, FORMAT_VERSION, NONCE_LEN};
use crate::error::{CryptpadError, ErrorCategory, ErrorKind, Result};
use crate::kdf::{self, SALT_LEN};
use crate::legacy;

/// Which cipher scheme protected a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherScheme {
    /// Version 1 container: PBKDF2-HMAC-SHA256 + AES-256-GCM.
    Modern,
    /// Pre-container files: AES-128-ECB keyed from an MD5 digest. Read only.
    LegacyInsecure,
}

/// A decrypted payload together with the scheme that protected it.
#[derive(Debug)]
pub struct Opened {
    pub plaintext: Vec<u8>,
    pub scheme: CipherScheme,
}

fn require_passphrase(passphrase: &[u8]) -> Result<()> {
    if passphrase.is_empty() {
        return Err(CryptpadError::with_kind(
            ErrorCategory::User,
            ErrorKind::PassphraseUnavailable,
            "passphrase must not be empty",
        ));
    }
    Ok(())
}

/// Encrypt plaintext with a passphrase using the operating system RNG
pub fn encrypt(passphrase: &[u8], plaintext: &[u8]) -> Result<Container> {
    encrypt_with_rng(&mut OsRng, passphrase, plaintext)
}

/// Encrypt plaintext with a passphrase, sampling salt and nonce from `rng`
pub fn encrypt_with_rng<R>(rng: &mut R, passphrase: &[u8], plaintext: &[u8]) -> Result<Container>
where
    R: RngCore + CryptoRng,
{
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    for buf in [&mut salt[..], &mut nonce[..]] {
        rng.try_fill_bytes(buf).map_err(|e| {
            CryptpadError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::RandomSource,
                "secure random source failed",
                e,
            )
        })?;
    }

    encrypt_deterministic(passphrase, plaintext, &salt, &nonce)
}

/// Encrypt plaintext with a passphrase using provided salt and nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random salt/nonce.
pub fn encrypt_deterministic(
    passphrase: &[u8],
    plaintext: &[u8],
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<Container> {
    require_passphrase(passphrase)?;

    let key = kdf::derive_key(passphrase, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
    let sealed = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| {
            CryptpadError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "AES-GCM encryption failed",
            )
        })?;

    Ok(Container::new(*salt, *nonce, sealed))
}

/// Decrypt a parsed container with a passphrase
pub fn decrypt(passphrase: &[u8], container: &Container) -> Result<Vec<u8>> {
    if container.version != FORMAT_VERSION {
        return Err(CryptpadError::format(
            ErrorKind::UnsupportedVersion,
            format!("unsupported container version {}", container.version),
        ));
    }
    require_passphrase(passphrase)?;

    let key = kdf::derive_key(passphrase, &container.salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
    cipher
        .decrypt(Nonce::from_slice(&container.nonce), container.sealed.as_slice())
        .map_err(|_| CryptpadError::authentication_failed())
}

/// Decrypt a whitespace-free Base64 payload, modern format first.
///
/// With `legacy_fallback` set, the legacy reader is tried when the payload
/// is not a modern container, or when it parsed as one only by accident of
/// its first byte and failed authentication. Either way the caller sees a
/// single authentication failure if nothing decrypts.
pub fn open_payload(passphrase: &[u8], encoded: &str, legacy_fallback: bool) -> Result<Opened> {
    require_passphrase(passphrase)?;
    let raw = container::decode_base64(encoded)?;
    let may_be_legacy = legacy_fallback && legacy::is_block_aligned(&raw);

    let modern_err = match Container::from_bytes(&raw) {
        Ok(parsed) => match decrypt(passphrase, &parsed) {
            Ok(plaintext) => {
                debug!(scheme = ?CipherScheme::Modern, "payload decrypted");
                return Ok(Opened {
                    plaintext,
                    scheme: CipherScheme::Modern,
                });
            }
            Err(e) => e,
        },
        Err(e) => e,
    };

    if !may_be_legacy {
        return Err(modern_err);
    }

    debug!(error = %modern_err, "not a modern container; trying legacy reader");
    match legacy::decrypt_bytes(passphrase, &raw) {
        Ok(plaintext) => {
            warn!("payload uses the legacy ECB scheme; it will be re-encrypted on next save");
            Ok(Opened {
                plaintext,
                scheme: CipherScheme::LegacyInsecure,
            })
        }
        Err(_) => Err(CryptpadError::authentication_failed()),
    }
}
