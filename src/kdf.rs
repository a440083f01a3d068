//! Passphrase key derivation
//!
//! PBKDF2 with HMAC-SHA-256, a fixed iteration count and a 256-bit output.
//! The iteration count is part of container format version 1: it is not
//! stored alongside the ciphertext, so changing it requires a new version.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length of the per-encryption salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of the derived key in bytes
pub const KEY_LEN: usize = 32;

/// PBKDF2-HMAC-SHA256 rounds (OWASP 2023 recommendation).
pub const PBKDF2_ROUNDS: u32 = 600_000;

/// Derive a 32-byte key from a passphrase and salt.
///
/// Keys are never cached: every encrypt and decrypt call derives afresh.
/// The returned key is wiped when dropped.
pub fn derive_key(passphrase: &[u8], salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(passphrase, salt, PBKDF2_ROUNDS, key.as_mut_slice());
    key
}
