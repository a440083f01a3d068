//! Legacy (insecure) reader for files written before the AES-GCM container
//!
//! Those files hold the raw Base64 of AES-128-ECB/PKCS#5 ciphertext. The key
//! is what a SHA1PRNG seeded with the Base64 MD5 digest of the passphrase
//! emits first: SHA-1(SHA-1(seed)), truncated to 16 bytes.
//!
//! Decrypt only. Nothing in this crate ever writes this format.

use aes::Aes128;
use aes::cipher::{BlockDecrypt, KeyInit, generic_array::GenericArray};
use base64::{Engine, engine::general_purpose::STANDARD};
use md5::Md5;
use sha1::{Digest, Sha1};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptpadError, Result};

const BLOCK_LEN: usize = 16;
const KEY_LEN: usize = 16;

fn derive_legacy_key(passphrase: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut digest = Md5::digest(passphrase);
    let seed = Zeroizing::new(STANDARD.encode(digest.as_slice()));
    digest.as_mut_slice().zeroize();

    let mut state = Sha1::digest(seed.as_bytes());
    let mut output = Sha1::digest(state.as_slice());
    state.as_mut_slice().zeroize();

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&output[..KEY_LEN]);
    output.as_mut_slice().zeroize();
    key
}

/// Whether `data` could be legacy ciphertext at all (a whole, non-zero
/// number of AES blocks).
pub fn is_block_aligned(data: &[u8]) -> bool {
    !data.is_empty() && data.len() % BLOCK_LEN == 0
}

/// Decrypt raw legacy ciphertext bytes.
///
/// Any failure (bad shape, bad padding or non-UTF-8 output, which is what
/// a wrong passphrase produces) is reported as an authentication failure,
/// exactly like the modern scheme.
pub fn decrypt_bytes(passphrase: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if !is_block_aligned(ciphertext) {
        return Err(CryptpadError::authentication_failed());
    }

    let key = derive_legacy_key(passphrase);
    let cipher = Aes128::new(GenericArray::from_slice(key.as_slice()));

    let mut buf = Zeroizing::new(ciphertext.to_vec());
    for block in buf.chunks_exact_mut(BLOCK_LEN) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    let pad = usize::from(buf[buf.len() - 1]);
    if pad == 0
        || pad > BLOCK_LEN
        || buf[buf.len() - pad..]
            .iter()
            .any(|&b| usize::from(b) != pad)
    {
        return Err(CryptpadError::authentication_failed());
    }

    // Legacy writers only ever encrypted UTF-8 text; anything else means a
    // wrong key that happened to produce valid padding.
    let plain_len = buf.len() - pad;
    if std::str::from_utf8(&buf[..plain_len]).is_err() {
        return Err(CryptpadError::authentication_failed());
    }
    Ok(buf[..plain_len].to_vec())
}

/// Decrypt a legacy Base64 payload.
pub fn decrypt(passphrase: &[u8], encoded: &str) -> Result<Vec<u8>> {
    let data = crate::container::decode_base64(encoded)?;
    decrypt_bytes(passphrase, &data)
}
