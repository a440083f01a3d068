//! DA-CryptPad - password-encrypted tree notebook
//!
//! A document is a tree of titled text entries. It is serialized to XML
//! markup, sealed with AES-256-GCM under a PBKDF2-derived key and stored as
//! ASCII-armored Base64. Files from older releases (AES-128-ECB) can still
//! be opened and are upgraded on the next save.

#![forbid(unsafe_code)]

pub mod codec;
pub mod config;
pub mod container;
pub mod document;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod legacy;
pub mod markup;
pub mod passgen;
pub mod passphrase;
pub mod secretcrypt;
pub mod varmor;

pub use codec::{Codec, Decoded};
pub use config::CodecConfig;
pub use document::{Change, Document, EntryId, EntryTree};
pub use error::{CryptpadError, ErrorCategory, ErrorKind, Result};
pub use secretcrypt::CipherScheme;
pub use varmor::ArmorKind;
