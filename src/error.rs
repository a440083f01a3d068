use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee the error is not, for example,
    /// caused by the user - merely that it cannot be confidently determined
    /// by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Armor banners/markers are missing, out of order, or enclose nothing.
    ArmoringInvalid,
    /// Base64 decoding of the armored payload failed.
    ArmoringDecode,
    /// The container carries a version byte we do not understand.
    UnsupportedVersion,
    /// Input ended before the fixed-size container fields could be read.
    TruncatedInput,
    /// The decrypted document markup is malformed or lacks required structure.
    MarkupInvalid,
    /// Authentication failed due to an incorrect passphrase or tampering
    /// or corruption. Deliberately never says which.
    AuthenticationFailed,
    /// A tree restructuring would have created a cycle or targeted an
    /// illegal position. The tree is left unchanged.
    InvalidMove,
    /// An entry title was empty.
    InvalidTitle,
    /// An entry reference does not (or no longer) exist in the document.
    EntryNotFound,
    /// A file name does not carry an extension we read or write.
    UnsupportedExtension,
    /// Passphrase could not be obtained, or was empty.
    PassphraseUnavailable,
    /// The operating system random source failed.
    RandomSource,
    /// A configuration file or value is invalid.
    ConfigInvalid,
    /// Unexpected state reached within cryptpad logic.
    InternalInvariant,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct CryptpadError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl CryptpadError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The single error reported for every AEAD or legacy decryption failure.
    pub(crate) fn authentication_failed() -> Self {
        Self::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "wrong passphrase or corrupted data",
        )
    }

    pub(crate) fn format(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorCategory::User, kind, msg)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }

    /// Malformed armor, container, or markup, or an unsupported version.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self.kind,
            Some(
                ErrorKind::ArmoringInvalid
                    | ErrorKind::ArmoringDecode
                    | ErrorKind::UnsupportedVersion
                    | ErrorKind::TruncatedInput
                    | ErrorKind::MarkupInvalid
            )
        )
    }

    /// Wrong passphrase or tampered/corrupted ciphertext.
    pub fn is_authentication_failure(&self) -> bool {
        self.kind == Some(ErrorKind::AuthenticationFailed)
    }

    pub fn is_invalid_move(&self) -> bool {
        self.kind == Some(ErrorKind::InvalidMove)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CryptpadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_preserves_kind() {
        let err = CryptpadError::format(ErrorKind::TruncatedInput, "too short")
            .with_context("failed to open");
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
        assert_eq!(err.category, ErrorCategory::User);
        assert_eq!(err.message(), "failed to open");
        assert!(err.is_format_error());
        assert_eq!(err.source_error().unwrap().to_string(), "too short");
    }

    #[test]
    fn test_authentication_failure_is_not_format_error() {
        let err = CryptpadError::authentication_failed();
        assert!(err.is_authentication_failure());
        assert!(!err.is_format_error());
        assert_eq!(err.to_string(), "wrong passphrase or corrupted data");
    }

    #[test]
    fn test_untagged_error_matches_no_class() {
        let err = CryptpadError::new(ErrorCategory::Internal, "boom");
        assert!(!err.is_format_error());
        assert!(!err.is_authentication_failure());
        assert!(!err.is_invalid_move());
    }
}
