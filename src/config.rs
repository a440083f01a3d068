//! Codec configuration, passed explicitly to [`crate::codec::Codec`]
//!
//! ```toml
//! legacy_fallback = true   # accept pre-GCM files
//! wrap_width = 64          # hard-wrap armored Base64; 0 keeps one line
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{CryptpadError, ErrorCategory, ErrorKind, Result};

/// Narrowest hard-wrap width accepted; one Base64 quantum.
pub const MIN_WRAP_WIDTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Try the legacy reader when a payload is not a modern container.
    pub legacy_fallback: bool,
    /// Characters per armored payload line; 0 disables wrapping.
    pub wrap_width: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            legacy_fallback: true,
            wrap_width: 0,
        }
    }
}

fn config_error(msg: impl Into<String>) -> CryptpadError {
    CryptpadError::with_kind(ErrorCategory::User, ErrorKind::ConfigInvalid, msg)
}

impl CodecConfig {
    pub fn validate(&self) -> Result<()> {
        if self.wrap_width != 0 && self.wrap_width < MIN_WRAP_WIDTH {
            return Err(config_error(format!(
                "wrap_width must be 0 or at least {}, got {}",
                MIN_WRAP_WIDTH, self.wrap_width
            )));
        }
        Ok(())
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| {
            CryptpadError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::ConfigInvalid,
                format!("failed to parse config: {}", e.message()),
                e,
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CryptpadError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to read config {}", path.display()),
                e,
            )
        })?;
        Self::from_toml_str(&text).map_err(|e| e.with_context(format!("in config {}", path.display())))
    }
}
