//! Error types for the cache crate
//!
//! Loader failures are not represented here: they are returned to the
//! caller as the loader's own error type.

use std::io;
use std::path::PathBuf;

/// Errors that can occur while loading, validating or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration key holds a value that cannot be used
    #[error("invalid value for configuration key {key}: {value}")]
    InvalidValue { key: String, value: String },

    /// Reading or writing the configuration file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::CacheConfig`]
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered as TOML
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: impl ToString) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}
