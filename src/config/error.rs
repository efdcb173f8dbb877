//! Configuration errors

use std::io;
use std::path::PathBuf;

/// Errors raised while loading, merging or projecting configuration layers
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An explicitly supplied config path does not exist
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A config source does not have the expected shape
    #[error("invalid configuration in {path}: {reason}")]
    Format { path: String, reason: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid hostname: '{0}'")]
    InvalidHostname(String),
}

impl ConfigError {
    pub(crate) fn format(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ConfigError::Format {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
