//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for configuration and path handling.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A setting has an unusable value
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// The config file exists but is not valid JSON for `Config`
    #[error("Failed to parse config file {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// `api_url` does not parse
    #[error("Invalid API URL {url:?}: {source}")]
    InvalidApiUrl {
        url: String,
        source: url::ParseError,
    },

    /// No home directory to put `~/.medisecure` in
    #[error("Could not determine home directory")]
    HomeDirNotFound,

    /// Config serialization failed
    #[error("Failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
