//! Error types for wp-recon

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a reconnaissance run
///
/// Only [`Error::DomainList`] and [`Error::Config`] are fatal for a run; the
/// transport variants are recovered per probe as "absent".
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to create HTTP client
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpRequest(String),

    /// HTTP response error status
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    /// The domain list could not be opened or read
    #[error("cannot read domain list {}: {source}", path.display())]
    DomainList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Invalid summary format specified
    #[error("invalid output format: '{0}' (valid: human, json, none)")]
    InvalidOutputFormat(String),

    /// Output operation failed
    #[error("output failed: {0}")]
    OutputFailed(#[source] std::io::Error),

    /// JSON serialization failed
    #[error("JSON serialization failed")]
    SerializationFailed(#[from] serde_json::Error),
}
