//! Error types for the student portal offline cache.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Lifecycle errors
    #[error("Install of {version} failed at {url}: {reason}")]
    InstallFailed {
        version: String,
        url: String,
        reason: String,
    },

    // Cache errors
    #[error("Cache storage error: {0}")]
    CacheStorage(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error came from the network rather than local state.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}
