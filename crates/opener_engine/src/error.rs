use thiserror::Error;

use crate::PersistError;

/// Failures reported by host platform calls.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("not found: {0}")]
    NotFound(String),
    /// The receiving end does not exist, e.g. a bridge that was never injected.
    #[error("receiver unavailable: {0}")]
    Unavailable(String),
    #[error("rejected by host: {0}")]
    Rejected(String),
    #[error("storage error: {0}")]
    Storage(#[from] PersistError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}
