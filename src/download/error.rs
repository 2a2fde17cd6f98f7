use thiserror::Error;

use super::service::DownloadId;

/// Why a download could not be started or driven by the download service
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Download rejected: {0}")]
    Rejected(String),

    #[error("Invalid download URL '{0}'")]
    InvalidUrl(String),

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download {0} not found")]
    NotFound(DownloadId),
}

/// History and settings file errors. Callers treat these as best-effort.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Failure to talk to a running orchestrator
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Queue orchestrator is not running")]
    Closed,

    #[error(transparent)]
    Options(#[from] super::item::OptionsError),
}
