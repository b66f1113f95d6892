use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for aftx application glue.
pub type Result<T> = anyhow::Result<T>;

/// Failure taxonomy of the flashing core.
///
/// Every variant is recoverable at the orchestration level: it maps to a user-facing message
/// and either a retry (download, extraction) or a safe stop (flash abort).
#[derive(Error, Debug)]
pub enum FlashToolError {
    #[error("Could not start {program}: {reason}")]
    ProcessSpawnFailure { program: String, reason: String },

    #[error("No {transport} device found")]
    TransportParseEmpty { transport: String },

    #[error("Download failed for {url}: {reason}")]
    DownloadFailure { url: String, reason: String },

    #[error("No extractor produced image files from {} (tried: {})", .archive.display(), .tried.join(", "))]
    ExtractionExhausted { archive: PathBuf, tried: Vec<String> },

    #[error("Flashing {partition} failed")]
    FlashFailure { partition: String },

    #[error("Operation aborted by user")]
    UserAborted,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlashToolError {
    pub(crate) fn download(url: &str, reason: impl std::fmt::Display) -> Self {
        FlashToolError::DownloadFailure {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
