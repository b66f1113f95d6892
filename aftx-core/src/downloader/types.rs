use std::path::PathBuf;

/// Progress of one transfer, reported once per chunk read from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub transferred: u64,
    /// `None` when the server did not announce a usable length.
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Percentage complete, or `None` when the total is unknown.
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => {
                Some((self.transferred as f64 / total as f64 * 100.0).min(100.0))
            }
            _ => None,
        }
    }
}

/// A completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSession {
    pub url: String,
    pub destination: PathBuf,
    pub expected: Option<u64>,
    pub transferred: u64,
    pub sha256: String,
}
