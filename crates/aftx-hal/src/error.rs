use thiserror::Error;

pub type HalResult<T> = std::result::Result<T, HalError>;

/// Why an external tool produced no usable output.
#[derive(Error, Debug)]
pub enum HalError {
    #[error("{0} is not installed or not on PATH")]
    CommandNotFound(String),

    #[error("{0} exists but is not executable")]
    PermissionDenied(String),

    #[error("{program} still running after {timeout_secs}s; killed")]
    CommandTimeout { program: String, timeout_secs: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
