use thiserror::Error;

/// Core error type for waypost operations.
#[derive(Error, Debug)]
pub enum WaypostError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// No live entry matches the given id or name. This is an expected
    /// outcome of races (late heartbeat, double deregister), not a fault.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WaypostError {
    /// Whether this error is the benign "no live entry" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for WaypostError {
    fn from(e: serde_json::Error) -> Self {
        WaypostError::Serialization(e.to_string())
    }
}

/// Result type alias using WaypostError.
pub type Result<T> = std::result::Result<T, WaypostError>;
