//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
///
/// Only `StoreUnavailable` during the scan phase is ever fatal to a sweep.
/// Everything else is recorded per account or per recipient.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a store unavailable error
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short machine-readable name of the variant, used in reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidState(_) => "invalid_state",
            Error::StoreUnavailable(_) => "store_unavailable",
            Error::Config(_) => "config",
            Error::Transport(_) => "transport",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Other(_) => "other",
        }
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_names() {
        assert_eq!(Error::invalid_state("x").kind(), "invalid_state");
        assert_eq!(Error::store_unavailable("x").kind(), "store_unavailable");
        assert_eq!(Error::config("x").kind(), "config");
    }

    #[test]
    fn test_error_display() {
        let err = Error::store_unavailable("connection refused");
        assert_eq!(err.to_string(), "Store unavailable: connection refused");
    }
}
