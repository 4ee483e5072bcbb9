// src/error.rs

//! Crate-wide error type
//!
//! Expected resolution failures (packages not found, solver conflicts,
//! protected removals) are not errors: they are reported through
//! `LogEvent`s on the resolved `Transaction`. The variants here cover API
//! misuse and hard failures that leave no meaningful partial answer.

use thiserror::Error;

/// Errors returned by rpmgoal operations
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem or lock failure
    #[error("I/O error: {0}")]
    IoError(String),

    /// Malformed input (specs, versions, metadata snapshots)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A named item does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Replay file or transaction model failure
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Persisted system state cannot be used safely
    #[error("System state error: {0}")]
    StateError(String),

    /// API misuse by the caller (setting re-resolved differently, goal
    /// resolved before the base was set up, ...)
    #[error("Assertion failed: {0}")]
    AssertionError(String),

    /// The solver oracle could not complete
    #[error("Resolution error: {0}")]
    ResolutionError(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ParseError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ParseError(err.to_string())
    }
}

impl From<glob::PatternError> for Error {
    fn from(err: glob::PatternError) -> Self {
        Error::ParseError(format!("invalid glob pattern: {}", err))
    }
}
