//! Error types for proctest

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the proctest common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading fixtures and building selections
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON5 error: {0}")]
    Json5(#[from] json5::Error),

    #[error("Failed to load fixture {path}: {reason}")]
    FixtureLoad { path: PathBuf, reason: String },

    #[error("Process id mismatch between id {id:?} and filename {filename:?}")]
    IdMismatch { id: String, filename: String },

    #[error("Unknown process level: {0:?}")]
    UnknownLevel(String),

    #[error("Invalid datetime: {0:?}")]
    InvalidDatetime(String),

    #[error("Process not found: {0:?}")]
    ProcessNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Wrap any error as a fixture load error for the given file
    pub fn fixture(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::FixtureLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
