//! Error types for the step reporting core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised inside the reporting core.
///
/// None of these cross the public boundary of a wrapped test action: the
/// tracker and logger absorb them and downgrade them to `warn!` lines.
/// Only configuration errors are returned to callers, and those surface
/// before any test runs.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Reporter transport error: {0}")]
    Transport(String),

    #[error("Reporter rejected {operation}: HTTP {status}: {body}")]
    Rejected {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Reporter is closed")]
    ReporterClosed,

    #[error("Attachment file does not exist at {}", path.display())]
    MissingAttachment { path: PathBuf },

    #[error("Unknown priority: {0} (expected one of Critical, High, Medium, Low, Optional)")]
    UnknownPriority(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl Error {
    /// Whether this error describes a setup defect that must stop the run.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::UnknownPriority(_) | Error::InvalidConfig(_))
    }
}
