//! Structured error types for the Cyanea ecosystem.

use thiserror::Error;

/// Unified error type for all Cyanea operations.
#[derive(Debug, Error)]
pub enum CyaneaError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed input data)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Fatal configuration problem detected before any parallel work starts
    /// (invalid namespace filter, cyclic or multi-rooted ontology, missing input).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single pair failed while being evaluated.
    #[error("pair ({first}, {second}) failed: {message}")]
    Worker {
        /// Identity of the first item of the pair.
        first: String,
        /// Identity of the second item of the pair.
        second: String,
        /// What went wrong.
        message: String,
    },

    /// A remote lookup (e.g. pathway enrichment) failed or returned garbage.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// The run was stopped by an external cancellation signal.
    #[error("run cancelled")]
    Cancelled,

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

impl CyaneaError {
    /// Build a [`CyaneaError::Worker`] from anything printable.
    pub fn worker(
        first: impl Into<String>,
        second: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        CyaneaError::Worker {
            first: first.into(),
            second: second.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error must abort the run before (or instead of) any work.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CyaneaError::Configuration(_) | CyaneaError::Io(_))
    }
}

/// Convenience alias used throughout the Cyanea ecosystem.
pub type Result<T> = std::result::Result<T, CyaneaError>;
