//! Error types for the retrieval benchmark.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors that can occur while ingesting or evaluating.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration file or environment error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend could not be reached with the configured credentials.
    #[error("Backend connection check failed: {0}")]
    Connection(String),

    /// The requested collection is not part of the dataset catalogue.
    #[error("'{name}' is not in the list of available collections ({})", .known.join(", "))]
    UnknownCollection { name: String, known: Vec<String> },

    /// The requested dataset is not part of the catalogue.
    #[error("'{name}' is not in the list of available datasets ({})", .known.join(", "))]
    UnknownDataset { name: String, known: Vec<String> },

    /// A dataset file is malformed.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// The backend returned fewer results than requested.
    #[error("Expected {expected} search results, got {got}")]
    InsufficientResults { expected: usize, got: usize },

    /// The backend answered with a non-success status.
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// The backend refused to acknowledge a write.
    #[error("Backend did not acknowledge upsert of '{0}'")]
    NotAcknowledged(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// An operation kept failing until its retry policy gave up.
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last_error: Box<BenchError>,
    },

    /// Ingestion stopped partway; `offset` is where to resume.
    #[error("Ingestion into '{collection}' aborted at document offset {offset}: {source}")]
    IngestionAborted {
        collection: String,
        offset: usize,
        #[source]
        source: Box<BenchError>,
    },
}

impl BenchError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for BenchError {
    fn from(err: reqwest::Error) -> Self {
        BenchError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::Serialization(err.to_string())
    }
}
