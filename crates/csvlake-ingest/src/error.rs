//! Ingest error types

use thiserror::Error;

/// Result type for per-object ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that end the processing of one source object.
///
/// Every variant is turned into a failed [`crate::ProcessingResult`] by the
/// pipeline; none of them escape a batch.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Failed to read s3://{bucket}/{key}: {source}")]
    StorageRead {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to write s3://{bucket}/{key}: {source}")]
    StorageWrite {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Object is {size} bytes, limit is {limit} bytes")]
    FileTooLarge { size: usize, limit: usize },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        IngestError::Parse(err.to_string())
    }
}

/// Errors reported by an [`crate::storage::ObjectStore`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("object s3://{bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("{operation} request failed: {message}")]
    Request { operation: String, message: String },
}

impl StorageError {
    pub fn request(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        StorageError::Request {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// Settings problems detected at startup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
