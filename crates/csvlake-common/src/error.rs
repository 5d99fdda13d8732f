//! Error types shared across csvlake crates

use thiserror::Error;

/// Result type alias for csvlake operations
pub type Result<T> = std::result::Result<T, LakeError>;

/// Errors raised outside the per-object ingest path
#[derive(Error, Debug)]
pub enum LakeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging setup error: {0}")]
    Logging(String),
}
