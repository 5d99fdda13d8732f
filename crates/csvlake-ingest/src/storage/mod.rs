//! Object storage
//!
//! The pipeline talks to storage through [`ObjectStore`] so the same code runs
//! against S3 in production and an in-memory map in tests.

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

pub mod config;
pub mod memory;
pub mod s3;

pub use config::StorageConfig;
pub use memory::MemoryStorage;
pub use s3::S3Storage;

/// Outcome of a successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReceipt {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    /// Hex SHA-256 of the bytes written
    pub checksum: String,
}

impl WriteReceipt {
    pub(crate) fn for_data(bucket: &str, key: &str, data: &[u8]) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: data.len() as u64,
            checksum: calculate_sha256(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectMetadata {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the whole object. Absent objects are [`StorageError::NotFound`].
    async fn read(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn write(
        &self,
        data: Vec<u8>,
        bucket: &str,
        key: &str,
    ) -> Result<WriteReceipt, StorageError>;

    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<(), StorageError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    /// Keys under `prefix`, in the order the backend returns them.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError>;

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StorageError>;
}

/// `key` placed under `prefix`, e.g. `processed/` + `incoming/a.csv`.
pub fn prefixed_key(prefix: &str, key: &str) -> String {
    let key = key.trim_start_matches('/');
    if prefix.is_empty() || prefix.ends_with('/') {
        format!("{}{}", prefix, key)
    } else {
        format!("{}/{}", prefix, key)
    }
}

/// Move an object within a bucket: copy, then delete the original.
pub async fn move_object(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    dest_key: &str,
) -> Result<(), StorageError> {
    store.copy(bucket, key, bucket, dest_key).await?;
    store.delete(bucket, key).await?;
    info!(bucket, from = key, to = dest_key, "moved object");
    Ok(())
}

/// Content type to record for an uploaded key.
pub(crate) fn content_type_for(key: &str) -> &'static str {
    let lower = key.to_ascii_lowercase();
    if lower.ends_with(".parquet") {
        "application/vnd.apache.parquet"
    } else if lower.ends_with(".csv") {
        "text/csv"
    } else {
        "application/octet-stream"
    }
}

fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
