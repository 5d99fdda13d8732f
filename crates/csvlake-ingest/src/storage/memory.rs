//! In-memory object store for tests and dry runs.

use super::{content_type_for, ObjectMetadata, ObjectStore, WriteReceipt};
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
}

type BucketStorage = BTreeMap<String, BTreeMap<String, StoredObject>>;

#[derive(Debug, Default)]
struct State {
    buckets: BucketStorage,
    failing_reads: HashSet<(String, String)>,
    failing_writes: HashSet<String>,
}

/// Cloneable handle to a shared map of buckets. Reads and writes can be made to
/// fail on demand to exercise error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object without going through [`ObjectStore::write`].
    pub fn put(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.lock()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                StoredObject {
                    data,
                    last_modified: Utc::now(),
                },
            );
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.data.clone())
    }

    /// Every key in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Make reads of one object fail with a request error.
    pub fn fail_reads_for(&self, bucket: &str, key: &str) {
        self.lock()
            .failing_reads
            .insert((bucket.to_string(), key.to_string()));
    }

    /// Make every write into `bucket` fail with a request error.
    pub fn fail_writes_to(&self, bucket: &str) {
        self.lock().failing_writes.insert(bucket.to_string());
    }

    fn not_found(bucket: &str, key: &str) -> StorageError {
        StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStorage {
    async fn read(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let state = self.lock();
        if state
            .failing_reads
            .contains(&(bucket.to_string(), key.to_string()))
        {
            return Err(StorageError::request("GetObject", "injected read failure"));
        }
        state
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.data.clone())
            .ok_or_else(|| Self::not_found(bucket, key))
    }

    async fn write(
        &self,
        data: Vec<u8>,
        bucket: &str,
        key: &str,
    ) -> Result<WriteReceipt, StorageError> {
        let mut state = self.lock();
        if state.failing_writes.contains(bucket) {
            return Err(StorageError::request("PutObject", "injected write failure"));
        }
        let receipt = WriteReceipt::for_data(bucket, key, &data);
        state.buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(receipt)
    }

    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.lock();
        if state.failing_writes.contains(dest_bucket) {
            return Err(StorageError::request("CopyObject", "injected write failure"));
        }
        let object = state
            .buckets
            .get(source_bucket)
            .and_then(|objects| objects.get(source_key))
            .cloned()
            .ok_or_else(|| Self::not_found(source_bucket, source_key))?;
        state
            .buckets
            .entry(dest_bucket.to_string())
            .or_default()
            .insert(dest_key.to_string(), object);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        // S3 deletes are idempotent; so is this one.
        if let Some(objects) = self.lock().buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .keys(bucket)
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect())
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StorageError> {
        let state = self.lock();
        let object = state
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .ok_or_else(|| Self::not_found(bucket, key))?;
        Ok(ObjectMetadata {
            size: object.data.len() as u64,
            last_modified: Some(object.last_modified),
            content_type: Some(content_type_for(key).to_string()),
        })
    }
}
