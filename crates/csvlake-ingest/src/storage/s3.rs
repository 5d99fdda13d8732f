use super::{content_type_for, ObjectMetadata, ObjectStore, StorageConfig, WriteReceipt};
use crate::error::StorageError;
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use chrono::DateTime;
use tracing::{debug, info, instrument};

/// [`ObjectStore`] backed by the AWS S3 API (or anything speaking it).
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub async fn new(config: &StorageConfig) -> Self {
        debug!(region = %config.region, endpoint = ?config.endpoint, "Initializing S3 client");

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "csvlake-static",
            ));
        }

        let shared = loader.load().await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(region = %config.region, "S3 client initialized");
        Self::from_client(Client::from_conf(builder.build()))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// `CopySource` header value: bucket plus the key with each segment
/// percent-encoded.
fn copy_source(bucket: &str, key: &str) -> String {
    let encoded = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", bucket, encoded)
}

#[async_trait]
impl ObjectStore for S3Storage {
    #[instrument(skip(self))]
    async fn read(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        debug!("Downloading from s3://{}/{}", bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::request("GetObject", DisplayErrorContext(&err))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|err| StorageError::request("GetObject body", err))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), bucket, key);
        Ok(data)
    }

    #[instrument(skip(self, data))]
    async fn write(
        &self,
        data: Vec<u8>,
        bucket: &str,
        key: &str,
    ) -> Result<WriteReceipt, StorageError> {
        let receipt = WriteReceipt::for_data(bucket, key, &data);
        debug!("Uploading {} bytes to s3://{}/{}", receipt.size, bucket, key);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type_for(key))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| StorageError::request("PutObject", DisplayErrorContext(&err)))?;

        info!("Successfully uploaded to s3://{}/{}", bucket, key);
        Ok(receipt)
    }

    #[instrument(skip(self))]
    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<(), StorageError> {
        self.client
            .copy_object()
            .copy_source(copy_source(source_bucket, source_key))
            .bucket(dest_bucket)
            .key(dest_key)
            .send()
            .await
            .map_err(|err| StorageError::request("CopyObject", DisplayErrorContext(&err)))?;

        info!(
            "Successfully copied s3://{}/{} to s3://{}/{}",
            source_bucket, source_key, dest_bucket, dest_key
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| StorageError::request("DeleteObject", DisplayErrorContext(&err)))?;

        info!("Successfully deleted s3://{}/{}", bucket, key);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|err| StorageError::request("ListObjectsV2", DisplayErrorContext(&err)))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(|k| k.to_string())),
            );
        }

        debug!(count = keys.len(), "Listed s3://{}/{}", bucket, prefix);
        Ok(keys)
    }

    #[instrument(skip(self))]
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StorageError> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::request("HeadObject", DisplayErrorContext(&err))
                }
            })?;

        Ok(ObjectMetadata {
            size: response
                .content_length()
                .and_then(|len| u64::try_from(len).ok())
                .unwrap_or(0),
            last_modified: response
                .last_modified()
                .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())),
            content_type: response.content_type().map(|s| s.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_source_encodes_segments() {
        assert_eq!(
            copy_source("raw", "incoming/2024 sales+q1.csv"),
            "raw/incoming/2024%20sales%2Bq1.csv"
        );
        assert_eq!(copy_source("raw", "plain.csv"), "raw/plain.csv");
    }

    #[test]
    fn test_from_client() {
        let storage = S3Storage::from_client(Client::from_conf(
            aws_sdk_s3::Config::builder()
                .region(Region::new("us-east-1"))
                .build(),
        ));
        let _store: &dyn ObjectStore = &storage;
    }
}
