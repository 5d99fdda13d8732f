//! Per-object ingestion
//!
//! [`IngestPipeline::process`] takes one raw CSV object through
//! read → parse → clean → annotate → validate → encode → write and reports the
//! outcome as a [`ProcessingResult`]. Errors never escape: a bad object becomes
//! a failed result and the caller moves on to the next one.

use crate::cleaner::{deduplicate_and_dropblank, validate};
use crate::config::Settings;
use crate::encoder::{encode, EncodeOptions};
use crate::error::{IngestError, Result, StorageError};
use crate::metadata::annotate_at;
use crate::reader::{parse, DEFAULT_DELIMITER};
use crate::storage::{move_object, prefixed_key, ObjectStore};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Source of the processing instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Data-lake key for `source_key` processed on `date`:
/// `data/year=YYYY/month=MM/day=DD/<basename>.parquet`.
pub fn destination_key(source_key: &str, date: NaiveDate) -> String {
    let name = source_key.rsplit('/').next().unwrap_or(source_key);
    let basename = name
        .len()
        .checked_sub(4)
        .and_then(|split| {
            let (stem, ext) = (name.get(..split)?, name.get(split..)?);
            ext.eq_ignore_ascii_case(".csv").then_some(stem)
        })
        .unwrap_or(name);

    format!(
        "data/year={}/month={:02}/day={:02}/{}.parquet",
        date.year(),
        date.month(),
        date.day(),
        basename
    )
}

/// Outcome of processing one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingResult {
    success: bool,
    origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ProcessingResult {
    pub fn succeeded(origin: impl Into<String>, destination: impl Into<String>, rows: usize) -> Self {
        Self {
            success: true,
            origin: origin.into(),
            destination: Some(destination.into()),
            rows: Some(rows),
            error: None,
        }
    }

    pub fn failed(origin: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            success: false,
            origin: origin.into(),
            destination: None,
            rows: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// `<bucket>/<key>` of the source object
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// `<bucket>/<key>` of the written Parquet object
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn rows(&self) -> Option<usize> {
        self.rows
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Where a raw object goes once it has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Processed,
    Failed,
}

impl FromStr for ArchiveOutcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processed" => Ok(ArchiveOutcome::Processed),
            "failed" => Ok(ArchiveOutcome::Failed),
            other => Err(format!("unknown outcome '{}', expected processed or failed", other)),
        }
    }
}

pub struct IngestPipeline {
    settings: Arc<Settings>,
    storage: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
}

impl IngestPipeline {
    pub fn new(settings: Arc<Settings>, storage: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            storage,
            clock,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Process one raw object into the data lake.
    #[instrument(skip(self))]
    pub async fn process(&self, bucket: &str, key: &str) -> ProcessingResult {
        let origin = format!("{}/{}", bucket, key);
        info!("Processing s3://{}", origin);

        match self.try_process(bucket, key).await {
            Ok((destination, rows)) => {
                info!(rows, destination = %destination, "Processed s3://{}", origin);
                ProcessingResult::succeeded(origin, destination, rows)
            },
            Err(e) => {
                error!(error = %e, "Failed to process s3://{}", origin);
                ProcessingResult::failed(origin, e)
            },
        }
    }

    async fn try_process(&self, bucket: &str, key: &str) -> Result<(String, usize)> {
        let processing = &self.settings.processing;

        let raw = self
            .storage
            .read(bucket, key)
            .await
            .map_err(|source| IngestError::StorageRead {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            })?;

        let limit = processing.max_file_size_bytes();
        if raw.len() > limit {
            return Err(IngestError::FileTooLarge {
                size: raw.len(),
                limit,
            });
        }

        let now = self.clock.now();
        let dataset = parse(&raw, DEFAULT_DELIMITER)?;
        let dataset = deduplicate_and_dropblank(dataset);
        let dataset = annotate_at(dataset, key, now);

        let required: Vec<&str> = processing
            .partition_columns
            .iter()
            .map(String::as_str)
            .collect();
        if !validate(Some(&dataset), Some(required.as_slice())) {
            let reason = if dataset.is_empty() {
                "no data rows after cleaning".to_string()
            } else {
                let missing: Vec<&str> = required
                    .iter()
                    .copied()
                    .filter(|name| !dataset.has_column(name))
                    .collect();
                format!("missing partition columns: {}", missing.join(", "))
            };
            return Err(IngestError::Validation(reason));
        }

        let parquet = encode(
            &dataset,
            EncodeOptions {
                batch_size: processing.batch_size,
            },
        )?;

        let lake_bucket = &self.settings.s3.data_lake_bucket;
        let dest_key = destination_key(key, now.date_naive());
        let receipt = self
            .storage
            .write(parquet, lake_bucket, &dest_key)
            .await
            .map_err(|source| IngestError::StorageWrite {
                bucket: lake_bucket.clone(),
                key: dest_key.clone(),
                source,
            })?;
        debug!(size = receipt.size, checksum = %receipt.checksum, "Wrote parquet object");

        Ok((format!("{}/{}", lake_bucket, dest_key), dataset.row_count()))
    }

    /// Move a raw object under the processed or failed prefix of the raw
    /// bucket. Returns the new key.
    #[instrument(skip(self))]
    pub async fn archive(
        &self,
        key: &str,
        outcome: ArchiveOutcome,
    ) -> std::result::Result<String, StorageError> {
        let s3 = &self.settings.s3;
        let prefix = match outcome {
            ArchiveOutcome::Processed => &s3.processed_prefix,
            ArchiveOutcome::Failed => &s3.failed_prefix,
        };
        let dest_key = prefixed_key(prefix, key);
        move_object(self.storage.as_ref(), &s3.raw_bucket, key, &dest_key).await?;
        Ok(dest_key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_destination_key() {
        assert_eq!(
            destination_key("incoming/sales.csv", date(2024, 3, 7)),
            "data/year=2024/month=03/day=07/sales.parquet"
        );
        assert_eq!(
            destination_key("a/b/Report.CSV", date(2023, 12, 31)),
            "data/year=2023/month=12/day=31/Report.parquet"
        );
        assert_eq!(
            destination_key("data.csv.bak", date(2024, 1, 1)),
            "data/year=2024/month=01/day=01/data.csv.bak.parquet"
        );
        assert_eq!(
            destination_key("x.csv", date(2024, 1, 1)),
            "data/year=2024/month=01/day=01/x.parquet"
        );
    }

    #[test]
    fn test_result_shapes() {
        let ok = ProcessingResult::succeeded("raw/a.csv", "lake/data/a.parquet", 3);
        assert!(ok.is_success());
        assert_eq!(ok.rows(), Some(3));
        assert!(ok.error().is_none());

        let failed = ProcessingResult::failed("raw/b.csv", "boom");
        assert!(!failed.is_success());
        assert_eq!(failed.error(), Some("boom"));
        assert!(failed.destination().is_none());
        assert!(failed.rows().is_none());

        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "origin": "raw/b.csv", "error": "boom"})
        );
    }

    #[test]
    fn test_archive_outcome_from_str() {
        assert_eq!("processed".parse::<ArchiveOutcome>(), Ok(ArchiveOutcome::Processed));
        assert_eq!("FAILED".parse::<ArchiveOutcome>(), Ok(ArchiveOutcome::Failed));
        assert!("done".parse::<ArchiveOutcome>().is_err());
    }

    #[tokio::test]
    async fn test_process_writes_partitioned_parquet() {
        let store = MemoryStorage::new();
        store.put("raw", "incoming/sales.csv", b"id,name\n1,Alice\n2,Bob\n1,Alice\n".to_vec());
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 9, 0, 0).unwrap();
        let pipeline = IngestPipeline::new(
            Arc::new(Settings::for_buckets("raw", "lake")),
            Arc::new(store.clone()),
            Arc::new(FixedClock(now)),
        );

        let result = pipeline.process("raw", "incoming/sales.csv").await;

        assert!(result.is_success(), "{:?}", result.error());
        assert_eq!(result.rows(), Some(2));
        assert_eq!(
            result.destination(),
            Some("lake/data/year=2024/month=03/day=07/sales.parquet")
        );
        assert!(store
            .get("lake", "data/year=2024/month=03/day=07/sales.parquet")
            .is_some());
    }

    #[tokio::test]
    async fn test_archive_moves_under_prefix() {
        let store = MemoryStorage::new();
        store.put("raw", "incoming/a.csv", b"id\n1\n".to_vec());
        let pipeline = IngestPipeline::new(
            Arc::new(Settings::for_buckets("raw", "lake")),
            Arc::new(store.clone()),
            Arc::new(SystemClock),
        );

        let dest = pipeline
            .archive("incoming/a.csv", ArchiveOutcome::Failed)
            .await
            .unwrap();

        assert_eq!(dest, "failed/incoming/a.csv");
        assert_eq!(store.keys("raw"), vec!["failed/incoming/a.csv"]);
    }
}
