//! csvlake Ingest Library
//!
//! Turns raw CSV objects landing in a bucket into partitioned, Snappy-compressed
//! Parquet files in a data-lake bucket.
//!
//! # Stages
//!
//! - [`reader`]: permissive CSV parsing with per-column type inference
//! - [`cleaner`]: duplicate and blank-row removal, column checks
//! - [`metadata`]: ingestion timestamp, source and partition columns
//! - [`encoder`]: Parquet encoding (and decoding for inspection)
//! - [`pipeline`]: one object end to end, against an [`storage::ObjectStore`]
//! - [`dispatcher`]: a whole notification batch, aggregated into one response
//!
//! # Example
//!
//! ```no_run
//! use csvlake_ingest::{Dispatcher, IngestPipeline, S3Event, Settings, SystemClock};
//! use csvlake_ingest::storage::S3Storage;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let storage = S3Storage::new(&settings.s3.connection).await;
//!     let pipeline = IngestPipeline::new(Arc::new(settings), Arc::new(storage), Arc::new(SystemClock));
//!
//!     let batch = S3Event::for_objects([("my-raw-data-bucket", "incoming/sales.csv")]);
//!     let response = Dispatcher::new(pipeline).handle(&batch).await;
//!     println!("{}", response.to_lambda_json()?);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cleaner;
pub mod config;
pub mod dataset;
pub mod dispatcher;
pub mod encoder;
pub mod error;
pub mod event;
pub mod metadata;
pub mod pipeline;
pub mod reader;
pub mod storage;

pub use config::Settings;
pub use dataset::{Column, ColumnKind, Dataset, DatasetStats, Value};
pub use dispatcher::{BatchResponse, Dispatcher, ResponseBody};
pub use error::{ConfigError, IngestError, Result, StorageError};
pub use event::S3Event;
pub use pipeline::{
    destination_key, ArchiveOutcome, Clock, FixedClock, IngestPipeline, ProcessingResult,
    SystemClock,
};
