//! Ingestion metadata columns

use crate::dataset::{ColumnKind, Dataset, Value};
use chrono::{DateTime, Datelike, SubsecRound, Utc};

pub const INGESTION_TIMESTAMP: &str = "ingestion_timestamp";
pub const SOURCE_FILE: &str = "source_file";
pub const YEAR: &str = "year";
pub const MONTH: &str = "month";
pub const DAY: &str = "day";

/// Every column [`annotate`] writes, in append order.
pub const METADATA_COLUMNS: [&str; 5] = [INGESTION_TIMESTAMP, SOURCE_FILE, YEAR, MONTH, DAY];

/// Stamp every row with the current time and the source identifier.
pub fn annotate(dataset: Dataset, source_file: &str) -> Dataset {
    annotate_at(dataset, source_file, Utc::now())
}

/// Stamp every row with `now` and `source_file`.
///
/// Existing columns with a metadata name are overwritten. The timestamp is
/// truncated to microseconds, the precision the Parquet column stores.
pub fn annotate_at(dataset: Dataset, source_file: &str, now: DateTime<Utc>) -> Dataset {
    let now = now.trunc_subsecs(6);
    dataset
        .with_constant_column(INGESTION_TIMESTAMP, ColumnKind::Timestamp, Value::Timestamp(now))
        .with_constant_column(SOURCE_FILE, ColumnKind::Utf8, Value::from(source_file))
        .with_constant_column(YEAR, ColumnKind::Int64, Value::Int(i64::from(now.year())))
        .with_constant_column(MONTH, ColumnKind::Int64, Value::Int(i64::from(now.month())))
        .with_constant_column(DAY, ColumnKind::Int64, Value::Int(i64::from(now.day())))
}
