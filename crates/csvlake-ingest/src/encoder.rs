//! Parquet encoding of datasets
//!
//! [`encode`] produces a Snappy-compressed Parquet file in memory; [`decode`] is
//! its inverse and is what the `inspect` command and the round-trip tests use.

use crate::dataset::{Column, ColumnKind, Dataset, Value};
use crate::error::{IngestError, Result};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{
    DataType, Field, Float64Type, Int64Type, Schema, SchemaRef, TimeUnit,
    TimestampMicrosecondType,
};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::sync::Arc;
use tracing::debug;

/// Default number of rows handed to the Parquet writer per record batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

const UTC: &str = "UTC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Rows per Arrow record batch
    pub batch_size: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

fn arrow_type(kind: ColumnKind) -> DataType {
    match kind {
        ColumnKind::Int64 => DataType::Int64,
        ColumnKind::Float64 => DataType::Float64,
        ColumnKind::Boolean => DataType::Boolean,
        ColumnKind::Utf8 => DataType::Utf8,
        ColumnKind::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into())),
    }
}

fn column_kind(field: &Field) -> Result<ColumnKind> {
    match field.data_type() {
        DataType::Int64 => Ok(ColumnKind::Int64),
        DataType::Float64 => Ok(ColumnKind::Float64),
        DataType::Boolean => Ok(ColumnKind::Boolean),
        DataType::Utf8 => Ok(ColumnKind::Utf8),
        DataType::Timestamp(TimeUnit::Microsecond, _) => Ok(ColumnKind::Timestamp),
        other => Err(IngestError::Encode(format!(
            "column '{}' has unsupported type {}",
            field.name(),
            other
        ))),
    }
}

fn schema_for(columns: &[Column]) -> SchemaRef {
    Arc::new(Schema::new(
        columns
            .iter()
            .map(|c| Field::new(c.name.as_str(), arrow_type(c.kind), true))
            .collect::<Vec<_>>(),
    ))
}

/// Build the Arrow array for column `index` over `rows`. Values of the wrong
/// kind cannot occur because [`Dataset::new`] rejects them; they map to null.
fn build_array(rows: &[Vec<Value>], index: usize, kind: ColumnKind) -> ArrayRef {
    let cells = rows.iter().map(|row| &row[index]);
    match kind {
        ColumnKind::Int64 => Arc::new(Int64Array::from_iter(cells.map(|v| match v {
            Value::Int(i) => Some(*i),
            _ => None,
        }))),
        ColumnKind::Float64 => Arc::new(Float64Array::from_iter(cells.map(|v| match v {
            Value::Float(f) => Some(*f),
            _ => None,
        }))),
        ColumnKind::Boolean => Arc::new(BooleanArray::from_iter(cells.map(|v| match v {
            Value::Bool(b) => Some(*b),
            _ => None,
        }))),
        ColumnKind::Utf8 => Arc::new(StringArray::from_iter(cells.map(|v| match v {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }))),
        ColumnKind::Timestamp => Arc::new(
            TimestampMicrosecondArray::from_iter(cells.map(|v| match v {
                Value::Timestamp(t) => Some(t.timestamp_micros()),
                _ => None,
            }))
            .with_timezone(UTC),
        ),
    }
}

fn record_batch(schema: &SchemaRef, columns: &[Column], rows: &[Vec<Value>]) -> Result<RecordBatch> {
    let arrays = columns
        .iter()
        .enumerate()
        .map(|(index, column)| build_array(rows, index, column.kind))
        .collect();

    RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| IngestError::Encode(format!("record batch build failed: {e}")))
}

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

/// Serialize the whole dataset to Snappy-compressed Parquet bytes.
pub fn encode(dataset: &Dataset, options: EncodeOptions) -> Result<Vec<u8>> {
    if dataset.column_count() == 0 {
        return Err(IngestError::Encode(
            "cannot write a dataset without columns".to_string(),
        ));
    }

    let schema = schema_for(dataset.columns());
    let mut writer = ArrowWriter::try_new(Vec::new(), schema.clone(), Some(writer_properties()))
        .map_err(|e| IngestError::Encode(format!("parquet writer init failed: {e}")))?;

    let batch_size = options.batch_size.max(1);
    if dataset.is_empty() {
        let batch = record_batch(&schema, dataset.columns(), &[])?;
        writer
            .write(&batch)
            .map_err(|e| IngestError::Encode(format!("parquet write failed: {e}")))?;
    }
    for rows in dataset.rows().chunks(batch_size) {
        let batch = record_batch(&schema, dataset.columns(), rows)?;
        writer
            .write(&batch)
            .map_err(|e| IngestError::Encode(format!("parquet write failed: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| IngestError::Encode(format!("parquet close failed: {e}")))?;

    debug!(
        rows = dataset.row_count(),
        bytes = bytes.len(),
        "encoded dataset as parquet"
    );
    Ok(bytes)
}

fn missing_array(name: &str) -> IngestError {
    IngestError::Encode(format!("column '{name}' does not match its schema type"))
}

fn read_value(array: &dyn Array, kind: ColumnKind, row: usize, name: &str) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    let value = match kind {
        ColumnKind::Int64 => Value::Int(
            array
                .as_primitive_opt::<Int64Type>()
                .ok_or_else(|| missing_array(name))?
                .value(row),
        ),
        ColumnKind::Float64 => Value::Float(
            array
                .as_primitive_opt::<Float64Type>()
                .ok_or_else(|| missing_array(name))?
                .value(row),
        ),
        ColumnKind::Boolean => Value::Bool(
            array
                .as_boolean_opt()
                .ok_or_else(|| missing_array(name))?
                .value(row),
        ),
        ColumnKind::Utf8 => Value::Text(
            array
                .as_string_opt::<i32>()
                .ok_or_else(|| missing_array(name))?
                .value(row)
                .to_string(),
        ),
        ColumnKind::Timestamp => {
            let micros = array
                .as_primitive_opt::<TimestampMicrosecondType>()
                .ok_or_else(|| missing_array(name))?
                .value(row);
            let instant = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
                IngestError::Encode(format!("column '{name}' holds out-of-range timestamp"))
            })?;
            Value::Timestamp(instant)
        },
    };
    Ok(value)
}

/// Read Parquet bytes written by [`encode`] back into a dataset.
pub fn decode(data: &[u8]) -> Result<Dataset> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(data))
        .map_err(|e| IngestError::Encode(format!("parquet reader init failed: {e}")))?;

    let columns = builder
        .schema()
        .fields()
        .iter()
        .map(|field| Ok(Column::new(field.name().as_str(), column_kind(field)?)))
        .collect::<Result<Vec<_>>>()?;

    let reader = builder
        .build()
        .map_err(|e| IngestError::Encode(format!("parquet reader build failed: {e}")))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch =
            batch.map_err(|e| IngestError::Encode(format!("parquet read batch failed: {e}")))?;

        for row in 0..batch.num_rows() {
            let values = columns
                .iter()
                .zip(batch.columns())
                .map(|(column, array)| read_value(array.as_ref(), column.kind, row, &column.name))
                .collect::<Result<Vec<_>>>()?;
            rows.push(values);
        }
    }

    Dataset::new(columns, rows)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cleaner::deduplicate_and_dropblank;
    use crate::metadata::annotate_at;
    use crate::reader::{parse, DEFAULT_DELIMITER};
    use chrono::TimeZone;

    const SAMPLE: &[u8] = b"id,name,score,active,note
1,Alice,9.5,true,
2,Bob,7,false,late
3,Charlie,NA,TRUE,x
2,Bob,7,false,late
";

    #[test]
    fn test_encode_produces_parquet() {
        let dataset = parse(SAMPLE, DEFAULT_DELIMITER).unwrap();
        let bytes = encode(&dataset, EncodeOptions::default()).unwrap();

        assert!(bytes.len() > 8);
        assert_eq!(&bytes[..4], b"PAR1");
        assert_eq!(&bytes[bytes.len() - 4..], b"PAR1");
    }

    #[test]
    fn test_round_trip_after_full_transform() {
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 12, 30, 0).unwrap();
        let dataset = parse(SAMPLE, DEFAULT_DELIMITER).unwrap();
        let dataset = annotate_at(deduplicate_and_dropblank(dataset), "sales.csv", now);

        let bytes = encode(&dataset, EncodeOptions::default()).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded, dataset);
    }

    #[test]
    fn test_round_trip_across_small_batches() {
        let dataset = parse(SAMPLE, DEFAULT_DELIMITER).unwrap();
        let bytes = encode(&dataset, EncodeOptions { batch_size: 1 }).unwrap();

        assert_eq!(decode(&bytes).unwrap(), dataset);
    }

    #[test]
    fn test_empty_dataset_keeps_schema() {
        let dataset = parse(b"a,b\n", DEFAULT_DELIMITER).unwrap();
        let decoded = decode(&encode(&dataset, EncodeOptions::default()).unwrap()).unwrap();

        assert_eq!(decoded.row_count(), 0);
        assert_eq!(decoded.column_names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let dataset = parse(SAMPLE, DEFAULT_DELIMITER).unwrap();
        let first = encode(&dataset, EncodeOptions::default()).unwrap();
        let second = encode(&dataset, EncodeOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(b"definitely not parquet"),
            Err(IngestError::Encode(_))
        ));
    }
}
