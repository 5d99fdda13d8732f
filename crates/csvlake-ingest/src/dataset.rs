//! In-memory tabular dataset
//!
//! A [`Dataset`] is an owned value: every pipeline stage takes one by value and
//! hands back the next version. Rows are stored row-major because the cleaning
//! stage compares whole rows; the encoder pivots to columns when it builds Arrow
//! arrays.

use crate::error::{IngestError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Physical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Int64,
    Float64,
    Boolean,
    Utf8,
    /// UTC instant with microsecond precision
    Timestamp,
}

/// A single cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Column kind this value belongs to; `None` for nulls, which fit any column.
    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(ColumnKind::Int64),
            Value::Float(_) => Some(ColumnKind::Float64),
            Value::Bool(_) => Some(ColumnKind::Boolean),
            Value::Text(_) => Some(ColumnKind::Utf8),
            Value::Timestamp(_) => Some(ColumnKind::Timestamp),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

/// Named, typed column header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Row and column counts plus column names, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
}

/// Statistics of a possibly absent dataset; `None` when nothing is loaded.
pub fn statistics(dataset: Option<&Dataset>) -> Option<DatasetStats> {
    dataset.map(Dataset::statistics)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Build a dataset, checking that column names are unique, that every row
    /// has one cell per column, and that non-null cells match their column kind.
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(IngestError::Validation(format!(
                    "duplicate column name {:?}",
                    column.name
                )));
            }
        }

        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(IngestError::Validation(format!(
                    "row {} has {} cells, expected {}",
                    index,
                    row.len(),
                    columns.len()
                )));
            }
            for (value, column) in row.iter().zip(&columns) {
                if let Some(kind) = value.kind() {
                    if kind != column.kind {
                        return Err(IngestError::Validation(format!(
                            "row {} column {:?}: {:?} value in {:?} column",
                            index, column.name, kind, column.kind
                        )));
                    }
                }
            }
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |row| &row[index])
    }

    pub fn statistics(&self) -> DatasetStats {
        DatasetStats {
            row_count: self.row_count(),
            column_count: self.column_count(),
            columns: self.column_names().map(str::to_string).collect(),
        }
    }

    pub fn into_parts(self) -> (Vec<Column>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }

    /// Keep only the rows for which `keep` returns true, preserving order.
    pub(crate) fn filter_rows<F>(self, mut keep: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self.rows.into_iter().filter(|row| keep(row)).collect();
        Self {
            columns: self.columns,
            rows,
        }
    }

    /// Set `name` to `value` on every row. An existing column of that name is
    /// replaced in place (taking the new kind); otherwise the column is appended.
    pub(crate) fn with_constant_column(
        mut self,
        name: &str,
        kind: ColumnKind,
        value: Value,
    ) -> Self {
        debug_assert!(value.kind().map_or(true, |k| k == kind));

        match self.column_index(name) {
            Some(index) => {
                self.columns[index].kind = kind;
                for row in &mut self.rows {
                    row[index] = value.clone();
                }
            },
            None => {
                self.columns.push(Column::new(name, kind));
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            },
        }

        self
    }
}
