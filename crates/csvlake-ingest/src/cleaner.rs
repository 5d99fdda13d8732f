//! Row cleaning and dataset validation

use crate::dataset::{Dataset, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Hashable view of a cell. Floats compare by bit pattern after folding
/// `-0.0` into `0.0`.
#[derive(Hash, PartialEq, Eq)]
enum CellKey<'a> {
    Null,
    Int(i64),
    Float(u64),
    Bool(bool),
    Text(&'a str),
    Timestamp(i64),
}

impl<'a> From<&'a Value> for CellKey<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => CellKey::Null,
            Value::Int(v) => CellKey::Int(*v),
            Value::Float(v) => CellKey::Float(if *v == 0.0 { 0 } else { v.to_bits() }),
            Value::Bool(v) => CellKey::Bool(*v),
            Value::Text(v) => CellKey::Text(v),
            Value::Timestamp(v) => CellKey::Timestamp(v.timestamp_micros()),
        }
    }
}

/// Drop rows that repeat an earlier row and rows where every cell is null.
///
/// Surviving rows keep their first-occurrence order.
pub fn deduplicate_and_dropblank(dataset: Dataset) -> Dataset {
    let before = dataset.row_count();

    // Keys borrow from `dataset`, so collect the keep-mask before consuming it.
    let keep: Vec<bool> = {
        let mut seen: HashSet<Vec<CellKey<'_>>> = HashSet::with_capacity(before);
        dataset
            .rows()
            .iter()
            .map(|row| {
                let blank = row.iter().all(Value::is_null);
                let first = seen.insert(row.iter().map(CellKey::from).collect());
                first && !blank
            })
            .collect()
    };

    let mut mask = keep.into_iter();
    let cleaned = dataset.filter_rows(|_| mask.next().unwrap_or(false));

    debug!(
        before,
        after = cleaned.row_count(),
        "removed duplicate and blank rows"
    );
    cleaned
}

/// True when the dataset is present, has rows, and carries every required column.
pub fn validate(dataset: Option<&Dataset>, required_columns: Option<&[&str]>) -> bool {
    let Some(dataset) = dataset else {
        return false;
    };
    if dataset.is_empty() {
        return false;
    }

    if let Some(required) = required_columns {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|name| !dataset.has_column(name))
            .collect();
        if !missing.is_empty() {
            warn!(missing = ?missing, "required columns missing");
            return false;
        }
    }

    true
}
