//! Delimited-text reader
//!
//! Turns raw CSV bytes into a typed [`Dataset`]. The header row names the
//! columns; column kinds are inferred from the data.

use crate::dataset::{Column, ColumnKind, Dataset, Value};
use crate::error::{IngestError, Result};
use csv::ReaderBuilder;
use std::collections::HashSet;
use tracing::{debug, info};

pub const DEFAULT_DELIMITER: u8 = b',';

/// Cell contents read as missing values.
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Parse delimited text with a header row.
///
/// Blank lines are skipped, short rows are padded with nulls, and a row with
/// more fields than the header is rejected.
pub fn parse(raw: &[u8], delimiter: u8) -> Result<Dataset> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(raw);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(IngestError::Parse("no columns to parse from input".to_string()));
    }
    let names = column_names(headers.iter());
    debug!(columns = ?names, "read CSV header");

    let width = names.len();
    let mut cells: Vec<Vec<Option<String>>> = Vec::new();

    for record in reader.records() {
        let record = record?;
        if record.len() > width {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(IngestError::Parse(format!(
                "expected {} fields in line {}, saw {}",
                width,
                line,
                record.len()
            )));
        }

        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|field| (!NA_TOKENS.contains(&field)).then(|| field.to_string()))
            .collect();
        row.resize(width, None);
        cells.push(row);
    }

    let kinds: Vec<ColumnKind> = (0..width)
        .map(|index| infer_kind(cells.iter().filter_map(|row| row[index].as_deref())))
        .collect();

    let rows = cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&kinds)
                .map(|(cell, kind)| to_value(cell, *kind))
                .collect()
        })
        .collect();

    let columns = names
        .into_iter()
        .zip(kinds)
        .map(|(name, kind)| Column::new(name, kind))
        .collect();

    let dataset = Dataset::new(columns, rows)?;
    info!(
        rows = dataset.row_count(),
        columns = dataset.column_count(),
        "CSV parsed"
    );
    Ok(dataset)
}

/// Unique column names: blanks become `Unnamed: <i>`, repeats get `.1`, `.2`, ...
fn column_names<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::new();

    for (index, header) in headers.enumerate() {
        let base = if header.is_empty() {
            format!("Unnamed: {}", index)
        } else {
            header.to_string()
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }

        seen.insert(name.clone());
        names.push(name);
    }

    names
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_float(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Narrowest kind that every non-missing cell fits.
fn infer_kind<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> ColumnKind {
    let mut cells = cells.peekable();
    if cells.peek().is_none() {
        return ColumnKind::Utf8;
    }

    if cells.clone().all(|c| c.trim().parse::<i64>().is_ok()) {
        ColumnKind::Int64
    } else if cells.clone().all(|c| parse_float(c.trim()).is_some()) {
        ColumnKind::Float64
    } else if cells.all(|c| parse_bool(c.trim()).is_some()) {
        ColumnKind::Boolean
    } else {
        ColumnKind::Utf8
    }
}

fn to_value(cell: Option<String>, kind: ColumnKind) -> Value {
    let Some(cell) = cell else {
        return Value::Null;
    };

    // `infer_kind` already checked every cell parses as `kind`.
    match kind {
        ColumnKind::Int64 => cell.trim().parse().map(Value::Int).unwrap_or(Value::Null),
        ColumnKind::Float64 => parse_float(cell.trim()).map(Value::Float).unwrap_or(Value::Null),
        ColumnKind::Boolean => parse_bool(cell.trim()).map(Value::Bool).unwrap_or(Value::Null),
        ColumnKind::Utf8 | ColumnKind::Timestamp => Value::Text(cell),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"id,name,value,date
1,Alice,100,2024-01-01
2,Bob,200,2024-01-02
3,Charlie,300,2024-01-03
2,Bob,200,2024-01-02
";

    #[test]
    fn test_parse_sample() {
        let dataset = parse(SAMPLE, DEFAULT_DELIMITER).unwrap();

        assert_eq!(dataset.row_count(), 4);
        assert_eq!(
            dataset.column_names().collect::<Vec<_>>(),
            vec!["id", "name", "value", "date"]
        );
        let kinds: Vec<_> = dataset.columns().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Int64,
                ColumnKind::Utf8,
                ColumnKind::Int64,
                ColumnKind::Utf8
            ]
        );
        assert_eq!(dataset.rows()[0][1], Value::from("Alice"));
    }

    #[test]
    fn test_parse_custom_delimiter() {
        let dataset = parse(b"id;name;value\n1;Alice;100\n2;Bob;200", b';').unwrap();

        assert_eq!(dataset.row_count(), 2);
        assert!(dataset.has_column("name"));
    }

    #[test]
    fn test_parse_empty_input_fails() {
        let err = parse(b"", DEFAULT_DELIMITER).unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn test_parse_header_only() {
        let dataset = parse(b"a,b,c\n", DEFAULT_DELIMITER).unwrap();
        assert_eq!(dataset.row_count(), 0);
        assert_eq!(dataset.column_count(), 3);
        assert!(dataset.columns().iter().all(|c| c.kind == ColumnKind::Utf8));
    }

    #[test]
    fn test_parse_pads_short_rows() {
        let dataset = parse(b"a,b,c\n1,2\n", DEFAULT_DELIMITER).unwrap();
        assert_eq!(
            dataset.rows()[0],
            vec![Value::Int(1), Value::Int(2), Value::Null]
        );
    }

    #[test]
    fn test_parse_rejects_long_rows() {
        let err = parse(b"a,b\n1,2\n3,4,5\n", DEFAULT_DELIMITER).unwrap_err();
        assert!(err.to_string().contains("expected 2 fields in line 3"));
    }

    #[test]
    fn test_parse_rejects_invalid_utf8() {
        let err = parse(b"a,b\n\xff\xfe,1\n", DEFAULT_DELIMITER).unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn test_na_tokens_become_null() {
        let dataset = parse(b"a,b\nNA,x\n2,null\n", DEFAULT_DELIMITER).unwrap();
        assert_eq!(dataset.rows()[0][0], Value::Null);
        assert_eq!(dataset.rows()[1][1], Value::Null);
        assert_eq!(dataset.columns()[0].kind, ColumnKind::Int64);
    }

    #[test]
    fn test_kind_inference() {
        let dataset =
            parse(b"i,f,b,s\n1,1.5,true,x\n2,3,FALSE,4\n", DEFAULT_DELIMITER).unwrap();
        let kinds: Vec<_> = dataset.columns().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Int64,
                ColumnKind::Float64,
                ColumnKind::Boolean,
                ColumnKind::Utf8
            ]
        );
        assert_eq!(dataset.rows()[1][1], Value::Float(3.0));
        assert_eq!(dataset.rows()[1][2], Value::Bool(false));
        assert_eq!(dataset.rows()[1][3], Value::from("4"));
    }

    #[test]
    fn test_duplicate_and_blank_headers_are_renamed() {
        let dataset = parse(b"a,a,,a.1\n1,2,3,4\n", DEFAULT_DELIMITER).unwrap();
        assert_eq!(
            dataset.column_names().collect::<Vec<_>>(),
            vec!["a", "a.1", "Unnamed: 2", "a.1.1"]
        );
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let dataset = parse(b"a,b\n1,2\n\n3,4\n", DEFAULT_DELIMITER).unwrap();
        assert_eq!(dataset.row_count(), 2);
    }
}
