//! Typed decoding of text rows returned by row queries.

#![allow(missing_docs)]

use chrono::NaiveDate;
use thiserror::Error;

use crate::diagnosis::snapshot::{
    GrowthPoint, LargeRecord, StatusCount, TableSize, UNKNOWN_WORKFLOW_NAME, WorkflowAggregate,
};
use crate::source::Row;

/// A row that could not be decoded. Any such row invalidates the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("row {row}: expected {expected} fields for {shape}, found {found}")]
    FieldCount {
        row: usize,
        shape: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("row {row}: column {column} {value:?} is not {expected}")]
    FieldType {
        row: usize,
        column: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{shape}: {found} rows exceed the cap of {cap}")]
    OverCap {
        shape: &'static str,
        cap: usize,
        found: usize,
    },
}

/// Field-level failure before the row index is known.
#[derive(Debug)]
pub struct FieldError {
    column: &'static str,
    value: String,
    expected: &'static str,
}

pub type FieldResult<T> = std::result::Result<T, FieldError>;

/// A type decodable from one row with a fixed field count.
pub trait FromRow: Sized {
    const SHAPE: &'static str;
    const FIELDS: usize;

    fn from_fields(fields: &[String]) -> FieldResult<Self>;
}

/// Decode every row, rejecting the whole set on the first bad row.
///
/// `cap` is the row limit the query asked for; more rows than that means the
/// source ignored the limit and the set is not trustworthy.
pub fn decode_rows<T: FromRow>(rows: &[Row], cap: usize) -> Result<Vec<T>, RowError> {
    if rows.len() > cap {
        return Err(RowError::OverCap {
            shape: T::SHAPE,
            cap,
            found: rows.len(),
        });
    }
    rows.iter()
        .enumerate()
        .map(|(idx, row)| decode_row(idx, row))
        .collect()
}

/// Decode a single row, reporting it as row `idx`.
pub fn decode_row<T: FromRow>(idx: usize, row: &Row) -> Result<T, RowError> {
    if row.len() != T::FIELDS {
        return Err(RowError::FieldCount {
            row: idx,
            shape: T::SHAPE,
            expected: T::FIELDS,
            found: row.len(),
        });
    }
    T::from_fields(row.fields()).map_err(|e| RowError::FieldType {
        row: idx,
        column: e.column,
        value: e.value,
        expected: e.expected,
    })
}

fn field<'a>(fields: &'a [String], idx: usize) -> &'a str {
    fields.get(idx).map_or("", |f| f.trim())
}

/// Non-negative integer. SQL `NULL` (empty) is not a count.
pub fn read_u64(fields: &[String], idx: usize, column: &'static str) -> FieldResult<u64> {
    let raw = field(fields, idx);
    raw.parse::<u64>().map_err(|_| FieldError {
        column,
        value: raw.to_string(),
        expected: "a non-negative integer",
    })
}

/// Non-empty text.
pub fn read_text(fields: &[String], idx: usize, column: &'static str) -> FieldResult<String> {
    let raw = field(fields, idx);
    if raw.is_empty() {
        return Err(FieldError {
            column,
            value: String::new(),
            expected: "non-empty text",
        });
    }
    Ok(raw.to_string())
}

/// Workflow name, falling back to the placeholder when metadata is missing.
pub fn read_name(fields: &[String], idx: usize) -> String {
    let raw = fields.get(idx).map_or("", String::as_str);
    if raw.trim().is_empty() {
        UNKNOWN_WORKFLOW_NAME.to_string()
    } else {
        raw.to_string()
    }
}

pub fn read_flag(fields: &[String], idx: usize, column: &'static str) -> FieldResult<bool> {
    match field(fields, idx).to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" | "" => Ok(false),
        other => Err(FieldError {
            column,
            value: other.to_string(),
            expected: "a boolean flag",
        }),
    }
}

pub fn read_date(fields: &[String], idx: usize, column: &'static str) -> FieldResult<NaiveDate> {
    let raw = field(fields, idx);
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| FieldError {
        column,
        value: raw.to_string(),
        expected: "a YYYY-MM-DD date",
    })
}

impl FromRow for TableSize {
    const SHAPE: &'static str = "table size";
    const FIELDS: usize = 2;

    fn from_fields(fields: &[String]) -> FieldResult<Self> {
        Ok(Self {
            table_name: read_text(fields, 0, "name")?,
            size_bytes: read_u64(fields, 1, "size_bytes")?,
        })
    }
}

impl FromRow for WorkflowAggregate {
    const SHAPE: &'static str = "workflow aggregate";
    const FIELDS: usize = 7;

    fn from_fields(fields: &[String]) -> FieldResult<Self> {
        Ok(Self {
            id: read_text(fields, 0, "workflow_id")?,
            name: read_name(fields, 1),
            active: read_flag(fields, 2, "active")?,
            exec_count_24h: read_u64(fields, 3, "exec_count_24h")?,
            error_count_24h: read_u64(fields, 4, "error_count_24h")?,
            stored_bytes: read_u64(fields, 5, "stored_bytes")?,
            exec_count_total: read_u64(fields, 6, "exec_count_total")?,
        })
    }
}

impl FromRow for LargeRecord {
    const SHAPE: &'static str = "large record";
    const FIELDS: usize = 3;

    fn from_fields(fields: &[String]) -> FieldResult<Self> {
        Ok(Self {
            record_id: read_text(fields, 0, "execution_id")?,
            workflow_name: read_name(fields, 1),
            size_bytes: read_u64(fields, 2, "size_bytes")?,
        })
    }
}

impl FromRow for GrowthPoint {
    const SHAPE: &'static str = "growth point";
    const FIELDS: usize = 2;

    fn from_fields(fields: &[String]) -> FieldResult<Self> {
        Ok(Self {
            date: read_date(fields, 0, "date")?,
            count: read_u64(fields, 1, "count")?,
        })
    }
}

impl FromRow for StatusCount {
    const SHAPE: &'static str = "status count";
    const FIELDS: usize = 2;

    fn from_fields(fields: &[String]) -> FieldResult<Self> {
        Ok(Self {
            status: read_name(fields, 0),
            count: read_u64(fields, 1, "count")?,
        })
    }
}
