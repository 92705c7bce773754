//! Metrics source over a local SQLite file, such as a downloaded backup.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::core::errors::{MedicError, Result};
use crate::source::{
    MetricsSource, QuerySpec, ResourceSpec, Row, Scalar, SourceError, SourceResult, Target,
};

/// Read-only view of an instance database file.
pub struct SqliteSource {
    conn: Connection,
    path: PathBuf,
}

impl SqliteSource {
    /// Open `path` read-only. The file must already exist.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MedicError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "database file not found"),
            ));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn query_error(label: &str, error: &rusqlite::Error) -> SourceError {
    match error {
        rusqlite::Error::QueryReturnedNoRows => SourceError::Malformed {
            label: label.to_string(),
            details: "query returned no rows".to_string(),
        },
        other => SourceError::QueryFailed {
            label: label.to_string(),
            details: other.to_string(),
        },
    }
}

fn value_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(n) => n.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

impl MetricsSource for SqliteSource {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn scalar_query(&self, _target: &Target, spec: &QuerySpec) -> SourceResult<Scalar> {
        self.conn
            .query_row(&spec.sql, [], |row| {
                Ok(match row.get_ref(0)? {
                    ValueRef::Integer(n) => Scalar::Integer(n),
                    other => Scalar::Text(value_text(other)),
                })
            })
            .map_err(|e| query_error(spec.label, &e))
    }

    fn row_query(&self, _target: &Target, spec: &QuerySpec) -> SourceResult<Vec<Row>> {
        let mut stmt = self
            .conn
            .prepare(&spec.sql)
            .map_err(|e| query_error(spec.label, &e))?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|idx| row.get_ref(idx).map(value_text))
                    .collect::<rusqlite::Result<Row>>()
            })
            .map_err(|e| query_error(spec.label, &e))?;
        rows.collect::<rusqlite::Result<Vec<Row>>>()
            .map_err(|e| query_error(spec.label, &e))
    }

    /// The size of the opened file; the resource path names the remote
    /// location and has no meaning for a local copy.
    fn byte_size_probe(&self, _target: &Target, resource: &ResourceSpec) -> SourceResult<u64> {
        fs::metadata(&self.path)
            .map(|meta| meta.len())
            .map_err(|e| SourceError::QueryFailed {
                label: resource.label.to_string(),
                details: format!("{}: {e}", self.path.display()),
            })
    }
}
