//! Metrics sources: the seam between probes and whatever reaches an instance.
//!
//! A [`MetricsSource`] answers three kinds of question about a [`Target`]: a
//! scalar query, a row query, and a byte-size probe. Every call either
//! returns data or a [`SourceError`]; an empty row set is data, not a failure.
//! Probes own the conversion of these results into snapshot values.

#![allow(missing_docs)]

pub mod kubectl;
pub mod scripted;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The instance under diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Tenant identifier (the Kubernetes namespace for the kubectl source).
    pub id: String,
    /// Explicit pod name; resolved from the namespace when absent.
    pub pod: Option<String>,
}

impl Target {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pod: None,
        }
    }

    #[must_use]
    pub fn with_pod(mut self, pod: impl Into<String>) -> Self {
        self.pod = Some(pod.into());
        self
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pod {
            Some(pod) => write!(f, "{}/{pod}", self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// A query against the instance's persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    /// Stable probe label; scripted sources key their responses on it.
    pub label: &'static str,
    pub sql: String,
}

impl QuerySpec {
    #[must_use]
    pub fn new(label: &'static str, sql: impl Into<String>) -> Self {
        Self {
            label,
            sql: sql.into(),
        }
    }
}

/// A file whose size is probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    pub label: &'static str,
    pub path: String,
}

impl ResourceSpec {
    #[must_use]
    pub fn new(label: &'static str, path: impl Into<String>) -> Self {
        Self {
            label,
            path: path.into(),
        }
    }
}

/// Result of a scalar query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Integer(i64),
    Text(String),
}

impl Scalar {
    /// Interpret the value as a non-negative count.
    #[must_use]
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Integer(n) => u64::try_from(*n).ok(),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// One row of a row query, already split into plain-text fields.
///
/// NULL columns arrive as empty strings, matching the sqlite3 CLI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    fields: Vec<String>,
}

impl Row {
    #[must_use]
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Split one delimited record into fields.
    #[must_use]
    pub fn split(record: &str, separator: char) -> Self {
        Self::new(record.split(separator).map(str::to_string).collect())
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Row {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// Raw process status as reported by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessStatus {
    pub phase: String,
    pub container_ready: Vec<bool>,
    pub restart_counts: Vec<u32>,
}

/// Why a source call produced no data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("target {target} unreachable: {details}")]
    Unreachable { target: String, details: String },

    #[error("{label} timed out after {secs}s")]
    Timeout { label: String, secs: u64 },

    #[error("{label} exited with status {code}: {stderr}")]
    CommandFailed {
        label: String,
        code: i32,
        stderr: String,
    },

    #[error("{label} query failed: {details}")]
    QueryFailed { label: String, details: String },

    #[error("{label} returned malformed output: {details}")]
    Malformed { label: String, details: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{operation} is not supported by the {source_name} source")]
    Unsupported {
        operation: &'static str,
        source_name: &'static str,
    },
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Contract consumed by probes.
///
/// Implementations run one call at a time and may block; they must bound
/// each call with their own timeout and report it as [`SourceError::Timeout`].
pub trait MetricsSource {
    /// Short name for diagnostics (`kubectl`, `sqlite`, ...).
    fn name(&self) -> &'static str;

    fn scalar_query(&self, target: &Target, spec: &QuerySpec) -> SourceResult<Scalar>;

    fn row_query(&self, target: &Target, spec: &QuerySpec) -> SourceResult<Vec<Row>>;

    /// Size of a resource in bytes. Never a human-readable string.
    fn byte_size_probe(&self, target: &Target, resource: &ResourceSpec) -> SourceResult<u64>;

    /// Orchestrator view of the process. Optional capability.
    fn process_status(&self, _target: &Target) -> SourceResult<ProcessStatus> {
        Err(SourceError::Unsupported {
            operation: "process_status",
            source_name: self.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_as_count_rejects_negative_and_garbage() {
        assert_eq!(Scalar::Integer(42).as_count(), Some(42));
        assert_eq!(Scalar::Integer(-1).as_count(), None);
        assert_eq!(Scalar::Text(" 17\n".to_string()).as_count(), Some(17));
        assert_eq!(Scalar::Text("Error: no such table".to_string()).as_count(), None);
    }

    #[test]
    fn row_split_keeps_empty_fields() {
        let row = Row::split("a||c", '|');
        assert_eq!(row.len(), 3);
        assert_eq!(row.fields()[1], "");
    }

    #[test]
    fn target_display_includes_pod_when_known() {
        assert_eq!(Target::new("acme").to_string(), "acme");
        assert_eq!(Target::new("acme").with_pod("n8n-0").to_string(), "acme/n8n-0");
    }
}
