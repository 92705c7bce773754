//! In-memory source that replays canned responses keyed by probe label.
//!
//! Used by tests and by `classify`-style dry runs. Unscripted labels answer
//! `NotFound`, so a forgotten response shows up as an unknown metric rather
//! than a silent zero.

#![allow(missing_docs)]

use std::cell::RefCell;
use std::collections::HashMap;

use crate::source::{
    MetricsSource, ProcessStatus, QuerySpec, ResourceSpec, Row, Scalar, SourceError, SourceResult,
    Target,
};

/// One canned answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Scalar(Scalar),
    Rows(Vec<Row>),
    Bytes(u64),
    Process(ProcessStatus),
    Fail(SourceError),
}

/// Scripted [`MetricsSource`].
#[derive(Debug, Default)]
pub struct ScriptedSource {
    responses: HashMap<String, Response>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, label: &str, response: Response) -> Self {
        self.responses.insert(label.to_string(), response);
        self
    }

    #[must_use]
    pub fn with_count(self, label: &str, count: i64) -> Self {
        self.with(label, Response::Scalar(Scalar::Integer(count)))
    }

    #[must_use]
    pub fn with_bytes(self, label: &str, bytes: u64) -> Self {
        self.with(label, Response::Bytes(bytes))
    }

    /// Rows given as string slices, one inner slice per row.
    #[must_use]
    pub fn with_rows(self, label: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|fields| fields.iter().copied().collect::<Row>())
            .collect();
        self.with(label, Response::Rows(rows))
    }

    #[must_use]
    pub fn with_failure(self, label: &str, error: SourceError) -> Self {
        self.with(label, Response::Fail(error))
    }

    #[must_use]
    pub fn with_process(self, status: ProcessStatus) -> Self {
        self.with(PROCESS_LABEL, Response::Process(status))
    }

    /// Labels requested so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn answer(&self, label: &str) -> SourceResult<Response> {
        self.calls.borrow_mut().push(label.to_string());
        match self.responses.get(label) {
            Some(Response::Fail(error)) => Err(error.clone()),
            Some(response) => Ok(response.clone()),
            None => Err(SourceError::NotFound {
                resource: format!("scripted response {label:?}"),
            }),
        }
    }
}

/// Label under which process status responses are stored.
pub const PROCESS_LABEL: &str = "process_status";

fn mismatch(label: &str, expected: &str) -> SourceError {
    SourceError::Malformed {
        label: label.to_string(),
        details: format!("scripted response is not {expected}"),
    }
}

impl MetricsSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn scalar_query(&self, _target: &Target, spec: &QuerySpec) -> SourceResult<Scalar> {
        match self.answer(spec.label)? {
            Response::Scalar(value) => Ok(value),
            _ => Err(mismatch(spec.label, "a scalar")),
        }
    }

    fn row_query(&self, _target: &Target, spec: &QuerySpec) -> SourceResult<Vec<Row>> {
        match self.answer(spec.label)? {
            Response::Rows(rows) => Ok(rows),
            _ => Err(mismatch(spec.label, "a row set")),
        }
    }

    fn byte_size_probe(&self, _target: &Target, resource: &ResourceSpec) -> SourceResult<u64> {
        match self.answer(resource.label)? {
            Response::Bytes(bytes) => Ok(bytes),
            _ => Err(mismatch(resource.label, "a byte count")),
        }
    }

    fn process_status(&self, _target: &Target) -> SourceResult<ProcessStatus> {
        match self.answer(PROCESS_LABEL)? {
            Response::Process(status) => Ok(status),
            _ => Err(mismatch(PROCESS_LABEL, "a process status")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscripted_label_is_not_found() {
        let source = ScriptedSource::new();
        let err = source
            .scalar_query(&Target::new("t"), &QuerySpec::new("missing", "SELECT 1"))
            .expect_err("no response scripted");
        assert!(matches!(err, SourceError::NotFound { .. }));
    }

    #[test]
    fn wrong_response_shape_is_malformed() {
        let source = ScriptedSource::new().with_bytes("db", 10);
        let err = source
            .row_query(&Target::new("t"), &QuerySpec::new("db", "SELECT 1"))
            .expect_err("bytes are not rows");
        assert!(matches!(err, SourceError::Malformed { .. }));
    }

    #[test]
    fn calls_are_recorded_in_order() {
        let source = ScriptedSource::new()
            .with_count("a", 1)
            .with_rows("b", &[&["x", "1"]]);
        let target = Target::new("t");
        let _ = source.scalar_query(&target, &QuerySpec::new("a", ""));
        let rows = source
            .row_query(&target, &QuerySpec::new("b", ""))
            .expect("rows");
        assert_eq!(rows[0].fields(), ["x", "1"]);
        assert_eq!(source.calls(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn scripted_failures_are_returned() {
        let source = ScriptedSource::new().with_failure(
            "a",
            SourceError::Timeout {
                label: "a".to_string(),
                secs: 30,
            },
        );
        let err = source
            .scalar_query(&Target::new("t"), &QuerySpec::new("a", ""))
            .expect_err("scripted failure");
        assert!(matches!(err, SourceError::Timeout { secs: 30, .. }));
    }
}
