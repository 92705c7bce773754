//! One probe per snapshot metric.
//!
//! Each probe issues exactly one [`MetricsSource`] call and turns its answer
//! into a typed value. Failures come back as a [`ProbeFailure`]; the
//! aggregator converts them to `Unknown`. A probe never returns part of a
//! row set.

#![allow(missing_docs)]

pub mod queries;
pub mod rows;

use crate::diagnosis::snapshot::{
    GrowthPoint, LargeRecord, ProbeFailure, ProcessHealth, QueueCounts, StatusCount, TableSize,
    WorkflowAggregate,
};
use crate::source::{MetricsSource, QuerySpec, Row, SourceError, Target};

use self::rows::{FieldResult, FromRow, RowError, decode_row, decode_rows, read_u64};

pub type ProbeOutcome<T> = std::result::Result<T, ProbeFailure>;

impl From<SourceError> for ProbeFailure {
    fn from(error: SourceError) -> Self {
        match error {
            // The source answered; its answer was unusable.
            SourceError::Malformed { .. } => Self::malformed(error.to_string()),
            other => Self::unavailable(other.to_string()),
        }
    }
}

impl From<RowError> for ProbeFailure {
    fn from(error: RowError) -> Self {
        Self::malformed(error.to_string())
    }
}

/// Which top-N workflow list to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    Volume,
    Errors,
    StoredBytes,
}

impl Ranking {
    #[must_use]
    pub const fn limit(self) -> usize {
        match self {
            Self::Volume => queries::TOP_VOLUME_LIMIT,
            Self::Errors => queries::TOP_ERRORS_LIMIT,
            Self::StoredBytes => queries::TOP_STORED_LIMIT,
        }
    }

    fn query(self) -> QuerySpec {
        match self {
            Self::Volume => queries::top_by_volume(),
            Self::Errors => queries::top_by_errors(),
            Self::StoredBytes => queries::top_by_stored_bytes(),
        }
    }
}

fn count(source: &dyn MetricsSource, target: &Target, spec: &QuerySpec) -> ProbeOutcome<u64> {
    let scalar = source.scalar_query(target, spec)?;
    scalar.as_count().ok_or_else(|| {
        ProbeFailure::malformed(format!("{}: {scalar:?} is not a count", spec.label))
    })
}

fn rows_of<T: FromRow>(
    source: &dyn MetricsSource,
    target: &Target,
    spec: &QuerySpec,
    cap: usize,
) -> ProbeOutcome<Vec<T>> {
    let rows = source.row_query(target, spec)?;
    decode_rows(&rows, cap).map_err(|e| ProbeFailure::malformed(format!("{}: {e}", spec.label)))
}

/// Database file size in bytes.
pub fn db_size(source: &dyn MetricsSource, target: &Target, database_path: &str) -> ProbeOutcome<u64> {
    Ok(source.byte_size_probe(target, &queries::database_file(database_path))?)
}

/// Largest tables, descending by size.
pub fn table_sizes(source: &dyn MetricsSource, target: &Target) -> ProbeOutcome<Vec<TableSize>> {
    let mut tables: Vec<TableSize> = rows_of(
        source,
        target,
        &queries::table_sizes(),
        queries::TABLE_SIZES_LIMIT,
    )?;
    // Sources without ORDER BY support still yield a descending list.
    tables.sort_by(|a, b| {
        b.size_bytes
            .cmp(&a.size_bytes)
            .then_with(|| a.table_name.cmp(&b.table_name))
    });
    Ok(tables)
}

struct QueueRow(QueueCounts);

impl FromRow for QueueRow {
    const SHAPE: &'static str = "queue counts";
    const FIELDS: usize = 3;

    fn from_fields(fields: &[String]) -> FieldResult<Self> {
        Ok(Self(QueueCounts {
            pending: read_u64(fields, 0, "pending")?,
            waiting: read_u64(fields, 1, "waiting")?,
            running: read_u64(fields, 2, "running")?,
        }))
    }
}

pub fn queue_counts(source: &dyn MetricsSource, target: &Target) -> ProbeOutcome<QueueCounts> {
    let spec = queries::queue_counts();
    let rows: Vec<Row> = source.row_query(target, &spec)?;
    match rows.as_slice() {
        [row] => Ok(decode_row::<QueueRow>(0, row)?.0),
        other => Err(ProbeFailure::malformed(format!(
            "{}: expected exactly one row, found {}",
            spec.label,
            other.len()
        ))),
    }
}

pub fn total_executions(source: &dyn MetricsSource, target: &Target) -> ProbeOutcome<u64> {
    count(source, target, &queries::total_executions())
}

pub fn active_workflow_count(source: &dyn MetricsSource, target: &Target) -> ProbeOutcome<u64> {
    count(source, target, &queries::active_workflows())
}

pub fn error_count_24h(source: &dyn MetricsSource, target: &Target) -> ProbeOutcome<u64> {
    count(source, target, &queries::errors_24h())
}

/// Waiting executions parked on the far-future resume date.
pub fn stuck_waiting(source: &dyn MetricsSource, target: &Target) -> ProbeOutcome<u64> {
    count(source, target, &queries::stuck_waiting())
}

pub fn status_breakdown(
    source: &dyn MetricsSource,
    target: &Target,
) -> ProbeOutcome<Vec<StatusCount>> {
    rows_of(
        source,
        target,
        &queries::status_breakdown(),
        queries::STATUS_LIMIT,
    )
}

pub fn top_workflows(
    source: &dyn MetricsSource,
    target: &Target,
    ranking: Ranking,
) -> ProbeOutcome<Vec<WorkflowAggregate>> {
    rows_of(source, target, &ranking.query(), ranking.limit())
}

pub fn largest_records(
    source: &dyn MetricsSource,
    target: &Target,
) -> ProbeOutcome<Vec<LargeRecord>> {
    rows_of(
        source,
        target,
        &queries::largest_records(),
        queries::LARGEST_RECORDS_LIMIT,
    )
}

/// Daily execution counts, newest first.
pub fn growth_series(
    source: &dyn MetricsSource,
    target: &Target,
) -> ProbeOutcome<Vec<GrowthPoint>> {
    let mut points: Vec<GrowthPoint> = rows_of(
        source,
        target,
        &queries::growth_series(),
        queries::GROWTH_DAYS,
    )?;
    points.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(points)
}

pub fn process_health(source: &dyn MetricsSource, target: &Target) -> ProbeOutcome<ProcessHealth> {
    let status = source.process_status(target)?;
    let restart_count = status
        .restart_counts
        .iter()
        .map(|n| u64::from(*n))
        .max()
        .unwrap_or(0);
    let ready = !status.container_ready.is_empty() && status.container_ready.iter().all(|r| *r);
    Ok(ProcessHealth {
        phase: status.phase,
        ready,
        restart_count,
    })
}
