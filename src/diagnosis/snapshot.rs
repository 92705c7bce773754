//! Snapshot data model.
//!
//! A [`DiagnosticSnapshot`] is built once per investigation and is never
//! mutated afterwards. Every probed field is a [`MetricValue`], so "probe
//! failed" and "zero" stay distinct all the way to the renderer.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Either a probed value or `Unknown` when the probe produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum MetricValue<T> {
    Known(T),
    Unknown,
}

impl<T> MetricValue<T> {
    #[must_use]
    pub const fn known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown => None,
        }
    }

    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MetricValue<U> {
        match self {
            Self::Known(value) => MetricValue::Known(f(value)),
            Self::Unknown => MetricValue::Unknown,
        }
    }
}

impl<T> Default for MetricValue<T> {
    fn default() -> Self {
        Self::Unknown
    }
}

impl<T> From<Option<T>> for MetricValue<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

/// Per-workflow execution and storage statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowAggregate {
    pub id: String,
    /// `"Unknown"` when the workflow row is missing.
    pub name: String,
    pub active: bool,
    pub exec_count_24h: u64,
    pub error_count_24h: u64,
    pub stored_bytes: u64,
    pub exec_count_total: u64,
}

/// Placeholder name for executions whose workflow metadata is gone.
pub const UNKNOWN_WORKFLOW_NAME: &str = "Unknown";

/// Point-in-time queue depth by lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueCounts {
    /// Not yet started.
    pub pending: u64,
    /// Suspended until a resume signal.
    pub waiting: u64,
    pub running: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSize {
    pub table_name: String,
    pub size_bytes: u64,
}

/// Executions started on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthPoint {
    pub date: NaiveDate,
    pub count: u64,
}

/// One stored execution payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeRecord {
    pub record_id: String,
    pub workflow_name: String,
    pub size_bytes: u64,
}

/// Execution count for one status value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: u64,
}

/// Orchestrator view of the instance process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHealth {
    pub phase: String,
    /// True when every container reports ready.
    pub ready: bool,
    /// Highest restart count of any container.
    pub restart_count: u64,
}

/// Identity of every probe the aggregator runs, in run order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProbeId {
    DbSize,
    TableSizes,
    QueueCounts,
    TotalExecutions,
    ActiveWorkflows,
    Errors24h,
    StuckWaiting,
    StatusBreakdown,
    TopByVolume,
    TopByErrors,
    TopByStoredBytes,
    LargestRecords,
    GrowthSeries,
    ProcessStatus,
}

impl ProbeId {
    pub const ALL: [Self; 14] = [
        Self::DbSize,
        Self::TableSizes,
        Self::QueueCounts,
        Self::TotalExecutions,
        Self::ActiveWorkflows,
        Self::Errors24h,
        Self::StuckWaiting,
        Self::StatusBreakdown,
        Self::TopByVolume,
        Self::TopByErrors,
        Self::TopByStoredBytes,
        Self::LargestRecords,
        Self::GrowthSeries,
        Self::ProcessStatus,
    ];

    /// Stable label; also the label of the source call the probe issues.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DbSize => "db_size",
            Self::TableSizes => "table_sizes",
            Self::QueueCounts => "queue_counts",
            Self::TotalExecutions => "total_executions",
            Self::ActiveWorkflows => "active_workflows",
            Self::Errors24h => "errors_24h",
            Self::StuckWaiting => "stuck_waiting",
            Self::StatusBreakdown => "status_breakdown",
            Self::TopByVolume => "top_by_volume",
            Self::TopByErrors => "top_by_errors",
            Self::TopByStoredBytes => "top_by_stored_bytes",
            Self::LargestRecords => "largest_records",
            Self::GrowthSeries => "growth_series",
            Self::ProcessStatus => "process_status",
        }
    }
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure class recorded for a probe that produced `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The source call failed, timed out, or is unsupported.
    ProbeUnavailable,
    /// The source answered, but the rows did not decode.
    MalformedRow,
}

impl FailureKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ProbeUnavailable => "probe_unavailable",
            Self::MalformedRow => "malformed_row",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl ProbeFailure {
    #[must_use]
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ProbeUnavailable,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::MalformedRow,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.detail)
    }
}

/// Everything one investigation learned about one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticSnapshot {
    pub captured_at: DateTime<Utc>,
    pub target_id: String,
    pub db_size: MetricValue<u64>,
    /// Descending by size.
    pub table_sizes: MetricValue<Vec<TableSize>>,
    pub queue: MetricValue<QueueCounts>,
    pub total_executions: MetricValue<u64>,
    pub active_workflow_count: MetricValue<u64>,
    pub error_count_24h: MetricValue<u64>,
    /// Waiting executions whose resume date is the far-future sentinel.
    pub stuck_waiting: MetricValue<u64>,
    pub status_breakdown: MetricValue<Vec<StatusCount>>,
    /// At most 5.
    pub top_workflows_by_volume: MetricValue<Vec<WorkflowAggregate>>,
    /// At most 5.
    pub top_workflows_by_errors: MetricValue<Vec<WorkflowAggregate>>,
    /// At most 10.
    pub top_workflows_by_stored_bytes: MetricValue<Vec<WorkflowAggregate>>,
    /// At most 10.
    pub largest_records: MetricValue<Vec<LargeRecord>>,
    /// At most 7, newest first.
    pub growth_series: MetricValue<Vec<GrowthPoint>>,
    pub process_health: MetricValue<ProcessHealth>,
    /// Why each `Unknown` field is unknown.
    #[serde(default)]
    pub failures: BTreeMap<ProbeId, ProbeFailure>,
}

impl DiagnosticSnapshot {
    /// A snapshot with every field `Unknown` and no recorded failures.
    #[must_use]
    pub fn empty(target_id: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            target_id: target_id.into(),
            db_size: MetricValue::Unknown,
            table_sizes: MetricValue::Unknown,
            queue: MetricValue::Unknown,
            total_executions: MetricValue::Unknown,
            active_workflow_count: MetricValue::Unknown,
            error_count_24h: MetricValue::Unknown,
            stuck_waiting: MetricValue::Unknown,
            status_breakdown: MetricValue::Unknown,
            top_workflows_by_volume: MetricValue::Unknown,
            top_workflows_by_errors: MetricValue::Unknown,
            top_workflows_by_stored_bytes: MetricValue::Unknown,
            largest_records: MetricValue::Unknown,
            growth_series: MetricValue::Unknown,
            process_health: MetricValue::Unknown,
            failures: BTreeMap::new(),
        }
    }

    /// Whether the field fed by `probe` holds a value.
    #[must_use]
    pub const fn is_known(&self, probe: ProbeId) -> bool {
        match probe {
            ProbeId::DbSize => self.db_size.is_known(),
            ProbeId::TableSizes => self.table_sizes.is_known(),
            ProbeId::QueueCounts => self.queue.is_known(),
            ProbeId::TotalExecutions => self.total_executions.is_known(),
            ProbeId::ActiveWorkflows => self.active_workflow_count.is_known(),
            ProbeId::Errors24h => self.error_count_24h.is_known(),
            ProbeId::StuckWaiting => self.stuck_waiting.is_known(),
            ProbeId::StatusBreakdown => self.status_breakdown.is_known(),
            ProbeId::TopByVolume => self.top_workflows_by_volume.is_known(),
            ProbeId::TopByErrors => self.top_workflows_by_errors.is_known(),
            ProbeId::TopByStoredBytes => self.top_workflows_by_stored_bytes.is_known(),
            ProbeId::LargestRecords => self.largest_records.is_known(),
            ProbeId::GrowthSeries => self.growth_series.is_known(),
            ProbeId::ProcessStatus => self.process_health.is_known(),
        }
    }

    /// Number of probed fields that are `Unknown`.
    #[must_use]
    pub fn unknown_count(&self) -> usize {
        ProbeId::ALL
            .iter()
            .filter(|probe| !self.is_known(**probe))
            .count()
    }

    /// Size of a named table, when table sizes are known and list it.
    #[must_use]
    pub fn table_size(&self, name: &str) -> Option<u64> {
        self.table_sizes
            .known()?
            .iter()
            .find(|table| table.table_name == name)
            .map(|table| table.size_bytes)
    }
}
