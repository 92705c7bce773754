//! Snapshot aggregation: run every probe, keep whatever succeeds.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::diagnosis::snapshot::{DiagnosticSnapshot, MetricValue, ProbeFailure, ProbeId};
use crate::probe::{self, ProbeOutcome, Ranking};
use crate::source::{MetricsSource, Target};

/// Runs probes one after another against a single source.
pub struct Aggregator<'a> {
    source: &'a dyn MetricsSource,
    database_path: String,
}

impl<'a> Aggregator<'a> {
    #[must_use]
    pub fn new(source: &'a dyn MetricsSource, database_path: impl Into<String>) -> Self {
        Self {
            source,
            database_path: database_path.into(),
        }
    }

    /// Build a snapshot stamped with the current time.
    #[must_use]
    pub fn aggregate(&self, target: &Target) -> DiagnosticSnapshot {
        self.aggregate_at(target, Utc::now())
    }

    /// Build a snapshot. Never fails: each probe failure becomes `Unknown`
    /// for that field and an entry in `failures`.
    #[must_use]
    pub fn aggregate_at(&self, target: &Target, captured_at: DateTime<Utc>) -> DiagnosticSnapshot {
        let source = self.source;
        let mut ledger = FailureLedger::default();

        let db_size = ledger.settle(
            ProbeId::DbSize,
            probe::db_size(source, target, &self.database_path),
        );
        let table_sizes = ledger.settle(ProbeId::TableSizes, probe::table_sizes(source, target));
        let queue = ledger.settle(ProbeId::QueueCounts, probe::queue_counts(source, target));
        let total_executions = ledger.settle(
            ProbeId::TotalExecutions,
            probe::total_executions(source, target),
        );
        let active_workflow_count = ledger.settle(
            ProbeId::ActiveWorkflows,
            probe::active_workflow_count(source, target),
        );
        let error_count_24h = ledger.settle(ProbeId::Errors24h, probe::error_count_24h(source, target));
        let stuck_waiting = ledger.settle(ProbeId::StuckWaiting, probe::stuck_waiting(source, target));
        let status_breakdown = ledger.settle(
            ProbeId::StatusBreakdown,
            probe::status_breakdown(source, target),
        );
        let top_workflows_by_volume = ledger.settle(
            ProbeId::TopByVolume,
            probe::top_workflows(source, target, Ranking::Volume),
        );
        let top_workflows_by_errors = ledger.settle(
            ProbeId::TopByErrors,
            probe::top_workflows(source, target, Ranking::Errors),
        );
        let top_workflows_by_stored_bytes = ledger.settle(
            ProbeId::TopByStoredBytes,
            probe::top_workflows(source, target, Ranking::StoredBytes),
        );
        let largest_records = ledger.settle(
            ProbeId::LargestRecords,
            probe::largest_records(source, target),
        );
        let growth_series = ledger.settle(ProbeId::GrowthSeries, probe::growth_series(source, target));
        let process_health = ledger.settle(
            ProbeId::ProcessStatus,
            probe::process_health(source, target),
        );

        DiagnosticSnapshot {
            captured_at,
            target_id: target.id.clone(),
            db_size,
            table_sizes,
            queue,
            total_executions,
            active_workflow_count,
            error_count_24h,
            stuck_waiting,
            status_breakdown,
            top_workflows_by_volume,
            top_workflows_by_errors,
            top_workflows_by_stored_bytes,
            largest_records,
            growth_series,
            process_health,
            failures: ledger.failures,
        }
    }
}

#[derive(Default)]
struct FailureLedger {
    failures: BTreeMap<ProbeId, ProbeFailure>,
}

impl FailureLedger {
    fn settle<T>(&mut self, id: ProbeId, outcome: ProbeOutcome<T>) -> MetricValue<T> {
        match outcome {
            Ok(value) => MetricValue::Known(value),
            Err(failure) => {
                self.failures.insert(id, failure);
                MetricValue::Unknown
            }
        }
    }
}
