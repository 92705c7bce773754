//! Culprit classification.
//!
//! `classify` runs a fixed, ordered list of rules over a snapshot. Every rule
//! reads only the fields it needs and abstains when any of them is
//! `Unknown`. Output order is rule order; it is never re-sorted.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::units::format_bytes;
use crate::diagnosis::snapshot::DiagnosticSnapshot;

/// Rule thresholds. Every comparison is strict (`value > threshold`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub execution_data_bloat_bytes: u64,
    pub inactive_workflow_bytes: u64,
    pub large_record_bytes: u64,
    pub pending_backlog: u64,
    pub database_overall_bytes: u64,
    /// Table holding execution payloads.
    pub execution_payload_table: String,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            execution_data_bloat_bytes: 100_000_000,
            inactive_workflow_bytes: 10_000_000,
            large_record_bytes: 10_000_000,
            pending_backlog: 100,
            database_overall_bytes: 200_000_000,
            execution_payload_table: "execution_data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CulpritKind {
    DatabaseBloat,
    InactiveWorkflowData,
    LargeIndividualRecords,
    PendingBacklog,
    LargeDatabaseOverall,
}

impl CulpritKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DatabaseBloat => "database_bloat",
            Self::InactiveWorkflowData => "inactive_workflow_data",
            Self::LargeIndividualRecords => "large_individual_records",
            Self::PendingBacklog => "pending_backlog",
            Self::LargeDatabaseOverall => "large_database_overall",
        }
    }
}

impl fmt::Display for CulpritKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A candidate root cause with a recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Culprit {
    pub kind: CulpritKind,
    pub title: String,
    pub description: String,
    pub recommendation: String,
    /// Snapshot field (and entry, where relevant) the rule fired on.
    pub evidence_ref: String,
}

type Rule = fn(&DiagnosticSnapshot, &Thresholds) -> Option<Culprit>;

/// Evaluation order.
const RULES: [Rule; 5] = [
    database_bloat,
    inactive_workflow_data,
    large_individual_records,
    pending_backlog,
    large_database_overall,
];

/// Classify with default thresholds.
#[must_use]
pub fn classify(snapshot: &DiagnosticSnapshot) -> Vec<Culprit> {
    classify_with(snapshot, &Thresholds::default())
}

/// Classify with explicit thresholds. Pure; an empty result means no rule fired.
#[must_use]
pub fn classify_with(snapshot: &DiagnosticSnapshot, thresholds: &Thresholds) -> Vec<Culprit> {
    RULES
        .iter()
        .filter_map(|rule| rule(snapshot, thresholds))
        .collect()
}

fn database_bloat(snapshot: &DiagnosticSnapshot, t: &Thresholds) -> Option<Culprit> {
    let table = &t.execution_payload_table;
    let size = snapshot.table_size(table)?;
    (size > t.execution_data_bloat_bytes).then(|| Culprit {
        kind: CulpritKind::DatabaseBloat,
        title: format!("Execution payload table {table} is bloated"),
        description: format!(
            "{table} holds {}, above the {} limit. Every execution keeps its full payload until pruned.",
            format_bytes(size),
            format_bytes(t.execution_data_bloat_bytes)
        ),
        recommendation: "Prune old execution payload records: enable execution data pruning \
                         (EXECUTIONS_DATA_PRUNE=true with a short EXECUTIONS_DATA_MAX_AGE), \
                         then VACUUM the database."
            .to_string(),
        evidence_ref: format!("table_sizes[{table}]"),
    })
}

fn inactive_workflow_data(snapshot: &DiagnosticSnapshot, t: &Thresholds) -> Option<Culprit> {
    let workflows = snapshot.top_workflows_by_stored_bytes.known()?;
    let (idx, workflow) = workflows
        .iter()
        .enumerate()
        .find(|(_, wf)| !wf.active && wf.stored_bytes > t.inactive_workflow_bytes)?;
    Some(Culprit {
        kind: CulpritKind::InactiveWorkflowData,
        title: format!("Inactive workflow \"{}\" retains execution data", workflow.name),
        description: format!(
            "Workflow {} ({}) is inactive but still stores {} of execution data across {} executions.",
            workflow.name,
            workflow.id,
            format_bytes(workflow.stored_bytes),
            workflow.exec_count_total
        ),
        recommendation: format!(
            "Delete the stored executions of workflow {} or archive the workflow if it is no longer needed.",
            workflow.id
        ),
        evidence_ref: format!("top_workflows_by_stored_bytes[{idx}]"),
    })
}

fn large_individual_records(snapshot: &DiagnosticSnapshot, t: &Thresholds) -> Option<Culprit> {
    let records = snapshot.largest_records.known()?;
    let large = records
        .iter()
        .filter(|record| record.size_bytes > t.large_record_bytes)
        .count();
    (large > 0).then(|| Culprit {
        kind: CulpritKind::LargeIndividualRecords,
        title: format!("{large} execution record(s) larger than {}", format_bytes(t.large_record_bytes)),
        description: format!(
            "{large} stored execution payload(s) exceed {}. Loading one of them can exhaust instance memory.",
            format_bytes(t.large_record_bytes)
        ),
        recommendation: "Reduce payload sizes: avoid passing binary data between nodes, \
                         set EXECUTIONS_DATA_SAVE_ON_SUCCESS=none for high-volume workflows, \
                         and split large batches."
            .to_string(),
        evidence_ref: "largest_records".to_string(),
    })
}

fn pending_backlog(snapshot: &DiagnosticSnapshot, t: &Thresholds) -> Option<Culprit> {
    let queue = snapshot.queue.known()?;
    (queue.pending > t.pending_backlog).then(|| Culprit {
        kind: CulpritKind::PendingBacklog,
        title: format!("{} executions pending", queue.pending),
        description: format!(
            "{} executions are queued but not started (limit {}). The instance replays them on boot.",
            queue.pending, t.pending_backlog
        ),
        recommendation: "Clear the backlog: cancel pending executions and find the trigger flooding the queue."
            .to_string(),
        evidence_ref: "queue.pending".to_string(),
    })
}

fn large_database_overall(snapshot: &DiagnosticSnapshot, t: &Thresholds) -> Option<Culprit> {
    let size = *snapshot.db_size.known()?;
    (size > t.database_overall_bytes).then(|| Culprit {
        kind: CulpritKind::LargeDatabaseOverall,
        title: format!("Database is {}", format_bytes(size)),
        description: format!(
            "The database file is {}, above the {} limit.",
            format_bytes(size),
            format_bytes(t.database_overall_bytes)
        ),
        recommendation: "Review data retention: lower execution history age and count limits, \
                         then VACUUM to reclaim space."
            .to_string(),
        evidence_ref: "db_size".to_string(),
    })
}
