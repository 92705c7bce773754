//! SQL issued by each probe against the instance database.
//!
//! Every row query carries its own `LIMIT`; callers never truncate.

use crate::diagnosis::snapshot::ProbeId;
use crate::source::{QuerySpec, ResourceSpec};

pub const TOP_VOLUME_LIMIT: usize = 5;
pub const TOP_ERRORS_LIMIT: usize = 5;
pub const TOP_STORED_LIMIT: usize = 10;
pub const LARGEST_RECORDS_LIMIT: usize = 10;
pub const TABLE_SIZES_LIMIT: usize = 10;
pub const GROWTH_DAYS: usize = 7;
/// Distinct execution statuses are a small closed set upstream.
pub const STATUS_LIMIT: usize = 20;

/// Resume date used for executions parked with no real wake-up time.
pub const FAR_FUTURE_WAIT: &str = "3000-01-01 00:00:00.000";

const ERROR_STATUSES: &str = "('error', 'crashed', 'failed')";
const LAST_DAY: &str = "datetime('now', '-1 day')";

pub fn database_file(path: &str) -> ResourceSpec {
    ResourceSpec::new(ProbeId::DbSize.label(), path)
}

pub fn table_sizes() -> QuerySpec {
    QuerySpec::new(
        ProbeId::TableSizes.label(),
        format!(
            "SELECT name, SUM(pgsize) FROM dbstat GROUP BY name ORDER BY 2 DESC, 1 LIMIT {TABLE_SIZES_LIMIT};"
        ),
    )
}

pub fn queue_counts() -> QuerySpec {
    QuerySpec::new(
        ProbeId::QueueCounts.label(),
        "SELECT COUNT(CASE WHEN status = 'new' THEN 1 END), \
         COUNT(CASE WHEN status = 'waiting' THEN 1 END), \
         COUNT(CASE WHEN status = 'running' THEN 1 END) \
         FROM execution_entity;",
    )
}

pub fn total_executions() -> QuerySpec {
    QuerySpec::new(
        ProbeId::TotalExecutions.label(),
        "SELECT COUNT(*) FROM execution_entity;",
    )
}

pub fn active_workflows() -> QuerySpec {
    QuerySpec::new(
        ProbeId::ActiveWorkflows.label(),
        "SELECT COUNT(*) FROM workflow_entity WHERE active = 1;",
    )
}

pub fn errors_24h() -> QuerySpec {
    QuerySpec::new(
        ProbeId::Errors24h.label(),
        format!(
            "SELECT COUNT(*) FROM execution_entity \
             WHERE status IN {ERROR_STATUSES} AND datetime(startedAt) > {LAST_DAY};"
        ),
    )
}

pub fn stuck_waiting() -> QuerySpec {
    QuerySpec::new(
        ProbeId::StuckWaiting.label(),
        format!(
            "SELECT COUNT(*) FROM execution_entity \
             WHERE status = 'waiting' AND waitTill = '{FAR_FUTURE_WAIT}';"
        ),
    )
}

pub fn status_breakdown() -> QuerySpec {
    QuerySpec::new(
        ProbeId::StatusBreakdown.label(),
        format!(
            "SELECT status, COUNT(*) FROM execution_entity \
             GROUP BY status ORDER BY 2 DESC, 1 LIMIT {STATUS_LIMIT};"
        ),
    )
}

/// Per-workflow aggregate rows:
/// `id | name | active | exec_24h | errors_24h | stored_bytes | exec_total`.
fn workflow_aggregates(label: &'static str, tail: &str) -> QuerySpec {
    QuerySpec::new(
        label,
        format!(
            "SELECT e.workflowId, \
             COALESCE(w.name, 'Unknown'), \
             COALESCE(w.active, 0), \
             COUNT(CASE WHEN datetime(e.startedAt) > {LAST_DAY} THEN 1 END) AS exec_24h, \
             COUNT(CASE WHEN datetime(e.startedAt) > {LAST_DAY} AND e.status IN {ERROR_STATUSES} THEN 1 END) AS errors_24h, \
             COALESCE(SUM(LENGTH(CAST(d.data AS BLOB))), 0) AS stored_bytes, \
             COUNT(*) AS exec_total \
             FROM execution_entity e \
             LEFT JOIN workflow_entity w ON w.id = e.workflowId \
             LEFT JOIN execution_data d ON d.executionId = e.id \
             WHERE e.workflowId IS NOT NULL \
             GROUP BY e.workflowId {tail};"
        ),
    )
}

pub fn top_by_volume() -> QuerySpec {
    workflow_aggregates(
        ProbeId::TopByVolume.label(),
        &format!("ORDER BY exec_24h DESC, exec_total DESC, e.workflowId LIMIT {TOP_VOLUME_LIMIT}"),
    )
}

pub fn top_by_errors() -> QuerySpec {
    workflow_aggregates(
        ProbeId::TopByErrors.label(),
        &format!(
            "HAVING errors_24h > 0 ORDER BY errors_24h DESC, e.workflowId LIMIT {TOP_ERRORS_LIMIT}"
        ),
    )
}

pub fn top_by_stored_bytes() -> QuerySpec {
    workflow_aggregates(
        ProbeId::TopByStoredBytes.label(),
        &format!(
            "HAVING stored_bytes > 0 ORDER BY stored_bytes DESC, e.workflowId LIMIT {TOP_STORED_LIMIT}"
        ),
    )
}

pub fn largest_records() -> QuerySpec {
    QuerySpec::new(
        ProbeId::LargestRecords.label(),
        format!(
            "SELECT d.executionId, COALESCE(w.name, 'Unknown'), LENGTH(CAST(d.data AS BLOB)) \
             FROM execution_data d \
             LEFT JOIN execution_entity e ON e.id = d.executionId \
             LEFT JOIN workflow_entity w ON w.id = e.workflowId \
             ORDER BY 3 DESC, 1 LIMIT {LARGEST_RECORDS_LIMIT};"
        ),
    )
}

pub fn growth_series() -> QuerySpec {
    QuerySpec::new(
        ProbeId::GrowthSeries.label(),
        format!(
            "SELECT date(startedAt), COUNT(*) FROM execution_entity \
             WHERE datetime(startedAt) >= datetime('now', '-{GROWTH_DAYS} days') \
             GROUP BY 1 ORDER BY 1 DESC LIMIT {GROWTH_DAYS};"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_queries_carry_their_limits() {
        for (spec, limit) in [
            (top_by_volume(), TOP_VOLUME_LIMIT),
            (top_by_errors(), TOP_ERRORS_LIMIT),
            (top_by_stored_bytes(), TOP_STORED_LIMIT),
            (largest_records(), LARGEST_RECORDS_LIMIT),
            (growth_series(), GROWTH_DAYS),
            (table_sizes(), TABLE_SIZES_LIMIT),
        ] {
            assert!(
                spec.sql.contains(&format!("LIMIT {limit};")),
                "{} lacks LIMIT {limit}: {}",
                spec.label,
                spec.sql
            );
        }
    }

    #[test]
    fn labels_match_probe_ids() {
        assert_eq!(queue_counts().label, "queue_counts");
        assert_eq!(database_file("database.sqlite").label, "db_size");
        assert_eq!(top_by_stored_bytes().label, "top_by_stored_bytes");
    }
}
