//! Report rendering.
//!
//! Both renderers are pure functions of `(snapshot, culprits, options)`;
//! the Markdown renderer additionally takes the "generated at" time from its
//! caller. Neither reads the clock or the environment, so rendering the same
//! inputs twice produces identical bytes.

#![allow(missing_docs)]

pub mod markdown;
pub mod terminal;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::core::config::Config;
use crate::core::errors::{MedicError, Result};
use crate::core::units::format_bytes;
use crate::diagnosis::classifier::Culprit;
use crate::diagnosis::health::health_verdict;
use crate::diagnosis::snapshot::{DiagnosticSnapshot, MetricValue, WorkflowAggregate};
use crate::probe::queries;

pub use markdown::render_markdown;
pub use terminal::render_terminal;

/// Shown in place of culprits when no rule fires.
pub const NO_CULPRIT_MESSAGE: &str =
    "No obvious culprit detected - check runtime telemetry (memory and CPU graphs).";
/// Placeholder for a scalar whose probe failed.
pub const UNKNOWN_TEXT: &str = "Unknown (probe failed)";
/// Placeholder for a list that is known but empty.
pub const NO_DATA_TEXT: &str = "No data";

/// Knobs that shape rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Terminal width of workflow-name columns.
    pub name_width: usize,
    /// Terminal width of table-name columns.
    pub table_width: usize,
    /// Container holding the database, for manual-check commands.
    pub container: String,
    /// Application container, for log commands.
    pub app_container: String,
    pub database_path: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RenderOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            name_width: config.report.name_width,
            table_width: config.report.table_width,
            container: config.source.container.clone(),
            app_container: config.source.app_container.clone(),
            database_path: config.source.database_path.clone(),
        }
    }
}

/// A follow-up command for the operator to run by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualCheck {
    pub purpose: &'static str,
    pub command: String,
}

/// Fixed follow-up commands templated with the target namespace.
#[must_use]
pub fn manual_checks(target_id: &str, opts: &RenderOptions) -> Vec<ManualCheck> {
    let ns = target_id;
    let pod = format!("$(kubectl get pods -n {ns} -o name | head -n 1)");
    vec![
        ManualCheck {
            purpose: "Pod status and restart counts",
            command: format!("kubectl get pods -n {ns} -o wide"),
        },
        ManualCheck {
            purpose: "Last termination reason (look for OOMKilled)",
            command: format!("kubectl describe pods -n {ns}"),
        },
        ManualCheck {
            purpose: "Live memory and CPU per container",
            command: format!("kubectl top pods -n {ns} --containers"),
        },
        ManualCheck {
            purpose: "Recent cluster events",
            command: format!("kubectl get events -n {ns} --sort-by=.lastTimestamp"),
        },
        ManualCheck {
            purpose: "Logs from the previous (crashed) container",
            command: format!(
                "kubectl logs -n {ns} {pod} -c {} --previous --tail=200",
                opts.app_container
            ),
        },
        ManualCheck {
            purpose: "Database integrity",
            command: format!(
                "kubectl exec -n {ns} {pod} -c {} -- sqlite3 {} \"PRAGMA integrity_check;\"",
                opts.container, opts.database_path
            ),
        },
    ]
}

/// Reject snapshots that no correct aggregator could have produced.
///
/// Snapshots replayed from disk pass through here too, so a hand-edited
/// file is caught before it is rendered misleadingly.
pub fn validate_inputs(snapshot: &DiagnosticSnapshot, culprits: &[Culprit]) -> Result<()> {
    check_cap(
        "top_workflows_by_volume",
        &snapshot.top_workflows_by_volume,
        queries::TOP_VOLUME_LIMIT,
    )?;
    check_cap(
        "top_workflows_by_errors",
        &snapshot.top_workflows_by_errors,
        queries::TOP_ERRORS_LIMIT,
    )?;
    check_cap(
        "top_workflows_by_stored_bytes",
        &snapshot.top_workflows_by_stored_bytes,
        queries::TOP_STORED_LIMIT,
    )?;
    check_cap(
        "largest_records",
        &snapshot.largest_records,
        queries::LARGEST_RECORDS_LIMIT,
    )?;
    check_cap("growth_series", &snapshot.growth_series, queries::GROWTH_DAYS)?;
    check_cap("table_sizes", &snapshot.table_sizes, queries::TABLE_SIZES_LIMIT)?;

    if let Some(tables) = snapshot.table_sizes.known() {
        if tables.windows(2).any(|w| w[0].size_bytes < w[1].size_bytes) {
            return Err(MedicError::render_input(
                "table_sizes",
                "entries are not ordered by descending size",
            ));
        }
    }

    if let Some(points) = snapshot.growth_series.known() {
        if points.windows(2).any(|w| w[0].date <= w[1].date) {
            return Err(MedicError::render_input(
                "growth_series",
                "entries are not ordered newest first",
            ));
        }
    }

    for (section, list) in [
        ("top_workflows_by_volume", &snapshot.top_workflows_by_volume),
        ("top_workflows_by_errors", &snapshot.top_workflows_by_errors),
        (
            "top_workflows_by_stored_bytes",
            &snapshot.top_workflows_by_stored_bytes,
        ),
    ] {
        if let Some(bad) = list.known().and_then(|wfs| wfs.iter().find(|wf| !counts_consistent(wf)))
        {
            return Err(MedicError::render_input(
                section,
                format!(
                    "workflow {} has errors {} > executions {} or executions > total {}",
                    bad.id, bad.error_count_24h, bad.exec_count_24h, bad.exec_count_total
                ),
            ));
        }
    }

    if let Some(idx) = culprits.iter().position(|c| c.title.trim().is_empty()) {
        return Err(MedicError::render_input(
            "culprits",
            format!("culprit {idx} has an empty title"),
        ));
    }

    Ok(())
}

fn counts_consistent(wf: &WorkflowAggregate) -> bool {
    wf.error_count_24h <= wf.exec_count_24h && wf.exec_count_24h <= wf.exec_count_total
}

fn check_cap<T>(section: &'static str, value: &MetricValue<Vec<T>>, cap: usize) -> Result<()> {
    match value.known() {
        Some(items) if items.len() > cap => Err(MedicError::render_input(
            section,
            format!("{} entries exceed the limit of {cap}", items.len()),
        )),
        _ => Ok(()),
    }
}

/// Summary rows shared by both renderers: `(label, value)`.
#[must_use]
pub fn summary_rows(snapshot: &DiagnosticSnapshot) -> Vec<(&'static str, String)> {
    let count = |value: &MetricValue<u64>| {
        value
            .known()
            .map_or_else(|| UNKNOWN_TEXT.to_string(), ToString::to_string)
    };
    vec![
        (
            "Database size",
            snapshot
                .db_size
                .known()
                .map_or_else(|| UNKNOWN_TEXT.to_string(), |b| format_bytes(*b)),
        ),
        ("Total executions", count(&snapshot.total_executions)),
        ("Active workflows", count(&snapshot.active_workflow_count)),
        ("Errors (24h)", count(&snapshot.error_count_24h)),
        (
            "Pending executions",
            snapshot
                .queue
                .known()
                .map_or_else(|| UNKNOWN_TEXT.to_string(), |q| q.pending.to_string()),
        ),
        ("Stuck waiting executions", count(&snapshot.stuck_waiting)),
        (
            "Process",
            snapshot.process_health.known().map_or_else(
                || UNKNOWN_TEXT.to_string(),
                |p| {
                    format!(
                        "{}, {}, {} restart(s)",
                        p.phase,
                        if p.ready { "ready" } else { "not ready" },
                        p.restart_count
                    )
                },
            ),
        ),
        (
            "Overall health",
            health_verdict(snapshot)
                .map_or_else(|| UNKNOWN_TEXT.to_string(), |v| v.label().to_string()),
        ),
    ]
}

/// Yes/No rendering of a workflow's active flag.
#[must_use]
pub const fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Lowercase hex SHA-256 of a rendered document.
#[must_use]
pub fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A persisted report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    pub path: PathBuf,
    pub digest: String,
}

/// File name for a target's report: `medic-<target>-<YYYYmmdd-HHMMSS>.md`.
#[must_use]
pub fn report_file_name(snapshot: &DiagnosticSnapshot) -> String {
    let safe: String = snapshot
        .target_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "medic-{safe}-{}.md",
        snapshot.captured_at.format("%Y%m%d-%H%M%S")
    )
}

/// Render the Markdown report and write it into `dir`.
pub fn write_report(
    dir: &Path,
    snapshot: &DiagnosticSnapshot,
    culprits: &[Culprit],
    opts: &RenderOptions,
    generated_at: DateTime<Utc>,
) -> Result<WrittenReport> {
    let document = render_markdown(snapshot, culprits, opts, generated_at)?;
    fs::create_dir_all(dir).map_err(|source| MedicError::io(dir, source))?;
    let path = dir.join(report_file_name(snapshot));
    fs::write(&path, &document).map_err(|source| MedicError::io(&path, source))?;
    Ok(WrittenReport {
        digest: digest(&document),
        path,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, NaiveDate, Utc};

    use crate::diagnosis::classifier::classify;
    use crate::diagnosis::snapshot::{
        DiagnosticSnapshot, GrowthPoint, LargeRecord, MetricValue, ProbeFailure, ProbeId,
        ProcessHealth, QueueCounts, StatusCount, TableSize, WorkflowAggregate,
    };
    use crate::diagnosis::Culprit;

    pub fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    pub fn workflow(id: &str, name: &str, active: bool, stored: u64) -> WorkflowAggregate {
        WorkflowAggregate {
            id: id.to_string(),
            name: name.to_string(),
            active,
            exec_count_24h: 120,
            error_count_24h: 7,
            stored_bytes: stored,
            exec_count_total: 900,
        }
    }

    /// The canonical crashing instance: bloat, inactive data, backlog, big database.
    pub fn crashing() -> (DiagnosticSnapshot, Vec<Culprit>) {
        let mut s = DiagnosticSnapshot::empty("acme-prod", at());
        s.db_size = MetricValue::Known(250_000_000);
        s.table_sizes = MetricValue::Known(vec![
            TableSize {
                table_name: "execution_data".to_string(),
                size_bytes: 150_000_000,
            },
            TableSize {
                table_name: "workflow_statistics_and_other_long_table_name".to_string(),
                size_bytes: 2_048,
            },
        ]);
        s.queue = MetricValue::Known(QueueCounts {
            pending: 150,
            waiting: 4,
            running: 1,
        });
        s.total_executions = MetricValue::Known(48_210);
        s.active_workflow_count = MetricValue::Known(14);
        s.error_count_24h = MetricValue::Known(31);
        s.stuck_waiting = MetricValue::Known(2);
        s.status_breakdown = MetricValue::Known(vec![
            StatusCount {
                status: "success".to_string(),
                count: 47_000,
            },
            StatusCount {
                status: "new".to_string(),
                count: 150,
            },
        ]);
        let busy = workflow(
            "wf-1",
            "Sync CRM contacts | hourly with a very long descriptive name",
            true,
            5_000_000,
        );
        s.top_workflows_by_volume = MetricValue::Known(vec![busy.clone()]);
        s.top_workflows_by_errors = MetricValue::Known(vec![busy.clone()]);
        s.top_workflows_by_stored_bytes = MetricValue::Known(vec![
            workflow("wf-9", "Legacy export", false, 20_000_000),
            busy,
        ]);
        s.largest_records = MetricValue::Known(vec![LargeRecord {
            record_id: "48101".to_string(),
            workflow_name: "Legacy export".to_string(),
            size_bytes: 4_500_000,
        }]);
        s.growth_series = MetricValue::Known(vec![
            GrowthPoint {
                date: NaiveDate::from_ymd_opt(2026, 3, 1).expect("date"),
                count: 610,
            },
            GrowthPoint {
                date: NaiveDate::from_ymd_opt(2026, 2, 28).expect("date"),
                count: 584,
            },
        ]);
        s.process_health = MetricValue::Known(ProcessHealth {
            phase: "Running".to_string(),
            ready: false,
            restart_count: 7,
        });
        let culprits = classify(&s);
        (s, culprits)
    }

    /// Every probe failed.
    pub fn blind() -> DiagnosticSnapshot {
        let mut s = DiagnosticSnapshot::empty("acme-prod", at());
        for id in ProbeId::ALL {
            s.failures
                .insert(id, ProbeFailure::unavailable("target acme-prod unreachable"));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{at, blind, crashing, workflow};
    use super::*;
    use crate::diagnosis::snapshot::{GrowthPoint, TableSize};
    use chrono::NaiveDate;

    #[test]
    fn valid_snapshots_pass() {
        let (snapshot, culprits) = crashing();
        assert!(validate_inputs(&snapshot, &culprits).is_ok());
        assert!(validate_inputs(&blind(), &[]).is_ok());
    }

    #[test]
    fn over_cap_list_is_render_input_invalid() {
        let (mut snapshot, culprits) = crashing();
        snapshot.top_workflows_by_volume =
            MetricValue::Known((0..6).map(|i| workflow(&i.to_string(), "w", true, 0)).collect());
        let err = validate_inputs(&snapshot, &culprits).expect_err("six > five");
        assert_eq!(err.code(), "MED-2201");
        assert!(err.to_string().contains("top_workflows_by_volume"));
    }

    #[test]
    fn unsorted_tables_rejected() {
        let (mut snapshot, culprits) = crashing();
        snapshot.table_sizes = MetricValue::Known(vec![
            TableSize {
                table_name: "a".to_string(),
                size_bytes: 1,
            },
            TableSize {
                table_name: "b".to_string(),
                size_bytes: 2,
            },
        ]);
        assert!(validate_inputs(&snapshot, &culprits).is_err());
    }

    #[test]
    fn oldest_first_growth_rejected() {
        let (mut snapshot, culprits) = crashing();
        snapshot.growth_series = MetricValue::Known(vec![
            GrowthPoint {
                date: NaiveDate::from_ymd_opt(2026, 2, 28).expect("date"),
                count: 1,
            },
            GrowthPoint {
                date: NaiveDate::from_ymd_opt(2026, 3, 1).expect("date"),
                count: 1,
            },
        ]);
        assert!(validate_inputs(&snapshot, &culprits).is_err());
    }

    #[test]
    fn impossible_workflow_counts_rejected() {
        let (mut snapshot, culprits) = crashing();
        let mut wf = workflow("wf-x", "x", true, 0);
        wf.error_count_24h = wf.exec_count_24h + 1;
        snapshot.top_workflows_by_errors = MetricValue::Known(vec![wf]);
        let err = validate_inputs(&snapshot, &culprits).expect_err("errors > executions");
        assert!(err.to_string().contains("wf-x"));
    }

    #[test]
    fn blank_culprit_title_rejected() {
        let (snapshot, mut culprits) = crashing();
        culprits[0].title = "  ".to_string();
        assert!(validate_inputs(&snapshot, &culprits).is_err());
    }

    #[test]
    fn manual_checks_are_templated_with_target() {
        let checks = manual_checks("acme-prod", &RenderOptions::default());
        assert!(!checks.is_empty());
        assert!(checks.iter().all(|c| c.command.contains("-n acme-prod")));
        assert!(checks.iter().any(|c| c.command.contains("-c n8n")));
        assert!(checks.iter().any(|c| c.command.contains("-c backup-cron")));
    }

    #[test]
    fn summary_marks_unknown_explicitly() {
        let rows = summary_rows(&blind());
        assert!(rows.iter().all(|(_, value)| value == UNKNOWN_TEXT));
    }

    #[test]
    fn summary_carries_health_verdict() {
        let (snapshot, culprits) = crashing();
        let rows = summary_rows(&snapshot);
        assert_eq!(
            rows.last(),
            Some(&("Overall health", "Running with issues".to_string()))
        );

        let opts = RenderOptions::default();
        let text = render_terminal(&snapshot, &culprits, &opts).expect("terminal");
        assert!(text.contains("Overall health            Running with issues"));
        let doc = render_markdown(&snapshot, &culprits, &opts, at()).expect("markdown");
        assert!(doc.contains("| Overall health | Running with issues |"));
    }

    #[test]
    fn digest_is_stable_sha256() {
        assert_eq!(
            digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn report_file_name_is_filesystem_safe() {
        let mut snapshot = blind();
        snapshot.target_id = "team/acme prod".to_string();
        assert_eq!(report_file_name(&snapshot), "medic-team_acme_prod-20260301-120000.md");
    }

    #[test]
    fn write_report_persists_document_with_digest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (snapshot, culprits) = crashing();
        let written = write_report(dir.path(), &snapshot, &culprits, &RenderOptions::default(), at())
            .expect("report written");
        let contents = fs::read_to_string(&written.path).expect("read back");
        assert_eq!(digest(&contents), written.digest);
        assert!(contents.contains("Sync CRM contacts \\| hourly with a very long descriptive name"));
    }
}
