//! Fixed-width terminal rendering.
//!
//! Every section is always printed, in [`SECTIONS`] order. Names are cut to
//! the configured widths; the Markdown report keeps them whole.

use std::fmt::Write as _;

use crate::core::errors::Result;
use crate::core::units::{format_bytes, truncate_display};
use crate::diagnosis::classifier::Culprit;
use crate::diagnosis::snapshot::{DiagnosticSnapshot, MetricValue, WorkflowAggregate};
use crate::report::{
    NO_CULPRIT_MESSAGE, NO_DATA_TEXT, RenderOptions, UNKNOWN_TEXT, manual_checks, summary_rows,
    validate_inputs, yes_no,
};

pub const METRICS: &str = "METRICS";
pub const TABLE_SIZES: &str = "TABLE SIZES";
pub const TOP_BY_VOLUME: &str = "TOP WORKFLOWS BY VOLUME (24H)";
pub const TOP_BY_ERRORS: &str = "TOP WORKFLOWS BY ERRORS (24H)";
pub const QUEUE_STATUS: &str = "QUEUE STATUS";
pub const GROWTH: &str = "7-DAY GROWTH";
pub const LARGEST_STORED: &str = "LARGEST STORED WORKFLOWS";
pub const LARGEST_RECORDS: &str = "LARGEST RECORDS";
pub const CULPRITS: &str = "LIKELY CULPRITS";
pub const ACTIONS: &str = "RECOMMENDED ACTIONS";
pub const MANUAL_CHECKS: &str = "MANUAL CHECKS";
pub const PROBE_DIAGNOSTICS: &str = "PROBE DIAGNOSTICS";

/// Section headers in print order.
pub const SECTIONS: [&str; 12] = [
    METRICS,
    TABLE_SIZES,
    TOP_BY_VOLUME,
    TOP_BY_ERRORS,
    QUEUE_STATUS,
    GROWTH,
    LARGEST_STORED,
    LARGEST_RECORDS,
    CULPRITS,
    ACTIONS,
    MANUAL_CHECKS,
    PROBE_DIAGNOSTICS,
];

const RULE: &str =
    "========================================================================";
const INDENT: &str = "  ";

/// Render the interactive view.
pub fn render_terminal(
    snapshot: &DiagnosticSnapshot,
    culprits: &[Culprit],
    opts: &RenderOptions,
) -> Result<String> {
    validate_inputs(snapshot, culprits)?;

    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, " INSTANCE DIAGNOSIS: {}", snapshot.target_id);
    let _ = writeln!(
        out,
        " Captured: {}",
        snapshot.captured_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "{RULE}");

    section(&mut out, METRICS);
    for (label, value) in summary_rows(snapshot) {
        let _ = writeln!(out, "{INDENT}{label:<26}{value}");
    }

    section(&mut out, TABLE_SIZES);
    list(&mut out, &snapshot.table_sizes, |out, tables| {
        for table in tables {
            let _ = writeln!(
                out,
                "{INDENT}{:<width$}  {:>10}",
                truncate_display(&table.table_name, opts.table_width),
                format_bytes(table.size_bytes),
                width = opts.table_width
            );
        }
    });

    section(&mut out, TOP_BY_VOLUME);
    workflow_table(&mut out, &snapshot.top_workflows_by_volume, opts, |wf| {
        format!(
            "{:>8} runs  {:>6} errors  {:>8} total",
            wf.exec_count_24h, wf.error_count_24h, wf.exec_count_total
        )
    });

    section(&mut out, TOP_BY_ERRORS);
    workflow_table(&mut out, &snapshot.top_workflows_by_errors, opts, |wf| {
        format!(
            "{:>6} errors  {:>8} runs",
            wf.error_count_24h, wf.exec_count_24h
        )
    });

    section(&mut out, QUEUE_STATUS);
    match snapshot.queue.known() {
        Some(queue) => {
            let _ = writeln!(out, "{INDENT}{:<26}{}", "Pending", queue.pending);
            let _ = writeln!(out, "{INDENT}{:<26}{}", "Waiting", queue.waiting);
            let _ = writeln!(out, "{INDENT}{:<26}{}", "Running", queue.running);
        }
        None => {
            let _ = writeln!(out, "{INDENT}{UNKNOWN_TEXT}");
        }
    }
    let _ = writeln!(out, "{INDENT}By status:");
    match snapshot.status_breakdown.known() {
        Some(rows) if rows.is_empty() => {
            let _ = writeln!(out, "{INDENT}{INDENT}{NO_DATA_TEXT}");
        }
        Some(rows) => {
            for row in rows {
                let _ = writeln!(out, "{INDENT}{INDENT}{:<24}{}", row.status, row.count);
            }
        }
        None => {
            let _ = writeln!(out, "{INDENT}{INDENT}{UNKNOWN_TEXT}");
        }
    }

    section(&mut out, GROWTH);
    list(&mut out, &snapshot.growth_series, |out, points| {
        for point in points {
            let _ = writeln!(out, "{INDENT}{}  {:>8}", point.date, point.count);
        }
    });

    section(&mut out, LARGEST_STORED);
    workflow_table(&mut out, &snapshot.top_workflows_by_stored_bytes, opts, |wf| {
        format!(
            "{:>10}  active: {:<3}  {:>8} total",
            format_bytes(wf.stored_bytes),
            yes_no(wf.active),
            wf.exec_count_total
        )
    });

    section(&mut out, LARGEST_RECORDS);
    list(&mut out, &snapshot.largest_records, |out, records| {
        for record in records {
            let _ = writeln!(
                out,
                "{INDENT}#{:<10} {:<width$}  {:>10}",
                record.record_id,
                truncate_display(&record.workflow_name, opts.name_width),
                format_bytes(record.size_bytes),
                width = opts.name_width
            );
        }
    });

    section(&mut out, CULPRITS);
    if culprits.is_empty() {
        let _ = writeln!(out, "{INDENT}{NO_CULPRIT_MESSAGE}");
    }
    for (idx, culprit) in culprits.iter().enumerate() {
        let _ = writeln!(out, "{INDENT}{}. {}", idx + 1, culprit.title);
        let _ = writeln!(out, "{INDENT}   {}", culprit.description);
    }

    section(&mut out, ACTIONS);
    if culprits.is_empty() {
        let _ = writeln!(
            out,
            "{INDENT}Review memory and CPU graphs for the crash window."
        );
    }
    for (idx, culprit) in culprits.iter().enumerate() {
        let _ = writeln!(out, "{INDENT}{}. {}", idx + 1, culprit.recommendation);
    }

    section(&mut out, MANUAL_CHECKS);
    for check in manual_checks(&snapshot.target_id, opts) {
        let _ = writeln!(out, "{INDENT}# {}", check.purpose);
        let _ = writeln!(out, "{INDENT}{}", check.command);
    }

    section(&mut out, PROBE_DIAGNOSTICS);
    if snapshot.failures.is_empty() {
        let _ = writeln!(out, "{INDENT}All probes succeeded.");
    }
    for (probe, failure) in &snapshot.failures {
        let _ = writeln!(out, "{INDENT}{:<22}{failure}", probe.label());
    }

    Ok(out)
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "-".repeat(title.len()));
}

fn list<T>(out: &mut String, value: &MetricValue<Vec<T>>, body: impl FnOnce(&mut String, &[T])) {
    match value.known() {
        None => {
            let _ = writeln!(out, "{INDENT}{UNKNOWN_TEXT}");
        }
        Some(items) if items.is_empty() => {
            let _ = writeln!(out, "{INDENT}{NO_DATA_TEXT}");
        }
        Some(items) => body(out, items),
    }
}

fn workflow_table(
    out: &mut String,
    value: &MetricValue<Vec<WorkflowAggregate>>,
    opts: &RenderOptions,
    columns: impl Fn(&WorkflowAggregate) -> String,
) {
    list(out, value, |out, workflows| {
        for wf in workflows {
            let _ = writeln!(
                out,
                "{INDENT}{:<width$}  {}",
                truncate_display(&wf.name, opts.name_width),
                columns(wf),
                width = opts.name_width
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::ELLIPSIS;
    use crate::diagnosis::snapshot::MetricValue;
    use crate::report::fixtures::{blind, crashing};

    fn positions(text: &str) -> Vec<usize> {
        SECTIONS
            .iter()
            .map(|title| {
                text.find(&format!("\n{title}\n"))
                    .unwrap_or_else(|| panic!("missing section {title}"))
            })
            .collect()
    }

    #[test]
    fn sections_always_present_in_order() {
        for snapshot in [crashing().0, blind()] {
            let text = render_terminal(&snapshot, &[], &RenderOptions::default()).unwrap();
            let found = positions(&text);
            let mut sorted = found.clone();
            sorted.sort_unstable();
            assert_eq!(found, sorted);
        }
    }

    #[test]
    fn culprits_listed_with_recommendations() {
        let (snapshot, culprits) = crashing();
        assert_eq!(culprits.len(), 4);
        let text = render_terminal(&snapshot, &culprits, &RenderOptions::default()).unwrap();
        let culprit_block = &text[text.find(CULPRITS).unwrap()..text.find(ACTIONS).unwrap()];
        let action_block = &text[text.find(ACTIONS).unwrap()..text.find(MANUAL_CHECKS).unwrap()];
        for culprit in &culprits {
            assert!(culprit_block.contains(&culprit.title));
            assert!(action_block.contains(&culprit.recommendation));
        }
        assert!(!text.contains(NO_CULPRIT_MESSAGE));
    }

    #[test]
    fn blind_snapshot_renders_unknowns_and_no_culprit_message() {
        let text = render_terminal(&blind(), &[], &RenderOptions::default()).unwrap();
        assert!(text.contains(NO_CULPRIT_MESSAGE));
        assert!(text.contains("Database size             Unknown (probe failed)"));
        assert!(text.contains("target acme-prod unreachable"));
        assert!(!text.contains("All probes succeeded."));
    }

    #[test]
    fn empty_lists_render_no_data_not_unknown() {
        let mut snapshot = blind();
        snapshot.largest_records = MetricValue::Known(vec![]);
        let text = render_terminal(&snapshot, &[], &RenderOptions::default()).unwrap();
        let block = &text[text.find(LARGEST_RECORDS).unwrap()..text.find(CULPRITS).unwrap()];
        assert!(block.contains(NO_DATA_TEXT));
        assert!(!block.contains(UNKNOWN_TEXT));
    }

    #[test]
    fn long_names_are_truncated_to_width() {
        let (snapshot, culprits) = crashing();
        let opts = RenderOptions::default();
        let text = render_terminal(&snapshot, &culprits, &opts).unwrap();
        let cut = truncate_display(
            "Sync CRM contacts | hourly with a very long descriptive name",
            opts.name_width,
        );
        assert!(cut.ends_with(ELLIPSIS));
        assert!(text.contains(&cut));
        assert!(!text.contains("very long descriptive name"));
    }

    #[test]
    fn render_is_idempotent() {
        let (snapshot, culprits) = crashing();
        let opts = RenderOptions::default();
        assert_eq!(
            render_terminal(&snapshot, &culprits, &opts).unwrap(),
            render_terminal(&snapshot, &culprits, &opts).unwrap()
        );
    }
}
