//! Persisted Markdown report. Names are never truncated here.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::core::errors::Result;
use crate::core::units::format_bytes;
use crate::diagnosis::classifier::Culprit;
use crate::diagnosis::snapshot::{DiagnosticSnapshot, MetricValue, WorkflowAggregate};
use crate::report::{
    NO_CULPRIT_MESSAGE, NO_DATA_TEXT, RenderOptions, UNKNOWN_TEXT, manual_checks, summary_rows,
    validate_inputs, yes_no,
};

/// Render the report document. `generated_at` is printed verbatim.
pub fn render_markdown(
    snapshot: &DiagnosticSnapshot,
    culprits: &[Culprit],
    opts: &RenderOptions,
    generated_at: DateTime<Utc>,
) -> Result<String> {
    validate_inputs(snapshot, culprits)?;

    let mut out = String::new();
    let _ = writeln!(out, "# Instance diagnosis: {}", cell(&snapshot.target_id));
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "- **Captured:** {}",
        snapshot.captured_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "- **Generated:** {}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    heading(&mut out, "Summary");
    let _ = writeln!(out, "| Metric | Value |");
    let _ = writeln!(out, "|---|---|");
    for (label, value) in summary_rows(snapshot) {
        let _ = writeln!(out, "| {label} | {} |", cell(&value));
    }

    heading(&mut out, "Likely culprits");
    if culprits.is_empty() {
        let _ = writeln!(out, "{NO_CULPRIT_MESSAGE}");
    }
    for (idx, culprit) in culprits.iter().enumerate() {
        let _ = writeln!(out, "{}. **{}**", idx + 1, inline(&culprit.title));
        let _ = writeln!(out, "   - {}", inline(&culprit.description));
        let _ = writeln!(out, "   - Recommendation: {}", inline(&culprit.recommendation));
        let _ = writeln!(out, "   - Evidence: `{}`", culprit.evidence_ref);
    }

    heading(&mut out, "Table sizes");
    table(
        &mut out,
        &snapshot.table_sizes,
        &["Table", "Size"],
        |table| vec![table.table_name.clone(), format_bytes(table.size_bytes)],
    );

    heading(&mut out, "Top workflows by volume (24h)");
    workflows(&mut out, &snapshot.top_workflows_by_volume);

    heading(&mut out, "Top workflows by errors (24h)");
    workflows(&mut out, &snapshot.top_workflows_by_errors);

    heading(&mut out, "Queue status");
    match snapshot.queue.known() {
        Some(queue) => {
            let _ = writeln!(out, "| State | Count |");
            let _ = writeln!(out, "|---|---|");
            let _ = writeln!(out, "| Pending | {} |", queue.pending);
            let _ = writeln!(out, "| Waiting | {} |", queue.waiting);
            let _ = writeln!(out, "| Running | {} |", queue.running);
        }
        None => {
            let _ = writeln!(out, "{UNKNOWN_TEXT}");
        }
    }
    let _ = writeln!(out);
    table(
        &mut out,
        &snapshot.status_breakdown,
        &["Status", "Executions"],
        |row| vec![row.status.clone(), row.count.to_string()],
    );

    heading(&mut out, "7-day growth");
    table(
        &mut out,
        &snapshot.growth_series,
        &["Date", "Executions"],
        |point| vec![point.date.to_string(), point.count.to_string()],
    );

    heading(&mut out, "Largest stored workflows");
    workflows(&mut out, &snapshot.top_workflows_by_stored_bytes);

    heading(&mut out, "Largest records");
    table(
        &mut out,
        &snapshot.largest_records,
        &["Execution", "Workflow", "Size"],
        |record| {
            vec![
                record.record_id.clone(),
                record.workflow_name.clone(),
                format_bytes(record.size_bytes),
            ]
        },
    );

    heading(&mut out, "Manual checks");
    for check in manual_checks(&snapshot.target_id, opts) {
        let _ = writeln!(out, "- {}", check.purpose);
        let _ = writeln!(out);
        let _ = writeln!(out, "  ```sh");
        let _ = writeln!(out, "  {}", check.command);
        let _ = writeln!(out, "  ```");
    }

    heading(&mut out, "Probe diagnostics");
    if snapshot.failures.is_empty() {
        let _ = writeln!(out, "All probes succeeded.");
    } else {
        let _ = writeln!(out, "| Probe | Failure | Detail |");
        let _ = writeln!(out, "|---|---|---|");
        for (probe, failure) in &snapshot.failures {
            let _ = writeln!(
                out,
                "| {} | {} | {} |",
                probe.label(),
                failure.kind.label(),
                cell(&failure.detail)
            );
        }
    }

    Ok(out)
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "## {title}");
    let _ = writeln!(out);
}

/// Escape a value for a single table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Keep free text on one list line and out of emphasis markers.
fn inline(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\r', '\n'], " ")
        .replace('*', "\\*")
}

fn table<T>(
    out: &mut String,
    value: &MetricValue<Vec<T>>,
    headers: &[&str],
    row: impl Fn(&T) -> Vec<String>,
) {
    match value.known() {
        None => {
            let _ = writeln!(out, "{UNKNOWN_TEXT}");
        }
        Some(items) if items.is_empty() => {
            let _ = writeln!(out, "{NO_DATA_TEXT}");
        }
        Some(items) => {
            let _ = writeln!(out, "| {} |", headers.join(" | "));
            let _ = writeln!(out, "|{}", "---|".repeat(headers.len()));
            for item in items {
                let cells: Vec<String> = row(item).iter().map(|c| cell(c)).collect();
                let _ = writeln!(out, "| {} |", cells.join(" | "));
            }
        }
    }
}

fn workflows(out: &mut String, value: &MetricValue<Vec<WorkflowAggregate>>) {
    table(
        out,
        value,
        &[
            "Workflow",
            "ID",
            "Active",
            "Runs (24h)",
            "Errors (24h)",
            "Stored",
            "Total runs",
        ],
        |wf| {
            vec![
                wf.name.clone(),
                wf.id.clone(),
                yes_no(wf.active).to_string(),
                wf.exec_count_24h.to_string(),
                wf.error_count_24h.to_string(),
                format_bytes(wf.stored_bytes),
                wf.exec_count_total.to_string(),
            ]
        },
    );
}
