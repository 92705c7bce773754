//! Activity logging: investigation lifecycle events as JSONL.

pub mod jsonl;

use std::path::Path;
use std::time::Duration;

use crate::diagnosis::classifier::Culprit;
use crate::diagnosis::snapshot::DiagnosticSnapshot;

use self::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Typed front-end over [`JsonlWriter`] for the events medic emits.
pub struct ActivityLogger {
    writer: JsonlWriter,
}

impl ActivityLogger {
    /// Log to `path`, degrading through the writer's fallback chain.
    #[must_use]
    pub fn open(path: &Path) -> Self {
        Self {
            writer: JsonlWriter::open(JsonlConfig::at(path)),
        }
    }

    /// Logger that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            writer: JsonlWriter::disabled(),
        }
    }

    /// Record the start of an investigation.
    pub fn investigation_start(&mut self, target: &str, source: &str, config_hash: Option<String>) {
        let mut entry = LogEntry::new(EventType::InvestigationStart, Severity::Info);
        entry.target = Some(target.to_string());
        entry.source = Some(source.to_string());
        entry.config_hash = config_hash;
        self.writer.write_entry(&entry);
    }

    /// One `probe_failed` line per failure recorded in the snapshot.
    pub fn probe_failures(&mut self, snapshot: &DiagnosticSnapshot) {
        for (probe, failure) in &snapshot.failures {
            let mut entry = LogEntry::new(EventType::ProbeFailed, Severity::Warning);
            entry.target = Some(snapshot.target_id.clone());
            entry.probe = Some(probe.label().to_string());
            entry.failure_kind = Some(failure.kind.label().to_string());
            entry.details = Some(failure.detail.clone());
            self.writer.write_entry(&entry);
        }
    }

    /// Record culprit kinds, unknown-probe count and elapsed time.
    pub fn investigation_complete(
        &mut self,
        snapshot: &DiagnosticSnapshot,
        culprits: &[Culprit],
        elapsed: Duration,
    ) {
        let mut entry = LogEntry::new(EventType::InvestigationComplete, Severity::Info);
        entry.target = Some(snapshot.target_id.clone());
        entry.culprits = Some(culprits.iter().map(|c| c.kind.label().to_string()).collect());
        entry.unknown_probes = Some(snapshot.unknown_count());
        entry.duration_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        self.writer.write_entry(&entry);
    }

    /// Record a persisted report and its digest.
    pub fn report_written(&mut self, target: &str, path: &Path, digest: &str) {
        let mut entry = LogEntry::new(EventType::ReportWritten, Severity::Info);
        entry.target = Some(target.to_string());
        entry.path = Some(path.display().to_string());
        entry.digest = Some(digest.to_string());
        self.writer.write_entry(&entry);
    }

    /// Record a snapshot written for later replay.
    pub fn snapshot_saved(&mut self, target: &str, path: &Path) {
        let mut entry = LogEntry::new(EventType::SnapshotSaved, Severity::Info);
        entry.target = Some(target.to_string());
        entry.path = Some(path.display().to_string());
        self.writer.write_entry(&entry);
    }

    /// Record a failure that ended a command.
    pub fn error(&mut self, code: &str, message: &str) {
        let mut entry = LogEntry::new(EventType::Error, Severity::Error);
        entry.error_code = Some(code.to_string());
        entry.details = Some(message.to_string());
        self.writer.write_entry(&entry);
    }

    /// Flush buffered entries to the active sink.
    pub fn flush(&mut self) {
        self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::snapshot::{ProbeFailure, ProbeId};
    use chrono::Utc;

    #[test]
    fn logs_one_line_per_probe_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let mut snapshot = DiagnosticSnapshot::empty("acme", Utc::now());
        snapshot
            .failures
            .insert(ProbeId::DbSize, ProbeFailure::unavailable("timed out"));
        snapshot
            .failures
            .insert(ProbeId::LargestRecords, ProbeFailure::malformed("row 1"));

        let mut logger = ActivityLogger::open(&path);
        logger.investigation_start("acme", "scripted", None);
        logger.probe_failures(&snapshot);
        logger.investigation_complete(&snapshot, &[], Duration::from_millis(42));
        logger.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1]["probe"], "db_size");
        assert_eq!(lines[1]["failure_kind"], "probe_unavailable");
        assert_eq!(lines[2]["failure_kind"], "malformed_row");
        assert_eq!(lines[3]["event"], "investigation_complete");
        assert_eq!(lines[3]["duration_ms"], 42);
        assert_eq!(lines[3]["unknown_probes"], ProbeId::ALL.len());
    }

    #[test]
    fn disabled_logger_accepts_every_event() {
        let snapshot = DiagnosticSnapshot::empty("acme", Utc::now());
        let mut logger = ActivityLogger::disabled();
        logger.investigation_start("acme", "scripted", Some("abc".to_string()));
        logger.probe_failures(&snapshot);
        logger.investigation_complete(&snapshot, &[], Duration::ZERO);
        logger.report_written("acme", Path::new("/tmp/r.md"), "00");
        logger.snapshot_saved("acme", Path::new("/tmp/s.json"));
        logger.error("MED-3900", "boom");
        logger.flush();
        assert_eq!(logger.writer.state(), "discard");
    }
}
