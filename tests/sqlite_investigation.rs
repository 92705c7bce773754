//! Investigations against a real SQLite file through `SqliteSource`.

#![cfg(feature = "sqlite")]

mod common;

use instance_medic::core::config::Config;
use instance_medic::diagnosis::snapshot::FailureKind;
use instance_medic::prelude::*;

fn investigate(path: &std::path::Path) -> DiagnosticSnapshot {
    let source = SqliteSource::open(path).expect("open seeded database");
    Aggregator::new(&source, "database.sqlite").aggregate(&Target::new("local"))
}

#[test]
fn seeded_database_populates_every_query_probe() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("database.sqlite");
    common::seed_database(&path);

    let snapshot = investigate(&path);

    assert_eq!(snapshot.total_executions.known(), Some(&7));
    assert_eq!(snapshot.active_workflow_count.known(), Some(&1));
    assert_eq!(snapshot.error_count_24h.known(), Some(&1));
    assert_eq!(snapshot.stuck_waiting.known(), Some(&0));
    let queue = snapshot.queue.known().expect("queue counts");
    assert_eq!(queue.pending, 1);
    assert_eq!(queue.running, 0);

    let db_size = *snapshot.db_size.known().expect("db size");
    assert_eq!(db_size, std::fs::metadata(&path).expect("metadata").len());

    let stored = snapshot
        .top_workflows_by_stored_bytes
        .known()
        .expect("stored bytes ranking");
    assert_eq!(stored[0].id, "wf-a");
    assert_eq!(stored[0].name, "Nightly export");
    assert!(!stored[0].active);
    assert_eq!(stored[0].stored_bytes, 2 * 64 * 1024);

    let volume = snapshot.top_workflows_by_volume.known().expect("volume");
    assert_eq!(volume[0].id, "wf-b");
    assert_eq!(volume[0].exec_count_24h, 4);
    assert_eq!(volume[0].exec_count_total, 5);

    let errors = snapshot.top_workflows_by_errors.known().expect("errors");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_count_24h, 1);

    let records = snapshot.largest_records.known().expect("largest records");
    assert_eq!(records.len(), 6);
    assert_eq!(records[0].workflow_name, "Nightly export");
    assert_eq!(records[0].size_bytes, 64 * 1024);

    let growth = snapshot.growth_series.known().expect("growth");
    assert!(!growth.is_empty());
    assert!(growth.len() <= 7);
}

#[test]
fn local_file_has_no_process_status() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("database.sqlite");
    common::seed_database(&path);

    let snapshot = investigate(&path);
    assert!(snapshot.process_health.is_unknown());
    assert_eq!(
        snapshot.failures[&ProbeId::ProcessStatus].kind,
        FailureKind::ProbeUnavailable
    );
}

#[test]
fn lowered_threshold_flags_inactive_workflow() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("database.sqlite");
    common::seed_database(&path);

    let snapshot = investigate(&path);
    assert!(classify(&snapshot).is_empty());

    let mut config = Config::default();
    config.thresholds.inactive_workflow_bytes = 100_000;
    let culprits = classify_with(&snapshot, &config.thresholds);
    assert_eq!(culprits.len(), 1);
    assert_eq!(culprits[0].kind, CulpritKind::InactiveWorkflowData);
    assert!(culprits[0].title.contains("Nightly export"));

    let text = render_terminal(&snapshot, &culprits, &RenderOptions::from_config(&config))
        .expect("render");
    assert!(text.contains("Nightly export"));
}

#[test]
fn missing_schema_degrades_to_unknowns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("empty.sqlite");
    rusqlite::Connection::open(&path)
        .and_then(|conn| conn.execute_batch("CREATE TABLE unrelated (id INTEGER);"))
        .expect("create empty database");

    let snapshot = investigate(&path);
    assert!(snapshot.db_size.is_known());
    assert!(snapshot.total_executions.is_unknown());
    assert!(snapshot.queue.is_unknown());
    assert!(snapshot.top_workflows_by_volume.is_unknown());
    assert!(snapshot.failures.contains_key(&ProbeId::TotalExecutions));

    let culprits = classify(&snapshot);
    assert!(culprits.is_empty());
    assert!(render_markdown(&snapshot, &culprits, &RenderOptions::default(), chrono::Utc::now()).is_ok());
}
