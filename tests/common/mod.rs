#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_medic") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "medic.exe" } else { "medic" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve medic binary path for integration test"),
    }
}

/// Run medic with `home` as `$HOME`, so config and activity log stay isolated.
pub fn run_cli_in(home: &Path, case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("medic-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("HOME", home)
        .env_remove("MEDIC_OUTPUT_FORMAT")
        .env_remove("MEDIC_ACTIVITY_LOG")
        .env_remove("MEDIC_SOURCE_KIND")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute medic command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Activity log location under an isolated `$HOME`.
pub fn activity_log(home: &Path) -> PathBuf {
    home.join(".local")
        .join("share")
        .join("medic")
        .join("activity.jsonl")
}

/// Build a small n8n-shaped database with one bloated inactive workflow.
#[cfg(feature = "sqlite")]
pub fn seed_database(path: &Path) {
    let conn = rusqlite::Connection::open(path).expect("create sqlite db");
    conn.execute_batch(
        "CREATE TABLE workflow_entity (
             id TEXT PRIMARY KEY,
             name TEXT NOT NULL,
             active INTEGER NOT NULL DEFAULT 0
         );
         CREATE TABLE execution_entity (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             workflowId TEXT,
             status TEXT,
             finished INTEGER NOT NULL DEFAULT 0,
             mode TEXT,
             startedAt DATETIME,
             stoppedAt DATETIME,
             waitTill DATETIME
         );
         CREATE TABLE execution_data (
             executionId INTEGER PRIMARY KEY,
             workflowData TEXT,
             data TEXT
         );
         INSERT INTO workflow_entity (id, name, active) VALUES
             ('wf-a', 'Nightly export', 0),
             ('wf-b', 'Webhook intake', 1);",
    )
    .expect("create schema");

    let big = "x".repeat(64 * 1024);
    for idx in 0..6 {
        let (workflow, status) = if idx < 4 {
            ("wf-b", if idx == 0 { "error" } else { "success" })
        } else {
            ("wf-a", "success")
        };
        conn.execute(
            "INSERT INTO execution_entity (workflowId, status, finished, mode, startedAt, stoppedAt)
             VALUES (?1, ?2, 1, 'trigger', datetime('now', '-1 hour'), datetime('now', '-1 hour'))",
            rusqlite::params![workflow, status],
        )
        .expect("insert execution");
        let id = conn.last_insert_rowid();
        let payload = if workflow == "wf-a" { big.as_str() } else { "{}" };
        conn.execute(
            "INSERT INTO execution_data (executionId, workflowData, data) VALUES (?1, '{}', ?2)",
            rusqlite::params![id, payload],
        )
        .expect("insert execution data");
    }
    conn.execute(
        "INSERT INTO execution_entity (workflowId, status, finished, mode, startedAt)
         VALUES ('wf-b', 'new', 0, 'trigger', NULL)",
        [],
    )
    .expect("insert pending execution");
}
