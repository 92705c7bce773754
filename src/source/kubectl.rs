//! Metrics source backed by `kubectl exec` into the instance's database sidecar.
//!
//! Queries run through the sqlite3 CLI with ASCII unit/record separators
//! instead of the default `|`/newline, so workflow names containing pipes or
//! line breaks cannot shift fields.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::core::config::SourceConfig;
use crate::core::units::parse_human_size;
use crate::source::{
    MetricsSource, ProcessStatus, QuerySpec, ResourceSpec, Row, Scalar, SourceError, SourceResult,
    Target,
};

/// Field separator passed to `sqlite3 -separator`.
pub const FIELD_SEPARATOR: char = '\u{1f}';
/// Record separator passed to `sqlite3 -newline`.
pub const RECORD_SEPARATOR: char = '\u{1e}';

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const POD_STATUS_JSONPATH: &str = "jsonpath={.status.phase}|{.status.containerStatuses[*].ready}|{.status.containerStatuses[*].restartCount}";

/// Captured output of one finished command.
#[derive(Debug, Clone)]
struct CommandOutput {
    stdout: String,
    stderr: String,
    code: i32,
}

/// `kubectl`-backed source. Pod names are resolved once per namespace.
#[derive(Debug)]
pub struct KubectlSource {
    config: SourceConfig,
    pods: RwLock<HashMap<String, String>>,
}

impl KubectlSource {
    #[must_use]
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            pods: RwLock::new(HashMap::new()),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    fn resolve_pod(&self, target: &Target) -> SourceResult<String> {
        if let Some(pod) = &target.pod {
            return Ok(pod.clone());
        }
        if let Some(pod) = self.pods.read().get(&target.id) {
            return Ok(pod.clone());
        }

        let args = vec![
            "get".to_string(),
            "pods".to_string(),
            "-n".to_string(),
            target.id.clone(),
            "-o".to_string(),
            "jsonpath={.items[0].metadata.name}".to_string(),
        ];
        let output = self.kubectl("resolve_pod", target, &args)?;
        let pod = output.stdout.trim().to_string();
        if pod.is_empty() {
            return Err(SourceError::NotFound {
                resource: format!("pod in namespace {}", target.id),
            });
        }
        self.pods.write().insert(target.id.clone(), pod.clone());
        Ok(pod)
    }

    fn exec_args(&self, target: &Target, pod: String, command: Vec<String>) -> Vec<String> {
        let mut args = vec![
            "exec".to_string(),
            pod,
            "-n".to_string(),
            target.id.clone(),
            "-c".to_string(),
            self.config.container.clone(),
            "--".to_string(),
        ];
        args.extend(command);
        args
    }

    fn sqlite(&self, target: &Target, spec: &QuerySpec) -> SourceResult<String> {
        let pod = self.resolve_pod(target)?;
        let command = vec![
            self.config.sqlite3_bin.clone(),
            "-batch".to_string(),
            "-noheader".to_string(),
            "-separator".to_string(),
            FIELD_SEPARATOR.to_string(),
            "-newline".to_string(),
            RECORD_SEPARATOR.to_string(),
            self.config.database_path.clone(),
            spec.sql.clone(),
        ];
        let args = self.exec_args(target, pod, command);
        let output = self.kubectl(spec.label, target, &args)?;
        Ok(output.stdout)
    }

    fn kubectl(&self, label: &str, target: &Target, args: &[String]) -> SourceResult<CommandOutput> {
        let output = run_with_timeout(&self.config.kubectl_bin, args, self.timeout(), label)?;
        if output.code == 0 {
            Ok(output)
        } else {
            Err(classify_failure(label, target, &output))
        }
    }
}

impl MetricsSource for KubectlSource {
    fn name(&self) -> &'static str {
        "kubectl"
    }

    fn scalar_query(&self, target: &Target, spec: &QuerySpec) -> SourceResult<Scalar> {
        let stdout = self.sqlite(target, spec)?;
        parse_scalar(spec.label, &stdout)
    }

    fn row_query(&self, target: &Target, spec: &QuerySpec) -> SourceResult<Vec<Row>> {
        let stdout = self.sqlite(target, spec)?;
        Ok(parse_rows(&stdout))
    }

    fn byte_size_probe(&self, target: &Target, resource: &ResourceSpec) -> SourceResult<u64> {
        let pod = self.resolve_pod(target)?;
        let command = vec![
            "stat".to_string(),
            "-c".to_string(),
            "%s".to_string(),
            resource.path.clone(),
        ];
        let args = self.exec_args(target, pod, command);
        let output = self.kubectl(resource.label, target, &args)?;
        parse_human_size(&output.stdout).ok_or_else(|| SourceError::Malformed {
            label: resource.label.to_string(),
            details: format!("not a byte count: {:?}", output.stdout.trim()),
        })
    }

    fn process_status(&self, target: &Target) -> SourceResult<ProcessStatus> {
        let pod = self.resolve_pod(target)?;
        let args = vec![
            "get".to_string(),
            "pod".to_string(),
            pod,
            "-n".to_string(),
            target.id.clone(),
            "-o".to_string(),
            POD_STATUS_JSONPATH.to_string(),
        ];
        let output = self.kubectl("process_status", target, &args)?;
        parse_pod_status(&output.stdout)
    }
}

/// Parse sqlite3 output for a single-value query.
fn parse_scalar(label: &str, stdout: &str) -> SourceResult<Scalar> {
    let value = stdout
        .trim_end_matches(RECORD_SEPARATOR)
        .trim()
        .to_string();
    if value.is_empty() {
        return Err(SourceError::Malformed {
            label: label.to_string(),
            details: "empty scalar result".to_string(),
        });
    }
    if value.contains(RECORD_SEPARATOR) || value.contains(FIELD_SEPARATOR) {
        return Err(SourceError::Malformed {
            label: label.to_string(),
            details: "scalar query returned more than one value".to_string(),
        });
    }
    Ok(value
        .parse::<i64>()
        .map_or_else(|_| Scalar::Text(value.clone()), Scalar::Integer))
}

/// Split sqlite3 output into rows. Empty output is an empty row set.
fn parse_rows(stdout: &str) -> Vec<Row> {
    stdout
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
        .map(|record| Row::split(record.trim_start_matches('\n'), FIELD_SEPARATOR))
        .collect()
}

/// Parse `phase|ready ready|restarts restarts` from the pod jsonpath query.
fn parse_pod_status(stdout: &str) -> SourceResult<ProcessStatus> {
    let malformed = |details: String| SourceError::Malformed {
        label: "process_status".to_string(),
        details,
    };

    let parts: Vec<&str> = stdout.trim().split('|').collect();
    if parts.len() != 3 {
        return Err(malformed(format!(
            "expected 3 jsonpath segments, found {}",
            parts.len()
        )));
    }

    let phase = parts[0].trim();
    if phase.is_empty() {
        return Err(malformed("empty pod phase".to_string()));
    }

    let container_ready = parts[1]
        .split_whitespace()
        .map(|flag| flag.eq_ignore_ascii_case("true"))
        .collect();
    let restart_counts = parts[2]
        .split_whitespace()
        .map(|count| {
            count
                .parse::<u32>()
                .map_err(|e| malformed(format!("restart count {count:?}: {e}")))
        })
        .collect::<SourceResult<Vec<u32>>>()?;

    Ok(ProcessStatus {
        phase: phase.to_string(),
        container_ready,
        restart_counts,
    })
}

fn classify_failure(label: &str, target: &Target, output: &CommandOutput) -> SourceError {
    let stderr = output.stderr.trim().to_string();
    let lowered = stderr.to_ascii_lowercase();
    if ["unable to connect", "connection refused", "no such host", "i/o timeout"]
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        SourceError::Unreachable {
            target: target.id.clone(),
            details: stderr,
        }
    } else if lowered.contains("notfound") || lowered.contains("not found") {
        SourceError::NotFound {
            resource: format!("{label} on {target}"),
        }
    } else {
        SourceError::CommandFailed {
            label: label.to_string(),
            code: output.code,
            stderr,
        }
    }
}

/// Run `bin args…`, killing it once `timeout` elapses.
///
/// Output pipes are drained on helper threads so a chatty child cannot block
/// on a full pipe while we poll for exit.
fn run_with_timeout(
    bin: &str,
    args: &[String],
    timeout: Duration,
    label: &str,
) -> SourceResult<CommandOutput> {
    let mut child = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SourceError::Unreachable {
            target: label.to_string(),
            details: format!("failed to spawn {bin}: {e}"),
        })?;

    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    // An unrepresentable deadline means the call is never cut short.
    let deadline = Instant::now().checked_add(timeout);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if deadline.is_some_and(|d| Instant::now() >= d) => {
                kill_quietly(&mut child);
                return Err(SourceError::Timeout {
                    label: label.to_string(),
                    secs: timeout.as_secs(),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill_quietly(&mut child);
                return Err(SourceError::Unreachable {
                    target: label.to_string(),
                    details: format!("failed to wait on {bin}: {e}"),
                });
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        code: status.code().unwrap_or(-1),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn kill_quietly(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
