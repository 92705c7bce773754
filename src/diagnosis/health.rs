//! Overall health verdict from process state and recent errors.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnosis::snapshot::DiagnosticSnapshot;

/// Restarts at or above this mark a running instance as having issues.
pub const RESTART_LIMIT: u64 = 5;
/// Errors in the last 24h at or above this mark a running instance as having issues.
pub const ERROR_LIMIT: u64 = 10;

const RUNNING_PHASE: &str = "Running";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthVerdict {
    Healthy,
    RunningWithIssues,
    Unhealthy,
}

impl HealthVerdict {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::RunningWithIssues => "Running with issues",
            Self::Unhealthy => "Unhealthy",
        }
    }
}

impl fmt::Display for HealthVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Verdict for a snapshot, or `None` when process health or the 24h error
/// count is unknown.
#[must_use]
pub fn health_verdict(snapshot: &DiagnosticSnapshot) -> Option<HealthVerdict> {
    let process = snapshot.process_health.known()?;
    let errors = *snapshot.error_count_24h.known()?;

    if process.phase != RUNNING_PHASE {
        return Some(HealthVerdict::Unhealthy);
    }
    if process.restart_count < RESTART_LIMIT && errors < ERROR_LIMIT {
        Some(HealthVerdict::Healthy)
    } else {
        Some(HealthVerdict::RunningWithIssues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::snapshot::{MetricValue, ProcessHealth};
    use chrono::Utc;

    fn snapshot(phase: &str, restarts: u64, errors: u64) -> DiagnosticSnapshot {
        let mut s = DiagnosticSnapshot::empty("acme", Utc::now());
        s.process_health = MetricValue::Known(ProcessHealth {
            phase: phase.to_string(),
            ready: true,
            restart_count: restarts,
        });
        s.error_count_24h = MetricValue::Known(errors);
        s
    }

    #[test]
    fn restart_boundary() {
        assert_eq!(
            health_verdict(&snapshot("Running", 4, 0)),
            Some(HealthVerdict::Healthy)
        );
        assert_eq!(
            health_verdict(&snapshot("Running", 5, 0)),
            Some(HealthVerdict::RunningWithIssues)
        );
    }

    #[test]
    fn error_boundary() {
        assert_eq!(
            health_verdict(&snapshot("Running", 0, 9)),
            Some(HealthVerdict::Healthy)
        );
        assert_eq!(
            health_verdict(&snapshot("Running", 0, 10)),
            Some(HealthVerdict::RunningWithIssues)
        );
    }

    #[test]
    fn not_running_is_unhealthy() {
        assert_eq!(
            health_verdict(&snapshot("CrashLoopBackOff", 0, 0)),
            Some(HealthVerdict::Unhealthy)
        );
        assert_eq!(
            health_verdict(&snapshot("Pending", 12, 40)),
            Some(HealthVerdict::Unhealthy)
        );
    }

    #[test]
    fn abstains_on_unknown_inputs() {
        let mut no_errors = snapshot("Running", 0, 0);
        no_errors.error_count_24h = MetricValue::Unknown;
        assert_eq!(health_verdict(&no_errors), None);

        let mut no_process = snapshot("Running", 0, 0);
        no_process.process_health = MetricValue::Unknown;
        assert_eq!(health_verdict(&no_process), None);
    }
}
