//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use instance_medic::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{MedicError, Result};

// Sources
pub use crate::source::scripted::ScriptedSource;
pub use crate::source::{MetricsSource, SourceError, Target};
pub use crate::source::kubectl::KubectlSource;
#[cfg(feature = "sqlite")]
pub use crate::source::sqlite::SqliteSource;

// Diagnosis
pub use crate::diagnosis::{
    Aggregator, Culprit, CulpritKind, DiagnosticSnapshot, HealthVerdict, MetricValue, ProbeFailure,
    ProbeId, Thresholds, classify, classify_with, health_verdict,
};

// Reports
pub use crate::report::{RenderOptions, WrittenReport, render_markdown, render_terminal, write_report};

// Logging
pub use crate::logger::ActivityLogger;
