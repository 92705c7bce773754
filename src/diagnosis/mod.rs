//! Diagnosis engine: snapshot model, aggregation, culprit classification.

pub mod aggregator;
pub mod classifier;
pub mod health;
pub mod snapshot;

pub use aggregator::Aggregator;
pub use classifier::{Culprit, CulpritKind, Thresholds, classify, classify_with};
pub use health::{HealthVerdict, health_verdict};
pub use snapshot::{DiagnosticSnapshot, MetricValue, ProbeFailure, ProbeId};
