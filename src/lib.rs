#![forbid(unsafe_code)]

//! Instance Medic (medic): crash and memory-exhaustion diagnosis for
//! workflow-automation instances backed by a single SQLite database.
//!
//! An investigation runs in three stages:
//! 1. **Probes** gather metrics through a [`source::MetricsSource`]; each
//!    failed probe becomes an explicit unknown instead of aborting the run
//! 2. **Classification** applies fixed threshold rules to the snapshot
//! 3. **Reports** render the snapshot and culprits for a terminal and as a
//!    persisted Markdown document
//!
//! # Library usage
//!
//! ```rust,no_run
//! use instance_medic::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use instance_medic::core::config::Config;
//! use instance_medic::diagnosis::{Aggregator, classify};
//! ```

pub mod prelude;

pub mod core;
pub mod diagnosis;
pub mod logger;
pub mod probe;
pub mod report;
pub mod source;
