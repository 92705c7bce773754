//! Core types: errors, configuration, unit formatting.

pub mod config;
pub mod errors;
pub mod units;
