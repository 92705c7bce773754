//! MED-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, MedicError>;

/// Top-level error type for instance medic.
///
/// Probe failures are deliberately absent: they are absorbed into the
/// snapshot as `Unknown` values and never surface through this type.
#[derive(Debug, Error)]
pub enum MedicError {
    #[error("[MED-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[MED-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[MED-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[MED-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[MED-2102] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[MED-2201] invalid render input in {section}: {details}")]
    RenderInputInvalid {
        section: &'static str,
        details: String,
    },

    #[error("[MED-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[MED-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl MedicError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "MED-1001",
            Self::MissingConfig { .. } => "MED-1002",
            Self::ConfigParse { .. } => "MED-1003",
            Self::Serialization { .. } => "MED-2101",
            Self::Sql { .. } => "MED-2102",
            Self::RenderInputInvalid { .. } => "MED-2201",
            Self::Io { .. } => "MED-3002",
            Self::Runtime { .. } => "MED-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// `RenderInputInvalid` is never retryable: it signals an aggregator or
    /// classifier bug, not an environment problem.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Sql { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for renderer invariant violations.
    #[must_use]
    pub fn render_input(section: &'static str, details: impl Into<String>) -> Self {
        Self::RenderInputInvalid {
            section,
            details: details.into(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for MedicError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for MedicError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for MedicError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
