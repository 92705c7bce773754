//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{MedicError, Result};
use crate::diagnosis::classifier::Thresholds;

/// Upper bound for `source.timeout_secs` (one hour).
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Full medic configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub thresholds: Thresholds,
    pub source: SourceConfig,
    pub report: ReportConfig,
    pub paths: PathsConfig,
}

/// Which metrics source backs an investigation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Remote instance reached through `kubectl exec`.
    #[default]
    Kubectl,
    /// Local SQLite file (a downloaded backup, for example).
    Sqlite,
}

/// Remote execution knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub kubectl_bin: String,
    pub sqlite3_bin: String,
    /// Sidecar container that has the database file and the sqlite3 CLI.
    pub container: String,
    /// Application container, used by manual-check log commands.
    pub app_container: String,
    /// Database path inside the container.
    pub database_path: String,
    /// Upper bound for a single probe call.
    pub timeout_secs: u64,
}

/// Rendering knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory persisted reports are written to.
    pub output_dir: PathBuf,
    /// Display width for workflow-name columns.
    pub name_width: usize,
    /// Display width for table-name columns.
    pub table_width: usize,
}

/// Filesystem paths used by medic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub activity_log: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Kubectl,
            kubectl_bin: "kubectl".to_string(),
            sqlite3_bin: "sqlite3".to_string(),
            container: "backup-cron".to_string(),
            app_container: "n8n".to_string(),
            database_path: "database.sqlite".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            name_width: 30,
            table_width: 28,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[MEDIC-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("medic").join("config.toml"),
            activity_log: home_dir
                .join(".local")
                .join("share")
                .join("medic")
                .join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| MedicError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(MedicError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic FNV-1a hash of the effective config for the activity log.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // thresholds
        override_u64(
            &mut lookup,
            "MEDIC_THRESHOLD_EXECUTION_DATA_BLOAT_BYTES",
            &mut self.thresholds.execution_data_bloat_bytes,
        )?;
        override_u64(
            &mut lookup,
            "MEDIC_THRESHOLD_INACTIVE_WORKFLOW_BYTES",
            &mut self.thresholds.inactive_workflow_bytes,
        )?;
        override_u64(
            &mut lookup,
            "MEDIC_THRESHOLD_LARGE_RECORD_BYTES",
            &mut self.thresholds.large_record_bytes,
        )?;
        override_u64(
            &mut lookup,
            "MEDIC_THRESHOLD_PENDING_BACKLOG",
            &mut self.thresholds.pending_backlog,
        )?;
        override_u64(
            &mut lookup,
            "MEDIC_THRESHOLD_DATABASE_OVERALL_BYTES",
            &mut self.thresholds.database_overall_bytes,
        )?;

        // source
        if let Some(raw) = lookup("MEDIC_SOURCE_KIND") {
            self.source.kind = match raw.trim().to_ascii_lowercase().as_str() {
                "kubectl" => SourceKind::Kubectl,
                "sqlite" => SourceKind::Sqlite,
                _ => {
                    return Err(MedicError::ConfigParse {
                        context: "env",
                        details: format!("MEDIC_SOURCE_KIND={raw:?}: expected kubectl or sqlite"),
                    });
                }
            };
        }
        override_string(&mut lookup, "MEDIC_SOURCE_KUBECTL_BIN", &mut self.source.kubectl_bin);
        override_string(&mut lookup, "MEDIC_SOURCE_SQLITE3_BIN", &mut self.source.sqlite3_bin);
        override_string(&mut lookup, "MEDIC_SOURCE_CONTAINER", &mut self.source.container);
        override_string(
            &mut lookup,
            "MEDIC_SOURCE_DATABASE_PATH",
            &mut self.source.database_path,
        );
        override_u64(
            &mut lookup,
            "MEDIC_SOURCE_TIMEOUT_SECS",
            &mut self.source.timeout_secs,
        )?;

        // report
        if let Some(raw) = lookup("MEDIC_REPORT_OUTPUT_DIR") {
            self.report.output_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("MEDIC_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.source.timeout_secs == 0 {
            return Err(MedicError::InvalidConfig {
                details: "source.timeout_secs must be >= 1".to_string(),
            });
        }
        if self.source.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(MedicError::InvalidConfig {
                details: format!(
                    "source.timeout_secs must be <= {MAX_TIMEOUT_SECS}, got {}",
                    self.source.timeout_secs
                ),
            });
        }

        for (name, value) in [
            ("kubectl_bin", &self.source.kubectl_bin),
            ("sqlite3_bin", &self.source.sqlite3_bin),
            ("container", &self.source.container),
            ("database_path", &self.source.database_path),
        ] {
            if value.trim().is_empty() {
                return Err(MedicError::InvalidConfig {
                    details: format!("source.{name} must not be empty"),
                });
            }
        }

        for (name, width) in [
            ("name_width", self.report.name_width),
            ("table_width", self.report.table_width),
        ] {
            if width < 8 {
                return Err(MedicError::InvalidConfig {
                    details: format!("report.{name} must be >= 8, got {width}"),
                });
            }
        }

        if self.thresholds.execution_payload_table.trim().is_empty() {
            return Err(MedicError::InvalidConfig {
                details: "thresholds.execution_payload_table must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn override_u64<F>(lookup: &mut F, name: &str, slot: &mut u64) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw
            .trim()
            .parse::<u64>()
            .map_err(|error| MedicError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

fn override_string<F>(lookup: &mut F, name: &str, slot: &mut String)
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw;
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, MAX_TIMEOUT_SECS, MedicError, SourceKind};
    use std::collections::HashMap;
    use std::path::Path;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn default_thresholds_match_reference_behavior() {
        let cfg = Config::default();
        assert_eq!(cfg.thresholds.execution_data_bloat_bytes, 100_000_000);
        assert_eq!(cfg.thresholds.inactive_workflow_bytes, 10_000_000);
        assert_eq!(cfg.thresholds.large_record_bytes, 10_000_000);
        assert_eq!(cfg.thresholds.pending_backlog, 100);
        assert_eq!(cfg.thresholds.database_overall_bytes, 200_000_000);
        assert_eq!(cfg.thresholds.execution_payload_table, "execution_data");
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut cfg = Config::default();
        cfg.source.timeout_secs = 0;
        let err = cfg.validate().expect_err("expected timeout error");
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn oversized_timeout_rejected() {
        let mut cfg = Config::default();
        cfg.source.timeout_secs = MAX_TIMEOUT_SECS;
        assert!(cfg.validate().is_ok());

        let overrides = vars(&[("MEDIC_SOURCE_TIMEOUT_SECS", "18446744073709551615")]);
        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("u64::MAX parses");
        let err = cfg.validate().expect_err("expected timeout bound error");
        assert!(err.to_string().contains("<= 3600"));
    }

    #[test]
    fn narrow_display_width_rejected() {
        let mut cfg = Config::default();
        cfg.report.name_width = 3;
        let err = cfg.validate().expect_err("expected width error");
        assert!(err.to_string().contains("name_width"));
    }

    #[test]
    fn empty_payload_table_rejected() {
        let mut cfg = Config::default();
        cfg.thresholds.execution_payload_table = "  ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_thresholds_and_source() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("MEDIC_THRESHOLD_PENDING_BACKLOG", "250"),
            ("MEDIC_SOURCE_TIMEOUT_SECS", "5"),
            ("MEDIC_SOURCE_KIND", "sqlite"),
            ("MEDIC_SOURCE_CONTAINER", "db-sidecar"),
        ]);

        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("env overrides should parse");

        assert_eq!(cfg.thresholds.pending_backlog, 250);
        assert_eq!(cfg.source.timeout_secs, 5);
        assert_eq!(cfg.source.kind, SourceKind::Sqlite);
        assert_eq!(cfg.source.container, "db-sidecar");
    }

    #[test]
    fn env_invalid_number_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("MEDIC_THRESHOLD_PENDING_BACKLOG", "lots")]);

        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid number should fail");
        match err {
            MedicError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("MEDIC_THRESHOLD_PENDING_BACKLOG"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn env_unknown_source_kind_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("MEDIC_SOURCE_KIND", "ssh")]);
        assert!(
            cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
                .is_err()
        );
    }

    #[test]
    fn toml_sections_parse_with_partial_content() {
        let raw = r#"
            [thresholds]
            pending_backlog = 40

            [source]
            kind = "sqlite"
        "#;
        let cfg: Config = toml::from_str(raw).expect("partial toml parses");
        assert_eq!(cfg.thresholds.pending_backlog, 40);
        assert_eq!(cfg.thresholds.database_overall_bytes, 200_000_000);
        assert_eq!(cfg.source.kind, SourceKind::Sqlite);
        assert_eq!(cfg.source.container, "backup-cron");
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("medic.toml");
        std::fs::write(&path, "[report]\nname_width = 40\n").expect("write config");
        let cfg = Config::load(Some(&path)).expect("load config");
        assert_eq!(cfg.report.name_width, 40);
        assert_eq!(cfg.paths.config_file, path);
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/medic/config.toml")));
        assert!(matches!(result, Err(MedicError::MissingConfig { .. })));
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let before = cfg.stable_hash().expect("hash");
        let mut modified = Config::default();
        modified.thresholds.pending_backlog += 1;
        let after = modified.stable_hash().expect("hash");
        assert_ne!(before, after);
        assert_eq!(before, cfg.stable_hash().expect("hash"));
    }
}
