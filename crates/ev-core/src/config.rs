//! Configuration types and parsing for evolve.yml

use crate::error::{CoreError, CoreResult};
use crate::serde_helpers::{
    default_db_path, default_delimiter, default_keyspace, default_lock_poll_interval_ms,
    default_metadata_table, default_script_extension, default_script_path,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `database.path`.
pub const DATABASE_ENV_VAR: &str = "EVOLVE_DATABASE";

/// Migration configuration from evolve.yml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvolveConfig {
    /// Database namespace holding the metadata and lock tables
    #[serde(default = "default_keyspace")]
    pub keyspace: String,

    /// Name of the migration history table; the lock table is `<name>_lock`
    #[serde(default = "default_metadata_table")]
    pub metadata_table: String,

    /// Directory containing migration scripts, relative to the project directory
    #[serde(default = "default_script_path")]
    pub script_path: String,

    /// File extension of migration scripts (without the dot)
    #[serde(default = "default_script_extension")]
    pub script_extension: String,

    /// Statement delimiter used to split scripts
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// How often a waiting process re-checks a held lock
    #[serde(default = "default_lock_poll_interval_ms")]
    pub lock_poll_interval_ms: u64,

    /// Upper bound on waiting for another process's lock; unbounded when absent
    #[serde(default)]
    pub lock_wait_timeout_secs: Option<u64>,

    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database path (DuckDB file or :memory:)
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for EvolveConfig {
    fn default() -> Self {
        Self {
            keyspace: default_keyspace(),
            metadata_table: default_metadata_table(),
            script_path: default_script_path(),
            script_extension: default_script_extension(),
            delimiter: default_delimiter(),
            lock_poll_interval_ms: default_lock_poll_interval_ms(),
            lock_wait_timeout_secs: None,
            database: DatabaseConfig::default(),
        }
    }
}

impl EvolveConfig {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(content: &str) -> CoreResult<Self> {
        let config: EvolveConfig = if content.trim().is_empty() {
            EvolveConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for evolve.yml or evolve.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("evolve.yml");
        let yaml_path = dir.join("evolve.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        validate_identifier("keyspace", &self.keyspace)?;
        validate_identifier("metadata_table", &self.metadata_table)?;

        if self.delimiter.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "delimiter cannot be empty".to_string(),
            });
        }
        if self.lock_poll_interval_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "lock_poll_interval_ms must be greater than zero".to_string(),
            });
        }
        if self.script_extension.is_empty() || self.script_extension.starts_with('.') {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "script_extension must be a bare extension such as 'sql', got '{}'",
                    self.script_extension
                ),
            });
        }
        Ok(())
    }

    /// Name of the lock table that sits next to the history table
    pub fn lock_table(&self) -> String {
        format!("{}_lock", self.metadata_table)
    }

    /// Interval between lock polls while waiting for another process
    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms)
    }

    /// Maximum time to wait for another process's lock, if bounded
    pub fn lock_wait_timeout(&self) -> Option<Duration> {
        self.lock_wait_timeout_secs.map(Duration::from_secs)
    }

    /// Absolute script directory for a project rooted at `root`
    pub fn script_dir(&self, root: &Path) -> PathBuf {
        let path = Path::new(&self.script_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }

    /// Resolve the database path: CLI flag > EVOLVE_DATABASE env var > config
    pub fn resolve_database(&self, cli_database: Option<&str>) -> String {
        cli_database
            .map(String::from)
            .or_else(|| std::env::var(DATABASE_ENV_VAR).ok())
            .unwrap_or_else(|| self.database.path.clone())
    }
}

/// Identifiers are spliced into DDL, so only plain SQL identifiers are allowed.
fn validate_identifier(field: &str, value: &str) -> CoreResult<()> {
    if value.is_empty() {
        return Err(CoreError::ConfigInvalid {
            message: format!("{field} cannot be empty"),
        });
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CoreError::ConfigInvalid {
            message: format!("{field} '{value}' may only contain letters, digits and '_'"),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
