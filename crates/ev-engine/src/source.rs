//! Migration discovery.

use crate::migration::SharedMigration;
use crate::script::ScriptMigration;
use ev_core::{CoreError, CoreResult, EvolveConfig, ScriptName};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Supplies migrations found outside the process, in any order.
pub trait MigrationSource: Send + Sync {
    fn discover(&self) -> CoreResult<Vec<SharedMigration>>;
}

/// Loads `<version>_<description>.<ext>` script files from one directory.
pub struct DirectorySource {
    dir: PathBuf,
    extension: String,
    delimiter: String,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>, extension: &str, delimiter: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.to_string(),
            delimiter: delimiter.to_string(),
        }
    }

    /// Source for the configured script directory of a project rooted at `root`.
    pub fn from_config(config: &EvolveConfig, root: &Path) -> Self {
        Self::new(
            config.script_dir(root),
            &config.script_extension,
            &config.delimiter,
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load(&self, path: &Path) -> CoreResult<ScriptMigration> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CoreError::InvalidScriptName {
                name: path.display().to_string(),
                reason: "file name is not valid UTF-8".to_string(),
            })?;
        let name = ScriptName::parse(file_name)?;
        let script = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(ScriptMigration::new(name.version, name.description, script)
            .with_delimiter(self.delimiter.as_str()))
    }
}

impl MigrationSource for DirectorySource {
    fn discover(&self) -> CoreResult<Vec<SharedMigration>> {
        if !self.dir.is_dir() {
            log::debug!(
                "Migration script directory {} not found; no scripts discovered",
                self.dir.display()
            );
            return Ok(Vec::new());
        }

        let io_err = |e| CoreError::IoWithPath {
            path: self.dir.display().to_string(),
            source: e,
        };
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_dir() {
                continue;
            }
            if !path.extension().is_some_and(|e| e == self.extension.as_str()) {
                log::debug!("Skipping non-script file {}", path.display());
                continue;
            }
            paths.push(path);
        }
        paths.sort();

        let mut migrations: Vec<SharedMigration> = Vec::with_capacity(paths.len());
        for path in &paths {
            migrations.push(Arc::new(self.load(path)?));
        }
        log::debug!(
            "Discovered {} migration script(s) in {}",
            migrations.len(),
            self.dir.display()
        );
        Ok(migrations)
    }
}
