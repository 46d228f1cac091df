//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use ev_core::{CoreError, EvolveConfig};
use ev_db::DuckDbSession;
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;

/// Project root, configuration and database location for one invocation.
#[derive(Debug)]
pub(crate) struct Workspace {
    pub(crate) root: PathBuf,
    pub(crate) config: EvolveConfig,
    pub(crate) database: String,
}

/// Load the project configuration and resolve the database path.
///
/// An explicit `--config` must exist. Without one, `evolve.yml` or
/// `evolve.yaml` in the project directory is used if present, defaults
/// otherwise. Relative database paths are taken relative to the project.
pub(crate) fn load_workspace(global: &GlobalArgs) -> Result<Workspace> {
    let root = PathBuf::from(&global.project_dir);

    let config = match &global.config {
        Some(path) => EvolveConfig::load(Path::new(path))
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => match EvolveConfig::load_from_dir(&root) {
            Ok(config) => config,
            Err(CoreError::ConfigNotFound { path }) => {
                log::debug!("No config at {}, using defaults", path);
                EvolveConfig::default()
            }
            Err(e) => return Err(e).context("Failed to load project config"),
        },
    };

    let database = resolve_database_path(
        &root,
        &config.resolve_database(global.database.as_deref()),
    );
    Ok(Workspace {
        root,
        config,
        database,
    })
}

fn resolve_database_path(root: &Path, database: &str) -> String {
    if database == ":memory:" || Path::new(database).is_absolute() {
        database.to_string()
    } else {
        root.join(database).display().to_string()
    }
}

/// Open the workspace database.
pub(crate) fn open_session(workspace: &Workspace) -> Result<DuckDbSession> {
    if workspace.database == ":memory:" {
        log::warn!("Using an in-memory database; nothing will persist after this command");
    }
    DuckDbSession::new(&workspace.database)
        .with_context(|| format!("Failed to open database {}", workspace.database))
}

/// Compute column widths for a table given headers and rows.
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

/// Print a left-aligned table with a dashed separator under the header.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);
    let format_row = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", format_row(headers.to_vec()));
    let separator: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", separator.join("  "));
    for row in rows {
        println!("{}", format_row(row.iter().map(String::as_str).collect()));
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
