//! Status command implementation

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ev_db::Session;
use ev_engine::{CurrentVersion, Migration, Orchestrator};
use ev_meta::{LockCoordinator, LockRecord, MetadataRecord, MetadataStore};
use serde::Serialize;

use crate::cli::{GlobalArgs, StatusArgs, StatusOutput};
use crate::commands::common::{load_workspace, open_session, print_table};

/// Snapshot of the migration state of one database.
#[derive(Debug, Serialize)]
struct StatusReport {
    database: String,
    metadata_table: String,
    initialized: bool,
    current_version: Option<i32>,
    last_attempt_failed: bool,
    target_version: Option<i32>,
    pending: Vec<i32>,
    lock: Option<LockRecord>,
    history: Vec<MetadataRecord>,
}

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let workspace = load_workspace(global)?;
    let session = open_session(&workspace)?;
    let orchestrator = Orchestrator::for_project(&workspace.config, &workspace.root);

    let report = build_report(&orchestrator, &session, &workspace.database).await?;
    match args.output {
        StatusOutput::Table => print_report(&report),
        StatusOutput::Json => {
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialize to JSON")?;
            println!("{}", json);
        }
    }
    Ok(())
}

async fn build_report(
    orchestrator: &Orchestrator,
    session: &dyn Session,
    database: &str,
) -> Result<StatusReport> {
    let store = orchestrator.store();
    let current = orchestrator
        .current_version(session)
        .await
        .context("Failed to read migration history")?;
    let resolved = orchestrator
        .resolve_migrations()
        .context("Failed to discover migrations")?;
    let lock = store
        .lock_info(session)
        .await
        .context("Failed to read migration lock")?;

    let from = current.resume_from();
    let pending = match resolved.target() {
        Some(target) => resolved
            .iter()
            .filter(|m| m.is_applicable(from, target))
            .map(|m| m.version())
            .collect(),
        None => Vec::new(),
    };

    let (initialized, current_version, last_attempt_failed, history) = match current {
        CurrentVersion::Uninitialized => (false, None, false, Vec::new()),
        CurrentVersion::At {
            version,
            last_failed,
        } => (
            true,
            Some(version),
            last_failed,
            store
                .history(session)
                .await
                .context("Failed to read migration history")?,
        ),
    };

    Ok(StatusReport {
        database: database.to_string(),
        metadata_table: store.describe(),
        initialized,
        current_version,
        last_attempt_failed,
        target_version: resolved.target(),
        pending,
        lock,
        history,
    })
}

fn print_report(report: &StatusReport) {
    println!("Database:        {}", report.database);
    println!("Metadata table:  {}", report.metadata_table);
    match report.current_version {
        Some(version) if report.last_attempt_failed => {
            println!("Current version: {} (last attempt failed)", version)
        }
        Some(version) => println!("Current version: {}", version),
        None => println!("Current version: uninitialized"),
    }
    match report.target_version {
        Some(target) => println!("Target version:  {}", target),
        None => println!("Target version:  none (no migrations found)"),
    }
    match &report.lock {
        Some(lock) => println!("Lock:            held since {}", format_time(&lock.locked_at)),
        None => println!("Lock:            free"),
    }
    if !report.pending.is_empty() {
        let pending: Vec<String> = report.pending.iter().map(|v| v.to_string()).collect();
        println!("Pending:         {}", pending.join(", "));
    }

    if report.history.is_empty() {
        return;
    }
    println!();
    let rows: Vec<Vec<String>> = report
        .history
        .iter()
        .map(|r| {
            vec![
                r.version.to_string(),
                r.description.clone(),
                if r.was_successful { "ok" } else { "FAILED" }.to_string(),
                format_time(&r.installed_at),
                format!("{}ms", r.execution_time_ms),
                r.hash
                    .as_deref()
                    .map(|h| h.chars().take(12).collect())
                    .unwrap_or_default(),
            ]
        })
        .collect();
    print_table(
        &["VERSION", "DESCRIPTION", "STATUS", "INSTALLED AT", "TIME", "HASH"],
        &rows,
    );
}

fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}
