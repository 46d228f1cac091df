//! Migrate command implementation

use anyhow::{bail, Context, Result};
use ev_engine::{MigrateOutcome, Orchestrator};

use crate::cli::{GlobalArgs, MigrateArgs};
use crate::commands::common::{load_workspace, open_session};

/// Execute the migrate command
pub async fn execute(args: &MigrateArgs, global: &GlobalArgs) -> Result<()> {
    let mut workspace = load_workspace(global)?;
    if let Some(secs) = args.lock_timeout {
        workspace.config.lock_wait_timeout_secs = Some(secs);
    }
    let session = open_session(&workspace)?;
    let orchestrator = Orchestrator::for_project(&workspace.config, &workspace.root);

    // Ctrl-C ends a lock wait. A migration that is already running finishes
    // so its attempt is recorded and the lock released.
    let cancel = orchestrator.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted");
            cancel.cancel();
        }
    });

    let outcome = orchestrator.migrate(&session).await;
    interrupt.abort();

    match outcome.context("Migration failed")? {
        MigrateOutcome::Applied { from, to, applied } => {
            let listed: Vec<String> = applied.iter().map(|v| format!("v{:03}", v)).collect();
            println!(
                "Migrated from version {} to {}: applied {}",
                from,
                to,
                listed.join(", ")
            );
        }
        MigrateOutcome::UpToDate { version } => {
            println!("Already up to date at version {}", version);
        }
        MigrateOutcome::NoMigrations => {
            println!(
                "No migrations found in {}",
                workspace.config.script_dir(&workspace.root).display()
            );
        }
        MigrateOutcome::WaitedForPeer => {
            println!("Another process ran the migrations; nothing applied here");
        }
        MigrateOutcome::Cancelled => {
            bail!("Cancelled while waiting for the migration lock");
        }
    }
    Ok(())
}
