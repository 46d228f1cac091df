//! Unlock command implementation

use anyhow::{Context, Result};
use ev_meta::{LockCoordinator, SqlMetadataStore};

use crate::cli::{GlobalArgs, UnlockArgs};
use crate::commands::common::{load_workspace, open_session};

/// Execute the unlock command
pub async fn execute(args: &UnlockArgs, global: &GlobalArgs) -> Result<()> {
    let workspace = load_workspace(global)?;
    let session = open_session(&workspace)?;
    let store = SqlMetadataStore::new(&workspace.config);

    let lock = store
        .lock_info(&session)
        .await
        .context("Failed to read migration lock")?;
    let Some(lock) = lock else {
        println!("Migration lock is not held");
        return Ok(());
    };

    if args.dry_run {
        println!("Migration lock held since {}", lock.locked_at.to_rfc3339());
        return Ok(());
    }

    // Only safe when no migration process is alive.
    if store
        .force_release(&session)
        .await
        .context("Failed to remove migration lock")?
    {
        log::warn!(
            "Removed migration lock taken at {}",
            lock.locked_at.to_rfc3339()
        );
        println!("Migration lock released");
    } else {
        println!("Migration lock was released concurrently");
    }
    Ok(())
}
