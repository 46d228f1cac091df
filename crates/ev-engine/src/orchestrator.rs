//! Migration runs.
//!
//! A run takes the metadata lock, provisions the metadata structures on first
//! use, resolves the known migrations, applies every applicable one in
//! ascending version order and records each attempt. The lock is released on
//! every exit path once it has been taken, panics included. A process that
//! finds the lock taken waits for the holder to release it and then returns
//! without running anything itself.

use crate::error::{EngineError, EngineResult};
use crate::lock::{wait_for_release, LockWait, WaitPolicy};
use crate::migration::{Migration, SharedMigration};
use crate::resolver::{resolve, ResolvedMigrations};
use crate::source::{DirectorySource, MigrationSource};
use ev_core::EvolveConfig;
use ev_db::Session;
use ev_meta::{LockCoordinator, MetadataRecord, MetadataStore, SqlMetadataStore};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Schema version as read from the migration history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentVersion {
    /// The history has never been provisioned.
    Uninitialized,
    /// Version of the newest record, `0` for an empty history.
    At { version: i32, last_failed: bool },
}

impl CurrentVersion {
    /// Lower bound of the next run's applicable range.
    ///
    /// One below a failed newest record, so that version is attempted again.
    pub fn resume_from(&self) -> i32 {
        match *self {
            CurrentVersion::Uninitialized => 0,
            CurrentVersion::At {
                version,
                last_failed: true,
            } => version - 1,
            CurrentVersion::At { version, .. } => version,
        }
    }
}

/// What a call to [`Orchestrator::migrate`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrateOutcome {
    /// Migrations in `(from, to]` were applied, in this order.
    Applied {
        from: i32,
        to: i32,
        applied: Vec<i32>,
    },
    /// Nothing to apply; the history is already at or past the target.
    UpToDate { version: i32 },
    /// No migrations are registered or discovered.
    NoMigrations,
    /// Another process held the lock; this call waited for it to finish.
    WaitedForPeer,
    /// The wait for another process's lock was cancelled.
    Cancelled,
}

/// Drives migration runs against one metadata store.
pub struct Orchestrator {
    store: Arc<dyn MetadataStore>,
    registered: Vec<SharedMigration>,
    sources: Vec<Box<dyn MigrationSource>>,
    wait_policy: WaitPolicy,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            registered: Vec::new(),
            sources: Vec::new(),
            wait_policy: WaitPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// SQL-backed store plus the script directory of the project at `root`.
    pub fn for_project(config: &EvolveConfig, root: &Path) -> Self {
        Self::new(Arc::new(SqlMetadataStore::new(config)))
            .with_source(DirectorySource::from_config(config, root))
            .with_wait_policy(WaitPolicy::from_config(config))
    }

    pub fn register(mut self, migration: impl Migration + 'static) -> Self {
        self.registered.push(Arc::new(migration));
        self
    }

    pub fn register_all(mut self, migrations: impl IntoIterator<Item = SharedMigration>) -> Self {
        self.registered.extend(migrations);
        self
    }

    pub fn with_source(mut self, source: impl MigrationSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    /// Use `token` to cancel lock waits instead of the built-in one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token whose cancellation ends a pending lock wait.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    /// Read the current version from the history.
    pub async fn current_version(&self, session: &dyn Session) -> EngineResult<CurrentVersion> {
        if !self.store.exists(session).await? {
            return Ok(CurrentVersion::Uninitialized);
        }
        Ok(match self.store.latest(session).await? {
            Some(record) => CurrentVersion::At {
                version: record.version,
                last_failed: !record.was_successful,
            },
            None => CurrentVersion::At {
                version: 0,
                last_failed: false,
            },
        })
    }

    /// Registered and discovered migrations, merged and ordered.
    pub fn resolve_migrations(&self) -> EngineResult<ResolvedMigrations> {
        let mut discovered = Vec::new();
        for source in &self.sources {
            discovered.extend(source.discover()?);
        }
        Ok(resolve(&self.registered, discovered))
    }

    /// Bring the database up to the highest known version.
    ///
    /// A failing migration aborts the run with
    /// [`EngineError::MigrationAborted`] after its attempt is recorded and the
    /// lock released.
    pub async fn migrate(&self, session: &dyn Session) -> EngineResult<MigrateOutcome> {
        if !self.store.acquire(session).await? {
            log::info!(
                "Migration lock on {} is held by another process, waiting",
                self.store.describe()
            );
            let waited = wait_for_release(
                self.store.as_ref(),
                session,
                &self.wait_policy,
                &self.cancel,
            )
            .await?;
            return Ok(match waited {
                LockWait::Released => MigrateOutcome::WaitedForPeer,
                LockWait::Cancelled => MigrateOutcome::Cancelled,
            });
        }
        log::debug!("Acquired migration lock on {}", self.store.describe());

        let run = AssertUnwindSafe(self.run_locked(session))
            .catch_unwind()
            .await;
        let released = self.store.release(session).await;

        match run {
            Err(panic) => {
                if let Err(e) = released {
                    log::error!("Failed to release migration lock after panic: {}", e);
                }
                std::panic::resume_unwind(panic)
            }
            Ok(Err(e)) => {
                if let Err(release_err) = released {
                    log::error!("Failed to release migration lock: {}", release_err);
                }
                Err(e)
            }
            Ok(Ok(outcome)) => {
                released?;
                log::debug!("Released migration lock on {}", self.store.describe());
                Ok(outcome)
            }
        }
    }

    async fn run_locked(&self, session: &dyn Session) -> EngineResult<MigrateOutcome> {
        let current = self.current_version(session).await?;
        if current == CurrentVersion::Uninitialized {
            log::info!("Initializing migration metadata in {}", self.store.describe());
            self.store.initialize(session).await?;
        }
        if let CurrentVersion::At {
            version,
            last_failed: true,
        } = current
        {
            log::warn!("Last attempt of version {} failed, retrying it", version);
        }
        let from = current.resume_from();

        let resolved = self.resolve_migrations()?;
        let Some(target) = resolved.target() else {
            log::info!("No migrations found");
            return Ok(MigrateOutcome::NoMigrations);
        };
        if from >= target {
            log::info!("Schema is up to date at version {}", from);
            return Ok(MigrateOutcome::UpToDate { version: from });
        }

        log::info!("Migrating from version {} to {}", from, target);
        let mut applied = Vec::new();
        for migration in resolved.iter().filter(|m| m.is_applicable(from, target)) {
            self.apply(session, migration.as_ref()).await?;
            applied.push(migration.version());
        }
        log::info!("Applied {} migration(s), now at version {}", applied.len(), target);

        Ok(MigrateOutcome::Applied {
            from,
            to: target,
            applied,
        })
    }

    /// Run one migration and record the attempt, whatever its outcome.
    async fn apply(&self, session: &dyn Session, migration: &dyn Migration) -> EngineResult<()> {
        log::info!(
            "Applying migration v{:03}: {}",
            migration.version(),
            migration.description()
        );
        let started = Instant::now();
        let result = migration.migrate(session).await;
        let elapsed_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let succeeded = matches!(result, Ok(true));

        let record = MetadataRecord::new(
            migration.version(),
            migration.description(),
            migration.script().map(str::to_string),
            elapsed_ms,
            succeeded,
        );
        self.store.append(session, &record).await?;

        match result {
            Ok(true) => {
                log::debug!(
                    "Migration v{:03} finished in {}ms",
                    migration.version(),
                    elapsed_ms
                );
                Ok(())
            }
            Ok(false) => {
                log::error!(
                    "Migration v{:03} ({}) failed, aborting run",
                    migration.version(),
                    migration.description()
                );
                Err(EngineError::MigrationAborted {
                    version: migration.version(),
                    description: migration.description().to_string(),
                })
            }
            Err(e) => {
                log::error!("Migration v{:03} errored: {}", migration.version(), e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
