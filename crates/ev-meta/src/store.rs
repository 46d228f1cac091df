//! Metadata persistence and lock coordination contracts.

use crate::error::{MetaError, MetaResult};
use crate::record::{LockRecord, MetadataRecord};
use async_trait::async_trait;
use ev_db::Session;

/// Atomic operations over the singleton lock record.
///
/// `acquire` and `release` must be conditional writes (insert-if-absent,
/// delete-if-present) so two concurrent acquirers can never both succeed.
#[async_trait]
pub trait LockCoordinator: Send + Sync {
    /// Insert the lock record if absent. `true` iff this call created it.
    async fn acquire(&self, session: &dyn Session) -> MetaResult<bool>;

    /// Whether a lock record exists. Only for polling; never decides ownership.
    async fn is_held(&self, session: &dyn Session) -> MetaResult<bool>;

    /// Delete the lock record. Fails with [`MetaError::LockReleaseFailed`]
    /// when there was no record to delete.
    async fn release(&self, session: &dyn Session) -> MetaResult<()>;

    /// The current lock record, if any.
    async fn lock_info(&self, session: &dyn Session) -> MetaResult<Option<LockRecord>>;

    /// Delete the lock record regardless of who holds it. Returns whether one
    /// existed. Operator tool for locks left behind by a crashed process.
    async fn force_release(&self, session: &dyn Session) -> MetaResult<bool>;
}

/// Persistence of the migration history plus the lock record.
#[async_trait]
pub trait MetadataStore: LockCoordinator {
    /// Whether the history structure has been provisioned.
    async fn exists(&self, session: &dyn Session) -> MetaResult<bool>;

    /// Idempotently provision the history and lock structures.
    async fn initialize(&self, session: &dyn Session) -> MetaResult<()>;

    /// Append one attempt record. Fails with [`MetaError::WriteNotApplied`]
    /// when the write is not confirmed.
    async fn append(&self, session: &dyn Session, record: &MetadataRecord) -> MetaResult<()>;

    /// The newest record by `(installed_at DESC, version DESC)`.
    async fn latest(&self, session: &dyn Session) -> MetaResult<Option<MetadataRecord>>;

    /// All records, newest first.
    async fn history(&self, session: &dyn Session) -> MetaResult<Vec<MetadataRecord>>;

    /// Version of the newest record regardless of its outcome; `0` for an
    /// initialized but empty history.
    async fn current_version(&self, session: &dyn Session) -> MetaResult<i32> {
        if !self.exists(session).await? {
            return Err(MetaError::NotInitialized {
                table: self.describe(),
            });
        }
        Ok(self
            .latest(session)
            .await?
            .map(|record| record.version)
            .unwrap_or(0))
    }

    /// Human-readable location of the history, for messages.
    fn describe(&self) -> String;
}
