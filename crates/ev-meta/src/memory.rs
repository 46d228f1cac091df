//! In-process metadata store.
//!
//! Holds history and lock state behind one mutex, so every operation is
//! atomic with respect to other holders of the same `Arc`. Sharing one
//! instance between several orchestrators models several processes pointed
//! at the same database.

use crate::error::{MetaError, MetaResult};
use crate::record::{newest_first, LockRecord, MetadataRecord};
use crate::store::{LockCoordinator, MetadataStore};
use async_trait::async_trait;
use ev_db::{DbError, Session};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    provisioned: bool,
    records: Vec<MetadataRecord>,
    lock: Option<LockRecord>,
}

/// Metadata store that keeps everything in memory.
///
/// The session argument of every operation is ignored.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    state: Mutex<MemoryState>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that is already provisioned and holds `records`.
    pub fn with_history(records: Vec<MetadataRecord>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                provisioned: true,
                records,
                lock: None,
            }),
        }
    }

    /// Place a lock record as if another process held it.
    pub fn hold_lock(&self) -> MetaResult<bool> {
        let mut state = self.state()?;
        if state.lock.is_some() {
            return Ok(false);
        }
        state.lock = Some(LockRecord::now());
        Ok(true)
    }

    /// Number of records appended so far.
    pub fn record_count(&self) -> MetaResult<usize> {
        Ok(self.state()?.records.len())
    }

    fn state(&self) -> MetaResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| MetaError::Db(DbError::MutexPoisoned(e.to_string())))
    }
}

#[async_trait]
impl LockCoordinator for InMemoryMetadataStore {
    async fn acquire(&self, _session: &dyn Session) -> MetaResult<bool> {
        self.hold_lock()
    }

    async fn is_held(&self, _session: &dyn Session) -> MetaResult<bool> {
        Ok(self.state()?.lock.is_some())
    }

    async fn release(&self, _session: &dyn Session) -> MetaResult<()> {
        match self.state()?.lock.take() {
            Some(_) => Ok(()),
            None => Err(MetaError::LockReleaseFailed(
                "no lock record to delete".to_string(),
            )),
        }
    }

    async fn lock_info(&self, _session: &dyn Session) -> MetaResult<Option<LockRecord>> {
        Ok(self.state()?.lock.clone())
    }

    async fn force_release(&self, _session: &dyn Session) -> MetaResult<bool> {
        Ok(self.state()?.lock.take().is_some())
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn exists(&self, _session: &dyn Session) -> MetaResult<bool> {
        Ok(self.state()?.provisioned)
    }

    async fn initialize(&self, _session: &dyn Session) -> MetaResult<()> {
        self.state()?.provisioned = true;
        Ok(())
    }

    async fn append(&self, _session: &dyn Session, record: &MetadataRecord) -> MetaResult<()> {
        let mut state = self.state()?;
        if !state.provisioned {
            return Err(MetaError::WriteNotApplied {
                version: record.version,
            });
        }
        state.records.push(record.clone());
        Ok(())
    }

    async fn latest(&self, _session: &dyn Session) -> MetaResult<Option<MetadataRecord>> {
        Ok(self
            .state()?
            .records
            .iter()
            .min_by(|a, b| newest_first(a, b))
            .cloned())
    }

    async fn history(&self, _session: &dyn Session) -> MetaResult<Vec<MetadataRecord>> {
        let mut records = self.state()?.records.clone();
        records.sort_by(newest_first);
        Ok(records)
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
