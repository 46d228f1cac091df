//! The migration unit.

use crate::error::EngineResult;
use async_trait::async_trait;
use ev_db::Session;
use std::sync::Arc;

/// One versioned change to apply to the database.
///
/// Migrations are identified and ordered solely by [`version`](Self::version).
#[async_trait]
pub trait Migration: Send + Sync {
    /// Target schema version, positive and unique across the known set.
    fn version(&self) -> i32;

    /// Human-readable description recorded in the history.
    fn description(&self) -> &str;

    /// Raw script text recorded (and hashed) in the history, if any.
    fn script(&self) -> Option<&str> {
        None
    }

    /// Whether this migration falls in the range `(from, to]` being traversed.
    fn is_applicable(&self, from: i32, to: i32) -> bool {
        from < self.version() && self.version() <= to
    }

    /// Apply the migration.
    ///
    /// Expected failures are reported as `Ok(false)`; `Err` is reserved for
    /// conditions the run cannot treat as a failed attempt.
    async fn migrate(&self, session: &dyn Session) -> EngineResult<bool>;
}

/// Migrations are shared between the registry and each run.
pub type SharedMigration = Arc<dyn Migration>;
