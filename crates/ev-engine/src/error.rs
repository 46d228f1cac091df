//! Error types for ev-engine

use ev_core::CoreError;
use ev_db::DbError;
use ev_meta::MetaError;
use std::time::Duration;
use thiserror::Error;

/// Migration run errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// A migration reported failure; the run stopped there (V001).
    ///
    /// Details of the failed attempt are in the migration history.
    #[error("[V001] Migration aborted: version {version} ({description}) failed")]
    MigrationAborted { version: i32, description: String },

    /// Another process held the lock longer than the configured bound (V002).
    #[error("[V002] Gave up waiting for the migration lock after {waited:?}")]
    LockWaitTimeout { waited: Duration },

    /// Metadata or lock persistence failed (V003).
    #[error("[V003] {0}")]
    Meta(#[from] MetaError),

    /// A migration hit a session failure it could not report as a failed attempt (V004).
    #[error("[V004] Migration session error: {0}")]
    Db(#[from] DbError),

    /// Migration discovery failed.
    #[error(transparent)]
    Discovery(#[from] CoreError),
}

/// Result type alias for EngineError
pub type EngineResult<T> = Result<T, EngineError>;
