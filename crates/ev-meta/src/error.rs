//! Error types for migration metadata.

use ev_db::DbError;
use thiserror::Error;

/// Migration metadata errors.
#[derive(Error, Debug)]
pub enum MetaError {
    /// Metadata or lock table provisioning was not confirmed (M001).
    #[error("[M001] Migration metadata initialization failed: {0}")]
    InitializationFailed(String),

    /// A history append was not applied (M002).
    #[error("[M002] Failed to record migration metadata for version {version}")]
    WriteNotApplied { version: i32 },

    /// The conditional lock delete did not apply (M003).
    #[error("[M003] Failed to release migration lock: {0}")]
    LockReleaseFailed(String),

    /// The history table has not been provisioned yet (M004).
    #[error("[M004] Migration metadata table '{table}' does not exist")]
    NotInitialized { table: String },

    /// A stored row could not be decoded (M005).
    #[error("[M005] Corrupt migration metadata row: {0}")]
    CorruptRecord(String),

    /// Session error with preserved source chain (M006).
    #[error("[M006] Metadata query failed")]
    Db(#[from] DbError),
}

/// Result type alias for [`MetaError`].
pub type MetaResult<T> = Result<T, MetaError>;
