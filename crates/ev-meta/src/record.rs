//! History and lock record types.

use chrono::{DateTime, Utc};
use ev_core::compute_checksum;
use serde::{Deserialize, Serialize};

/// Grouping key shared by every history row and the lock row.
pub const MIGRATIONS_KEY: &str = "migrations";

/// One append-only audit entry for a single migration attempt.
///
/// Records are never updated or deleted. The newest record, ordered by
/// `(installed_at DESC, version DESC)`, defines the current version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Stream grouping key, always [`MIGRATIONS_KEY`]
    pub name: String,

    /// Version the attempt targeted
    pub version: i32,

    /// Migration description
    pub description: String,

    /// Raw script text, for script-backed migrations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// SHA-256 of the script text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// When the attempt was recorded
    pub installed_at: DateTime<Utc>,

    /// Wall-clock execution time in milliseconds
    pub execution_time_ms: i64,

    /// Whether the migration reported success
    pub was_successful: bool,
}

impl MetadataRecord {
    /// Build a record for an attempt that just finished, stamped now.
    pub fn new(
        version: i32,
        description: impl Into<String>,
        script: Option<String>,
        execution_time_ms: i64,
        was_successful: bool,
    ) -> Self {
        let hash = script.as_deref().map(compute_checksum);
        Self {
            name: MIGRATIONS_KEY.to_string(),
            version,
            description: description.into(),
            script,
            hash,
            installed_at: Utc::now(),
            execution_time_ms,
            was_successful,
        }
    }

    /// Override the installation timestamp.
    pub fn installed_at(mut self, at: DateTime<Utc>) -> Self {
        self.installed_at = at;
        self
    }
}

/// The singleton row whose presence means a migration run holds the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Stream grouping key, always [`MIGRATIONS_KEY`]
    pub name: String,

    /// When the lock was taken
    pub locked_at: DateTime<Utc>,
}

impl LockRecord {
    pub fn now() -> Self {
        Self {
            name: MIGRATIONS_KEY.to_string(),
            locked_at: Utc::now(),
        }
    }
}

/// Order records newest first: `installed_at DESC, version DESC`.
pub(crate) fn newest_first(a: &MetadataRecord, b: &MetadataRecord) -> std::cmp::Ordering {
    b.installed_at
        .cmp(&a.installed_at)
        .then_with(|| b.version.cmp(&a.version))
}
