//! Shared serde default functions for configuration fields.

pub(crate) fn default_keyspace() -> String {
    "evolve".to_string()
}

pub(crate) fn default_metadata_table() -> String {
    "migrations".to_string()
}

pub(crate) fn default_script_path() -> String {
    "migrations".to_string()
}

pub(crate) fn default_script_extension() -> String {
    "sql".to_string()
}

pub(crate) fn default_delimiter() -> String {
    ";".to_string()
}

/// One second, matching the interval peers poll a held lock at.
pub(crate) fn default_lock_poll_interval_ms() -> u64 {
    1000
}

pub(crate) fn default_db_path() -> String {
    ":memory:".to_string()
}
