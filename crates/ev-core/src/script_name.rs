//! Migration script file-name convention: `<version>_<description>.<ext>`.

use crate::error::{CoreError, CoreResult};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

static SCRIPT_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn script_name_re() -> &'static Regex {
    SCRIPT_NAME_RE.get_or_init(|| {
        Regex::new(r"^(\d+)_(.+)\.([A-Za-z0-9]+)$").expect("valid regex literal")
    })
}

/// Parsed components of a migration script file name.
///
/// `001_create_users.sql` parses to version `1`, description
/// `"create users"`, extension `"sql"`. The extension is everything after the
/// last dot, so descriptions may contain dots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptName {
    /// Target schema version (positive)
    pub version: i32,
    /// Human-readable description, underscores replaced with spaces
    pub description: String,
    /// File extension without the dot
    pub extension: String,
}

impl ScriptName {
    /// Parse a bare file name (no directory components).
    pub fn parse(file_name: &str) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidScriptName {
            name: file_name.to_string(),
            reason: reason.to_string(),
        };

        let caps = script_name_re()
            .captures(file_name)
            .ok_or_else(|| invalid("expected <version>_<description>.<ext>"))?;

        let version: i32 = caps[1]
            .parse()
            .map_err(|_| invalid("version does not fit in a 32-bit integer"))?;
        if version <= 0 {
            return Err(invalid("version must be a positive integer"));
        }

        let description = caps[2].replace('_', " ").trim().to_string();
        if description.is_empty() {
            return Err(invalid("description is empty"));
        }

        Ok(Self {
            version,
            description,
            extension: caps[3].to_string(),
        })
    }
}

impl fmt::Display for ScriptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{:03} {}", self.version, self.description)
    }
}
