//! Script-backed migrations.
//!
//! A script is split on its statement delimiter and each statement runs in
//! order. The store has no multi-statement transactions, so statements that
//! ran before a failing one stay applied.

use crate::error::EngineResult;
use crate::migration::Migration;
use async_trait::async_trait;
use ev_db::{DbError, Session};

/// Default statement delimiter.
pub const DEFAULT_DELIMITER: &str = ";";

/// A migration whose body is a multi-statement script.
#[derive(Debug, Clone)]
pub struct ScriptMigration {
    version: i32,
    description: String,
    script: String,
    delimiter: String,
}

impl ScriptMigration {
    pub fn new(version: i32, description: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            script: script.into(),
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }

    /// Split on `delimiter` instead of `;`.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Statements in execution order, skipping fragments with no SQL in them.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.script
            .split(self.delimiter.as_str())
            .map(str::trim)
            .filter(|fragment| !is_blank(fragment))
    }
}

/// Empty or comment-only fragment, e.g. the tail after a final delimiter.
fn is_blank(fragment: &str) -> bool {
    fragment.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with("--")
    })
}

#[async_trait]
impl Migration for ScriptMigration {
    fn version(&self) -> i32 {
        self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn script(&self) -> Option<&str> {
        Some(&self.script)
    }

    async fn migrate(&self, session: &dyn Session) -> EngineResult<bool> {
        for (idx, statement) in self.statements().enumerate() {
            match session.execute(statement).await {
                Ok(_) => {}
                Err(e @ (DbError::ConnectionError(_) | DbError::MutexPoisoned(_))) => {
                    return Err(e.into())
                }
                Err(e) => {
                    log::error!(
                        "Migration failed: {} (statement {}): {}",
                        self.description,
                        idx + 1,
                        e
                    );
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingSession;

    #[test]
    fn test_statements_skip_blank_fragments() {
        let m = ScriptMigration::new(
            1,
            "init",
            "CREATE TABLE a (id INT);\n\nCREATE TABLE b (id INT);\n-- done\n",
        );
        let statements: Vec<&str> = m.statements().collect();
        assert_eq!(
            statements,
            vec!["CREATE TABLE a (id INT)", "CREATE TABLE b (id INT)"]
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let m = ScriptMigration::new(2, "fn", "SELECT 1 $$ SELECT 2 $$").with_delimiter("$$");
        assert_eq!(m.statements().collect::<Vec<_>>(), vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_script_is_exposed_for_history() {
        let m = ScriptMigration::new(3, "x", "SELECT 1;");
        assert_eq!(m.script(), Some("SELECT 1;"));
        assert!(m.is_applicable(2, 3));
        assert!(!m.is_applicable(3, 5));
    }

    #[tokio::test]
    async fn test_runs_every_statement_in_order() {
        let session = RecordingSession::new();
        let m = ScriptMigration::new(1, "init", "CREATE TABLE a (id INT); INSERT INTO a VALUES (1);");
        assert!(m.migrate(&session).await.unwrap());
        assert_eq!(
            session.executed(),
            vec!["CREATE TABLE a (id INT)", "INSERT INTO a VALUES (1)"]
        );
    }

    #[tokio::test]
    async fn test_failing_statement_stops_script() {
        let session = RecordingSession::failing_on("BROKEN");
        let m = ScriptMigration::new(
            1,
            "init",
            "CREATE TABLE a (id INT); BROKEN STATEMENT; CREATE TABLE c (id INT);",
        );
        assert!(!m.migrate(&session).await.unwrap());
        // The statement before the failure stays applied; nothing after runs.
        assert_eq!(
            session.executed(),
            vec!["CREATE TABLE a (id INT)", "BROKEN STATEMENT"]
        );
    }

    #[tokio::test]
    async fn test_lost_connection_is_an_error() {
        let session = RecordingSession::disconnected();
        let m = ScriptMigration::new(1, "init", "SELECT 1;");
        assert!(m.migrate(&session).await.is_err());
    }
}
