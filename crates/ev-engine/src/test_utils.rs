//! Shared test utilities for ev-engine

use crate::error::EngineResult;
use crate::migration::{Migration, SharedMigration};
use async_trait::async_trait;
use ev_db::{DbError, DbResult, Row, Session, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Session double that records every executed statement.
///
/// Statements containing the failure marker are recorded and then rejected
/// with an execution error. Queries return no rows and no relation exists.
#[derive(Default)]
pub struct RecordingSession {
    executed: Mutex<Vec<String>>,
    fail_marker: Option<String>,
    disconnected: bool,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any statement containing `marker`.
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Self::default()
        }
    }

    /// Reject every statement with a connection error.
    pub fn disconnected() -> Self {
        Self {
            disconnected: true,
            ..Self::default()
        }
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn record(&self, sql: &str) -> DbResult<usize> {
        if self.disconnected {
            return Err(DbError::ConnectionError("connection reset".to_string()));
        }
        self.executed.lock().unwrap().push(sql.to_string());
        match &self.fail_marker {
            Some(marker) if sql.contains(marker.as_str()) => {
                Err(DbError::ExecutionError(format!("rejected: {sql}")))
            }
            _ => Ok(0),
        }
    }
}

#[async_trait]
impl Session for RecordingSession {
    async fn execute(&self, sql: &str) -> DbResult<usize> {
        self.record(sql)
    }

    async fn execute_with(&self, sql: &str, _params: &[Value]) -> DbResult<usize> {
        self.record(sql)
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> DbResult<Vec<Row>> {
        Ok(Vec::new())
    }

    async fn relation_exists(&self, _name: &str) -> DbResult<bool> {
        Ok(false)
    }

    async fn create_schema_if_not_exists(&self, _schema: &str) -> DbResult<()> {
        Ok(())
    }

    fn db_type(&self) -> &'static str {
        "recording"
    }
}

/// What a [`TestMigration`] does when run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    Error,
    Panic,
}

/// Migration double that counts its runs and logs its version to the session.
pub struct TestMigration {
    version: i32,
    description: String,
    behavior: Behavior,
    delay: Option<Duration>,
    runs: Arc<AtomicUsize>,
}

impl TestMigration {
    pub fn new(version: i32, behavior: Behavior) -> Self {
        Self {
            version,
            description: format!("test migration {version}"),
            behavior,
            delay: None,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep this long inside `migrate` before finishing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handle to the run counter, usable after the migration is shared.
    pub fn runs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }

    pub fn shared(self) -> SharedMigration {
        Arc::new(self)
    }
}

#[async_trait]
impl Migration for TestMigration {
    fn version(&self) -> i32 {
        self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn migrate(&self, session: &dyn Session) -> EngineResult<bool> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.behavior {
            Behavior::Succeed => {
                session.execute(&format!("-- v{}", self.version)).await?;
                Ok(true)
            }
            Behavior::Fail => Ok(false),
            Behavior::Error => Err(DbError::ConnectionError("connection reset".to_string()).into()),
            Behavior::Panic => panic!("migration {} panicked", self.version),
        }
    }
}

/// Shorthand for a list of succeeding migrations.
pub fn succeeding(versions: &[i32]) -> Vec<SharedMigration> {
    versions
        .iter()
        .map(|v| TestMigration::new(*v, Behavior::Succeed).shared())
        .collect()
}
