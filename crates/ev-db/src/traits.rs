//! Session trait definition

use crate::error::DbResult;
use crate::value::{Row, Value};
use async_trait::async_trait;

/// A live connection that migrations and metadata stores execute against.
///
/// Implementations must be Send + Sync for async operation. Writes report the
/// number of affected rows so callers can tell a conditional write that was
/// rejected (`Ok(0)`) apart from a transport failure (`Err`).
#[async_trait]
pub trait Session: Send + Sync {
    /// Execute a single statement, returns affected rows
    async fn execute(&self, sql: &str) -> DbResult<usize>;

    /// Execute a single statement with positional `?` parameters
    async fn execute_with(&self, sql: &str, params: &[Value]) -> DbResult<usize>;

    /// Run a query with positional `?` parameters and collect all rows
    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>>;

    /// Check if a table or view exists (accepts `schema.table`)
    async fn relation_exists(&self, name: &str) -> DbResult<bool>;

    /// Create a schema if it does not exist
    async fn create_schema_if_not_exists(&self, schema: &str) -> DbResult<()>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}
