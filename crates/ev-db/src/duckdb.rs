//! DuckDB session implementation

use crate::error::{DbError, DbResult};
use crate::traits::Session;
use crate::value::{Row, Value};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::types::{TimeUnit, Value as DuckValue};
use duckdb::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// DuckDB session
///
/// All statements go through one mutex-guarded connection, so conditional
/// writes issued through the same session are linearizable.
pub struct DuckDbSession {
    conn: Mutex<Connection>,
}

impl DuckDbSession {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    fn execute_sync(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        log::debug!("duckdb execute: {sql}");
        let conn = self.lock()?;
        let bound: Vec<DuckValue> = params.iter().map(to_duck).collect();
        let affected = conn.execute(sql, duckdb::params_from_iter(bound))?;
        Ok(affected)
    }

    fn query_sync(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        log::debug!("duckdb query: {sql}");
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let bound: Vec<DuckValue> = params.iter().map(to_duck).collect();
        let mut rows = stmt.query(duckdb::params_from_iter(bound))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let width = row.as_ref().column_count();
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(from_duck(row.get::<_, DuckValue>(idx)?)?);
            }
            out.push(values);
        }
        Ok(out)
    }

    fn relation_exists_sync(&self, name: &str) -> DbResult<bool> {
        // Handle schema-qualified names
        let (schema, table) = match name.rfind('.') {
            Some(pos) => (&name[..pos], &name[pos + 1..]),
            None => ("main", name),
        };

        let rows = self.query_sync(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
            &[Value::from(schema), Value::from(table)],
        )?;
        let count = match rows.first().and_then(|r| r.first()) {
            Some(v) => v.as_i64("count")?,
            None => 0,
        };
        Ok(count > 0)
    }
}

#[async_trait]
impl Session for DuckDbSession {
    async fn execute(&self, sql: &str) -> DbResult<usize> {
        self.execute_sync(sql, &[])
    }

    async fn execute_with(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        self.execute_sync(sql, params)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.query_sync(sql, params)
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        self.relation_exists_sync(name)
    }

    async fn create_schema_if_not_exists(&self, schema: &str) -> DbResult<()> {
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", schema);
        self.execute_sync(&sql, &[])?;
        Ok(())
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

fn to_duck(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Bool(v) => DuckValue::Boolean(*v),
        Value::Int(v) => DuckValue::BigInt(*v),
        Value::Text(v) => DuckValue::Text(v.clone()),
        Value::Timestamp(v) => DuckValue::Timestamp(TimeUnit::Microsecond, v.timestamp_micros()),
    }
}

fn from_duck(value: DuckValue) -> DbResult<Value> {
    let converted = match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(v) => Value::Bool(v),
        DuckValue::TinyInt(v) => Value::Int(i64::from(v)),
        DuckValue::SmallInt(v) => Value::Int(i64::from(v)),
        DuckValue::Int(v) => Value::Int(i64::from(v)),
        DuckValue::BigInt(v) => Value::Int(v),
        DuckValue::UTinyInt(v) => Value::Int(i64::from(v)),
        DuckValue::USmallInt(v) => Value::Int(i64::from(v)),
        DuckValue::UInt(v) => Value::Int(i64::from(v)),
        DuckValue::UBigInt(v) => Value::Int(i64::try_from(v).map_err(|_| overflow(v))?),
        DuckValue::HugeInt(v) => Value::Int(i64::try_from(v).map_err(|_| overflow(v))?),
        DuckValue::Text(v) => Value::Text(v),
        DuckValue::Timestamp(unit, v) => Value::Timestamp(timestamp_from(unit, v)?),
        other => {
            return Err(DbError::TypeMismatch {
                column: "?".to_string(),
                expected: "BOOLEAN, INTEGER, TEXT or TIMESTAMP",
                found: format!("{other:?}"),
            })
        }
    };
    Ok(converted)
}

fn overflow(v: impl std::fmt::Display) -> DbError {
    DbError::ExecutionError(format!("integer {v} does not fit in 64 bits"))
}

fn timestamp_from(unit: TimeUnit, v: i64) -> DbResult<DateTime<Utc>> {
    let micros = match unit {
        TimeUnit::Second => v.saturating_mul(1_000_000),
        TimeUnit::Millisecond => v.saturating_mul(1_000),
        TimeUnit::Microsecond => v,
        TimeUnit::Nanosecond => v / 1_000,
    };
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| DbError::ExecutionError(format!("timestamp out of range: {v}")))
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
