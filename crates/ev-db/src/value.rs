//! Driver-neutral parameter and column values.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, Utc};
use std::fmt;

/// A single bound parameter or returned column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// One result row, columns in SELECT order.
pub type Row = Vec<Value>;

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::Text(_) => "TEXT",
            Value::Timestamp(_) => "TIMESTAMP",
        }
    }

    fn mismatch(&self, column: &str, expected: &'static str) -> DbError {
        DbError::TypeMismatch {
            column: column.to_string(),
            expected,
            found: self.kind().to_string(),
        }
    }

    /// Read an integer column.
    pub fn as_i64(&self, column: &str) -> DbResult<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(other.mismatch(column, "INTEGER")),
        }
    }

    /// Read a boolean column.
    pub fn as_bool(&self, column: &str) -> DbResult<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(other.mismatch(column, "BOOLEAN")),
        }
    }

    /// Read a non-null text column.
    pub fn as_text(&self, column: &str) -> DbResult<String> {
        match self {
            Value::Text(v) => Ok(v.clone()),
            other => Err(other.mismatch(column, "TEXT")),
        }
    }

    /// Read a nullable text column.
    pub fn as_opt_text(&self, column: &str) -> DbResult<Option<String>> {
        match self {
            Value::Null => Ok(None),
            Value::Text(v) => Ok(Some(v.clone())),
            other => Err(other.mismatch(column, "TEXT")),
        }
    }

    /// Read a timestamp column.
    pub fn as_timestamp(&self, column: &str) -> DbResult<DateTime<Utc>> {
        match self {
            Value::Timestamp(v) => Ok(*v),
            other => Err(other.mismatch(column, "TIMESTAMP")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
