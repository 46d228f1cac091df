//! ev-db - Database session layer for Evolve
//!
//! This crate provides the `Session` trait that migrations and metadata
//! stores execute against, and its DuckDB implementation.

pub mod duckdb;
pub mod error;
pub mod traits;
pub mod value;

pub use duckdb::DuckDbSession;
pub use error::{DbError, DbResult};
pub use traits::Session;
pub use value::{Row, Value};
