use super::*;
use chrono::{Duration, TimeZone};

#[tokio::test]
async fn test_in_memory() {
    let db = DuckDbSession::in_memory().unwrap();
    assert_eq!(db.db_type(), "duckdb");
}

#[tokio::test]
async fn test_new_memory_special_case() {
    let db = DuckDbSession::new(":memory:").unwrap();
    db.execute("CREATE TABLE t (id INT)").await.unwrap();
    assert!(db.relation_exists("t").await.unwrap());
}

#[tokio::test]
async fn test_execute_reports_affected_rows() {
    let db = DuckDbSession::in_memory().unwrap();
    db.execute("CREATE TABLE nums (n INTEGER)").await.unwrap();
    let inserted = db
        .execute("INSERT INTO nums SELECT * FROM range(5)")
        .await
        .unwrap();
    assert_eq!(inserted, 5);

    let deleted = db
        .execute_with("DELETE FROM nums WHERE n >= ?", &[Value::from(3i64)])
        .await
        .unwrap();
    assert_eq!(deleted, 2);

    let none = db
        .execute_with("DELETE FROM nums WHERE n = ?", &[Value::from(42i64)])
        .await
        .unwrap();
    assert_eq!(none, 0);
}

#[tokio::test]
async fn test_query_round_trips_values() {
    let db = DuckDbSession::in_memory().unwrap();
    db.execute(
        "CREATE TABLE history (version INTEGER, note TEXT, ok BOOLEAN, \"at\" TIMESTAMP)",
    )
    .await
    .unwrap();

    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap() + Duration::microseconds(42);
    db.execute_with(
        "INSERT INTO history VALUES (?, ?, ?, ?)",
        &[
            Value::from(3i32),
            Value::Null,
            Value::from(true),
            Value::from(at),
        ],
    )
    .await
    .unwrap();

    let rows = db
        .query("SELECT version, note, ok, \"at\" FROM history", &[])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row[0].as_i64("version").unwrap(), 3);
    assert_eq!(row[1].as_opt_text("note").unwrap(), None);
    assert!(row[2].as_bool("ok").unwrap());
    assert_eq!(row[3].as_timestamp("at").unwrap(), at);
}

#[tokio::test]
async fn test_query_empty_result() {
    let db = DuckDbSession::in_memory().unwrap();
    db.execute("CREATE TABLE t (id INT)").await.unwrap();
    let rows = db.query("SELECT id FROM t", &[]).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_primary_key_conflict_is_constraint_violation() {
    let db = DuckDbSession::in_memory().unwrap();
    db.execute("CREATE TABLE locks (name TEXT PRIMARY KEY)")
        .await
        .unwrap();
    db.execute("INSERT INTO locks VALUES ('migrations')")
        .await
        .unwrap();
    let err = db
        .execute("INSERT INTO locks VALUES ('migrations')")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ConstraintViolation(_)), "{err}");
}

#[tokio::test]
async fn test_missing_table_classified() {
    let db = DuckDbSession::in_memory().unwrap();
    let err = db.query("SELECT * FROM nope", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::TableNotFound(_)), "{err}");
}

#[tokio::test]
async fn test_relation_exists_schema_qualified() {
    let db = DuckDbSession::in_memory().unwrap();
    db.create_schema_if_not_exists("evolve").await.unwrap();
    assert!(!db.relation_exists("evolve.migrations").await.unwrap());
    db.execute("CREATE TABLE evolve.migrations (id INT)")
        .await
        .unwrap();
    assert!(db.relation_exists("evolve.migrations").await.unwrap());
    assert!(!db.relation_exists("migrations").await.unwrap());
}

#[tokio::test]
async fn test_create_schema_is_idempotent() {
    let db = DuckDbSession::in_memory().unwrap();
    db.create_schema_if_not_exists("evolve").await.unwrap();
    db.create_schema_if_not_exists("evolve").await.unwrap();
}

#[tokio::test]
async fn test_invalid_sql_is_execution_error() {
    let db = DuckDbSession::in_memory().unwrap();
    let err = db.execute("CREAT TABLE oops (id INT)").await.unwrap_err();
    assert!(matches!(err, DbError::ExecutionError(_)), "{err}");
}

#[tokio::test]
async fn test_file_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evolve.duckdb");
    {
        let db = DuckDbSession::from_path(&path).unwrap();
        db.execute("CREATE TABLE kept (id INT)").await.unwrap();
    }
    let db = DuckDbSession::from_path(&path).unwrap();
    assert!(db.relation_exists("kept").await.unwrap());
}
