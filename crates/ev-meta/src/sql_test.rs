//! Tests for the SQL metadata mapping against DuckDB.

use super::*;
use chrono::{Datelike, Duration, Utc};
use ev_db::{DbResult, DuckDbSession};

// ── Helpers ────────────────────────────────────────────────────────────

fn store() -> SqlMetadataStore {
    SqlMetadataStore::new(&EvolveConfig::default())
}

async fn count(session: &DuckDbSession, sql: &str) -> i64 {
    let rows = session.query(sql, &[]).await.unwrap();
    rows[0][0].as_i64("count").unwrap()
}

// ── Provisioning ───────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_database_is_not_initialized() {
    let session = DuckDbSession::in_memory().unwrap();
    let store = store();
    assert!(!store.exists(&session).await.unwrap());
    let err = store.current_version(&session).await.unwrap_err();
    assert!(matches!(err, MetaError::NotInitialized { .. }));
    assert!(err.to_string().contains("evolve.migrations"));
}

#[tokio::test]
async fn initialize_creates_both_tables_and_is_idempotent() {
    let session = DuckDbSession::in_memory().unwrap();
    let store = store();
    store.initialize(&session).await.unwrap();
    store.initialize(&session).await.unwrap();

    assert!(store.exists(&session).await.unwrap());
    assert!(session.relation_exists("evolve.migrations").await.unwrap());
    assert!(session
        .relation_exists("evolve.migrations_lock")
        .await
        .unwrap());
    assert_eq!(store.current_version(&session).await.unwrap(), 0);
}

#[tokio::test]
async fn custom_names_from_config() {
    let session = DuckDbSession::in_memory().unwrap();
    let config =
        EvolveConfig::from_yaml("keyspace: inventory\nmetadata_table: schema_history").unwrap();
    let store = SqlMetadataStore::new(&config);
    store.initialize(&session).await.unwrap();
    assert_eq!(store.describe(), "inventory.schema_history");
    assert!(session
        .relation_exists("inventory.schema_history_lock")
        .await
        .unwrap());
}

// ── History ────────────────────────────────────────────────────────────

#[tokio::test]
async fn append_and_read_back_record() {
    let session = DuckDbSession::in_memory().unwrap();
    let store = store();
    store.initialize(&session).await.unwrap();

    let record = MetadataRecord::new(
        1,
        "create users",
        Some("CREATE TABLE users (id INT)".to_string()),
        12,
        true,
    );
    store.append(&session, &record).await.unwrap();

    let latest = store.latest(&session).await.unwrap().unwrap();
    assert_eq!(latest.name, MIGRATIONS_KEY);
    assert_eq!(latest.version, 1);
    assert_eq!(latest.description, "create users");
    assert_eq!(latest.script, record.script);
    assert_eq!(latest.hash, record.hash);
    assert_eq!(latest.execution_time_ms, 12);
    assert!(latest.was_successful);
    assert_eq!(
        latest.installed_at.timestamp_micros(),
        record.installed_at.timestamp_micros()
    );
}

#[tokio::test]
async fn current_version_uses_installed_at_then_version() {
    let session = DuckDbSession::in_memory().unwrap();
    let store = store();
    store.initialize(&session).await.unwrap();

    let base = Utc::now();
    let records = [
        MetadataRecord::new(1, "one", None, 1, true).installed_at(base),
        MetadataRecord::new(3, "three", None, 1, true).installed_at(base + Duration::seconds(1)),
        MetadataRecord::new(2, "two", None, 1, true).installed_at(base + Duration::seconds(1)),
        MetadataRecord::new(4, "four", None, 1, false).installed_at(base + Duration::seconds(2)),
    ];
    for record in &records {
        store.append(&session, record).await.unwrap();
    }

    assert_eq!(store.current_version(&session).await.unwrap(), 4);
    let versions: Vec<i32> = store
        .history(&session)
        .await
        .unwrap()
        .iter()
        .map(|r| r.version)
        .collect();
    assert_eq!(versions, vec![4, 3, 2, 1]);
}

#[tokio::test]
async fn append_without_table_is_db_error() {
    let session = DuckDbSession::in_memory().unwrap();
    let store = store();
    let record = MetadataRecord::new(1, "init", None, 0, true);
    let err = store.append(&session, &record).await.unwrap_err();
    assert!(matches!(err, MetaError::Db(_)));
}

// ── Lock ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn acquire_before_initialize_provisions_lock_table() {
    let session = DuckDbSession::in_memory().unwrap();
    let store = store();
    assert!(store.acquire(&session).await.unwrap());
    assert!(store.is_held(&session).await.unwrap());
    assert!(!store.exists(&session).await.unwrap());
}

#[tokio::test]
async fn second_acquire_is_rejected() {
    let session = DuckDbSession::in_memory().unwrap();
    let first = store();
    let second = store();
    assert!(first.acquire(&session).await.unwrap());
    assert!(!second.acquire(&session).await.unwrap());

    first.release(&session).await.unwrap();
    assert!(!second.is_held(&session).await.unwrap());
    assert!(second.acquire(&session).await.unwrap());
}

#[tokio::test]
async fn release_without_lock_is_fatal() {
    let session = DuckDbSession::in_memory().unwrap();
    let store = store();
    store.initialize(&session).await.unwrap();
    let err = store.release(&session).await.unwrap_err();
    assert!(matches!(err, MetaError::LockReleaseFailed(_)));
    assert!(err.to_string().contains("[M003]"));
}

#[tokio::test]
async fn lock_info_and_force_release() {
    let session = DuckDbSession::in_memory().unwrap();
    let store = store();
    assert!(store.lock_info(&session).await.unwrap().is_none());
    assert!(!store.force_release(&session).await.unwrap());

    let before = Utc::now() - Duration::seconds(1);
    store.acquire(&session).await.unwrap();
    let lock = store.lock_info(&session).await.unwrap().unwrap();
    assert_eq!(lock.name, MIGRATIONS_KEY);
    assert!(lock.locked_at > before);

    assert!(store.force_release(&session).await.unwrap());
    assert!(!store.is_held(&session).await.unwrap());
}

#[tokio::test]
async fn lock_table_holds_single_row() {
    let session = DuckDbSession::in_memory().unwrap();
    let store = store();
    for _ in 0..3 {
        store.acquire(&session).await.unwrap();
    }
    assert_eq!(
        count(&session, "SELECT COUNT(*) FROM evolve.migrations_lock").await,
        1
    );
}

#[tokio::test]
async fn is_held_on_fresh_database_creates_nothing() {
    let session = DuckDbSession::in_memory().unwrap();
    let store = store();
    assert!(!store.is_held(&session).await.unwrap());
    assert!(!session
        .relation_exists("evolve.migrations_lock")
        .await
        .unwrap());
}

#[tokio::test]
async fn one_store_serves_several_databases() {
    let store = store();
    let first = DuckDbSession::in_memory().unwrap();
    let second = DuckDbSession::in_memory().unwrap();

    assert!(store.acquire(&first).await.unwrap());
    assert!(store.acquire(&second).await.unwrap());
    assert!(store.is_held(&second).await.unwrap());
    store.release(&first).await.unwrap();
    store.release(&second).await.unwrap();
}

/// Session where another process inserts the lock row after the acquire's
/// existence check has passed, so our insert hits the primary key.
struct PeerWinsSession {
    inner: DuckDbSession,
}

#[async_trait]
impl Session for PeerWinsSession {
    async fn execute(&self, sql: &str) -> DbResult<usize> {
        self.inner.execute(sql).await
    }

    async fn execute_with(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        if !sql.contains("WHERE NOT EXISTS") {
            return self.inner.execute_with(sql, params).await;
        }
        self.inner
            .execute(
                "INSERT INTO evolve.migrations_lock (name, locked_at)
                 VALUES ('migrations', TIMESTAMP '2020-01-01 00:00:00')",
            )
            .await?;
        self.inner
            .execute_with(
                "INSERT INTO evolve.migrations_lock (name, locked_at)
                 VALUES (CAST(? AS VARCHAR), CAST(? AS TIMESTAMP))",
                &params[..2],
            )
            .await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.inner.query(sql, params).await
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        self.inner.relation_exists(name).await
    }

    async fn create_schema_if_not_exists(&self, schema: &str) -> DbResult<()> {
        self.inner.create_schema_if_not_exists(schema).await
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[tokio::test]
async fn lost_insert_race_is_not_acquired() {
    let session = PeerWinsSession {
        inner: DuckDbSession::in_memory().unwrap(),
    };
    let store = store();

    assert!(!store.acquire(&session).await.unwrap());
    let lock = store.lock_info(&session).await.unwrap().unwrap();
    assert_eq!(lock.locked_at.year(), 2020);
}

#[tokio::test]
async fn history_survives_reopening_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meta.duckdb");

    {
        let session = DuckDbSession::from_path(&path).unwrap();
        let store = store();
        assert!(store.acquire(&session).await.unwrap());
        store.initialize(&session).await.unwrap();
        store
            .append(&session, &MetadataRecord::new(1, "init", None, 3, true))
            .await
            .unwrap();
        store.release(&session).await.unwrap();
    }

    let session = DuckDbSession::from_path(&path).unwrap();
    let store = store();
    assert!(store.exists(&session).await.unwrap());
    assert_eq!(store.current_version(&session).await.unwrap(), 1);
    assert!(!store.is_held(&session).await.unwrap());
}
