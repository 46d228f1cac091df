//! SQL persistence mapping for migration metadata.
//!
//! History lives in `<keyspace>.<metadata_table>`, keyed by the stream name and
//! clustered by `(installed_at, version)`; the lock row lives in
//! `<keyspace>.<metadata_table>_lock`. Conditional writes are expressed so the
//! affected-row count tells applied from rejected.

use crate::error::{MetaError, MetaResult};
use crate::record::{LockRecord, MetadataRecord, MIGRATIONS_KEY};
use crate::store::{LockCoordinator, MetadataStore};
use async_trait::async_trait;
use ev_core::EvolveConfig;
use ev_db::{DbError, Row, Session, Value};
use std::sync::OnceLock;

const RECORD_COLUMNS: &str =
    "name, version, description, script, hash, installed_at, exectime_ms, was_successful";

/// Rendered statements, built once per store instance.
struct Statements {
    create_history: String,
    create_lock: String,
    insert_record: String,
    select_latest: String,
    select_history: String,
    acquire_lock: String,
    check_lock: String,
    select_lock: String,
    delete_lock: String,
}

impl Statements {
    fn render(keyspace: &str, table: &str, lock_table: &str) -> Self {
        let history = format!("{keyspace}.{table}");
        let lock = format!("{keyspace}.{lock_table}");
        Self {
            create_history: format!(
                "CREATE TABLE IF NOT EXISTS {history} (
                    name           VARCHAR   NOT NULL,
                    version        INTEGER   NOT NULL,
                    description    VARCHAR   NOT NULL,
                    script         VARCHAR,
                    hash           VARCHAR,
                    installed_at   TIMESTAMP NOT NULL,
                    exectime_ms    BIGINT    NOT NULL,
                    was_successful BOOLEAN   NOT NULL,
                    PRIMARY KEY (name, installed_at, version)
                )"
            ),
            create_lock: format!(
                "CREATE TABLE IF NOT EXISTS {lock} (
                    name      VARCHAR   NOT NULL PRIMARY KEY,
                    locked_at TIMESTAMP NOT NULL
                )"
            ),
            insert_record: format!(
                "INSERT INTO {history} ({RECORD_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            select_latest: format!(
                "SELECT {RECORD_COLUMNS} FROM {history} WHERE name = ?
                 ORDER BY installed_at DESC, version DESC LIMIT 1"
            ),
            select_history: format!(
                "SELECT {RECORD_COLUMNS} FROM {history} WHERE name = ?
                 ORDER BY installed_at DESC, version DESC"
            ),
            acquire_lock: format!(
                "INSERT INTO {lock} (name, locked_at)
                 SELECT CAST(? AS VARCHAR), CAST(? AS TIMESTAMP)
                 WHERE NOT EXISTS (SELECT 1 FROM {lock} WHERE name = ?)"
            ),
            check_lock: format!("SELECT COUNT(*) FROM {lock} WHERE name = ?"),
            select_lock: format!("SELECT name, locked_at FROM {lock} WHERE name = ?"),
            delete_lock: format!("DELETE FROM {lock} WHERE name = ?"),
        }
    }
}

/// Metadata store that persists through a [`Session`] using SQL.
///
/// Only rendered statement text is cached, never database state, so one
/// instance can serve sessions on different databases.
pub struct SqlMetadataStore {
    keyspace: String,
    table: String,
    lock_table: String,
    statements: OnceLock<Statements>,
}

impl SqlMetadataStore {
    /// Build a store for the keyspace and table names in `config`.
    pub fn new(config: &EvolveConfig) -> Self {
        Self {
            keyspace: config.keyspace.clone(),
            table: config.metadata_table.clone(),
            lock_table: config.lock_table(),
            statements: OnceLock::new(),
        }
    }

    fn statements(&self) -> &Statements {
        self.statements
            .get_or_init(|| Statements::render(&self.keyspace, &self.table, &self.lock_table))
    }

    fn lock_relation(&self) -> String {
        format!("{}.{}", self.keyspace, self.lock_table)
    }

    /// The lock is taken before the history is provisioned, so every
    /// acquire makes sure the lock structure exists in the session's database.
    async fn ensure_lock_table(&self, session: &dyn Session) -> MetaResult<()> {
        session.create_schema_if_not_exists(&self.keyspace).await?;
        session.execute(&self.statements().create_lock).await?;
        Ok(())
    }
}

#[async_trait]
impl LockCoordinator for SqlMetadataStore {
    async fn acquire(&self, session: &dyn Session) -> MetaResult<bool> {
        self.ensure_lock_table(session).await?;
        let lock = LockRecord::now();
        let result = session
            .execute_with(
                &self.statements().acquire_lock,
                &[
                    Value::from(lock.name.as_str()),
                    Value::from(lock.locked_at),
                    Value::from(MIGRATIONS_KEY),
                ],
            )
            .await;

        match result {
            Ok(applied) => Ok(applied == 1),
            // Another connection inserted between our check and our write.
            Err(DbError::ConstraintViolation(msg)) => {
                log::debug!("Lock insert lost a race: {msg}");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn is_held(&self, session: &dyn Session) -> MetaResult<bool> {
        if !session.relation_exists(&self.lock_relation()).await? {
            return Ok(false);
        }
        let rows = session
            .query(&self.statements().check_lock, &[Value::from(MIGRATIONS_KEY)])
            .await?;
        let count = match rows.first().and_then(|row| row.first()) {
            Some(value) => value.as_i64("count")?,
            None => 0,
        };
        Ok(count > 0)
    }

    async fn release(&self, session: &dyn Session) -> MetaResult<()> {
        let deleted = session
            .execute_with(&self.statements().delete_lock, &[Value::from(MIGRATIONS_KEY)])
            .await?;
        if deleted == 0 {
            return Err(MetaError::LockReleaseFailed(format!(
                "no lock record in {}",
                self.lock_relation()
            )));
        }
        Ok(())
    }

    async fn lock_info(&self, session: &dyn Session) -> MetaResult<Option<LockRecord>> {
        if !session.relation_exists(&self.lock_relation()).await? {
            return Ok(None);
        }
        let rows = session
            .query(&self.statements().select_lock, &[Value::from(MIGRATIONS_KEY)])
            .await?;
        rows.first()
            .map(|row| -> MetaResult<LockRecord> {
                Ok(LockRecord {
                    name: column(row, 0, "name")?.as_text("name")?,
                    locked_at: column(row, 1, "locked_at")?.as_timestamp("locked_at")?,
                })
            })
            .transpose()
    }

    async fn force_release(&self, session: &dyn Session) -> MetaResult<bool> {
        if !session.relation_exists(&self.lock_relation()).await? {
            return Ok(false);
        }
        let deleted = session
            .execute_with(&self.statements().delete_lock, &[Value::from(MIGRATIONS_KEY)])
            .await?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl MetadataStore for SqlMetadataStore {
    async fn exists(&self, session: &dyn Session) -> MetaResult<bool> {
        Ok(session.relation_exists(&self.describe()).await?)
    }

    async fn initialize(&self, session: &dyn Session) -> MetaResult<()> {
        session.create_schema_if_not_exists(&self.keyspace).await?;
        session.execute(&self.statements().create_history).await?;
        self.ensure_lock_table(session).await?;

        if !session.relation_exists(&self.describe()).await? {
            return Err(MetaError::InitializationFailed(format!(
                "{} was not created",
                self.describe()
            )));
        }
        if !session.relation_exists(&self.lock_relation()).await? {
            return Err(MetaError::InitializationFailed(format!(
                "{} was not created",
                self.lock_relation()
            )));
        }
        log::debug!("Initialized migration metadata in {}", self.describe());
        Ok(())
    }

    async fn append(&self, session: &dyn Session, record: &MetadataRecord) -> MetaResult<()> {
        let inserted = session
            .execute_with(
                &self.statements().insert_record,
                &[
                    Value::from(record.name.as_str()),
                    Value::from(record.version),
                    Value::from(record.description.as_str()),
                    Value::from(record.script.clone()),
                    Value::from(record.hash.clone()),
                    Value::from(record.installed_at),
                    Value::from(record.execution_time_ms),
                    Value::from(record.was_successful),
                ],
            )
            .await?;
        if inserted != 1 {
            return Err(MetaError::WriteNotApplied {
                version: record.version,
            });
        }
        Ok(())
    }

    async fn latest(&self, session: &dyn Session) -> MetaResult<Option<MetadataRecord>> {
        let rows = session
            .query(&self.statements().select_latest, &[Value::from(MIGRATIONS_KEY)])
            .await?;
        rows.first().map(decode_record).transpose()
    }

    async fn history(&self, session: &dyn Session) -> MetaResult<Vec<MetadataRecord>> {
        let rows = session
            .query(&self.statements().select_history, &[Value::from(MIGRATIONS_KEY)])
            .await?;
        rows.iter().map(decode_record).collect()
    }

    fn describe(&self) -> String {
        format!("{}.{}", self.keyspace, self.table)
    }
}

fn column<'a>(row: &'a Row, idx: usize, name: &str) -> MetaResult<&'a Value> {
    row.get(idx)
        .ok_or_else(|| MetaError::CorruptRecord(format!("missing column '{name}'")))
}

fn decode_record(row: &Row) -> MetaResult<MetadataRecord> {
    let version = column(row, 1, "version")?.as_i64("version")?;
    Ok(MetadataRecord {
        name: column(row, 0, "name")?.as_text("name")?,
        version: i32::try_from(version)
            .map_err(|_| MetaError::CorruptRecord(format!("version {version} out of range")))?,
        description: column(row, 2, "description")?.as_text("description")?,
        script: column(row, 3, "script")?.as_opt_text("script")?,
        hash: column(row, 4, "hash")?.as_opt_text("hash")?,
        installed_at: column(row, 5, "installed_at")?.as_timestamp("installed_at")?,
        execution_time_ms: column(row, 6, "exectime_ms")?.as_i64("exectime_ms")?,
        was_successful: column(row, 7, "was_successful")?.as_bool("was_successful")?,
    })
}

#[cfg(test)]
#[path = "sql_test.rs"]
mod tests;
