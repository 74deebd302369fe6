//! SQLite-backed [`EventStore`].
//!
//! One connection behind a mutex. File databases run in WAL mode so auditors
//! and queries can read while the commit worker writes.

use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use virax_contracts::{
    error::{ViraxError, ViraxResult},
    record::format_timestamp,
    EventRecord, PipelineConfig, QueryFilter, StoredEvent, GENESIS, SCHEMA_VERSION,
};
use virax_core::EventStore;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Path that selects a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

const SELECT_COLUMNS: &str = "SELECT id, created_at, timestamp, session_id, level, category, source, \
                              payload, hash, prev_hash, schema_version FROM registry";

/// Append-only chain store on a single SQLite database.
pub struct SqliteStore {
    /// `None` once [`EventStore::close`] has run.
    conn: Mutex<Option<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create the database at `path`. The literal `:memory:` opens an
    /// in-memory database instead.
    pub fn open(path: impl AsRef<Path>) -> ViraxResult<Self> {
        let path = path.as_ref();
        if path.as_os_str() == MEMORY_PATH {
            return Self::in_memory();
        }

        let conn = Connection::open(path).map_err(db_error)?;
        let journal: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(db_error)?;
        conn.pragma_update(None, "synchronous", "NORMAL").map_err(db_error)?;
        Self::initialize(&conn)?;

        info!(path = %path.display(), journal_mode = %journal, "event store opened");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// A private database that disappears when the store is closed.
    pub fn in_memory() -> ViraxResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::initialize(&conn)?;
        debug!("in-memory event store opened");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: None,
        })
    }

    /// Open the store named by `config.store_path`.
    pub fn open_config(config: &PipelineConfig) -> ViraxResult<Self> {
        Self::open(&config.store_path)
    }

    /// Backing file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn initialize(conn: &Connection) -> ViraxResult<()> {
        conn.pragma_update(None, "foreign_keys", "ON").map_err(db_error)?;
        conn.execute_batch(SCHEMA_SQL).map_err(db_error)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(db_error)?;
        Ok(())
    }

    /// Run `f` against the open connection.
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>) -> ViraxResult<T> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(ViraxError::StoreClosed)?;
        f(conn).map_err(db_error)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventStore for SqliteStore {
    fn insert_batch(&self, records: &[EventRecord]) -> ViraxResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO registry (schema_version, timestamp, session_id, level, category, \
                     source, payload, hash, prev_hash) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )?;
                for record in records {
                    stmt.execute(params![
                        record.schema_version,
                        record.timestamp,
                        record.session_id,
                        record.level,
                        record.category,
                        record.source,
                        record.payload,
                        record.hash,
                        record.prev_hash,
                    ])?;
                }
            }
            tx.commit()
        })
    }

    fn last_hash(&self) -> ViraxResult<String> {
        let last = self.with_conn(|conn| {
            conn.query_row("SELECT hash FROM registry ORDER BY id DESC LIMIT 1", [], |row| {
                row.get::<_, String>(0)
            })
            .optional()
        })?;
        Ok(last.unwrap_or_else(|| GENESIS.to_string()))
    }

    fn query_range(&self, filter: &QueryFilter, limit: usize) -> ViraxResult<Vec<StoredEvent>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(category) = &filter.category {
            clauses.push("category = ?");
            values.push(Value::Text(category.clone()));
        }
        if let Some(level) = &filter.level {
            clauses.push("level = ?");
            values.push(Value::Text(level.clone()));
        }
        if let Some(since) = &filter.since {
            clauses.push("timestamp >= ?");
            values.push(Value::Text(since.clone()));
        }
        if let Some(until) = &filter.until {
            clauses.push("timestamp <= ?");
            values.push(Value::Text(until.clone()));
        }
        values.push(Value::Integer(sql_limit(limit)));

        let mut sql = String::from(SELECT_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id DESC LIMIT ?");

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), row_to_stored)?;
            rows.collect()
        })
    }

    fn integrity_rows(&self, limit: Option<usize>) -> ViraxResult<Vec<StoredEvent>> {
        self.with_conn(|conn| match limit {
            Some(limit) => {
                let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1"))?;
                let mut rows = stmt
                    .query_map(params![sql_limit(limit)], row_to_stored)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows.reverse();
                Ok(rows)
            }
            None => {
                let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))?;
                let rows = stmt.query_map([], row_to_stored)?;
                rows.collect()
            }
        })
    }

    fn count(&self) -> ViraxResult<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM registry", [], |row| row.get::<_, i64>(0))
        })
        .map(|n| n.max(0) as u64)
    }

    fn insert_heartbeat(&self, timestamp: &str, status: &str) -> ViraxResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO heartbeat (timestamp, status) VALUES (?1, ?2)",
                params![timestamp, status],
            )
            .map(|_| ())
        })
    }

    fn prune_heartbeats(&self, older_than: DateTime<Utc>) -> ViraxResult<usize> {
        let cutoff = format_timestamp(older_than);
        let removed = self.with_conn(|conn| {
            conn.execute("DELETE FROM heartbeat WHERE timestamp < ?1", params![cutoff])
        })?;
        debug!(removed, cutoff = %cutoff, "heartbeats pruned");
        Ok(removed)
    }

    fn compact(&self) -> ViraxResult<()> {
        self.with_conn(|conn| conn.execute_batch("PRAGMA optimize; VACUUM;"))
    }

    fn close(&self) -> ViraxResult<()> {
        let Some(conn) = self.lock().take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| db_error(e))?;
        debug!("event store closed");
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn db_error(e: rusqlite::Error) -> ViraxError {
    ViraxError::Store { reason: e.to_string() }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn row_to_stored(row: &Row<'_>) -> rusqlite::Result<StoredEvent> {
    Ok(StoredEvent {
        id: row.get(0)?,
        created_at: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        record: EventRecord {
            timestamp: row.get(2)?,
            session_id: row.get(3)?,
            level: row.get(4)?,
            category: row.get(5)?,
            source: row.get(6)?,
            payload: row.get(7)?,
            hash: row.get(8)?,
            prev_hash: row.get(9)?,
            schema_version: row.get(10)?,
        },
    })
}
