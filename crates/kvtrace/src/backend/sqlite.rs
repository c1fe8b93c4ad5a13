//! SQLite-based key-value backend.
//!
//! Plain values and counters live in `kv_strings`; lists live in `kv_lists`
//! with one row per entry, ordered by `position`. A key is in at most one
//! of the two tables.

use super::traits::{parse_counter, resolve_range, KvBackend};
use crate::config::SqliteBackendConfig;
use crate::error::{KvError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// SQLite-backed key-value store.
///
/// Thread-safe via internal mutex on the connection; every trait method is
/// one locked round-trip.
pub struct SqliteBackend {
    /// Database connection (wrapped for thread safety).
    conn: Arc<Mutex<Connection>>,
    /// Settings the backend was opened with.
    config: SqliteBackendConfig,
}

impl SqliteBackend {
    /// Open (or create) a database file at `path` with default settings.
    pub fn new(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        Self::open(SqliteBackendConfig::at(path))
    }

    /// Open a database described by `config`.
    ///
    /// Creates the parent directory and tables if they don't exist.
    pub fn open(config: SqliteBackendConfig) -> Result<Self> {
        if config.path.as_os_str().is_empty() {
            return Err(KvError::Config {
                message: "SQLite backend path is empty".to_string(),
            });
        }

        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| KvError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(&config.path).map_err(|e| KvError::BackendUnavailable {
            message: format!("Failed to open database {}: {}", config.path.display(), e),
            source: Some(e),
        })?;

        Self::with_connection(conn, config)
    }

    /// Private in-memory database. Contents vanish with the backend.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| KvError::BackendUnavailable {
            message: format!("Failed to open in-memory database: {}", e),
            source: Some(e),
        })?;

        let config = SqliteBackendConfig {
            path: ":memory:".into(),
            wal: false,
            ..SqliteBackendConfig::default()
        };
        Self::with_connection(conn, config)
    }

    fn with_connection(conn: Connection, config: SqliteBackendConfig) -> Result<Self> {
        conn.busy_timeout(config.busy_timeout())
            .map_err(|e| KvError::BackendUnavailable {
                message: format!("Failed to set busy timeout: {}", e),
                source: Some(e),
            })?;

        if config.wal {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
                .map_err(|e| KvError::BackendUnavailable {
                    message: format!("Failed to set pragmas: {}", e),
                    source: Some(e),
                })?;
        }

        let backend = Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        };
        backend.init_schema()?;

        debug!("Opened SQLite backend at {}", backend.config.path.display());
        Ok(backend)
    }

    /// Settings the backend was opened with.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| KvError::BackendUnavailable {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Plain values and counters
            CREATE TABLE IF NOT EXISTS kv_strings (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );

            -- Ordered lists, one row per entry
            CREATE TABLE IF NOT EXISTS kv_lists (
                key TEXT NOT NULL,
                position INTEGER NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (key, position)
            );
            "#,
        )
        .map_err(|e| KvError::BackendUnavailable {
            message: format!("Failed to initialize schema: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }
}

fn has_string(conn: &Connection, key: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM kv_strings WHERE key = ?1 LIMIT 1",
        params![key],
        |_| Ok(true),
    )
    .optional()
    .map(|found| found.unwrap_or(false))
}

fn list_len(conn: &Connection, key: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM kv_lists WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
}

fn read_string(conn: &Connection, key: &str) -> rusqlite::Result<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT value FROM kv_strings WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

impl KvBackend for SqliteBackend {
    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.lock()?;
        let write_err = |e: rusqlite::Error| KvError::write_failed("set", key, e);

        let tx = conn.transaction().map_err(write_err)?;
        tx.execute("DELETE FROM kv_lists WHERE key = ?1", params![key])
            .map_err(write_err)?;
        tx.execute(
            "INSERT OR REPLACE INTO kv_strings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(write_err)?;
        tx.commit().map_err(write_err)?;

        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let read_err = |e: rusqlite::Error| KvError::read_failed("get", key, e);

        if let Some(value) = read_string(&conn, key).map_err(read_err)? {
            return Ok(Some(value));
        }
        if list_len(&conn, key).map_err(read_err)? > 0 {
            return Err(KvError::read_failed("get", key, "key holds a list"));
        }

        Ok(None)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let read_err = |e: rusqlite::Error| KvError::read_failed("exists", key, e);

        if has_string(&conn, key).map_err(read_err)? {
            return Ok(true);
        }
        Ok(list_len(&conn, key).map_err(read_err)? > 0)
    }

    fn increment(&self, key: &str) -> Result<i64> {
        let mut conn = self.lock()?;
        let write_err = |e: rusqlite::Error| KvError::write_failed("increment", key, e);

        let tx = conn.transaction().map_err(write_err)?;
        if list_len(&tx, key).map_err(write_err)? > 0 {
            return Err(KvError::write_failed("increment", key, "key holds a list"));
        }

        let current = match read_string(&tx, key).map_err(write_err)? {
            None => 0,
            Some(raw) => parse_counter(&raw)
                .ok_or_else(|| KvError::write_failed("increment", key, "value is not an integer"))?,
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| KvError::write_failed("increment", key, "counter overflow"))?;

        tx.execute(
            "INSERT OR REPLACE INTO kv_strings (key, value) VALUES (?1, ?2)",
            params![key, next.to_string().into_bytes()],
        )
        .map_err(write_err)?;
        tx.commit().map_err(write_err)?;

        Ok(next)
    }

    fn get_counter(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key)? {
            None => Ok(None),
            Some(raw) => parse_counter(&raw)
                .map(Some)
                .ok_or_else(|| KvError::read_failed("get_counter", key, "value is not an integer")),
        }
    }

    fn append(&self, key: &str, value: &[u8]) -> Result<u64> {
        let mut conn = self.lock()?;
        let write_err = |e: rusqlite::Error| KvError::write_failed("append", key, e);

        let tx = conn.transaction().map_err(write_err)?;
        if has_string(&tx, key).map_err(write_err)? {
            return Err(KvError::write_failed("append", key, "key holds a value"));
        }

        tx.execute(
            r#"
            INSERT INTO kv_lists (key, position, value)
            VALUES (?1, (SELECT COALESCE(MAX(position) + 1, 0) FROM kv_lists WHERE key = ?1), ?2)
            "#,
            params![key, value],
        )
        .map_err(write_err)?;
        let len = list_len(&tx, key).map_err(write_err)?;
        tx.commit().map_err(write_err)?;

        Ok(len as u64)
    }

    fn get_range(&self, key: &str, start: i64, end: i64) -> Result<Vec<Vec<u8>>> {
        let conn = self.lock()?;
        let read_err = |e: rusqlite::Error| KvError::read_failed("get_range", key, e);

        if has_string(&conn, key).map_err(read_err)? {
            return Err(KvError::read_failed("get_range", key, "key holds a value"));
        }

        let len = list_len(&conn, key).map_err(read_err)? as usize;
        let (from, to) = match resolve_range(len, start, end) {
            Some(bounds) => bounds,
            None => return Ok(Vec::new()),
        };

        let mut stmt = conn
            .prepare(
                r#"
                SELECT value FROM kv_lists
                WHERE key = ?1
                ORDER BY position ASC
                LIMIT ?2 OFFSET ?3
                "#,
            )
            .map_err(read_err)?;

        let items = stmt
            .query_map(params![key, (to - from) as i64, from as i64], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .map_err(read_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(read_err)?;

        Ok(items)
    }

    fn flush_all(&self, synchronous: bool) -> Result<()> {
        let mut conn = self.lock()?;
        let write_err = |e: rusqlite::Error| KvError::write_failed("flush_all", "*", e);

        let tx = conn.transaction().map_err(write_err)?;
        let strings = tx.execute("DELETE FROM kv_strings", []).map_err(write_err)?;
        let lists = tx.execute("DELETE FROM kv_lists", []).map_err(write_err)?;
        tx.commit().map_err(write_err)?;

        if synchronous && self.config.wal {
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
                .map_err(write_err)?;
        }

        debug!("Flushed {} values and {} list entries", strings, lists);
        Ok(())
    }
}
