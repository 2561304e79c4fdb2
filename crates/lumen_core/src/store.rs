//! Per-application override store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the narrow string-value/integer-flag interface the bypass
//!   decider reads and writes, keyed by application name.
//! - Keep SQL details inside this persistence boundary.
//!
//! # Invariants
//! - A missing value reads back as `None`, never as an error.
//! - Writes upsert; the last write for an (application, name) pair wins.

use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Mutex;

pub type StoreResult<T> = Result<T, StoreError>;

/// Override store errors.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Poisoned,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Poisoned => write!(f, "override store lock poisoned"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Poisoned => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Narrow key/value interface for per-application overrides.
///
/// The bypass decider records one string (`module`) and reads one flag
/// (`bypass`); the maintenance CLI edits the same pairs.
pub trait OverrideStore: Send + Sync {
    fn set_string(&self, application: &str, name: &str, value: &str) -> StoreResult<()>;
    fn get_string(&self, application: &str, name: &str) -> StoreResult<Option<String>>;
    fn set_flag(&self, application: &str, name: &str, value: i64) -> StoreResult<()>;
    fn get_flag(&self, application: &str, name: &str) -> StoreResult<Option<i64>>;
}

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS application_overrides (
    application TEXT NOT NULL,
    name TEXT NOT NULL,
    string_value TEXT,
    flag_value INTEGER,
    PRIMARY KEY (application, name)
);";

/// SQLite-backed override store.
pub struct SqliteOverrideStore {
    conn: Mutex<Connection>,
}

impl SqliteOverrideStore {
    /// Opens the store database file, creating the schema when absent.
    ///
    /// # Side effects
    /// - Emits `store_open` logging events with status.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        info!("event=store_open module=store status=start mode=file");
        let conn = match Connection::open(path) {
            Ok(conn) => conn,
            Err(err) => {
                error!("event=store_open module=store status=error mode=file error={err}");
                return Err(err.into());
            }
        };
        Self::bootstrap(conn, "file")
    }

    /// Opens an in-memory store, mainly for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        info!("event=store_open module=store status=start mode=memory");
        let conn = match Connection::open_in_memory() {
            Ok(conn) => conn,
            Err(err) => {
                error!("event=store_open module=store status=error mode=memory error={err}");
                return Err(err.into());
            }
        };
        Self::bootstrap(conn, "memory")
    }

    fn bootstrap(conn: Connection, mode: &str) -> StoreResult<Self> {
        match conn.execute_batch(SCHEMA_SQL) {
            Ok(()) => {
                info!("event=store_open module=store status=ok mode={mode}");
                Ok(Self {
                    conn: Mutex::new(conn),
                })
            }
            Err(err) => {
                error!("event=store_open module=store status=error mode={mode} error={err}");
                Err(err.into())
            }
        }
    }

    fn with_conn<T>(&self, op: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        op(&conn)
    }
}

impl OverrideStore for SqliteOverrideStore {
    fn set_string(&self, application: &str, name: &str, value: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO application_overrides (application, name, string_value)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (application, name)
                 DO UPDATE SET string_value = excluded.string_value;",
                params![application, name, value],
            )?;
            Ok(())
        })
    }

    fn get_string(&self, application: &str, name: &str) -> StoreResult<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT string_value FROM application_overrides
                     WHERE application = ?1 AND name = ?2;",
                    params![application, name],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?;
            Ok(value.flatten())
        })
    }

    fn set_flag(&self, application: &str, name: &str, value: i64) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO application_overrides (application, name, flag_value)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (application, name)
                 DO UPDATE SET flag_value = excluded.flag_value;",
                params![application, name, value],
            )?;
            Ok(())
        })
    }

    fn get_flag(&self, application: &str, name: &str) -> StoreResult<Option<i64>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT flag_value FROM application_overrides
                     WHERE application = ?1 AND name = ?2;",
                    params![application, name],
                    |row| row.get::<_, Option<i64>>(0),
                )
                .optional()?;
            Ok(value.flatten())
        })
    }
}
