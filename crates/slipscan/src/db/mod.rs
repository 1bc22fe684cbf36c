//! SQLite store for source files and receipts.
//!
//! One connection behind a mutex serves the whole process. Every state
//! transition that touches both tables runs through [`Database::with_tx`], so
//! a receipt and the processed flag of its file are written or discarded
//! together.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, Transaction};

pub mod error;
pub mod migrations;
pub mod receipt_repo;
pub mod source_file_repo;

pub use error::DatabaseError;
pub use receipt_repo::{CommitOutcome, ReceiptRow};
pub use source_file_repo::{FileState, SourceFileRow, Validity};

/// How long a write waits on another process holding the file lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the receipt store. Clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the store at `path`, creating parent directories and applying
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Self::prepare(conn)?;

        log::info!("Receipt store opened at {}", path.display());
        Ok(db)
    }

    /// In-memory store with the full schema, used by tests and tooling.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        // The CHECK and UNIQUE backstops only hold with foreign keys on.
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    /// Runs `f` in a transaction: committed when `f` returns `Ok`, rolled
    /// back when it returns `Err`.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, DatabaseError>,
    {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }
}

/// `~/.slipscan/data/slipscan.db`
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".slipscan").join("data").join("slipscan.db"))
}

/// The configured `database_path`, falling back to [`default_database_path`].
pub fn resolve_database_path(configured: Option<&str>) -> Option<PathBuf> {
    match configured {
        Some(path) => Some(PathBuf::from(path)),
        None => default_database_path(),
    }
}
