//! SQLite as the relational backend.

use super::flat_table::FlatTable;
use super::json_table::JsonTable;
use super::{Backend, Catalog};
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::PathBuf;

/// Opens one SQLite database and hosts the flat and JSON table configurations.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: PathBuf,
}

impl SqliteBackend {
    /// `path` may be `:memory:` for a private in-memory database.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }
}

impl Backend for SqliteBackend {
    type Conn = Connection;

    fn kind(&self) -> &'static str {
        "relational"
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("open SQLite database {}", self.path.display()))?;
        configure_connection(&conn)?;
        log::info!("Connected to SQLite at {}", self.path.display());
        Ok(conn)
    }

    fn catalogs(&self) -> Vec<Box<dyn Catalog<Conn = Connection>>> {
        vec![Box::new(FlatTable::new()), Box::new(JsonTable::new())]
    }

    fn close(&self, conn: Connection) -> Result<()> {
        conn.close()
            .map_err(|(_, e)| e)
            .context("close SQLite connection")
    }
}

/// Tune a connection for bulk-load throughput while keeping commits durable.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -131072;
         PRAGMA mmap_size = 268435456;
         PRAGMA temp_store = MEMORY;",
    )
    .context("configure SQLite connection")?;
    Ok(())
}

/// Count rows in `table`. Used by tests and sanity logging.
pub fn row_count(conn: &Connection, table: &str) -> Result<u64> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
    Ok(n as u64)
}
