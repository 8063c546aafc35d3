//! Durable list of sites to block.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{BlockerError, Result};

/// A site registered for blocking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRecord {
    /// Primary key assigned by the registry.
    pub id: i64,
    /// Hostname written to the hosts file.
    pub url: String,
}

impl SiteRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
        }
    }
}

/// Storage for [`SiteRecord`]s.
pub trait SiteRegistry {
    /// All records ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::Storage`] if the store cannot be read.
    fn list(&self) -> Result<Vec<SiteRecord>>;

    /// Fetches record `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::SiteNotFound`] if no such record exists.
    fn get(&self, id: i64) -> Result<SiteRecord>;

    /// Registers `url` and returns its new id.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::InvalidConfig`] for a blank URL and
    /// [`BlockerError::Storage`] if the insert fails.
    fn add(&mut self, url: &str) -> Result<i64>;

    /// Replaces the URL of record `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::SiteNotFound`] if no such record exists.
    fn update(&mut self, id: i64, url: &str) -> Result<()>;

    /// Removes record `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::SiteNotFound`] if no such record exists.
    fn delete(&mut self, id: i64) -> Result<()>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS websites (
    id  INTEGER PRIMARY KEY,
    url TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_websites_url ON websites(url);
";

/// SQLite-backed registry.
///
/// The connection is released by [`close`](Self::close), which reports
/// close failures, or when the value is dropped.
#[derive(Debug)]
pub struct SqliteRegistry {
    conn: Connection,
}

impl SqliteRegistry {
    /// Opens (creating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::Storage`] if the database cannot be opened or
    /// the schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "Opened site registry");
        Self::init(conn)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::Storage`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::Storage`] if SQLite refuses to close.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| BlockerError::Storage(e))
    }
}

impl SiteRegistry for SqliteRegistry {
    fn list(&self) -> Result<Vec<SiteRecord>> {
        let mut stmt = self.conn.prepare("SELECT id, url FROM websites ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(SiteRecord::new(row.get(0)?, row.get::<_, String>(1)?))
        })?;
        let sites = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sites)
    }

    fn get(&self, id: i64) -> Result<SiteRecord> {
        self.conn
            .query_row(
                "SELECT id, url FROM websites WHERE id = ?1",
                params![id],
                |row| Ok(SiteRecord::new(row.get(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?
            .ok_or(BlockerError::SiteNotFound { id })
    }

    fn add(&mut self, url: &str) -> Result<i64> {
        let url = normalize(url)?;
        self.conn
            .execute("INSERT INTO websites (url) VALUES (?1)", params![url])?;
        let id = self.conn.last_insert_rowid();
        tracing::info!(id, url, "Added site");
        Ok(id)
    }

    fn update(&mut self, id: i64, url: &str) -> Result<()> {
        let url = normalize(url)?;
        let changed = self
            .conn
            .execute("UPDATE websites SET url = ?1 WHERE id = ?2", params![url, id])?;
        if changed == 0 {
            return Err(BlockerError::SiteNotFound { id });
        }
        tracing::info!(id, url, "Updated site");
        Ok(())
    }

    fn delete(&mut self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM websites WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(BlockerError::SiteNotFound { id });
        }
        tracing::info!(id, "Deleted site");
        Ok(())
    }
}

fn normalize(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.is_empty() || url.contains(char::is_whitespace) {
        return Err(BlockerError::InvalidConfig(format!("invalid site url {url:?}")));
    }
    Ok(url)
}
