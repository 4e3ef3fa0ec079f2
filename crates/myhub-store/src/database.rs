//! Database connection management.
//!
//! The [`Store`] struct owns an r2d2 pool of SQLite connections and
//! guarantees that migrations are run before any other operation. The pool
//! bounds concurrent database sessions; acquiring a connection past the
//! configured timeout fails the request instead of queueing forever.

use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::Result;
use crate::migrations;

/// Default maximum number of pooled connections.
pub const DEFAULT_POOL_SIZE: u32 = 20;

/// Default connection-acquire timeout.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// Cloneable handle to the SQLite connection pool.
#[derive(Clone)]
pub struct Store {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl Store {
    /// Open (or create) the database at the given path with default pool
    /// settings.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, DEFAULT_POOL_SIZE, DEFAULT_ACQUIRE_TIMEOUT)
    }

    /// Open (or create) the database with explicit pool sizing.
    ///
    /// Every pooled connection gets WAL journaling and enforced foreign
    /// keys; migrations run once before the handle is returned. A failure
    /// here is fatal to startup.
    pub fn open_with(path: &Path, pool_size: u32, acquire_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %path.display(), pool_size, "opening database");

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(acquire_timeout)
            .build(manager)?;

        // Run schema migrations on one connection before handing the pool out.
        let conn = pool.get()?;
        migrations::run_migrations(&conn)?;

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Check out a connection from the pool.
    ///
    /// Callers should prefer the typed CRUD helpers; direct access is
    /// occasionally needed for transactions or ad-hoc queries.
    pub fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Filesystem path of the open database.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse an RFC-3339 column value, reporting the column index on failure.
pub(crate) fn parse_timestamp(
    value: &str,
    column: usize,
) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let store = Store::open(&path).expect("should open");
        assert_eq!(store.path(), path);

        // Reopening against the same file must not re-run migrations.
        let again = Store::open(&path).expect("should reopen");
        let version: u32 = again
            .conn()
            .unwrap()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, migrations::CURRENT_VERSION);
    }
}
