//! SQLite connection pool
//!
//! r2d2-based pooling over `rusqlite` with pragmas applied in the
//! connection manager's init hook.

use std::path::{Path, PathBuf};
use std::time::Instant;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info, instrument, warn};

use super::config::SqlitePoolConfig;
use super::pragmas::apply_connection_pragmas;
use crate::storage::error::{StorageError, StorageResult};

/// A connection checked out of a [`SqlitePool`].
pub type PooledSqliteConnection = PooledConnection<SqliteConnectionManager>;

/// SQLite connection pool
#[derive(Debug, Clone)]
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
    config: SqlitePoolConfig,
}

impl SqlitePool {
    /// Open (or create) the database at `path` and build the pool.
    ///
    /// A test connection is checked out before returning so a bad path or
    /// unreadable file fails here instead of on first use.
    ///
    /// # Errors
    /// Returns [`StorageError::Connection`] if the pool cannot be built or the
    /// test connection cannot be acquired.
    #[instrument(fields(db_path = ?path, pool_size = config.max_size))]
    pub fn new(path: &Path, config: SqlitePoolConfig) -> StorageResult<Self> {
        if config.max_size == 0 {
            return Err(StorageError::InvalidConfig("pool size must be at least 1".into()));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pragma_config = config.clone();
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            apply_connection_pragmas(conn, &pragma_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        });

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!(error = %e, "Failed to create connection pool");
                StorageError::Connection(format!("Failed to create pool: {e}"))
            })?;

        drop(pool.get().map_err(|e| {
            StorageError::Connection(format!("Failed to get test connection: {e}"))
        })?);

        info!(pool_size = config.max_size, "SQLite pool created");
        Ok(Self { pool, path: path.to_path_buf(), config })
    }

    /// Check out a connection, waiting up to the configured timeout.
    ///
    /// # Errors
    /// Returns [`StorageError::PoolExhausted`] when no connection frees up in
    /// time.
    pub fn get(&self) -> StorageResult<PooledSqliteConnection> {
        let start = Instant::now();
        let conn = self.pool.get().map_err(|e| {
            warn!(error = %e, "Connection checkout failed");
            StorageError::PoolExhausted
        })?;
        debug!(wait_ms = start.elapsed().as_millis(), "Connection acquired");
        Ok(conn)
    }

    /// Run a trivial query to confirm the database is reachable.
    ///
    /// # Errors
    /// Propagates checkout and query failures.
    pub fn health_check(&self) -> StorageResult<()> {
        let conn = self.get()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configuration the pool was built with.
    pub fn config(&self) -> &SqlitePoolConfig {
        &self.config
    }

    /// Number of connections currently idle in the pool.
    pub fn idle_connections(&self) -> u32 {
        self.pool.state().idle_connections
    }
}
