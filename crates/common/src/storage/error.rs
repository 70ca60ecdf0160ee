//! Storage error types

use thiserror::Error;

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    /// Could not open a connection
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Statement failed
    #[error("Database query error: {0}")]
    Query(String),

    /// Schema migration failed
    #[error("Database migration error: {0}")]
    Migration(String),

    /// No pooled connection became free in time
    #[error("Database pool exhausted")]
    PoolExhausted,

    /// Configuration rejected before opening the pool
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem failure
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// SQLite driver error
    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),

    /// Connection pool error
    #[error(transparent)]
    R2d2(#[from] r2d2::Error),
}

impl StorageError {
    /// Returns true when retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PoolExhausted | Self::R2d2(_) => true,
            Self::Rusqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Result alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_database_is_retryable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(StorageError::Rusqlite(busy).is_retryable());
        assert!(StorageError::PoolExhausted.is_retryable());
        assert!(!StorageError::InvalidConfig("bad".into()).is_retryable());
    }
}
