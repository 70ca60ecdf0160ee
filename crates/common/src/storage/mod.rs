//! Pooled SQLite storage
//!
//! An r2d2 pool over `rusqlite` connections with per-connection pragmas
//! (WAL, foreign keys, busy timeout) applied on checkout. Schema management
//! belongs to the application layer; this module only hands out connections.

pub mod config;
pub mod error;
pub mod pool;
pub mod pragmas;

pub use config::SqlitePoolConfig;
pub use error::{StorageError, StorageResult};
pub use pool::{PooledSqliteConnection, SqlitePool};
pub use pragmas::apply_connection_pragmas;
