//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use stocksync_common::storage::StorageError;
use stocksync_domain::StockSyncError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub StockSyncError);

impl From<InfraError> for StockSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<StockSyncError> for InfraError {
    fn from(value: StockSyncError) -> Self {
        InfraError(value)
    }
}

trait IntoStockSyncError {
    fn into_stocksync(self) -> StockSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → StockSyncError */
/* -------------------------------------------------------------------------- */

impl IntoStockSyncError for SqlError {
    fn into_stocksync(self) -> StockSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        StockSyncError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        StockSyncError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        StockSyncError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        StockSyncError::Database("foreign key constraint violation".into())
                    }
                    _ => StockSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => StockSyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                StockSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                StockSyncError::Database(format!("invalid column type for {name}: {ty}"))
            }
            RE::Utf8Error(_) => {
                StockSyncError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidPath(path) => StockSyncError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => StockSyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_stocksync())
    }
}

/* -------------------------------------------------------------------------- */
/* Pool / storage errors → StockSyncError */
/* -------------------------------------------------------------------------- */

impl IntoStockSyncError for StorageError {
    fn into_stocksync(self) -> StockSyncError {
        match self {
            StorageError::Rusqlite(err) => err.into_stocksync(),
            StorageError::InvalidConfig(message) => StockSyncError::Config(message),
            StorageError::PoolExhausted => {
                StockSyncError::Database("database connection pool exhausted".into())
            }
            other => StockSyncError::Database(other.to_string()),
        }
    }
}

impl From<StorageError> for InfraError {
    fn from(value: StorageError) -> Self {
        InfraError(value.into_stocksync())
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(StockSyncError::Database(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → StockSyncError */
/* -------------------------------------------------------------------------- */

impl IntoStockSyncError for HttpError {
    fn into_stocksync(self) -> StockSyncError {
        if self.is_timeout() {
            return StockSyncError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return StockSyncError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => StockSyncError::Auth(message),
                404 => StockSyncError::NotFound(message),
                429 => StockSyncError::Network(message),
                400..=499 => StockSyncError::InvalidInput(message),
                _ => StockSyncError::Network(message),
            };
        }

        if self.is_builder() {
            return StockSyncError::Config(format!("invalid HTTP request: {self}"));
        }

        StockSyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_stocksync())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json / io */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(StockSyncError::InvalidInput(format!("invalid JSON: {value}")))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(StockSyncError::Internal(format!("I/O error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
