//! Helpers shared by the SQLite repositories.

use std::io;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;
use stocksync_domain::{Result, StockSyncError};
use tokio::task::{self, JoinError};

use super::manager::DbManager;
use crate::errors::InfraError;

/// Run `op` on a pooled connection off the async runtime.
pub(crate) async fn with_connection<T, F>(db: &Arc<DbManager>, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
{
    let db = Arc::clone(db);
    task::spawn_blocking(move || {
        let mut conn = db.get_connection()?;
        op(&mut conn).map_err(map_sql_error)
    })
    .await
    .map_err(map_join_error)?
}

pub(crate) fn map_sql_error(err: rusqlite::Error) -> StockSyncError {
    StockSyncError::from(InfraError::from(err))
}

pub(crate) fn map_join_error(err: JoinError) -> StockSyncError {
    if err.is_cancelled() {
        StockSyncError::Internal("blocking database task cancelled".into())
    } else {
        StockSyncError::Internal(format!("blocking database task failed: {err}"))
    }
}

/// Fixed-width UTC text so lexical order matches time order.
pub(crate) fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn opt_ts(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(ts)
}

pub(crate) fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| conversion_error(idx, err.to_string()))
}

pub(crate) fn parse_opt_ts(idx: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.as_deref().map(|raw| parse_ts(idx, raw)).transpose()
}

/// Parse a text column through the type's `FromStr`.
pub(crate) fn parse_text<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|err| conversion_error(idx, err.to_string()))
}

pub(crate) fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(io::Error::new(io::ErrorKind::InvalidData, message)),
    )
}

/// SQLite integers are signed; counters are stored saturated.
pub(crate) fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn from_sql_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn timestamps_sort_lexically() {
        let earlier = Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap();
        let later = earlier + chrono::Duration::milliseconds(1);
        assert!(ts(earlier) < ts(later));
        assert_eq!(ts(earlier), "2024-10-01T09:00:00.000000Z");
        assert_eq!(parse_ts(0, &ts(later)).unwrap(), later);
    }

    #[test]
    fn bad_timestamp_is_a_conversion_failure() {
        let err = parse_ts(3, "not-a-date").unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(3, Type::Text, _)));
    }
}
