//! SQLite credential store: a single row with `id = 1`.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use stocksync_common::clock::Clock;
use stocksync_core::auth::CredentialStore;
use stocksync_domain::{Credential, CredentialUpdate, Result, StockSyncError};

use super::manager::DbManager;
use super::sql::{opt_ts, parse_opt_ts, parse_ts, ts, with_connection};

const CREDENTIAL_COLUMNS: &str = "client_id, client_secret, access_token, refresh_token, \
     token_expires_at, is_active, last_notification_sent_at, updated_at";

/// SQLite-backed [`CredentialStore`] holding the single credential row.
pub struct SqliteCredentialStore {
    db: Arc<DbManager>,
    clock: Arc<dyn Clock>,
}

impl SqliteCredentialStore {
    /// Store over `db`; `clock` stamps `updated_at`.
    pub fn new(db: Arc<DbManager>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }
}

enum Upserted {
    Stored(Credential),
    MissingClient,
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get(&self) -> Result<Option<Credential>> {
        with_connection(&self.db, |conn| select_credential(conn)).await
    }

    /// Read-modify-write inside one immediate transaction so concurrent
    /// partial updates never lose each other's fields.
    async fn upsert(&self, update: &CredentialUpdate) -> Result<Credential> {
        let update = update.clone();
        let now = self.clock.now();

        let outcome = with_connection(&self.db, move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let credential = match select_credential(&tx)? {
                Some(mut existing) => {
                    update.apply_to(&mut existing, now);
                    existing
                }
                None => {
                    let (Some(client_id), Some(client_secret)) =
                        (update.client_id.clone(), update.client_secret.clone())
                    else {
                        return Ok(Upserted::MissingClient);
                    };
                    let mut fresh = Credential {
                        client_id,
                        client_secret,
                        access_token: None,
                        refresh_token: None,
                        token_expires_at: None,
                        is_active: true,
                        last_notification_sent_at: None,
                        updated_at: now,
                    };
                    update.apply_to(&mut fresh, now);
                    fresh
                }
            };

            tx.execute(
                &format!(
                    "INSERT INTO bling_credentials (id, {CREDENTIAL_COLUMNS}) \
                     VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                     ON CONFLICT(id) DO UPDATE SET \
                        client_id = excluded.client_id, \
                        client_secret = excluded.client_secret, \
                        access_token = excluded.access_token, \
                        refresh_token = excluded.refresh_token, \
                        token_expires_at = excluded.token_expires_at, \
                        is_active = excluded.is_active, \
                        last_notification_sent_at = excluded.last_notification_sent_at, \
                        updated_at = excluded.updated_at"
                ),
                params![
                    credential.client_id,
                    credential.client_secret,
                    credential.access_token,
                    credential.refresh_token,
                    opt_ts(credential.token_expires_at),
                    credential.is_active,
                    opt_ts(credential.last_notification_sent_at),
                    ts(credential.updated_at),
                ],
            )?;
            tx.commit()?;
            Ok(Upserted::Stored(credential))
        })
        .await?;

        match outcome {
            Upserted::Stored(credential) => Ok(credential),
            Upserted::MissingClient => Err(StockSyncError::InvalidInput(
                "client id and secret are required to create the credential".into(),
            )),
        }
    }
}

fn select_credential(conn: &rusqlite::Connection) -> rusqlite::Result<Option<Credential>> {
    conn.query_row(
        &format!("SELECT {CREDENTIAL_COLUMNS} FROM bling_credentials WHERE id = 1"),
        [],
        map_credential_row,
    )
    .optional()
}

fn map_credential_row(row: &Row<'_>) -> rusqlite::Result<Credential> {
    let updated_at: String = row.get(7)?;
    Ok(Credential {
        client_id: row.get(0)?,
        client_secret: row.get(1)?,
        access_token: row.get(2)?,
        refresh_token: row.get(3)?,
        token_expires_at: parse_opt_ts(4, row.get(4)?)?,
        is_active: row.get(5)?,
        last_notification_sent_at: parse_opt_ts(6, row.get(6)?)?,
        updated_at: parse_ts(7, &updated_at)?,
    })
}
