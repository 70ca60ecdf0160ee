//! Credential persistence port

use async_trait::async_trait;
use stocksync_domain::{Credential, CredentialUpdate, Result};

/// Single-row store of the ERP OAuth credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The stored credential, if the integration was ever configured.
    async fn get(&self) -> Result<Option<Credential>>;

    /// Apply a partial update and return the resulting credential.
    ///
    /// Creating the row requires `client_id` and `client_secret`; a new
    /// credential starts active unless the update says otherwise.
    async fn upsert(&self, update: &CredentialUpdate) -> Result<Credential>;
}
