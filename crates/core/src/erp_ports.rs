//! Ports towards the remote ERP

use async_trait::async_trait;
use serde_json::Value;
use stocksync_domain::{ErpApiError, TokenError, TokenGrant, TokenRefreshError};

/// Authenticated JSON calls against the ERP REST API.
///
/// `path` is relative to the API base URL. Query pairs may repeat a key
/// (`idsProdutos[]`).
#[async_trait]
pub trait ErpApi: Send + Sync {
    /// `GET path` with `query`
    async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value, ErpApiError>;

    /// `POST path` with a JSON body
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ErpApiError>;
}

/// Supplies a currently valid access token to the API client.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Valid access token, refreshing first when it is about to expire
    async fn access_token(&self) -> Result<String, TokenError>;
}

/// OAuth refresh-token grant against the ERP's token endpoint.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange `refresh_token` for a new grant
    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenGrant, TokenRefreshError>;
}
