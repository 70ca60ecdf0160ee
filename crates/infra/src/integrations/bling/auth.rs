//! OAuth refresh-token grant against the Bling token endpoint

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::Deserialize;
use stocksync_core::erp_ports::TokenRefresher;
use stocksync_domain::{BlingConfig, TokenGrant, TokenRefreshError};
use tracing::{info, instrument, warn};

use super::errors::classify_refresh_failure;
use crate::http::{HttpClient, HttpClientError};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Exchanges a refresh token for a new token pair.
///
/// Client credentials travel as HTTP Basic auth, the grant as a form body.
pub struct BlingTokenRefresher {
    token_url: String,
    http_client: HttpClient,
}

impl BlingTokenRefresher {
    /// Refresher posting to `token_url`. Never retries, since a refresh rotates the token.
    pub fn new(token_url: impl Into<String>, timeout: Duration) -> Result<Self, HttpClientError> {
        // A refresh rotates the token; never replay it.
        let http_client = HttpClient::builder().timeout(timeout).max_attempts(1).build()?;
        Ok(Self { token_url: token_url.into(), http_client })
    }

    /// Refresher for the configured token URL.
    pub fn from_config(config: &BlingConfig) -> Result<Self, HttpClientError> {
        Self::new(config.token_url.clone(), Duration::from_secs(config.request_timeout_secs))
    }
}

#[async_trait]
impl TokenRefresher for BlingTokenRefresher {
    #[instrument(skip_all)]
    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenGrant, TokenRefreshError> {
        let builder = self
            .http_client
            .request(Method::POST, &self.token_url)
            .basic_auth(client_id, Some(client_secret))
            .header(ACCEPT, "1.0")
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)]);

        let response = self
            .http_client
            .send(builder)
            .await
            .map_err(|err| TokenRefreshError::Transient(err.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            TokenRefreshError::Transient(format!("failed to read token response: {err}"))
        })?;

        if !status.is_success() {
            let err = classify_refresh_failure(status, &body);
            warn!(status = status.as_u16(), permanent = err.is_permanent(), "Token refresh rejected");
            return Err(err);
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|err| {
            TokenRefreshError::Transient(format!("unexpected token response: {err}"))
        })?;

        info!(expires_in = parsed.expires_in, rotated = parsed.refresh_token.is_some(), "Access token refreshed");
        Ok(TokenGrant {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            expires_in: parsed.expires_in,
        })
    }
}
