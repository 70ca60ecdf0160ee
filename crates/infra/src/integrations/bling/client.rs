//! Bling REST API v3 client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use stocksync_common::clock::Clock;
use stocksync_core::erp_ports::{AccessTokenProvider, ErpApi};
use stocksync_domain::{BlingConfig, ErpApiError};
use tracing::{debug, instrument, warn};

use super::errors::classify_api_error;
use crate::http::HttpClient;

/// Authenticated JSON client for the Bling API.
///
/// Every call asks the token provider for a valid access token first, so
/// on-demand refreshes happen before the request is sent. `Retry-After`
/// HTTP dates are resolved against the injected clock.
pub struct BlingClient {
    base_url: String,
    http_client: HttpClient,
    tokens: Arc<dyn AccessTokenProvider>,
    clock: Arc<dyn Clock>,
}

impl BlingClient {
    /// Client for `base_url` with three attempts per request.
    pub fn new(
        base_url: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Result<Self, ErpApiError> {
        let http_client = HttpClient::builder().timeout(timeout).max_attempts(3).build()?;
        Ok(Self { base_url: base_url.into(), http_client, tokens, clock })
    }

    /// Client for the configured API base URL and request timeout.
    pub fn from_config(
        config: &BlingConfig,
        tokens: Arc<dyn AccessTokenProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ErpApiError> {
        Self::new(
            config.api_base_url.clone(),
            tokens,
            clock,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Replace the HTTP client (tests use fast backoff).
    pub fn with_http_client(mut self, http_client: HttpClient) -> Self {
        self.http_client = http_client;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Value, ErpApiError> {
        let token = self.tokens.access_token().await?;
        let response = self.http_client.send(builder.bearer_auth(token)).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|err| ErpApiError::Network(format!("failed to read response body: {err}")))?;

        if !status.is_success() {
            let err = classify_api_error(status, &headers, &body, self.clock.now());
            if err.is_rate_limited() {
                warn!(status = status.as_u16(), error = %err, "Bling rate limit hit");
            } else {
                debug!(status = status.as_u16(), error = %err, "Bling request failed");
            }
            return Err(err);
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|err| ErpApiError::Decode(format!("invalid JSON from Bling: {err}")))
    }
}

#[async_trait]
impl ErpApi for BlingClient {
    #[instrument(skip(self, query), fields(path = %path))]
    async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value, ErpApiError> {
        let builder = self.http_client.request(Method::GET, self.url(path)).query(query);
        self.execute(builder).await
    }

    #[instrument(skip(self, body), fields(path = %path))]
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ErpApiError> {
        let builder = self.http_client.request(Method::POST, self.url(path)).json(body);
        self.execute(builder).await
    }
}
