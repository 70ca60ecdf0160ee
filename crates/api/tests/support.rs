#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::Response;
use serde_json::Value;
use stocksync_domain::Config;
use stocksync_server::AppContext;
use tempfile::TempDir;

pub const WEBHOOK_SECRET: &str = "route-test-secret";

/// Context over a temporary database. The ERP base URL points at a closed
/// port so no test reaches the network.
pub struct TestApp {
    pub ctx: Arc<AppContext>,
    _temp_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_secret(Some(WEBHOOK_SECRET)).await
    }

    pub async fn with_secret(secret: Option<&str>) -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("server-test.db");

        let mut config = Config::with_database_path(db_path.to_string_lossy().to_string());
        config.database.pool_size = 2;
        config.webhook.secret = secret.map(str::to_string);
        config.bling.api_base_url = "http://127.0.0.1:9/Api/v3".into();
        config.bling.token_url = "http://127.0.0.1:9/oauth/token".into();
        config.bling.request_timeout_secs = 1;

        let ctx = AppContext::new(config).await.expect("context should initialise");
        Self { ctx: Arc::new(ctx), _temp_dir: temp_dir }
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
