//! Application context - dependency injection container

mod background;

use std::sync::Arc;

use stocksync_common::clock::{Clock, SystemClock};
use stocksync_core::{
    AccessTokenProvider, BlingSyncExecutor, CatalogStore, CredentialStore, OrchestratorConfig,
    SyncJobConfig, SyncOrchestrator, TokenLifecycleConfig, TokenLifecycleManager, WebhookPipeline,
    WebhookRouter,
};
use stocksync_domain::{Config, Result, StockSyncError};
use stocksync_infra::{
    notifier_from_config, BlingClient, BlingTokenRefresher, DbManager, SqliteCatalogStore,
    SqliteCredentialStore, SqliteSyncRunRepository, SqliteWebhookEventRepository,
};
use tracing::{info, warn};

pub use background::BackgroundJobs;

use crate::utils::health::{ComponentHealth, HealthStatus};

/// Application context - holds all services and dependencies
pub struct AppContext {
    /// Loaded configuration
    pub config: Config,
    /// Connection pool
    pub db: Arc<DbManager>,
    /// Time source shared by every service
    pub clock: Arc<dyn Clock>,
    /// Sync run coordinator
    pub orchestrator: SyncOrchestrator,
    /// Webhook verification and dispatch
    pub webhooks: Arc<WebhookPipeline>,
    /// OAuth token lifecycle
    pub tokens: Arc<TokenLifecycleManager>,
}

impl AppContext {
    /// Open the database, apply migrations and wire every service.
    ///
    /// # Errors
    /// Fails when the database cannot be opened or migrated, an HTTP client
    /// cannot be built, or seeding the credential store fails.
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    /// Same as [`AppContext::new`] with an explicit clock.
    pub async fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;

        let tokens = Arc::new(create_token_manager(&config, &db, &clock)?);
        seed_credential(&config, &tokens).await?;

        let catalog: Arc<dyn CatalogStore> = Arc::new(SqliteCatalogStore::new(Arc::clone(&db)));
        let orchestrator = create_orchestrator(&config, &db, &clock, &tokens, &catalog)?;

        let webhooks = Arc::new(WebhookPipeline::new(
            Arc::new(SqliteWebhookEventRepository::new(Arc::clone(&db))),
            WebhookRouter::new(catalog),
            Arc::clone(&clock),
            config.webhook.secret.clone(),
        ));
        if config.webhook.secret.is_none() {
            warn!("No webhook secret configured; deliveries will be answered 500");
        }

        info!(database = %db.path().display(), "Application context initialised");
        Ok(Self { config, db, clock, orchestrator, webhooks, tokens })
    }

    /// Component health plus the integration flag.
    pub async fn health_check(&self) -> HealthStatus {
        let mut status = HealthStatus::new(self.clock.now());

        status = status.add_component(match self.db.health_check() {
            Ok(()) => ComponentHealth::healthy("database"),
            Err(err) => ComponentHealth::unhealthy("database", err.to_string()),
        });
        status = status.add_component(if self.config.webhook.secret.is_some() {
            ComponentHealth::healthy("webhook_secret")
        } else {
            ComponentHealth::unhealthy("webhook_secret", "not configured")
        });

        status.calculate_score();
        status
    }
}

fn create_token_manager(
    config: &Config,
    db: &Arc<DbManager>,
    clock: &Arc<dyn Clock>,
) -> Result<TokenLifecycleManager> {
    let store: Arc<dyn CredentialStore> =
        Arc::new(SqliteCredentialStore::new(Arc::clone(db), Arc::clone(clock)));
    let refresher = BlingTokenRefresher::from_config(&config.bling)?;

    Ok(TokenLifecycleManager::new(
        store,
        Arc::new(refresher),
        notifier_from_config(&config.notifications),
        Arc::clone(clock),
        TokenLifecycleConfig::from(&config.token),
    ))
}

async fn seed_credential(config: &Config, tokens: &TokenLifecycleManager) -> Result<()> {
    let bling = &config.bling;
    match (bling.client_id.as_deref(), bling.client_secret.as_deref()) {
        (Some(client_id), Some(client_secret)) => {
            tokens.bootstrap(client_id, client_secret, bling.refresh_token.as_deref()).await?;
        }
        _ => warn!("Bling client credentials not configured; relying on the stored credential"),
    }
    Ok(())
}

fn create_orchestrator(
    config: &Config,
    db: &Arc<DbManager>,
    clock: &Arc<dyn Clock>,
    tokens: &Arc<TokenLifecycleManager>,
    catalog: &Arc<dyn CatalogStore>,
) -> Result<SyncOrchestrator> {
    let provider: Arc<dyn AccessTokenProvider> = tokens.clone();
    let api = BlingClient::from_config(&config.bling, provider, Arc::clone(clock))
        .map_err(|err| StockSyncError::Config(format!("failed to build Bling client: {err}")))?;

    let executor = BlingSyncExecutor::new(
        Arc::new(api),
        Arc::clone(catalog),
        Arc::clone(clock),
        SyncJobConfig {
            page_size: config.bling.page_size,
            sales_lookback_days: config.sync.sales_lookback_days,
            ..SyncJobConfig::default()
        },
    );

    Ok(SyncOrchestrator::new(
        Arc::new(SqliteSyncRunRepository::new(Arc::clone(db))),
        Arc::new(executor),
        Arc::clone(clock),
        OrchestratorConfig::from(&config.sync),
    ))
}
