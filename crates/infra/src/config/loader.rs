//! Configuration loader
//!
//! ## Loading Strategy
//! 1. If `STOCKSYNC_DB_PATH` is set, build the config from defaults plus
//!    environment variables
//! 2. Otherwise search for a config file (JSON or TOML)
//! 3. Environment overrides are applied on top of a file config as well, so
//!    secrets can stay out of the file
//!
//! ## Environment Variables
//! - `STOCKSYNC_DB_PATH`: Database file path (required for env-only loading)
//! - `STOCKSYNC_DB_POOL_SIZE`: Connection pool size
//! - `STOCKSYNC_BLING_API_BASE_URL`, `STOCKSYNC_BLING_TOKEN_URL`
//! - `STOCKSYNC_BLING_CLIENT_ID`, `STOCKSYNC_BLING_CLIENT_SECRET`,
//!   `STOCKSYNC_BLING_REFRESH_TOKEN`: seed the credential store
//! - `STOCKSYNC_WEBHOOK_SECRET`: HMAC secret for webhook signatures
//! - `STOCKSYNC_SYNC_SCHEDULED_ENABLED`: cron-triggered full sync (true/false)
//! - `STOCKSYNC_NOTIFY_RELAY_URL`, `STOCKSYNC_NOTIFY_RECIPIENT`
//! - `STOCKSYNC_BIND_ADDRESS`: HTTP listen address
//! - `STOCKSYNC_LOG_FORMAT`: `pretty` or `json`
//!
//! ## File Locations
//! `stocksync.{toml,json}` then `config.{toml,json}`, looked up in the
//! working directory, its two parents, and next to the executable.

use std::path::{Path, PathBuf};

use stocksync_domain::{Config, LogFormat, Result, StockSyncError};

const ENV_DB_PATH: &str = "STOCKSYNC_DB_PATH";
const CONFIG_FILE_NAMES: [&str; 4] =
    ["stocksync.toml", "stocksync.json", "config.toml", "config.json"];

/// Load configuration from the environment, falling back to a config file.
///
/// # Errors
/// Returns `StockSyncError::Config` if neither source yields a valid
/// configuration.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Environment configuration incomplete, trying file");
            load_from_file(None)
        }
    }
}

/// Build configuration from defaults and `STOCKSYNC_*` variables.
///
/// # Errors
/// Returns `StockSyncError::Config` when `STOCKSYNC_DB_PATH` is missing or
/// a variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::with_database_path(env_var(ENV_DB_PATH)?);
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Load configuration from a file, then apply environment overrides.
///
/// With `path = None` the standard locations are searched, see
/// [`find_config_path`].
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(StockSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_path().ok_or_else(|| {
            StockSyncError::Config(format!(
                "{ENV_DB_PATH} is not set and no config file was found"
            ))
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| StockSyncError::Config(format!("Failed to read config file: {e}")))?;

    let mut config = parse_config(&contents, &config_path)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| StockSyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| StockSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(StockSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations.
pub fn find_config_path() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(pool_size) = env_opt("STOCKSYNC_DB_POOL_SIZE") {
        config.database.pool_size = pool_size
            .parse::<u32>()
            .map_err(|e| StockSyncError::Config(format!("Invalid pool size: {e}")))?;
    }

    let bling = &mut config.bling;
    if let Some(url) = env_opt("STOCKSYNC_BLING_API_BASE_URL") {
        bling.api_base_url = url;
    }
    if let Some(url) = env_opt("STOCKSYNC_BLING_TOKEN_URL") {
        bling.token_url = url;
    }
    if let Some(client_id) = env_opt("STOCKSYNC_BLING_CLIENT_ID") {
        bling.client_id = Some(client_id);
    }
    if let Some(secret) = env_opt("STOCKSYNC_BLING_CLIENT_SECRET") {
        bling.client_secret = Some(secret);
    }
    if let Some(token) = env_opt("STOCKSYNC_BLING_REFRESH_TOKEN") {
        bling.refresh_token = Some(token);
    }

    if let Some(secret) = env_opt("STOCKSYNC_WEBHOOK_SECRET") {
        config.webhook.secret = Some(secret);
    }

    config.sync.scheduled_enabled =
        env_bool("STOCKSYNC_SYNC_SCHEDULED_ENABLED", config.sync.scheduled_enabled);

    if let Some(url) = env_opt("STOCKSYNC_NOTIFY_RELAY_URL") {
        config.notifications.relay_url = Some(url);
    }
    if let Some(recipient) = env_opt("STOCKSYNC_NOTIFY_RECIPIENT") {
        config.notifications.recipient = Some(recipient);
    }

    if let Some(address) = env_opt("STOCKSYNC_BIND_ADDRESS") {
        config.server.bind_address = address;
    }
    if let Some(format) = env_opt("STOCKSYNC_LOG_FORMAT") {
        config.server.log_format = match format.to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => {
                return Err(StockSyncError::Config(format!("Invalid log format: {other}")));
            }
        };
    }

    Ok(())
}

fn env_var(key: &str) -> Result<String> {
    env_opt(key)
        .ok_or_else(|| StockSyncError::Config(format!("Missing environment variable: {key}")))
}

/// Set and non-blank.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use tempfile::{Builder, NamedTempFile};

    use super::*;

    // Environment variables are process-global.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: [&str; 13] = [
        "STOCKSYNC_DB_PATH",
        "STOCKSYNC_DB_POOL_SIZE",
        "STOCKSYNC_BLING_API_BASE_URL",
        "STOCKSYNC_BLING_TOKEN_URL",
        "STOCKSYNC_BLING_CLIENT_ID",
        "STOCKSYNC_BLING_CLIENT_SECRET",
        "STOCKSYNC_BLING_REFRESH_TOKEN",
        "STOCKSYNC_WEBHOOK_SECRET",
        "STOCKSYNC_SYNC_SCHEDULED_ENABLED",
        "STOCKSYNC_NOTIFY_RELAY_URL",
        "STOCKSYNC_NOTIFY_RECIPIENT",
        "STOCKSYNC_BIND_ADDRESS",
        "STOCKSYNC_LOG_FORMAT",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    fn temp_config(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn env_requires_database_path() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, StockSyncError::Config(msg) if msg.contains("STOCKSYNC_DB_PATH")));
    }

    #[test]
    fn env_overrides_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("STOCKSYNC_DB_PATH", "/tmp/stocksync.db");
        std::env::set_var("STOCKSYNC_DB_POOL_SIZE", "4");
        std::env::set_var("STOCKSYNC_WEBHOOK_SECRET", "hook");
        std::env::set_var("STOCKSYNC_SYNC_SCHEDULED_ENABLED", "no");
        std::env::set_var("STOCKSYNC_LOG_FORMAT", "JSON");

        let config = load_from_env().unwrap();
        clear_env();

        assert_eq!(config.database.path, "/tmp/stocksync.db");
        assert_eq!(config.database.pool_size, 4);
        assert_eq!(config.webhook.secret.as_deref(), Some("hook"));
        assert!(!config.sync.scheduled_enabled);
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.sync.max_retries, 3);
    }

    #[test]
    fn invalid_pool_size_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("STOCKSYNC_DB_PATH", "db.sqlite");
        std::env::set_var("STOCKSYNC_DB_POOL_SIZE", "many");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(StockSyncError::Config(_))));
    }

    #[test]
    fn loads_toml_file_with_env_secret() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("STOCKSYNC_BLING_CLIENT_SECRET", "from-env");

        let file = temp_config(
            ".toml",
            "[database]\npath = \"file.db\"\n\n[bling]\nclient_id = \"abc\"\n\n[sync]\nmax_retries = 5\n",
        );
        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();
        clear_env();

        assert_eq!(config.database.path, "file.db");
        assert_eq!(config.bling.client_id.as_deref(), Some("abc"));
        assert_eq!(config.bling.client_secret.as_deref(), Some("from-env"));
        assert_eq!(config.sync.max_retries, 5);
    }

    #[test]
    fn loads_json_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let file = temp_config(".json", r#"{"database":{"path":"j.db","pool_size":2}}"#);
        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.database.path, "j.db");
        assert_eq!(config.database.pool_size, 2);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let file = temp_config(".toml", "[database\npath = ");
        let err = load_from_file(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, StockSyncError::Config(msg) if msg.contains("TOML")));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/stocksync.toml"))).unwrap_err();
        assert!(matches!(err, StockSyncError::Config(msg) if msg.contains("not found")));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = parse_config("", Path::new("config.yaml")).unwrap_err();
        assert!(matches!(err, StockSyncError::Config(msg) if msg.contains("yaml")));
    }
}
