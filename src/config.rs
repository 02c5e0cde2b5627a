//! Configuration types for catalog-sync
//!
//! Everything is read once at process start, normally from the environment
//! (see [`Config::from_env`]), and stays immutable for the whole run.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Remote GraphQL endpoint settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// GraphQL endpoint URL
    pub endpoint: String,

    /// Bearer token sent with every request
    pub token: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_secs_serde")]
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Retry configuration for transient failures
///
/// The wait before retry `n` (1-based) is `base_delay * n`, so with the
/// defaults the waits are 2s, 4s, 6s, 8s across five attempts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts including the first one (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base delay (default: 2 seconds)
    #[serde(default = "default_base_delay", with = "duration_millis_serde")]
    pub base_delay: Duration,

    /// Upper bound for a single wait (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_millis_serde")]
    pub max_delay: Duration,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            jitter: false,
        }
    }
}

/// Run-scoped import settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of import workers (default: 1)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pause after each imported item (default: none)
    #[serde(default, with = "duration_millis_serde")]
    pub item_delay: Duration,

    /// First flattened item to import; `None` means "use the checkpoint"
    #[serde(default)]
    pub offset: Option<usize>,

    /// Maximum number of items to import (None = all remaining)
    #[serde(default)]
    pub limit: Option<usize>,

    /// Skip wiping the remote catalog before rebuilding
    #[serde(default)]
    pub skip_reset: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            item_delay: Duration::ZERO,
            offset: None,
            limit: None,
            skip_reset: false,
        }
    }
}

/// Import checkpoint persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Whether progress is persisted (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// SQLite database path (default: "catalog-sync.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for a synchronization run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Remote endpoint
    pub api: ApiConfig,

    /// Channel every product is published into (default: "default-channel")
    #[serde(default = "default_channel_slug")]
    pub channel_slug: String,

    /// Catalog document path (default: "catalog.json")
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// Canonical product type name (default: "Catalog Product")
    #[serde(default = "default_product_type_name")]
    pub product_type_name: String,

    /// Worker pool, window and reset settings
    #[serde(default)]
    pub run: RunConfig,

    /// Retry policy for remote calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Checkpoint persistence
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

impl Config {
    /// Build a config for `endpoint`/`token` with every other setting at its default
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                endpoint: endpoint.into(),
                token: token.into(),
                request_timeout: default_request_timeout(),
            },
            channel_slug: default_channel_slug(),
            catalog_path: default_catalog_path(),
            product_type_name: default_product_type_name(),
            run: RunConfig::default(),
            retry: RetryConfig::default(),
            checkpoint: CheckpointConfig::default(),
        }
    }

    /// Load configuration from the process environment
    ///
    /// A `.env` file in the working directory is honored if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// `CATALOG_API_URL` and `CATALOG_API_TOKEN` are required; everything
    /// else falls back to its default. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let endpoint = get("CATALOG_API_URL")
            .ok_or_else(|| Error::config("CATALOG_API_URL", "CATALOG_API_URL is not set"))?;
        url::Url::parse(&endpoint).map_err(|e| {
            Error::config(
                "CATALOG_API_URL",
                format!("invalid endpoint URL {endpoint:?}: {e}"),
            )
        })?;
        let token = get("CATALOG_API_TOKEN")
            .ok_or_else(|| Error::config("CATALOG_API_TOKEN", "CATALOG_API_TOKEN is not set"))?;

        let mut config = Config::new(endpoint, token);

        if let Some(secs) = parse_var::<u64>(&get, "REQUEST_TIMEOUT_SECS")? {
            config.api.request_timeout = Duration::from_secs(secs);
        }
        if let Some(slug) = get("CHANNEL_SLUG") {
            config.channel_slug = slug;
        }
        if let Some(path) = get("CATALOG_PATH") {
            config.catalog_path = PathBuf::from(path);
        }
        if let Some(name) = get("PRODUCT_TYPE_NAME") {
            config.product_type_name = name;
        }

        if let Some(skip) = parse_bool(&get, "SKIP_RESET")? {
            config.run.skip_reset = skip;
        }
        if let Some(concurrency) = parse_var::<usize>(&get, "IMPORT_CONCURRENCY")? {
            if concurrency == 0 {
                return Err(Error::config(
                    "IMPORT_CONCURRENCY",
                    "IMPORT_CONCURRENCY must be at least 1",
                ));
            }
            config.run.concurrency = concurrency;
        }
        if let Some(ms) = parse_var::<u64>(&get, "IMPORT_DELAY_MS")? {
            config.run.item_delay = Duration::from_millis(ms);
        }
        config.run.offset = parse_var::<usize>(&get, "IMPORT_OFFSET")?;
        config.run.limit = parse_var::<usize>(&get, "IMPORT_LIMIT")?;

        if let Some(attempts) = parse_var::<u32>(&get, "RETRY_MAX_ATTEMPTS")? {
            if attempts == 0 {
                return Err(Error::config(
                    "RETRY_MAX_ATTEMPTS",
                    "RETRY_MAX_ATTEMPTS must be at least 1",
                ));
            }
            config.retry.max_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64>(&get, "RETRY_BASE_DELAY_MS")? {
            config.retry.base_delay = Duration::from_millis(ms);
        }

        if let Some(enabled) = parse_bool(&get, "CHECKPOINT_ENABLED")? {
            config.checkpoint.enabled = enabled;
        }
        if let Some(path) = get("CHECKPOINT_DB") {
            config.checkpoint.database_path = PathBuf::from(path);
        }

        Ok(config)
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::config(key, format!("invalid value {raw:?} for {key}: {e}"))),
        None => Ok(None),
    }
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    match get(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(Error::config(
                key,
                format!("invalid boolean {raw:?} for {key}"),
            )),
        },
        None => Ok(None),
    }
}

// Default value functions
fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_concurrency() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("catalog-sync.db")
}

fn default_channel_slug() -> String {
    "default-channel".to_string()
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("catalog.json")
}

fn default_product_type_name() -> String {
    "Catalog Product".to_string()
}

// Duration serialization helpers
mod duration_secs_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

pub(crate) mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
