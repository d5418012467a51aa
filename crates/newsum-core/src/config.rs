use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::ApiShape;
use crate::retry::{RetryOn, RetryPolicy};

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable selecting the default model.
pub const MODEL_ENV: &str = "OPENAI_MODEL";
/// Environment variable overriding `api.base_url`.
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
/// Model used when neither `--model` nor `OPENAI_MODEL` is set.
pub const FALLBACK_MODEL: &str = "gpt-3.5-turbo";

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per row (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
    /// "any" retries every failure; "transient" only timeouts, throttling and 5xx.
    #[serde(default)]
    pub retry_on: RetryOn,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_secs: 1.0,
            max_delay_secs: 60,
            retry_on: RetryOn::Any,
        }
    }
}

impl RetryConfig {
    /// Fails when `base_delay_secs` does not fit in a `Duration` (e.g. `inf`, `1e30`).
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        let secs = self.base_delay_secs;
        let base_delay = Duration::try_from_secs_f64(secs.max(0.0))
            .with_context(|| format!("retry.base_delay_secs = {secs} is out of range"))?;
        Ok(RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(self.max_delay_secs),
            retry_on: self.retry_on,
        })
    }
}

/// Text-generation endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL; the shape's path is appended (e.g. `chat/completions`).
    pub base_url: String,
    /// Which request/response layout the endpoint speaks.
    #[serde(default)]
    pub shape: ApiShape,
    pub max_tokens: u32,
    pub temperature: f64,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            shape: ApiShape::Chat,
            max_tokens: 256,
            temperature: 0.2,
            connect_timeout_secs: 15,
            timeout_secs: 120,
        }
    }
}

/// Global configuration loaded from `~/.config/newsum/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsumConfig {
    /// Pause after each successful call, in milliseconds (rate limiting).
    pub pacing_ms: u64,
    /// Append-only JSON Lines file for rows that failed.
    pub error_log: PathBuf,
    #[serde(default)]
    pub api: ApiConfig,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for NewsumConfig {
    fn default() -> Self {
        Self {
            pacing_ms: 300,
            error_log: PathBuf::from("errors.log"),
            api: ApiConfig::default(),
            retry: None,
        }
    }
}

impl NewsumConfig {
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        match &self.retry {
            Some(retry) => retry.to_policy(),
            None => Ok(RetryPolicy::default()),
        }
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Pretty TOML, as written to the config file.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply environment overrides (`OPENAI_BASE_URL`).
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = non_empty_env(BASE_URL_ENV) {
            self.api.base_url = url;
        }
        self
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("newsum")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<NewsumConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Same as [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<NewsumConfig> {
    if !path.exists() {
        let default_cfg = NewsumConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: NewsumConfig = toml::from_str(&data)?;
    cfg.retry_policy()
        .with_context(|| format!("invalid [retry] section in {}", path.display()))?;
    Ok(cfg)
}

/// API credential. Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// No credential was found and the run needs one.
#[derive(Debug, thiserror::Error)]
#[error(
    "OPENAI_API_KEY not set. Copy .env.example to .env and set your key, \
     pass --api-key, or run with --dry-run."
)]
pub struct MissingCredential;

/// Load `.env` from the working directory, if present. Existing environment
/// variables win over the file.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("ignoring unreadable .env: {}", e),
    }
}

/// Resolve the credential: explicit argument, then `OPENAI_API_KEY`, then none.
pub fn resolve_api_key(explicit: Option<&str>) -> Option<ApiKey> {
    resolve_api_key_from(explicit, non_empty_env(API_KEY_ENV))
}

fn resolve_api_key_from(explicit: Option<&str>, env: Option<String>) -> Option<ApiKey> {
    explicit
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(ApiKey::new)
        .or_else(|| env.map(ApiKey::new))
}

/// Resolve the model: explicit argument, then `OPENAI_MODEL`, then [`FALLBACK_MODEL`].
pub fn resolve_model(explicit: Option<&str>) -> String {
    resolve_model_from(explicit, non_empty_env(MODEL_ENV))
}

fn resolve_model_from(explicit: Option<&str>, env: Option<String>) -> String {
    explicit
        .map(str::to_string)
        .or(env)
        .unwrap_or_else(|| FALLBACK_MODEL.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
