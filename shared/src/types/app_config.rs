use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::types::cache::DEFAULT_CACHE_TTL;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "SESSION_API_URL";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Root of the community backend, e.g. `"https://api.example.org/api"`.
    pub base_url: String,
    /// Per-request timeout. `0` leaves requests bounded only by the transport.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Cookie that carries the access token.
    #[serde(default = "default_token_cookie")]
    pub token_cookie: String,
    /// Where the user is sent after a logout.
    #[serde(default = "default_home_path")]
    pub home_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Cookie jar the token is read from (`name=value; name=value`).
    #[serde(default = "default_cookie_file")]
    pub cookie_file: String,
    /// Directory for the user/ban cache files. In-memory when unset.
    #[serde(default)]
    pub cache_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ApiConfig {
    /// Resolve the backend URL with `SESSION_API_URL` taking priority over
    /// the config file field. Trailing slashes are dropped.
    pub fn resolved_base_url(&self) -> String {
        std::env::var(API_URL_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.base_url.clone())
            .trim()
            .trim_end_matches('/')
            .to_string()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

impl SessionConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
            token_cookie: default_token_cookie(),
            home_path: default_home_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cookie_file: default_cookie_file(),
            cache_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

pub fn default_request_timeout() -> u64 {
    15
}

pub fn default_user_agent() -> String {
    concat!("session-orchestrator/", env!("CARGO_PKG_VERSION")).to_string()
}

pub fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL.as_secs()
}

pub fn default_token_cookie() -> String {
    "vatsim_token".to_string()
}

pub fn default_home_path() -> String {
    "/".to_string()
}

pub fn default_cookie_file() -> String {
    "cookies.txt".to_string()
}
