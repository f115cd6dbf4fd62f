use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

use crate::types::app_config::{AppConfig, ConfigError};

pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    info!("Loading configuration from: {}", path.display());

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path.display());

    let config = parse_config(&contents)?;

    info!("Configuration loaded successfully");
    Ok(config)
}

/// Parse and validate a TOML document.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config: AppConfig = toml::from_str(contents)?;
    debug!("Config: {:?}", config);

    validate_config(&config)?;

    info!("Config validated");

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let base_url = config.api.resolved_base_url();
    if base_url.is_empty() {
        return Err(ConfigError::InvalidConfig(
            "api.base_url must be set via the SESSION_API_URL env var or the config file".into(),
        ));
    }

    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::InvalidConfig(format!(
            "api.base_url must be an http:// or https:// URL, got {:?}",
            base_url
        )));
    }

    if config.session.cache_ttl_secs == 0 {
        return Err(ConfigError::InvalidConfig(
            "cache_ttl_secs must be greater than 0".into(),
        ));
    }

    if config.session.token_cookie.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "token_cookie cannot be empty".into(),
        ));
    }

    if !config.session.home_path.starts_with('/') {
        return Err(ConfigError::InvalidConfig(
            "home_path must start with '/'".into(),
        ));
    }

    if config.storage.cookie_file.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "cookie_file cannot be empty".into(),
        ));
    }

    Ok(())
}
