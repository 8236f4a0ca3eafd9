//! Configuration loading and validation.
//!
//! # Responsibilities
//! - Parse the TOML config file (optional; defaults apply without one)
//! - Apply `ALLOWGATE_*` environment overrides so secrets stay out of
//!   files
//! - Run semantic validation, reporting every problem at once
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload path
//! - Validation separates syntactic (serde) from semantic checks

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Load, override, and validate the service configuration.
pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config);

    let errors = validate(&config);
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.join("; ")));
    }

    Ok(config)
}

fn apply_env_overrides(config: &mut AppConfig) {
    let overrides: [(&str, &mut String); 6] = [
        ("ALLOWGATE_AUTH_SECRET", &mut config.auth.secret),
        ("ALLOWGATE_CF_TOKEN", &mut config.cloudflare.token),
        ("ALLOWGATE_CF_ZONE", &mut config.cloudflare.zone),
        ("ALLOWGATE_CF_ACCOUNT_ID", &mut config.cloudflare.account_id),
        ("ALLOWGATE_CF_LIST_ID", &mut config.cloudflare.list_id),
        ("ALLOWGATE_BIND_ADDRESS", &mut config.server.bind_address),
    ];

    for (name, slot) in overrides {
        if let Ok(value) = std::env::var(name) {
            if !value.is_empty() {
                *slot = value;
            }
        }
    }
}

/// Semantic validation; returns all problems, not just the first.
fn validate(config: &AppConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.auth.secret.is_empty() {
        errors.push("auth.secret is required (set ALLOWGATE_AUTH_SECRET)".to_string());
    }
    if config.cloudflare.token.is_empty() {
        errors.push("cloudflare.token is required (set ALLOWGATE_CF_TOKEN)".to_string());
    }
    if config.cloudflare.zone.is_empty() && config.cloudflare.list_id.is_empty() {
        errors.push(
            "cloudflare.zone is required unless cloudflare.list_id is set".to_string(),
        );
    }
    if config.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(format!(
            "server.bind_address is not a valid socket address: {}",
            config.server.bind_address
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push("server.request_timeout_secs must be positive".to_string());
    }
    if config.allowlist.label_prefix.is_empty() {
        errors.push("allowlist.label_prefix must not be empty".to_string());
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(format!(
            "observability.metrics_address is not a valid socket address: {}",
            config.observability.metrics_address
        ));
    }

    errors
}
