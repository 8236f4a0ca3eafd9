//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML
//! config file; every field has a default so a minimal file (or none at
//! all, with env overrides) is enough to start.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener and request-shaping settings.
    pub server: ServerConfig,

    /// Shared-secret authentication settings.
    pub auth: AuthConfig,

    /// Failed-authentication ban policy.
    pub ban: BanConfig,

    /// Remote allow-list aging policy.
    pub allowlist: AllowListConfig,

    /// Cloudflare API wiring.
    pub cloudflare: CloudflareConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g. "0.0.0.0:8080").
    pub bind_address: String,

    /// Honor CF-Connecting-IP / True-Client-IP / X-Forwarded-For.
    pub trust_proxy: bool,

    /// Home route target: an https:// URL to redirect to, or a literal
    /// message rendered inline.
    pub home: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            trust_proxy: true,
            home: "https://github.com".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret; required, usually via ALLOWGATE_AUTH_SECRET.
    pub secret: String,

    /// Basic-auth user paired with the secret.
    pub user: String,

    /// Ask the browser for credentials when none are supplied.
    pub prompt: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            user: "allowgate".to_string(),
            prompt: true,
        }
    }
}

/// Ban policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BanConfig {
    /// Consecutive failures before a ban; 0 disables banning.
    pub threshold: u32,

    /// Ban length in minutes; 0 disables banning.
    pub duration_mins: u64,
}

impl Default for BanConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            duration_mins: 60,
        }
    }
}

impl BanConfig {
    pub fn enabled(&self) -> bool {
        self.threshold > 0 && self.duration_mins > 0
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_mins * 60)
    }
}

/// Allow-list aging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AllowListConfig {
    /// Maximum entry age in minutes; 0 disables age-based purging.
    pub max_age_mins: u64,

    /// Label prefix that tags entries this service owns.
    pub label_prefix: String,
}

impl Default for AllowListConfig {
    fn default() -> Self {
        Self {
            max_age_mins: 1440,
            label_prefix: "allowgate".to_string(),
        }
    }
}

impl AllowListConfig {
    pub fn purge_enabled(&self) -> bool {
        self.max_age_mins > 0
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_mins * 60)
    }
}

/// Cloudflare API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CloudflareConfig {
    /// API token; required, usually via ALLOWGATE_CF_TOKEN.
    pub token: String,

    /// Zone name the firewall rule lives in.
    pub zone: String,

    /// Account id; discovered from the token when empty.
    pub account_id: String,

    /// IP list id; discovered or created when empty.
    pub list_id: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Serve Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}
