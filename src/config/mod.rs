//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → env overrides (ALLOWGATE_*)
//!     → semantic validation
//!     → AppConfig (validated, immutable)
//!     → passed by value into constructors at startup
//! ```

pub mod loader;
pub mod schema;

pub use loader::{load, ConfigError};
pub use schema::{
    AllowListConfig, AppConfig, AuthConfig, BanConfig, CloudflareConfig, ObservabilityConfig,
    ServerConfig,
};
