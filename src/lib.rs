//! Temporary IP allow-list admission service.
//!
//! Grants network-level access by adding a requester's address to a
//! remote allow-list behind a shared secret, bans credential guessers,
//! and purges grants that have gone stale.

pub mod admission;
pub mod config;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod liststore;
pub mod observability;
pub mod reconcile;

pub use admission::{AdmissionGate, AdmissionOutcome, RevokeOutcome};
pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
