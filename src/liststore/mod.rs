//! Remote allow-list capability.
//!
//! # Data Flow
//! ```text
//! AdmissionGate / Reconciler
//!     → ListStore trait (list / add / remove)
//!     → cloudflare.rs (REST calls, typed decode)
//! ```
//!
//! # Design Decisions
//! - The core only ever sees typed `RemoteListEntry` values; decoding
//!   untyped provider JSON stops at this boundary
//! - Removing an id the provider no longer has is not an error; another
//!   actor may have deleted it between list and remove

pub mod cloudflare;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use cloudflare::CloudflareListStore;

/// One entry on the remote allow-list, as decoded at the provider
/// boundary. The engine reads these to pick purge candidates and never
/// mutates fields directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteListEntry {
    /// Opaque provider key, used for deletion.
    pub id: String,
    /// Address or prefix the entry grants.
    pub ip: String,
    /// Free-text label; entries owned by this service carry the
    /// configured label prefix.
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// Failures at the list-store boundary.
#[derive(Debug, Error)]
pub enum ListStoreError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("unexpected upstream response: {0}")]
    Decode(String),

    #[error("list-store bootstrap failed: {0}")]
    Bootstrap(String),
}

/// Capability the core consumes; production wires the Cloudflare
/// implementation, tests inject a counting stub.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Fetch every entry currently on the remote list.
    async fn list_entries(&self) -> Result<Vec<RemoteListEntry>, ListStoreError>;

    /// Add an address with a display label; returns the provider's
    /// operation or item id.
    async fn add_entry(&self, ip: &str, label: &str) -> Result<String, ListStoreError>;

    /// Remove a batch of entries by id. Ids that are already gone are
    /// tolerated.
    async fn remove_entries(&self, ids: &[String]) -> Result<(), ListStoreError>;
}
