//! Shared utilities for integration testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use allowgate::admission::gate::GatePolicy;
use allowgate::admission::{AdmissionGate, BanRegistry, FailureTracker, LivenessLog};
use allowgate::config::AppConfig;
use allowgate::http::{build_router, AppState};
use allowgate::liststore::{ListStore, ListStoreError, RemoteListEntry};

/// In-memory list store that counts add calls, so tests can assert the
/// idempotent-add property.
#[derive(Default)]
pub struct CountingListStore {
    entries: Mutex<Vec<RemoteListEntry>>,
    add_calls: AtomicUsize,
    next_id: AtomicUsize,
}

impl CountingListStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn entries(&self) -> Vec<RemoteListEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListStore for CountingListStore {
    async fn list_entries(&self) -> Result<Vec<RemoteListEntry>, ListStoreError> {
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn add_entry(&self, ip: &str, label: &str) -> Result<String, ListStoreError> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        let id = format!("test-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.entries.lock().unwrap().push(RemoteListEntry {
            id: id.clone(),
            ip: ip.to_string(),
            label: label.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn remove_entries(&self, ids: &[String]) -> Result<(), ListStoreError> {
        self.entries
            .lock()
            .unwrap()
            .retain(|entry| !ids.contains(&entry.id));
        Ok(())
    }
}

/// Build the production router over a counting stub store.
pub fn test_app(store: Arc<CountingListStore>) -> axum::Router {
    let mut config = AppConfig::default();
    config.auth.secret = "s3cret".to_string();

    let failures = Arc::new(FailureTracker::new());
    let bans = Arc::new(BanRegistry::new(config.ban.duration()));
    let liveness = Arc::new(LivenessLog::new());

    let gate = Arc::new(AdmissionGate::new(
        GatePolicy {
            secret: config.auth.secret.clone(),
            user: config.auth.user.clone(),
            prompt: config.auth.prompt,
            ban_threshold: config.ban.threshold,
            label_prefix: config.allowlist.label_prefix.clone(),
        },
        failures,
        bans,
        liveness,
        store,
    ));

    let state = AppState {
        gate,
        server: config.server.clone(),
    };
    build_router(state, Duration::from_secs(config.server.request_timeout_secs))
}
