//! Allow-list reconciliation.
//!
//! # Responsibilities
//! - Decide which remote entries have outlived their welcome
//! - Purge them in one batch, tolerating concurrent removals
//!
//! # Design Decisions
//! - The purge decision is a pure function of (now, entries, liveness),
//!   so the policy is testable without any network
//! - An entry with recent local traffic survives even when it is
//!   chronologically old; absence of a liveness mark reads as idle
//!   forever
//! - A failed cycle is skipped, never fatal; the next tick retries

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;
use tokio::time;

use crate::admission::liveness::LivenessLog;
use crate::identity;
use crate::liststore::{ListStore, ListStoreError, RemoteListEntry};
use crate::observability::metrics;

/// How often the remote list is reconciled against local liveness.
pub const RECONCILE_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);

/// Compute the ids to purge from the remote list.
///
/// An entry is purge-eligible only when this service owns it (label
/// prefix match) and both its age and its local idle time exceed
/// `max_age`.
pub fn purge_set(
    now: DateTime<Utc>,
    entries: &[RemoteListEntry],
    max_age: Duration,
    label_prefix: &str,
    liveness: &LivenessLog,
) -> Vec<String> {
    let mut ids = Vec::new();

    for entry in entries {
        if !entry.label.starts_with(label_prefix) {
            continue;
        }
        if now - entry.created_at <= max_age {
            continue;
        }

        // Re-normalize the stored address so widened IPv6 entries join
        // the liveness map on the same key; normalization is idempotent
        // for entries that are already prefixes.
        let recently_seen = identity::normalize(&entry.ip)
            .ok()
            .and_then(|id| liveness.last_seen(&id))
            .map(|seen| now - seen <= max_age)
            .unwrap_or(false);

        if recently_seen {
            tracing::debug!(ip = %entry.ip, "Entry is old but still in use, keeping");
            continue;
        }

        tracing::info!(ip = %entry.ip, id = %entry.id, "Entry marked for removal");
        ids.push(entry.id.clone());
    }

    ids
}

/// Periodic task that applies [`purge_set`] through the list store.
pub struct Reconciler {
    store: Arc<dyn ListStore>,
    liveness: Arc<LivenessLog>,
    max_age: Duration,
    label_prefix: String,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ListStore>,
        liveness: Arc<LivenessLog>,
        max_age: StdDuration,
        label_prefix: String,
    ) -> Self {
        Self {
            store,
            liveness,
            max_age: Duration::from_std(max_age).unwrap_or(Duration::MAX),
            label_prefix,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        // The interval fires immediately, so the first reconciliation
        // runs at startup rather than an hour in.
        let mut ticker = time::interval(RECONCILE_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.run_once(Utc::now()).await {
                        metrics::record_upstream_error("reconcile");
                        tracing::error!(error = %err, "Reconciliation cycle failed, will retry next tick");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Reconciler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn run_once(&self, now: DateTime<Utc>) -> Result<(), ListStoreError> {
        let entries = self.store.list_entries().await?;
        let ids = purge_set(now, &entries, self.max_age, &self.label_prefix, &self.liveness);

        // A zero-length purge batch must not turn into a delete call.
        if ids.is_empty() {
            tracing::debug!(entries = entries.len(), "Nothing to purge");
            return Ok(());
        }

        self.store.remove_entries(&ids).await?;
        metrics::record_entries_purged(ids.len());
        tracing::info!(removed = ids.len(), "Purged expired allow-list entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::normalize;

    fn entry(id: &str, ip: &str, label: &str, created_at: DateTime<Utc>) -> RemoteListEntry {
        RemoteListEntry {
            id: id.to_string(),
            ip: ip.to_string(),
            label: label.to_string(),
            created_at,
        }
    }

    #[test]
    fn test_old_idle_entry_is_purged() {
        let now = Utc::now();
        let liveness = LivenessLog::new();
        let entries = vec![entry(
            "e1",
            "203.0.113.7",
            "allowgate: laptop",
            now - Duration::minutes(120),
        )];

        let ids = purge_set(now, &entries, Duration::minutes(60), "allowgate", &liveness);
        assert_eq!(ids, vec!["e1".to_string()]);
    }

    #[test]
    fn test_recent_traffic_overrides_age() {
        let now = Utc::now();
        let liveness = LivenessLog::new();
        liveness.mark(
            &normalize("203.0.113.7").unwrap(),
            now - Duration::minutes(10),
        );
        let entries = vec![entry(
            "e1",
            "203.0.113.7",
            "allowgate: laptop",
            now - Duration::minutes(120),
        )];

        let ids = purge_set(now, &entries, Duration::minutes(60), "allowgate", &liveness);
        assert!(ids.is_empty());
    }

    #[test]
    fn test_young_entry_survives() {
        let now = Utc::now();
        let liveness = LivenessLog::new();
        let entries = vec![entry(
            "e1",
            "203.0.113.7",
            "allowgate: laptop",
            now - Duration::minutes(30),
        )];

        let ids = purge_set(now, &entries, Duration::minutes(60), "allowgate", &liveness);
        assert!(ids.is_empty());
    }

    #[test]
    fn test_foreign_entries_never_touched() {
        let now = Utc::now();
        let liveness = LivenessLog::new();
        let entries = vec![
            entry("e1", "203.0.113.7", "added by hand", now - Duration::days(30)),
            entry("e2", "203.0.113.8", "", now - Duration::days(30)),
        ];

        let ids = purge_set(now, &entries, Duration::minutes(60), "allowgate", &liveness);
        assert!(ids.is_empty());
    }

    #[test]
    fn test_widened_entry_joins_liveness_on_prefix_key() {
        let now = Utc::now();
        let liveness = LivenessLog::new();
        // The admission path marked the widened /64 identity.
        liveness.mark(
            &normalize("2001:db8:0:0:1:2:3:4").unwrap(),
            now - Duration::minutes(5),
        );
        let entries = vec![entry(
            "e1",
            "2001:db8:0:0::/64",
            "allowgate: phone",
            now - Duration::days(3),
        )];

        let ids = purge_set(now, &entries, Duration::minutes(60), "allowgate", &liveness);
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_empty_purge_issues_no_delete() {
        use crate::liststore::testing::StubListStore;

        let store = Arc::new(StubListStore::new());
        store.seed(entry(
            "e1",
            "203.0.113.7",
            "allowgate: laptop",
            Utc::now() - Duration::minutes(5),
        ));

        let reconciler = Reconciler::new(
            store.clone(),
            Arc::new(LivenessLog::new()),
            StdDuration::from_secs(3600),
            "allowgate".to_string(),
        );
        reconciler.run_once(Utc::now()).await.unwrap();

        // Entry was too young; it must still be there.
        assert_eq!(store.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_cycle_purges_stale_entries() {
        use crate::liststore::testing::StubListStore;

        let store = Arc::new(StubListStore::new());
        let now = Utc::now();
        store.seed(entry(
            "stale",
            "203.0.113.7",
            "allowgate: laptop",
            now - Duration::days(3),
        ));
        store.seed(entry(
            "fresh",
            "203.0.113.8",
            "allowgate: phone",
            now - Duration::minutes(10),
        ));

        let reconciler = Reconciler::new(
            store.clone(),
            Arc::new(LivenessLog::new()),
            StdDuration::from_secs(24 * 3600),
            "allowgate".to_string(),
        );
        reconciler.run_once(now).await.unwrap();

        let remaining = store.entries();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "fresh");
    }
}
