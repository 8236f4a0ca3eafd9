//! Time-boxed bans for identities that keep failing authentication.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

use crate::admission::failures::FailureTracker;
use crate::identity::ClientIdentity;
use crate::observability::metrics;

/// How often expired bans are swept out of the registry.
pub const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(5 * 60);

/// An active ban for one identity.
#[derive(Debug, Clone)]
pub struct Ban {
    pub banned_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Registry of active bans.
///
/// `is_banned` is the correctness boundary: a ban past its expiry reads
/// as not-banned even before the sweeper removes it.
pub struct BanRegistry {
    bans: DashMap<ClientIdentity, Ban>,
    duration: Duration,
}

impl BanRegistry {
    pub fn new(duration: StdDuration) -> Self {
        Self {
            bans: DashMap::new(),
            duration: Duration::from_std(duration).unwrap_or(Duration::MAX),
        }
    }

    /// Ban an identity, refreshing `banned_at` if one already exists.
    pub fn ban(&self, identity: &ClientIdentity, now: DateTime<Utc>) {
        let ban = Ban {
            banned_at: now,
            expires_at: now + self.duration,
        };
        self.bans.insert(identity.clone(), ban);
    }

    pub fn is_banned(&self, identity: &ClientIdentity, now: DateTime<Utc>) -> bool {
        self.bans
            .get(identity)
            .map(|ban| ban.expires_at > now)
            .unwrap_or(false)
    }

    /// Remove a ban outright (successful authenticated admission).
    pub fn lift(&self, identity: &ClientIdentity) {
        self.bans.remove(identity);
    }

    /// Remove every ban past its expiry, returning the affected identities.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<ClientIdentity> {
        let mut unbanned = Vec::new();
        self.bans.retain(|identity, ban| {
            if ban.expires_at <= now {
                unbanned.push(identity.clone());
                false
            } else {
                true
            }
        });
        unbanned
    }

    /// Snapshot of active bans as identity → banned-at, sorted by identity.
    pub fn snapshot(&self) -> BTreeMap<String, DateTime<Utc>> {
        self.bans
            .iter()
            .map(|entry| (entry.key().as_str().to_string(), entry.value().banned_at))
            .collect()
    }
}

/// Periodic task that expires bans and resets their failure streaks.
pub struct BanSweeper {
    bans: Arc<BanRegistry>,
    failures: Arc<FailureTracker>,
}

impl BanSweeper {
    pub fn new(bans: Arc<BanRegistry>, failures: Arc<FailureTracker>) -> Self {
        Self { bans, failures }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(SWEEP_INTERVAL);
        // The immediate first tick is a no-op sweep; nothing can have
        // expired before the service has issued a ban.
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once(Utc::now());
                }
                _ = shutdown.recv() => {
                    tracing::info!("Ban sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn sweep_once(&self, now: DateTime<Utc>) {
        let unbanned = self.bans.sweep_expired(now);
        for identity in &unbanned {
            self.failures.clear(identity);
            tracing::warn!(identity = %identity, "Ban expired, identity unblocked");
        }
        if !unbanned.is_empty() {
            metrics::record_bans_expired(unbanned.len());
        }
    }
}
