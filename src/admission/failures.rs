//! Consecutive authentication failure tracking.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::identity::ClientIdentity;

/// Failure streak for a single identity.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub count: u32,
    pub last_failure_at: DateTime<Utc>,
}

/// Counts consecutive authentication failures per identity.
///
/// Counters are never expired by age alone; they are removed on a
/// successful admission or when the owning ban is swept.
#[derive(Default)]
pub struct FailureTracker {
    records: DashMap<ClientIdentity, FailureRecord>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure and return the new consecutive count.
    ///
    /// The entry API keeps the read-modify-write atomic per identity,
    /// so concurrent failures are never lost.
    pub fn record_failure(&self, identity: &ClientIdentity, now: DateTime<Utc>) -> u32 {
        let mut record = self
            .records
            .entry(identity.clone())
            .or_insert(FailureRecord {
                count: 0,
                last_failure_at: now,
            });
        record.count += 1;
        record.last_failure_at = now;
        record.count
    }

    /// Drop the counter entirely (successful admission or swept ban).
    pub fn clear(&self, identity: &ClientIdentity) {
        self.records.remove(identity);
    }

    pub fn count(&self, identity: &ClientIdentity) -> u32 {
        self.records.get(identity).map(|r| r.count).unwrap_or(0)
    }
}
