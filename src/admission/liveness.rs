//! Last-seen marks for successfully admitted identities.
//!
//! The reconciler consults these to keep actively-used allow-list
//! entries alive past their chronological age. Marks are never deleted;
//! a stale mark is harmless and absence reads as "never seen".

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::identity::ClientIdentity;

#[derive(Default)]
pub struct LivenessLog {
    marks: DashMap<ClientIdentity, DateTime<Utc>>,
}

impl LivenessLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, identity: &ClientIdentity, now: DateTime<Utc>) {
        self.marks.insert(identity.clone(), now);
    }

    pub fn last_seen(&self, identity: &ClientIdentity) -> Option<DateTime<Utc>> {
        self.marks.get(identity).map(|seen| *seen)
    }
}
