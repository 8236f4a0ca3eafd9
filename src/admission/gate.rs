//! Admission orchestration.
//!
//! # Responsibilities
//! - Run the per-request state machine: normalize → ban check →
//!   credential check → remote grant + liveness mark
//! - Convert failure streaks into bans at the configured threshold
//! - Expose revoke and banned-listing operations to the HTTP layer
//!
//! # Design Decisions
//! - Outcomes are data, not errors; only an upstream list-store fault
//!   surfaces as `Err`
//! - No map guard is held across the list-store calls: local state is
//!   read and updated in short touches before and after the network I/O

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::admission::bans::BanRegistry;
use crate::admission::failures::FailureTracker;
use crate::admission::liveness::LivenessLog;
use crate::identity::{self, ClientIdentity};
use crate::liststore::{ListStore, ListStoreError};
use crate::observability::metrics;

/// Credential supplied with an admission or revocation request.
#[derive(Debug, Clone)]
pub enum Credential {
    /// `Authorization: Bearer <token>` style shared secret.
    Bearer(String),
    /// Decoded `Authorization: Basic` user/password pair.
    Basic { user: String, password: String },
    /// No usable credential was presented.
    Missing,
}

/// Result of an admission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// Secret accepted and the identity is on the remote list.
    /// `newly_added` is false when the entry was already present.
    Granted {
        identity: ClientIdentity,
        newly_added: bool,
    },
    /// Credential rejected; the failure was counted.
    Unauthorized,
    /// Identity is currently banned; nothing else was evaluated.
    Denied,
    /// No credential and prompting is enabled: the caller should be
    /// asked interactively.
    Prompt,
    /// The raw address could not be normalized.
    Invalid,
}

/// Result of a revocation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeOutcome {
    Removed { identity: ClientIdentity },
    /// No remote entry for the identity; success-shaped, not an error.
    NotFound { identity: ClientIdentity },
    Invalid,
}

/// Authentication policy consumed by the gate.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    /// Shared secret compared against bearer tokens and basic passwords.
    pub secret: String,
    /// Expected basic-auth user.
    pub user: String,
    /// Whether a missing credential should yield a prompt response.
    pub prompt: bool,
    /// Consecutive failures before a ban; 0 disables banning.
    pub ban_threshold: u32,
    /// Prefix joined into remote entry labels, and used to recognize
    /// entries this service owns.
    pub label_prefix: String,
}

enum CredentialCheck {
    Accepted,
    Rejected,
    Prompt,
}

/// Orchestrates admission, revocation, and ban visibility.
pub struct AdmissionGate {
    policy: GatePolicy,
    failures: Arc<FailureTracker>,
    bans: Arc<BanRegistry>,
    liveness: Arc<LivenessLog>,
    store: Arc<dyn ListStore>,
}

impl AdmissionGate {
    pub fn new(
        policy: GatePolicy,
        failures: Arc<FailureTracker>,
        bans: Arc<BanRegistry>,
        liveness: Arc<LivenessLog>,
        store: Arc<dyn ListStore>,
    ) -> Self {
        Self {
            policy,
            failures,
            bans,
            liveness,
            store,
        }
    }

    /// Run one admission attempt end-to-end.
    pub async fn admit(
        &self,
        raw_addr: &str,
        credential: Credential,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<AdmissionOutcome, ListStoreError> {
        let identity = match self.authorize(raw_addr, &credential, now) {
            Ok(identity) => identity,
            Err(outcome) => return Ok(outcome),
        };

        // Success: the streak and any lingering ban are gone before the
        // grant is attempted, so a transient upstream fault cannot leave
        // a healthy caller banned.
        self.failures.clear(&identity);
        self.bans.lift(&identity);

        let newly_added = self.grant(&identity, label).await?;
        self.liveness.mark(&identity, now);

        metrics::record_admission("granted");
        tracing::info!(
            identity = %identity,
            newly_added,
            device = label,
            "Admission granted"
        );
        Ok(AdmissionOutcome::Granted {
            identity,
            newly_added,
        })
    }

    /// Run one revocation attempt.
    ///
    /// Route authentication happens in the HTTP layer via
    /// [`AdmissionGate::authorize`]; revocation itself touches neither
    /// failure nor ban state.
    pub async fn revoke(&self, raw_addr: &str) -> Result<RevokeOutcome, ListStoreError> {
        let identity = match identity::normalize(raw_addr) {
            Ok(identity) => identity,
            Err(err) => {
                tracing::debug!(addr = raw_addr, error = %err, "Rejected revoke address");
                return Ok(RevokeOutcome::Invalid);
            }
        };

        let entries = self.store.list_entries().await?;
        let ids: Vec<String> = entries
            .iter()
            .filter(|entry| entry.ip == identity.as_str())
            .map(|entry| entry.id.clone())
            .collect();

        if ids.is_empty() {
            tracing::info!(identity = %identity, "Revoke target not on the list");
            return Ok(RevokeOutcome::NotFound { identity });
        }

        self.store.remove_entries(&ids).await?;
        tracing::info!(identity = %identity, entries = ids.len(), "Admission revoked");
        Ok(RevokeOutcome::Removed { identity })
    }

    /// Active bans as identity → banned-at, for operator visibility.
    pub fn list_banned(&self) -> BTreeMap<String, DateTime<Utc>> {
        self.bans.snapshot()
    }

    /// Shared authentication path: normalize, ban check, credential
    /// check, failure accounting. `Ok` carries the authorized identity;
    /// `Err` carries the outcome to surface.
    pub fn authorize(
        &self,
        raw_addr: &str,
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> Result<ClientIdentity, AdmissionOutcome> {
        let identity = match identity::normalize(raw_addr) {
            Ok(identity) => identity,
            Err(err) => {
                tracing::debug!(addr = raw_addr, error = %err, "Rejected client address");
                metrics::record_admission("invalid");
                return Err(AdmissionOutcome::Invalid);
            }
        };

        // A banned caller pays no further penalty; the ban itself is the
        // penalty and repeated attempts do not extend it.
        if self.bans.is_banned(&identity, now) {
            tracing::warn!(identity = %identity, "Request from banned identity");
            metrics::record_admission("denied");
            return Err(AdmissionOutcome::Denied);
        }

        match self.check_credential(credential) {
            CredentialCheck::Accepted => Ok(identity),
            CredentialCheck::Prompt => {
                metrics::record_admission("prompt");
                Err(AdmissionOutcome::Prompt)
            }
            CredentialCheck::Rejected => {
                let count = self.failures.record_failure(&identity, now);
                if self.policy.ban_threshold > 0 && count >= self.policy.ban_threshold {
                    self.bans.ban(&identity, now);
                    metrics::record_ban_issued();
                    tracing::warn!(identity = %identity, count, "Identity banned");
                } else {
                    tracing::warn!(identity = %identity, count, "Authentication failed");
                }
                metrics::record_admission("unauthorized");
                Err(AdmissionOutcome::Unauthorized)
            }
        }
    }

    fn check_credential(&self, credential: &Credential) -> CredentialCheck {
        match credential {
            Credential::Bearer(token) => {
                if *token == self.policy.secret {
                    CredentialCheck::Accepted
                } else {
                    CredentialCheck::Rejected
                }
            }
            Credential::Basic { user, password } => {
                if *user == self.policy.user && *password == self.policy.secret {
                    CredentialCheck::Accepted
                } else {
                    CredentialCheck::Rejected
                }
            }
            Credential::Missing => {
                if self.policy.prompt {
                    CredentialCheck::Prompt
                } else {
                    CredentialCheck::Rejected
                }
            }
        }
    }

    /// Idempotent remote add: an identity already on the list is a
    /// success that must not create a duplicate entry.
    async fn grant(&self, identity: &ClientIdentity, label: &str) -> Result<bool, ListStoreError> {
        let entries = self.store.list_entries().await?;
        if entries.iter().any(|entry| entry.ip == identity.as_str()) {
            tracing::info!(identity = %identity, "Already on the allow list");
            return Ok(false);
        }

        let full_label = format!("{}: {}", self.policy.label_prefix, label);
        self.store.add_entry(identity.as_str(), &full_label).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liststore::testing::StubListStore;

    fn gate_with(store: Arc<StubListStore>, threshold: u32, prompt: bool) -> AdmissionGate {
        AdmissionGate::new(
            GatePolicy {
                secret: "s3cret".to_string(),
                user: "allowgate".to_string(),
                prompt,
                ban_threshold: threshold,
                label_prefix: "allowgate".to_string(),
            },
            Arc::new(FailureTracker::new()),
            Arc::new(BanRegistry::new(std::time::Duration::from_secs(3600))),
            Arc::new(LivenessLog::new()),
            store,
        )
    }

    fn bearer(token: &str) -> Credential {
        Credential::Bearer(token.to_string())
    }

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let store = Arc::new(StubListStore::new());
        let gate = gate_with(store.clone(), 5, true);
        let now = Utc::now();

        let first = gate
            .admit("203.0.113.7", bearer("s3cret"), "laptop", now)
            .await
            .unwrap();
        assert!(matches!(
            first,
            AdmissionOutcome::Granted { newly_added: true, .. }
        ));

        let second = gate
            .admit("203.0.113.7", bearer("s3cret"), "laptop", now)
            .await
            .unwrap();
        assert!(matches!(
            second,
            AdmissionOutcome::Granted { newly_added: false, .. }
        ));

        // Only one remote add for the two grants.
        assert_eq!(store.add_calls(), 1);
    }

    #[tokio::test]
    async fn test_failures_escalate_to_ban() {
        let store = Arc::new(StubListStore::new());
        let gate = gate_with(store, 5, true);
        let now = Utc::now();

        for _ in 0..4 {
            let outcome = gate
                .admit("203.0.113.7", bearer("wrong"), "laptop", now)
                .await
                .unwrap();
            assert_eq!(outcome, AdmissionOutcome::Unauthorized);
        }

        // Fourth failure has not crossed the threshold yet.
        assert!(gate.list_banned().is_empty());

        let fifth = gate
            .admit("203.0.113.7", bearer("wrong"), "laptop", now)
            .await
            .unwrap();
        assert_eq!(fifth, AdmissionOutcome::Unauthorized);
        assert!(gate.list_banned().contains_key("203.0.113.7"));

        // Even a valid secret is now denied before credential checks.
        let denied = gate
            .admit("203.0.113.7", bearer("s3cret"), "laptop", now)
            .await
            .unwrap();
        assert_eq!(denied, AdmissionOutcome::Denied);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let store = Arc::new(StubListStore::new());
        let gate = gate_with(store, 5, true);
        let now = Utc::now();

        for _ in 0..3 {
            gate.admit("203.0.113.7", bearer("wrong"), "laptop", now)
                .await
                .unwrap();
        }
        gate.admit("203.0.113.7", bearer("s3cret"), "laptop", now)
            .await
            .unwrap();

        // The next three failures start a fresh streak; no ban at 5 total.
        for _ in 0..3 {
            gate.admit("203.0.113.7", bearer("wrong"), "laptop", now)
                .await
                .unwrap();
        }
        assert!(gate.list_banned().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_prompts_or_counts() {
        let store = Arc::new(StubListStore::new());
        let gate = gate_with(store.clone(), 5, true);
        let now = Utc::now();

        let outcome = gate
            .admit("203.0.113.7", Credential::Missing, "laptop", now)
            .await
            .unwrap();
        assert_eq!(outcome, AdmissionOutcome::Prompt);

        // A prompt is not an authentication failure.
        let no_prompt = gate_with(store, 2, false);
        assert_eq!(
            no_prompt
                .admit("203.0.113.7", Credential::Missing, "laptop", now)
                .await
                .unwrap(),
            AdmissionOutcome::Unauthorized
        );
        assert_eq!(
            no_prompt
                .admit("203.0.113.7", Credential::Missing, "laptop", now)
                .await
                .unwrap(),
            AdmissionOutcome::Unauthorized
        );
        assert!(no_prompt.list_banned().contains_key("203.0.113.7"));
    }

    #[tokio::test]
    async fn test_basic_credential_accepted() {
        let store = Arc::new(StubListStore::new());
        let gate = gate_with(store, 5, true);
        let now = Utc::now();

        let outcome = gate
            .admit(
                "203.0.113.7",
                Credential::Basic {
                    user: "allowgate".to_string(),
                    password: "s3cret".to_string(),
                },
                "phone",
                now,
            )
            .await
            .unwrap();
        assert!(matches!(outcome, AdmissionOutcome::Granted { .. }));
    }

    #[tokio::test]
    async fn test_invalid_address_changes_nothing() {
        let store = Arc::new(StubListStore::new());
        let gate = gate_with(store.clone(), 5, true);
        let now = Utc::now();

        let outcome = gate
            .admit("127.0.0.1", bearer("s3cret"), "laptop", now)
            .await
            .unwrap();
        assert_eq!(outcome, AdmissionOutcome::Invalid);
        assert_eq!(store.add_calls(), 0);
    }

    #[tokio::test]
    async fn test_revoke_roundtrip() {
        let store = Arc::new(StubListStore::new());
        let gate = gate_with(store.clone(), 5, true);
        let now = Utc::now();

        // Nothing granted yet: success-shaped not-found.
        let missing = gate.revoke("203.0.113.7").await.unwrap();
        assert!(matches!(missing, RevokeOutcome::NotFound { .. }));

        gate.admit("203.0.113.7", bearer("s3cret"), "laptop", now)
            .await
            .unwrap();
        let removed = gate.revoke("203.0.113.7").await.unwrap();
        assert!(matches!(removed, RevokeOutcome::Removed { .. }));
        assert!(store.entries().is_empty());

        // Revocation left ban/failure state untouched.
        assert!(gate.list_banned().is_empty());
    }

    #[tokio::test]
    async fn test_ipv6_admission_is_widened() {
        let store = Arc::new(StubListStore::new());
        let gate = gate_with(store.clone(), 5, true);
        let now = Utc::now();

        gate.admit("2001:db8:0:0:1:2:3:4", bearer("s3cret"), "laptop", now)
            .await
            .unwrap();

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ip, "2001:db8:0:0::/64");
        assert!(entries[0].label.starts_with("allowgate"));
    }
}
