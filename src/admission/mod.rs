//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → gate.rs (normalize identity, ban check, credential check)
//!     → failures.rs (count consecutive auth failures)
//!     → bans.rs (issue / consult time-boxed bans)
//!     → list-store add + liveness.rs mark on success
//!
//! Background:
//!     bans.rs sweeper unbans expired identities every 5 minutes
//! ```
//!
//! # Design Decisions
//! - All three maps are keyed by normalized identity; DashMap shards
//!   serialize access at identity granularity
//! - `now` is an argument everywhere, so tests own the clock
//! - A banned caller is rejected before credential validation and does
//!   not advance the failure counter

pub mod bans;
pub mod failures;
pub mod gate;
pub mod liveness;

pub use bans::{BanRegistry, BanSweeper};
pub use failures::FailureTracker;
pub use gate::{AdmissionGate, AdmissionOutcome, Credential, RevokeOutcome};
pub use liveness::LivenessLog;
