//! Metrics collection and exposition.
//!
//! # Metrics
//! - `allowgate_admissions_total` (counter): admission attempts by outcome
//! - `allowgate_bans_issued_total` (counter): bans issued
//! - `allowgate_bans_expired_total` (counter): bans lifted by the sweeper
//! - `allowgate_entries_purged_total` (counter): remote entries removed
//!   by reconciliation
//! - `allowgate_upstream_errors_total` (counter): failed list-store
//!   operations by call site
//!
//! # Design Decisions
//! - Recording helpers are no-ops until an exporter is installed, so
//!   the hot path never branches on whether metrics are enabled

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
pub fn init_exporter(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(err) => tracing::error!(error = %err, "Failed to install metrics exporter"),
    }
}

pub fn record_admission(outcome: &'static str) {
    counter!("allowgate_admissions_total", "outcome" => outcome).increment(1);
}

pub fn record_ban_issued() {
    counter!("allowgate_bans_issued_total").increment(1);
}

pub fn record_bans_expired(count: usize) {
    counter!("allowgate_bans_expired_total").increment(count as u64);
}

pub fn record_entries_purged(count: usize) {
    counter!("allowgate_entries_purged_total").increment(count as u64);
}

pub fn record_upstream_error(operation: &'static str) {
    counter!("allowgate_upstream_errors_total", "operation" => operation).increment(1);
}
