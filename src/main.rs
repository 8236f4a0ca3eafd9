//! allowgate
//!
//! Temporary IP allow-list admission service.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                  ALLOWGATE                   │
//!                      │                                              │
//!   GET /allow         │  ┌──────┐   ┌──────────┐   ┌─────────────┐  │
//!   ───────────────────┼─▶│ http │──▶│ admission │──▶│  liststore  │──┼──▶ Cloudflare
//!                      │  └──────┘   │   gate    │   │ (REST API)  │  │    IP list
//!                      │             └─────┬─────┘   └──────▲──────┘  │
//!                      │                   │                │         │
//!                      │        failures / bans / liveness  │         │
//!                      │                   │                │         │
//!                      │             ┌─────▼─────┐   ┌──────┴──────┐  │
//!                      │             │ ban sweep │   │ reconciler  │  │
//!                      │             │ (5 min)   │   │ (hourly)    │  │
//!                      │             └───────────┘   └─────────────┘  │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use allowgate::admission::{AdmissionGate, BanRegistry, BanSweeper, FailureTracker, LivenessLog};
use allowgate::admission::gate::GatePolicy;
use allowgate::config;
use allowgate::http::HttpServer;
use allowgate::lifecycle::Shutdown;
use allowgate::liststore::{CloudflareListStore, ListStore};
use allowgate::observability;
use allowgate::reconcile::Reconciler;

#[derive(Parser)]
#[command(name = "allowgate")]
#[command(about = "Temporary IP allow-list admission service", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::logging::init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    tracing::info!(
        bind_address = %config.server.bind_address,
        "allowgate v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_exporter(addr),
            Err(err) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %err,
                "Failed to parse metrics address"
            ),
        }
    }

    // Effective policy summary, mirrored into one startup line.
    let mut policy_log = Vec::new();
    if config.allowlist.purge_enabled() {
        policy_log.push(format!("entry max age: {}m", config.allowlist.max_age_mins));
    } else {
        policy_log.push("age-based purge disabled".to_string());
    }
    if config.ban.enabled() {
        policy_log.push(format!(
            "ban: {}m after {} failed auths",
            config.ban.duration_mins, config.ban.threshold
        ));
    } else {
        policy_log.push("banning disabled".to_string());
    }
    tracing::info!("{}", policy_log.join(" | "));

    // Resolve the remote list before serving; refuse to run half-wired.
    let store: Arc<dyn ListStore> = Arc::new(CloudflareListStore::connect(&config.cloudflare).await?);

    let failures = Arc::new(FailureTracker::new());
    let bans = Arc::new(BanRegistry::new(config.ban.duration()));
    let liveness = Arc::new(LivenessLog::new());

    let gate = Arc::new(AdmissionGate::new(
        GatePolicy {
            secret: config.auth.secret.clone(),
            user: config.auth.user.clone(),
            prompt: config.auth.prompt,
            ban_threshold: if config.ban.enabled() { config.ban.threshold } else { 0 },
            label_prefix: config.allowlist.label_prefix.clone(),
        },
        failures.clone(),
        bans.clone(),
        liveness.clone(),
        store.clone(),
    ));

    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    if config.ban.enabled() {
        let sweeper = BanSweeper::new(bans, failures);
        tokio::spawn(sweeper.run(shutdown.subscribe()));
    }

    if config.allowlist.purge_enabled() {
        let reconciler = Reconciler::new(
            store,
            liveness,
            config.allowlist.max_age(),
            config.allowlist.label_prefix.clone(),
        );
        tokio::spawn(reconciler.run(shutdown.subscribe()));
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(&config, gate);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
