//! courtside-claim - assign legacy subscription purchases to players
//!
//! Resolves configuration (CLI > env > TOML > defaults), loads the
//! guardian's claim session from the league API and runs one command.

use anyhow::{Context, Result};
use clap::Parser;
use courtside_claim::cli::{self, Args};
use courtside_claim::{ClaimSession, HttpLeagueApi, SessionOptions};
use courtside_common::config::ConfigResolver;
use courtside_common::events::EventBus;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigResolver::new(args.overrides())
        .resolve()
        .context("Failed to resolve configuration")?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "Starting courtside-claim v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("League API: {}", config.base_url);

    let api = HttpLeagueApi::new(&config)?;
    let options = SessionOptions {
        strategy: args.strategy.build(),
        dashboard_url: config.dashboard_url(),
        events: EventBus::new(100),
    };

    let session = ClaimSession::load(Arc::new(api), options)
        .await
        .context("Failed to load claim session")?;

    cli::run(&session, &args.command).await
}
