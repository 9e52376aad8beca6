//! Command-line front end for the claim workflow
//!
//! Each invocation loads a fresh session (server truth), performs one
//! command and prints any notifications raised along the way.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use courtside_common::api::EntityId;
use courtside_common::config::ConfigOverrides;
use courtside_common::events::ClaimEvent;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::flatten::{FirstSubscription, RoundRobinByPosition, SubscriptionStrategy};
use crate::players::NewPlayerForm;
use crate::session::{ClaimSession, Completion};
use crate::submitter::SubmitterState;

/// Command-line arguments for courtside-claim
#[derive(Parser, Debug)]
#[command(name = "courtside-claim")]
#[command(about = "Assign legacy subscription purchases to players")]
#[command(version)]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// League API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Bearer token for the guardian's session
    #[arg(long)]
    pub token: Option<String>,

    /// Per-request timeout in seconds (default: none)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// How units are matched to legacy subscriptions
    #[arg(long, value_enum, default_value_t = StrategyArg::RoundRobin)]
    pub strategy: StrategyArg,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config.clone(),
            base_url: self.base_url.clone(),
            api_token: self.token.clone(),
            request_timeout_secs: self.timeout_secs,
            log_level: self.log_level.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Global unit position modulo subscription count
    RoundRobin,
    /// Always the record's first subscription
    First,
}

impl StrategyArg {
    pub fn build(self) -> Arc<dyn SubscriptionStrategy> {
        match self {
            StrategyArg::RoundRobin => Arc::new(RoundRobinByPosition),
            StrategyArg::First => Arc::new(FirstSubscription),
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show assigned and unassigned units
    List,
    /// Show the guardian's players
    Players,
    /// Assign one unit to a player
    Assign {
        /// Unit key as shown by `list`, e.g. 12-A-0
        #[arg(long)]
        unit: String,
        /// Player id as shown by `players`
        #[arg(long)]
        player: String,
    },
    /// Add a new player to the roster
    CreatePlayer {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    /// Defer assignment and return to the dashboard
    Skip,
}

/// Run one command against a loaded session
pub async fn run(session: &ClaimSession, command: &Command) -> Result<()> {
    let mut notifications = session.events().subscribe();
    let result = execute(session, command).await;
    print_notifications(&mut notifications);
    result
}

async fn execute(session: &ClaimSession, command: &Command) -> Result<()> {
    match command {
        Command::List => {
            print_units(session).await;
            print_completion(session).await;
        }
        Command::Players => {
            let roster = session.roster().await?;
            if roster.is_empty() {
                println!("No players yet. Use `create-player` to add one.");
            }
            for player in roster {
                println!("{:<12} {}", player.id, player.display_name());
            }
        }
        Command::Assign { unit, player } => {
            let outcome = session.assign(unit, EntityId::new(player.trim())).await?;
            if let SubmitterState::Selecting {
                last_error: Some(message),
                ..
            } = &outcome
            {
                bail!("{} was not assigned: {}", unit, message);
            }
            print_completion(session).await;
        }
        Command::CreatePlayer {
            first_name,
            last_name,
        } => {
            let form = NewPlayerForm::new(first_name.as_str(), last_name.as_str());
            let player = session.create_player(&form).await?;
            println!("{:<12} {}", player.id, player.display_name());
        }
        Command::Skip => {
            let redirect = session.skip().await?;
            println!("Continue at {}", redirect.to);
        }
    }
    Ok(())
}

async fn print_units(session: &ClaimSession) {
    let view = session.view().await;

    println!("Unassigned ({}):", view.unassigned.len());
    for unit in &view.unassigned {
        println!(
            "  {:<16} {:<8} {}",
            unit.unique_key,
            unit.item_type.to_string(),
            unit.label()
        );
    }

    println!("Assigned ({}):", view.assigned.len());
    for assigned in &view.assigned {
        println!(
            "  {:<16} {:<8} {} -> {}",
            assigned.unit.unique_key,
            assigned.unit.item_type.to_string(),
            assigned.unit.label(),
            assigned.player_id
        );
    }
}

async fn print_completion(session: &ClaimSession) {
    match session.completion().await {
        Completion::AllAssigned(redirect) => {
            println!("All purchases are assigned. Continue at {}", redirect.to);
        }
        Completion::InProgress { remaining } => {
            println!("{} unit(s) left to assign", remaining);
        }
    }
}

fn print_notifications(rx: &mut broadcast::Receiver<ClaimEvent>) {
    while let Ok(event) = rx.try_recv() {
        if let Some(text) = event.notification() {
            if event.is_error() {
                eprintln!("! {}", text);
            } else {
                eprintln!("* {}", text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assign() {
        let args = Args::try_parse_from([
            "courtside-claim",
            "--base-url",
            "https://league.example.org",
            "assign",
            "--unit",
            "1-A-0",
            "--player",
            "p1",
        ])
        .unwrap();

        assert_eq!(args.strategy, StrategyArg::RoundRobin);
        assert_eq!(
            args.command,
            Command::Assign {
                unit: "1-A-0".to_string(),
                player: "p1".to_string()
            }
        );
        assert_eq!(
            args.overrides().base_url.as_deref(),
            Some("https://league.example.org")
        );
    }

    #[test]
    fn test_parse_strategy_and_create_player() {
        let args = Args::try_parse_from([
            "courtside-claim",
            "--strategy",
            "first",
            "create-player",
            "--first-name",
            "Sam",
            "--last-name",
            "Jordan",
        ])
        .unwrap();

        assert_eq!(args.strategy, StrategyArg::First);
        assert_eq!(args.strategy.build().name(), "first");
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["courtside-claim"]).is_err());
    }
}
