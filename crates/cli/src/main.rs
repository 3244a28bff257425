//! Ad Sentinel operator CLI
//!
//! Command-line tool for running monitoring cycles, printing performance
//! reports, and checking single-unit decisions against the kill policy.

mod commands;
mod output;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sentinel_lib::platform::{GraphClient, GraphConfig};
use sentinel_lib::DEFAULT_MONITOR_INTERVAL_SECS;

/// Ad Sentinel CLI
#[derive(Parser)]
#[command(name = "adsctl")]
#[command(author, version, about = "CLI for the Ad Sentinel kill-switch", long_about = None)]
pub struct Cli {
    /// Graph API access token
    #[arg(long, env = "SENTINEL_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// Ad account identifier, with or without the act_ prefix
    #[arg(long, env = "SENTINEL_AD_ACCOUNT_ID")]
    pub ad_account_id: String,

    /// Graph API origin (overridable for testing)
    #[arg(
        long,
        env = "SENTINEL_GRAPH_API_BASE",
        default_value = "https://graph.facebook.com"
    )]
    pub graph_api_base: String,

    /// Slack webhook URL for action notifications
    #[arg(long, env = "SENTINEL_SLACK_WEBHOOK_URL")]
    pub slack_webhook_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Monitor active ads: pause losers, scale winners
    Run {
        /// Run a single cycle and exit instead of looping
        #[arg(long)]
        once: bool,

        /// Seconds between cycles when looping
        #[arg(long, default_value_t = DEFAULT_MONITOR_INTERVAL_SECS)]
        interval: u64,
    },

    /// Print a performance report for all active units (no actions taken)
    Report {
        /// Use a trailing window of this many days instead of today only
        #[arg(long)]
        days: Option<u32>,
    },

    /// Evaluate one unit against the policy without acting on it
    Check {
        /// Ad unit identifier
        unit_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("sentinel_lib=debug,info")
            .init();
    }

    let graph = Arc::new(GraphClient::new(GraphConfig {
        api_base: cli.graph_api_base.clone(),
        access_token: cli.access_token.clone(),
        account_id: cli.ad_account_id.clone(),
        ..GraphConfig::default()
    })?);

    match cli.command {
        Commands::Run { once, interval } => {
            commands::run::execute(
                graph,
                &cli.ad_account_id,
                cli.slack_webhook_url.clone(),
                once,
                interval,
            )
            .await
        }
        Commands::Report { days } => commands::report::execute(graph, days, cli.format).await,
        Commands::Check { unit_id } => {
            commands::check::execute(graph, &cli.ad_account_id, &unit_id, cli.format).await
        }
    }
}
