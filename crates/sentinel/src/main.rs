//! Ad Sentinel - automated ad performance kill-switch
//!
//! Long-running agent that monitors every active ad unit on a fixed
//! interval, pauses underperformers, and scales the budget of winners.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sentinel_lib::health::components;
use sentinel_lib::notify::SlackNotifier;
use sentinel_lib::platform::{GraphClient, GraphConfig};
use sentinel_lib::{CycleOrchestrator, EventLogger, HealthRegistry, MonitorMetrics};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const SENTINEL_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting ad-sentinel");

    let config = config::SentinelConfig::load()?;
    info!(account = %config.ad_account_id, "Sentinel configured");

    let interval = Duration::from_secs(config.monitor_interval_secs);

    // Platform client, shared by the read and write seams
    let graph = Arc::new(GraphClient::new(GraphConfig {
        api_base: config.graph_api_base.clone(),
        api_version: config.graph_api_version.clone(),
        access_token: config.access_token.clone(),
        account_id: config.ad_account_id.clone(),
        ..GraphConfig::default()
    })?);

    let notifier = Arc::new(SlackNotifier::new(config.slack_webhook_url.clone()));
    if !notifier.enabled() {
        info!("No Slack webhook configured, notifications disabled");
    }

    // Health registry backing the liveness/readiness probes
    let health = HealthRegistry::new();
    health.register(components::PLATFORM).await;
    health.register(components::MONITOR_LOOP).await;
    health.register(components::NOTIFIER).await;
    if !notifier.enabled() {
        health
            .set_degraded(components::NOTIFIER, "no webhook configured")
            .await;
    }

    let metrics = MonitorMetrics::new();

    let logger = EventLogger::new(config.ad_account_id.clone());
    logger.log_startup(SENTINEL_VERSION, interval);

    let orchestrator = CycleOrchestrator::new(
        graph.clone(),
        graph,
        notifier,
        config.thresholds(),
        config.ad_account_id.clone(),
    )
    .with_health(health.clone());

    // Health and metrics server
    let app_state = Arc::new(api::AppState::new(
        health.clone(),
        metrics,
        orchestrator.last_cycle_handle(),
    ));
    tokio::spawn(api::serve(config.api_port, app_state));

    health.set_ready(true).await;

    // Graceful shutdown on interrupt: the in-flight cycle is abandoned at
    // its next await point and the loop exits.
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    orchestrator.run_forever(interval, shutdown_rx).await;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
