//! Run monitoring cycles from the command line

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use sentinel_lib::notify::SlackNotifier;
use sentinel_lib::platform::GraphClient;
use sentinel_lib::{CycleOrchestrator, CycleSummary, Thresholds};
use tokio::sync::broadcast;

use crate::output::{format_count, print_info};

pub async fn execute(
    graph: Arc<GraphClient>,
    account_id: &str,
    slack_webhook_url: Option<String>,
    once: bool,
    interval_secs: u64,
) -> Result<()> {
    let notifier = Arc::new(SlackNotifier::new(slack_webhook_url));
    let orchestrator = CycleOrchestrator::new(
        graph.clone(),
        graph,
        notifier,
        Thresholds::default(),
        account_id,
    );

    if once {
        let summary = orchestrator.run_cycle().await?;
        print_summary(&summary);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    print_info(&format!(
        "Monitoring every {interval_secs}s, Ctrl-C to stop"
    ));
    orchestrator
        .run_forever(Duration::from_secs(interval_secs), shutdown_rx)
        .await;

    Ok(())
}

fn print_summary(summary: &CycleSummary) {
    println!();
    println!("{}", "Cycle complete".bold());
    println!("{}", "=".repeat(40));
    println!("Total ads: {}", format_count(summary.total as u64));
    println!("Kept:      {}", format_count(summary.kept as u64));

    let paused = format_count(summary.paused as u64);
    if summary.paused > 0 {
        println!("Paused:    {}", paused.yellow());
    } else {
        println!("Paused:    {}", paused);
    }

    let scaled = format_count(summary.scaled as u64);
    if summary.scaled > 0 {
        println!("Scaled:    {}", scaled.green());
    } else {
        println!("Scaled:    {}", scaled);
    }

    let errors = format_count(summary.errors as u64);
    if summary.errors > 0 {
        println!("Errors:    {}", errors.red());
    } else {
        println!("Errors:    {}", errors);
    }
}
