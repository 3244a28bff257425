//! Single-unit decision check

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use sentinel_lib::notify::SlackNotifier;
use sentinel_lib::platform::GraphClient;
use sentinel_lib::{CycleOrchestrator, Thresholds};

use crate::output::{color_decision, format_count, format_money, OutputFormat};

pub async fn execute(
    graph: Arc<GraphClient>,
    account_id: &str,
    unit_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let orchestrator = CycleOrchestrator::new(
        graph.clone(),
        graph,
        Arc::new(SlackNotifier::disabled()),
        Thresholds::default(),
        account_id,
    );

    let diagnostic = orchestrator.unit_diagnostic(unit_id).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&diagnostic)?);
        }
        OutputFormat::Table => {
            let s = &diagnostic.snapshot;
            println!("{}", format!("Unit {unit_id}").bold());
            println!("{}", "=".repeat(40));
            println!(
                "Impressions: {}  Clicks: {}",
                format_count(s.impressions),
                format_count(s.clicks)
            );
            println!("CTR: {:.2}%  CPC: {}", s.ctr, format_money(s.cpc));
            println!(
                "Spend: {}  Revenue: {}",
                format_money(s.spend),
                format_money(s.revenue)
            );
            println!("ROAS: {:.2}  Conversions: {}", s.roas, s.conversions);
            match diagnostic.reason {
                Some(reason) => println!(
                    "Decision: {} ({})",
                    color_decision(&diagnostic.decision),
                    reason
                ),
                None => println!("Decision: {}", color_decision(&diagnostic.decision)),
            }
        }
    }

    Ok(())
}
