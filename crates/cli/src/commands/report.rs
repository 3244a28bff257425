//! All-units performance report

use std::sync::Arc;

use anyhow::Result;
use sentinel_lib::platform::GraphClient;
use sentinel_lib::report::PerformanceReporter;
use sentinel_lib::{InsightsWindow, Thresholds};
use tabled::Tabled;

use crate::output::{color_decision, format_count, format_money, print_table, OutputFormat};

/// Row for the performance report table
#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Ad")]
    ad: String,
    #[tabled(rename = "Impressions")]
    impressions: String,
    #[tabled(rename = "Clicks")]
    clicks: String,
    #[tabled(rename = "CTR %")]
    ctr: String,
    #[tabled(rename = "CPC")]
    cpc: String,
    #[tabled(rename = "Spend")]
    spend: String,
    #[tabled(rename = "Revenue")]
    revenue: String,
    #[tabled(rename = "ROAS")]
    roas: String,
    #[tabled(rename = "Decision")]
    decision: String,
}

pub async fn execute(
    graph: Arc<GraphClient>,
    days: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let window = match days {
        Some(days) => InsightsWindow::TrailingDays(days),
        None => InsightsWindow::Today,
    };

    let reporter = PerformanceReporter::new(graph, Thresholds::default());
    let rows = reporter.report(window).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Table => {
            let table_rows: Vec<ReportRow> = rows
                .iter()
                .map(|row| {
                    let decision = match row.reason {
                        Some(reason) => {
                            format!("{} ({})", color_decision(&row.decision), reason)
                        }
                        None => color_decision(&row.decision),
                    };
                    ReportRow {
                        ad: format!("{} ({})", row.name, row.unit_id),
                        impressions: format_count(row.impressions),
                        clicks: format_count(row.clicks),
                        ctr: format!("{:.2}", row.ctr),
                        cpc: format_money(row.cpc),
                        spend: format_money(row.spend),
                        revenue: format_money(row.revenue),
                        roas: format!("{:.2}", row.roas),
                        decision,
                    }
                })
                .collect();
            print_table(&table_rows);
        }
    }

    Ok(())
}
