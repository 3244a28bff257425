//! Operator-facing diagnostics and performance reporting
//!
//! Read-only surfaces: a per-unit diagnostic (snapshot plus the decision the
//! policy would take) and an all-units report over a chosen window. Neither
//! performs any mutation.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::error::PlatformResult;
use crate::insights::MetricsFetcher;
use crate::models::{Decision, InsightsWindow, KillReason, PerformanceSnapshot};
use crate::platform::PlatformReadApi;
use crate::policy::{decide, Thresholds};

/// Trailing window used by reports when none is requested.
pub const DEFAULT_REPORT_WINDOW_DAYS: u32 = 7;

/// Snapshot and would-be decision for a single unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitDiagnostic {
    pub unit_id: String,
    pub snapshot: PerformanceSnapshot,
    pub decision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<KillReason>,
}

impl UnitDiagnostic {
    pub fn new(unit_id: impl Into<String>, snapshot: PerformanceSnapshot, decision: Decision) -> Self {
        Self {
            unit_id: unit_id.into(),
            snapshot,
            decision: decision.label().to_string(),
            reason: decision.kill_reason(),
        }
    }
}

/// One row of the all-units performance report.
#[derive(Debug, Clone, Serialize)]
pub struct UnitPerformanceRow {
    pub unit_id: String,
    pub name: String,
    pub impressions: u64,
    pub clicks: u64,
    pub spend: f64,
    pub ctr: f64,
    pub cpc: f64,
    pub conversions: u64,
    pub revenue: f64,
    pub roas: f64,
    pub decision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<KillReason>,
}

/// Builds performance reports over all active units.
pub struct PerformanceReporter {
    reads: Arc<dyn PlatformReadApi>,
    fetcher: MetricsFetcher,
    thresholds: Thresholds,
}

impl PerformanceReporter {
    pub fn new(reads: Arc<dyn PlatformReadApi>, thresholds: Thresholds) -> Self {
        Self {
            fetcher: MetricsFetcher::new(reads.clone()),
            reads,
            thresholds,
        }
    }

    /// Report on every active unit over the given window.
    ///
    /// The decision column reflects what the policy would do on the fetched
    /// snapshot; it matches the live kill decision only for the intraday
    /// window. Units whose metrics cannot be read are skipped with a warning
    /// so one bad unit does not sink the whole report.
    pub async fn report(
        &self,
        window: InsightsWindow,
    ) -> PlatformResult<Vec<UnitPerformanceRow>> {
        let units = self.reads.list_active_units().await?;
        let mut rows = Vec::with_capacity(units.len());

        for unit in units {
            let snapshot = match self.fetcher.fetch(&unit.id, window).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(unit_id = %unit.id, error = %e, "Skipping unit in report");
                    continue;
                }
            };

            let decision = decide(&snapshot, &self.thresholds);
            rows.push(UnitPerformanceRow {
                unit_id: unit.id,
                name: unit.name,
                impressions: snapshot.impressions,
                clicks: snapshot.clicks,
                spend: snapshot.spend,
                ctr: snapshot.ctr,
                cpc: snapshot.cpc,
                conversions: snapshot.conversions,
                revenue: snapshot.revenue,
                roas: snapshot.roas,
                decision: decision.label().to_string(),
                reason: decision.kill_reason(),
            });
        }

        Ok(rows)
    }
}
