//! Performance snapshot retrieval and shaping
//!
//! Turns raw platform insight rows into [`PerformanceSnapshot`]s: derives
//! conversions and revenue from the action breakdowns, computes ROAS, and
//! substitutes an all-zero snapshot when the platform has no data for a
//! unit. Pure read path, no side effects.

use std::sync::Arc;

use tracing::debug;

use crate::error::{PlatformError, PlatformResult};
use crate::models::{InsightsWindow, PerformanceSnapshot};
use crate::platform::{InsightsRow, PlatformReadApi};

/// Action types counted as conversions.
const CONVERSION_ACTION_TYPES: &[&str] =
    &["purchase", "lead", "complete_registration", "omni_purchase"];

/// Action types whose values sum into revenue.
const REVENUE_ACTION_TYPES: &[&str] = &["purchase", "omni_purchase"];

/// Fetches windowed performance snapshots for single units.
pub struct MetricsFetcher {
    reads: Arc<dyn PlatformReadApi>,
}

impl MetricsFetcher {
    pub fn new(reads: Arc<dyn PlatformReadApi>) -> Self {
        Self { reads }
    }

    /// Fetch a snapshot for one unit over the given window.
    ///
    /// A `MetricsUnavailable` response is not an error here: a freshly
    /// created unit has no insight rows yet and must still be evaluated. It
    /// becomes an all-zero snapshot, which falls through every decision tier
    /// to keep since all sample-size gates require positive volume.
    pub async fn fetch(
        &self,
        unit_id: &str,
        window: InsightsWindow,
    ) -> PlatformResult<PerformanceSnapshot> {
        let row = match self.reads.get_insights(unit_id, window).await {
            Ok(row) => row,
            Err(PlatformError::MetricsUnavailable { .. }) => {
                debug!(unit_id, "No insight data, treating as zero activity");
                return Ok(PerformanceSnapshot::default());
            }
            Err(e) => return Err(e),
        };

        Ok(shape(row))
    }
}

/// Shape a raw insight row into a snapshot.
///
/// CTR and CPC pass through untouched so decisions line up with the platform
/// UI; ROAS is the one derived metric (zero when nothing was spent).
pub fn shape(row: InsightsRow) -> PerformanceSnapshot {
    let conversions = row
        .actions
        .iter()
        .filter(|a| CONVERSION_ACTION_TYPES.contains(&a.action_type.as_str()))
        .map(|a| a.value)
        .sum();

    let revenue: f64 = row
        .action_values
        .iter()
        .filter(|a| REVENUE_ACTION_TYPES.contains(&a.action_type.as_str()))
        .map(|a| a.value)
        .sum();

    let roas = if row.spend > 0.0 {
        revenue / row.spend
    } else {
        0.0
    };

    PerformanceSnapshot {
        impressions: row.impressions,
        clicks: row.clicks,
        spend: row.spend,
        ctr: row.ctr,
        cpc: row.cpc,
        conversions,
        revenue,
        roas,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdUnit, BudgetGroup};
    use crate::platform::{ActionCount, ActionValue};
    use async_trait::async_trait;

    struct StubReads {
        result: fn(&str) -> PlatformResult<InsightsRow>,
    }

    #[async_trait]
    impl PlatformReadApi for StubReads {
        async fn list_active_units(&self) -> PlatformResult<Vec<AdUnit>> {
            Ok(vec![])
        }

        async fn get_insights(
            &self,
            unit_id: &str,
            _window: InsightsWindow,
        ) -> PlatformResult<InsightsRow> {
            (self.result)(unit_id)
        }

        async fn get_budget_group(&self, _adset_id: &str) -> PlatformResult<BudgetGroup> {
            Err(PlatformError::read("get_budget_group", "not stubbed"))
        }
    }

    fn purchase_row() -> InsightsRow {
        InsightsRow {
            impressions: 2000,
            clicks: 40,
            spend: 8000.0,
            ctr: 2.0,
            cpc: 200.0,
            actions: vec![
                ActionCount {
                    action_type: "purchase".to_string(),
                    value: 3,
                },
                ActionCount {
                    action_type: "lead".to_string(),
                    value: 2,
                },
                ActionCount {
                    action_type: "link_click".to_string(),
                    value: 40,
                },
            ],
            action_values: vec![
                ActionValue {
                    action_type: "purchase".to_string(),
                    value: 30_000.0,
                },
                ActionValue {
                    action_type: "omni_purchase".to_string(),
                    value: 10_000.0,
                },
                ActionValue {
                    action_type: "lead".to_string(),
                    value: 999.0,
                },
            ],
        }
    }

    #[test]
    fn test_shape_derives_conversions_and_revenue() {
        let snapshot = shape(purchase_row());

        // purchase + lead count; link_click does not
        assert_eq!(snapshot.conversions, 5);
        // purchase + omni_purchase values; lead value does not
        assert_eq!(snapshot.revenue, 40_000.0);
        assert_eq!(snapshot.roas, 5.0);
    }

    #[test]
    fn test_shape_passes_ratio_metrics_through() {
        let snapshot = shape(purchase_row());
        assert_eq!(snapshot.ctr, 2.0);
        assert_eq!(snapshot.cpc, 200.0);
    }

    #[test]
    fn test_shape_zero_spend_means_zero_roas() {
        let row = InsightsRow {
            spend: 0.0,
            action_values: vec![ActionValue {
                action_type: "purchase".to_string(),
                value: 500.0,
            }],
            ..InsightsRow::default()
        };
        assert_eq!(shape(row).roas, 0.0);
    }

    #[tokio::test]
    async fn test_fetch_substitutes_zero_snapshot_when_unavailable() {
        let fetcher = MetricsFetcher::new(Arc::new(StubReads {
            result: |unit_id| {
                Err(PlatformError::MetricsUnavailable {
                    unit_id: unit_id.to_string(),
                })
            },
        }));

        let snapshot = fetcher.fetch("ad1", InsightsWindow::Today).await.unwrap();
        assert_eq!(snapshot, PerformanceSnapshot::default());
    }

    #[tokio::test]
    async fn test_fetch_propagates_read_errors() {
        let fetcher = MetricsFetcher::new(Arc::new(StubReads {
            result: |_| Err(PlatformError::read("get_insights", "HTTP 500")),
        }));

        let err = fetcher.fetch("ad1", InsightsWindow::Today).await.unwrap_err();
        assert!(!err.is_metrics_unavailable());
    }
}
