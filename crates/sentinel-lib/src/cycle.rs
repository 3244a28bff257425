//! Cycle orchestration and the monitoring loop
//!
//! Drives fetch -> decide -> execute for every active unit, isolating
//! per-unit failures so one bad unit never aborts the batch, and aggregates
//! the outcome counters. The interval loop wraps single cycles and owns
//! graceful shutdown; it survives any number of failed cycles.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::error::PlatformResult;
use crate::executor::{ActionExecutor, ScaleOutcome, ScalingPolicy};
use crate::health::{components, HealthRegistry};
use crate::insights::MetricsFetcher;
use crate::models::{AdUnit, CycleSummary, Decision, InsightsWindow};
use crate::notify::SlackNotifier;
use crate::observability::{EventLogger, MonitorMetrics};
use crate::platform::{PlatformReadApi, PlatformWriteApi};
use crate::policy::{decide, Thresholds};
use crate::report::UnitDiagnostic;

/// Default wait between cycles (30 minutes).
pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 1800;

/// Snapshot of the most recently completed cycle, for the status API.
#[derive(Debug, Clone, Serialize)]
pub struct LastCycle {
    pub summary: CycleSummary,
    pub completed_at: i64,
    pub duration_ms: u64,
}

/// Where one processed unit landed in the summary.
enum UnitOutcome {
    Kept,
    Paused,
    Scaled,
}

/// Orchestrates monitoring cycles over all active units.
pub struct CycleOrchestrator {
    reads: Arc<dyn PlatformReadApi>,
    fetcher: MetricsFetcher,
    thresholds: Thresholds,
    executor: ActionExecutor,
    notifier: Arc<SlackNotifier>,
    logger: EventLogger,
    metrics: MonitorMetrics,
    health: Option<HealthRegistry>,
    last_cycle: Arc<RwLock<Option<LastCycle>>>,
}

impl CycleOrchestrator {
    pub fn new(
        reads: Arc<dyn PlatformReadApi>,
        writes: Arc<dyn PlatformWriteApi>,
        notifier: Arc<SlackNotifier>,
        thresholds: Thresholds,
        account_id: impl Into<String>,
    ) -> Self {
        let account_id = account_id.into();
        let logger = EventLogger::new(account_id);
        let executor = ActionExecutor::new(
            reads.clone(),
            writes,
            notifier.clone(),
            logger.clone(),
            thresholds.scale_rate,
        );

        Self {
            fetcher: MetricsFetcher::new(reads.clone()),
            reads,
            thresholds,
            executor,
            notifier,
            logger,
            metrics: MonitorMetrics::new(),
            health: None,
            last_cycle: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the budget scaling policy.
    pub fn with_scaling_policy(mut self, policy: Arc<dyn ScalingPolicy>) -> Self {
        self.executor = self.executor.with_scaling_policy(policy);
        self
    }

    /// Report component health into a registry.
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Shared handle to the most recent cycle result.
    pub fn last_cycle_handle(&self) -> Arc<RwLock<Option<LastCycle>>> {
        self.last_cycle.clone()
    }

    /// Run one complete monitoring cycle.
    ///
    /// Only a failure to list active units escalates; every per-unit error
    /// is absorbed into the `errors` counter so the remaining units still
    /// get processed.
    pub async fn run_cycle(&self) -> PlatformResult<CycleSummary> {
        let started = Instant::now();

        let units = match self.reads.list_active_units().await {
            Ok(units) => units,
            Err(e) => {
                error!(error = %e, "Failed to list active units, aborting cycle");
                self.metrics.inc_cycle_failures();
                self.notifier
                    .notify_error(
                        &format!("Failed to list active units: {e}"),
                        Some("run_cycle"),
                    )
                    .await;
                return Err(e);
            }
        };

        let mut summary = CycleSummary {
            total: units.len(),
            ..CycleSummary::default()
        };

        if units.is_empty() {
            debug!("No active units to monitor");
        }

        for unit in &units {
            match self.process_unit(unit).await {
                Ok(UnitOutcome::Kept) => summary.kept += 1,
                Ok(UnitOutcome::Paused) => summary.paused += 1,
                Ok(UnitOutcome::Scaled) => summary.scaled += 1,
                Err(e) => {
                    summary.errors += 1;
                    self.logger
                        .log_unit_error(&unit.id, &unit.name, &e.to_string());
                }
            }
        }

        let elapsed = started.elapsed();
        self.metrics.observe_cycle_duration(elapsed);
        self.metrics.record_cycle(&summary);
        self.logger.log_cycle_complete(&summary, elapsed);

        *self.last_cycle.write().await = Some(LastCycle {
            summary,
            completed_at: Utc::now().timestamp(),
            duration_ms: elapsed.as_millis() as u64,
        });

        Ok(summary)
    }

    /// Evaluate and act on a single unit.
    async fn process_unit(&self, unit: &AdUnit) -> PlatformResult<UnitOutcome> {
        let snapshot = self.fetcher.fetch(&unit.id, InsightsWindow::Today).await?;

        match decide(&snapshot, &self.thresholds) {
            Decision::Kill(reason) => {
                self.executor.pause(unit, reason).await?;
                Ok(UnitOutcome::Paused)
            }
            Decision::Scale => match self.executor.scale_budget(unit).await? {
                ScaleOutcome::Scaled { .. } => Ok(UnitOutcome::Scaled),
                ScaleOutcome::Skipped => Ok(UnitOutcome::Kept),
            },
            Decision::Keep => {
                self.executor.keep(unit);
                Ok(UnitOutcome::Kept)
            }
        }
    }

    /// Read-only diagnostic for one unit: its intraday snapshot and the
    /// decision the policy would take. Performs no mutation.
    pub async fn unit_diagnostic(&self, unit_id: &str) -> PlatformResult<UnitDiagnostic> {
        let snapshot = self.fetcher.fetch(unit_id, InsightsWindow::Today).await?;
        let decision = decide(&snapshot, &self.thresholds);
        Ok(UnitDiagnostic::new(unit_id, snapshot, decision))
    }

    /// Run cycles on a fixed interval until shutdown.
    ///
    /// A failed cycle is logged and the loop waits for the next tick;
    /// nothing here is fatal. The first cycle runs immediately.
    pub async fn run_forever(&self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = interval.as_secs(),
            "Starting monitoring loop"
        );
        self.notifier
            .notify_loop_started(interval, self.logger_account())
            .await;

        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();
                    match self.run_cycle().await {
                        Ok(summary) => {
                            if let Some(health) = &self.health {
                                health.set_healthy(components::PLATFORM).await;
                                health.set_healthy(components::MONITOR_LOOP).await;
                            }
                            if summary.changed() {
                                self.notifier
                                    .notify_cycle_summary(&summary, started.elapsed())
                                    .await;
                            }
                        }
                        Err(e) => {
                            if let Some(health) = &self.health {
                                health
                                    .set_unhealthy(components::PLATFORM, e.to_string())
                                    .await;
                                health
                                    .set_degraded(components::MONITOR_LOOP, "last cycle failed")
                                    .await;
                            }
                            error!(error = %e, "Cycle failed, waiting for next tick");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down monitoring loop");
                    self.notifier.notify_loop_stopped().await;
                    break;
                }
            }
        }
    }

    fn logger_account(&self) -> &str {
        self.logger.account_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::models::{BudgetField, BudgetGroup, UnitStatus};
    use crate::platform::InsightsRow;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    fn unit(id: &str) -> AdUnit {
        AdUnit {
            id: id.to_string(),
            name: format!("unit {id}"),
            adset_id: format!("as_{id}"),
            campaign_id: "c1".to_string(),
            status: "ACTIVE".to_string(),
            effective_status: "ACTIVE".to_string(),
        }
    }

    fn row(impressions: u64, clicks: u64, spend: f64, ctr: f64, cpc: f64) -> InsightsRow {
        InsightsRow {
            impressions,
            clicks,
            spend,
            ctr,
            cpc,
            ..InsightsRow::default()
        }
    }

    #[derive(Default)]
    struct MockPlatform {
        units: Vec<AdUnit>,
        insights: HashMap<String, InsightsRow>,
        budget_groups: HashMap<String, BudgetGroup>,
        fail_listing: bool,
        fail_insights_for: HashSet<String>,
        set_status_calls: Mutex<Vec<(String, UnitStatus)>>,
        set_budget_calls: Mutex<Vec<(String, BudgetField, u64)>>,
    }

    #[async_trait]
    impl PlatformReadApi for MockPlatform {
        async fn list_active_units(&self) -> PlatformResult<Vec<AdUnit>> {
            if self.fail_listing {
                return Err(PlatformError::read("list_active_units", "HTTP 500"));
            }
            Ok(self.units.clone())
        }

        async fn get_insights(
            &self,
            unit_id: &str,
            _window: InsightsWindow,
        ) -> PlatformResult<InsightsRow> {
            if self.fail_insights_for.contains(unit_id) {
                return Err(PlatformError::read("get_insights", "HTTP 500"));
            }
            self.insights
                .get(unit_id)
                .cloned()
                .ok_or_else(|| PlatformError::MetricsUnavailable {
                    unit_id: unit_id.to_string(),
                })
        }

        async fn get_budget_group(&self, adset_id: &str) -> PlatformResult<BudgetGroup> {
            self.budget_groups
                .get(adset_id)
                .cloned()
                .ok_or_else(|| PlatformError::read("get_budget_group", adset_id.to_string()))
        }
    }

    #[async_trait]
    impl PlatformWriteApi for MockPlatform {
        async fn set_status(&self, unit_id: &str, status: UnitStatus) -> PlatformResult<()> {
            self.set_status_calls
                .lock()
                .unwrap()
                .push((unit_id.to_string(), status));
            Ok(())
        }

        async fn set_budget(
            &self,
            adset_id: &str,
            field: BudgetField,
            amount: u64,
        ) -> PlatformResult<()> {
            self.set_budget_calls
                .lock()
                .unwrap()
                .push((adset_id.to_string(), field, amount));
            Ok(())
        }
    }

    fn orchestrator(platform: Arc<MockPlatform>) -> CycleOrchestrator {
        CycleOrchestrator::new(
            platform.clone(),
            platform,
            Arc::new(SlackNotifier::disabled()),
            Thresholds::default(),
            "act_test",
        )
    }

    #[tokio::test]
    async fn test_zero_unit_cycle_makes_no_writes() {
        let platform = Arc::new(MockPlatform::default());
        let summary = orchestrator(platform.clone()).run_cycle().await.unwrap();

        assert_eq!(summary, CycleSummary::default());
        assert!(platform.set_status_calls.lock().unwrap().is_empty());
        assert!(platform.set_budget_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_escalates() {
        let platform = Arc::new(MockPlatform {
            fail_listing: true,
            ..MockPlatform::default()
        });
        let orchestrator = orchestrator(platform);

        assert!(orchestrator.run_cycle().await.is_err());
        assert!(orchestrator.last_cycle_handle().read().await.is_none());
    }

    #[tokio::test]
    async fn test_dead_ad_is_paused_with_one_status_write() {
        let platform = Arc::new(MockPlatform {
            units: vec![unit("ad1")],
            insights: HashMap::from([("ad1".to_string(), row(600, 0, 0.0, 0.0, 0.0))]),
            ..MockPlatform::default()
        });

        let summary = orchestrator(platform.clone()).run_cycle().await.unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.paused, 1);
        let calls = platform.set_status_calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[("ad1".to_string(), UnitStatus::Paused)]);
    }

    #[tokio::test]
    async fn test_winner_scales_its_budget_group_once() {
        let mut insights = HashMap::new();
        let mut winner = row(2000, 40, 8000.0, 2.0, 200.0);
        winner.action_values = vec![crate::platform::ActionValue {
            action_type: "purchase".to_string(),
            value: 40_000.0,
        }];
        insights.insert("ad1".to_string(), winner);

        let platform = Arc::new(MockPlatform {
            units: vec![unit("ad1")],
            insights,
            budget_groups: HashMap::from([(
                "as_ad1".to_string(),
                BudgetGroup {
                    id: "as_ad1".to_string(),
                    name: "set".to_string(),
                    daily_budget: 10_000,
                    lifetime_budget: 0,
                },
            )]),
            ..MockPlatform::default()
        });

        let summary = orchestrator(platform.clone()).run_cycle().await.unwrap();

        assert_eq!(summary.scaled, 1);
        let calls = platform.set_budget_calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[("as_ad1".to_string(), BudgetField::Daily, 15_000)]
        );
    }

    #[tokio::test]
    async fn test_below_gates_unit_is_kept_without_writes() {
        let platform = Arc::new(MockPlatform {
            units: vec![unit("ad1")],
            insights: HashMap::from([("ad1".to_string(), row(200, 5, 100.0, 2.5, 20.0))]),
            ..MockPlatform::default()
        });

        let summary = orchestrator(platform.clone()).run_cycle().await.unwrap();

        assert_eq!(summary.kept, 1);
        assert!(platform.set_status_calls.lock().unwrap().is_empty());
        assert!(platform.set_budget_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_isolation_processes_remaining_units() {
        let platform = Arc::new(MockPlatform {
            units: vec![unit("ad1"), unit("ad2"), unit("ad3")],
            insights: HashMap::from([
                ("ad1".to_string(), row(600, 0, 0.0, 0.0, 0.0)),
                ("ad3".to_string(), row(200, 5, 100.0, 2.5, 20.0)),
            ]),
            fail_insights_for: HashSet::from(["ad2".to_string()]),
            ..MockPlatform::default()
        });

        let summary = orchestrator(platform.clone()).run_cycle().await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.paused, 1);
        assert_eq!(summary.kept, 1);
        // The failing unit did not stop ad3 from being evaluated.
        assert_eq!(
            summary.kept + summary.paused + summary.scaled + summary.errors,
            summary.total
        );
    }

    #[tokio::test]
    async fn test_fresh_unit_without_data_is_kept() {
        // No insight row at all: the zero snapshot falls through every tier.
        let platform = Arc::new(MockPlatform {
            units: vec![unit("ad1")],
            ..MockPlatform::default()
        });

        let summary = orchestrator(platform.clone()).run_cycle().await.unwrap();

        assert_eq!(summary.kept, 1);
        assert_eq!(summary.errors, 0);
        assert!(platform.set_status_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_every_unit_lands_in_exactly_one_bucket() {
        let platform = Arc::new(MockPlatform {
            units: (0..5).map(|i| unit(&format!("ad{i}"))).collect(),
            insights: HashMap::from([
                ("ad0".to_string(), row(600, 0, 0.0, 0.0, 0.0)),
                ("ad1".to_string(), row(1500, 4, 100.0, 0.2, 25.0)),
                ("ad2".to_string(), row(200, 5, 100.0, 2.5, 20.0)),
            ]),
            fail_insights_for: HashSet::from(["ad3".to_string()]),
            ..MockPlatform::default()
        });

        let summary = orchestrator(platform).run_cycle().await.unwrap();

        assert_eq!(summary.total, 5);
        assert_eq!(
            summary.kept + summary.paused + summary.scaled + summary.errors,
            summary.total
        );
    }

    #[tokio::test]
    async fn test_unit_diagnostic_is_read_only() {
        let platform = Arc::new(MockPlatform {
            insights: HashMap::from([("ad1".to_string(), row(600, 0, 0.0, 0.0, 0.0))]),
            ..MockPlatform::default()
        });

        let diagnostic = orchestrator(platform.clone())
            .unit_diagnostic("ad1")
            .await
            .unwrap();

        assert_eq!(diagnostic.decision, "kill");
        assert_eq!(
            diagnostic.reason,
            Some(crate::models::KillReason::NoClicks)
        );
        assert!(platform.set_status_calls.lock().unwrap().is_empty());
        assert!(platform.set_budget_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_cycle_published_after_run() {
        let platform = Arc::new(MockPlatform::default());
        let orchestrator = orchestrator(platform);
        let handle = orchestrator.last_cycle_handle();

        orchestrator.run_cycle().await.unwrap();

        let last = handle.read().await;
        let last = last.as_ref().expect("last cycle recorded");
        assert_eq!(last.summary, CycleSummary::default());
        assert!(last.completed_at > 0);
    }

    #[tokio::test]
    async fn test_run_forever_stops_on_shutdown() {
        let platform = Arc::new(MockPlatform::default());
        let orchestrator = Arc::new(orchestrator(platform));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move {
                orchestrator
                    .run_forever(Duration::from_secs(3600), shutdown_rx)
                    .await
            }
        });

        // Give the loop time to run its immediate first cycle.
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop exits on shutdown")
            .unwrap();

        assert!(orchestrator.last_cycle_handle().read().await.is_some());
    }
}
