//! Observability infrastructure for the ad monitor
//!
//! Provides:
//! - Prometheus metrics (cycle latency, outcome counters, active-unit gauge)
//! - Structured logging of significant control-loop events

use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use tracing::{error, info, warn};

use crate::models::{CycleSummary, KillReason};

/// Histogram buckets for cycle duration (seconds). Cycles are dominated by
/// sequential platform round-trips, so the range runs well into the minutes.
const CYCLE_LATENCY_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 180.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    cycle_duration_seconds: Histogram,
    cycles_total: IntCounter,
    cycle_failures_total: IntCounter,
    units_active: IntGauge,
    units_paused_total: IntCounter,
    units_scaled_total: IntCounter,
    unit_errors_total: IntCounter,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "ad_sentinel_cycle_duration_seconds",
                "Wall-clock time of one monitoring cycle",
                CYCLE_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            cycles_total: register_int_counter!(
                "ad_sentinel_cycles_total",
                "Number of completed monitoring cycles"
            )
            .expect("Failed to register cycles_total"),

            cycle_failures_total: register_int_counter!(
                "ad_sentinel_cycle_failures_total",
                "Number of cycles that failed to list active units"
            )
            .expect("Failed to register cycle_failures_total"),

            units_active: register_int_gauge!(
                "ad_sentinel_units_active",
                "Active ad units considered in the most recent cycle"
            )
            .expect("Failed to register units_active"),

            units_paused_total: register_int_counter!(
                "ad_sentinel_units_paused_total",
                "Ad units paused by the kill policy"
            )
            .expect("Failed to register units_paused_total"),

            units_scaled_total: register_int_counter!(
                "ad_sentinel_units_scaled_total",
                "Budget scale-ups applied to winning ad units"
            )
            .expect("Failed to register units_scaled_total"),

            unit_errors_total: register_int_counter!(
                "ad_sentinel_unit_errors_total",
                "Per-unit processing errors isolated by the orchestrator"
            )
            .expect("Failed to register unit_errors_total"),
        }
    }
}

/// Monitor metrics for Prometheus exposition.
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a metrics handle, initializing the global registry on first use.
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_cycle_duration(&self, duration: Duration) {
        self.inner()
            .cycle_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record the counters of a completed cycle.
    pub fn record_cycle(&self, summary: &CycleSummary) {
        let inner = self.inner();
        inner.cycles_total.inc();
        inner.units_active.set(summary.total as i64);
        inner.units_paused_total.inc_by(summary.paused as u64);
        inner.units_scaled_total.inc_by(summary.scaled as u64);
        inner.unit_errors_total.inc_by(summary.errors as u64);
    }

    pub fn inc_cycle_failures(&self) {
        self.inner().cycle_failures_total.inc();
    }
}

/// Structured logger for significant monitor events.
///
/// Keeps the event vocabulary in one place so log consumers can key on the
/// `event` field.
#[derive(Clone)]
pub struct EventLogger {
    account_id: String,
}

impl EventLogger {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn log_startup(&self, version: &str, interval: Duration) {
        info!(
            event = "monitor_started",
            account = %self.account_id,
            version = %version,
            interval_secs = interval.as_secs(),
            "Ad monitor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            account = %self.account_id,
            reason = %reason,
            "Ad monitor shutting down"
        );
    }

    pub fn log_unit_paused(&self, unit_id: &str, unit_name: &str, reason: KillReason) {
        warn!(
            event = "unit_paused",
            account = %self.account_id,
            unit_id = %unit_id,
            unit_name = %unit_name,
            reason = %reason,
            "Ad unit paused"
        );
    }

    pub fn log_budget_scaled(
        &self,
        unit_id: &str,
        adset_id: &str,
        old_budget: u64,
        new_budget: u64,
    ) {
        info!(
            event = "budget_scaled",
            account = %self.account_id,
            unit_id = %unit_id,
            adset_id = %adset_id,
            old_budget = old_budget,
            new_budget = new_budget,
            "Ad set budget scaled"
        );
    }

    pub fn log_unit_error(&self, unit_id: &str, unit_name: &str, error: &str) {
        error!(
            event = "unit_error",
            account = %self.account_id,
            unit_id = %unit_id,
            unit_name = %unit_name,
            error = %error,
            "Unit processing failed"
        );
    }

    pub fn log_cycle_complete(&self, summary: &CycleSummary, elapsed: Duration) {
        info!(
            event = "cycle_complete",
            account = %self.account_id,
            total = summary.total,
            kept = summary.kept,
            paused = summary.paused,
            scaled = summary.scaled,
            errors = summary.errors,
            elapsed_ms = elapsed.as_millis() as u64,
            "Monitoring cycle complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_metrics_creation() {
        // Prometheus keeps a process-global registry, so this exercises the
        // handle rather than asserting on registry contents.
        let metrics = MonitorMetrics::new();
        metrics.observe_cycle_duration(Duration::from_millis(250));
        metrics.record_cycle(&CycleSummary {
            total: 3,
            kept: 1,
            paused: 1,
            scaled: 1,
            errors: 0,
        });
        metrics.inc_cycle_failures();
    }

    #[test]
    fn test_event_logger_creation() {
        let logger = EventLogger::new("act_123");
        assert_eq!(logger.account_id, "act_123");
    }
}
