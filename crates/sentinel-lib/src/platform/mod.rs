//! Advertising platform access
//!
//! Defines the read/write seams the control loop consumes, plus the Meta
//! Graph API adapter implementing them over HTTP. The traits exist so the
//! orchestrator and executor can be tested against in-memory fakes.

mod graph;

pub use graph::{GraphClient, GraphConfig};

use async_trait::async_trait;

use crate::error::PlatformResult;
use crate::models::{AdUnit, BudgetField, BudgetGroup, InsightsWindow, UnitStatus};

/// A single insight row as returned by the platform, prior to shaping.
///
/// Counts and currency values are already parsed out of the platform's
/// string-typed wire encoding; action breakdowns are carried raw so the
/// metrics fetcher can derive conversions and revenue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsightsRow {
    pub impressions: u64,
    pub clicks: u64,
    pub spend: f64,
    pub ctr: f64,
    pub cpc: f64,
    pub actions: Vec<ActionCount>,
    pub action_values: Vec<ActionValue>,
}

/// Count of one action type within the window (e.g. `purchase`: 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCount {
    pub action_type: String,
    pub value: u64,
}

/// Monetary value attributed to one action type within the window.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionValue {
    pub action_type: String,
    pub value: f64,
}

/// Read-only platform operations. Pure reads, no side effects.
#[async_trait]
pub trait PlatformReadApi: Send + Sync {
    /// List every unit in the account whose effective status is `ACTIVE`.
    async fn list_active_units(&self) -> PlatformResult<Vec<AdUnit>>;

    /// Fetch the raw insight row for one unit over a window.
    ///
    /// Returns `PlatformError::MetricsUnavailable` when the platform has no
    /// data for the unit; callers decide whether that is an error.
    async fn get_insights(
        &self,
        unit_id: &str,
        window: InsightsWindow,
    ) -> PlatformResult<InsightsRow>;

    /// Fetch a budget group by its identifier.
    async fn get_budget_group(&self, adset_id: &str) -> PlatformResult<BudgetGroup>;
}

/// Mutating platform operations.
#[async_trait]
pub trait PlatformWriteApi: Send + Sync {
    /// Set a unit's lifecycle status.
    async fn set_status(&self, unit_id: &str, status: UnitStatus) -> PlatformResult<()>;

    /// Write a budget amount to the given field of a budget group.
    async fn set_budget(
        &self,
        adset_id: &str,
        field: BudgetField,
        amount: u64,
    ) -> PlatformResult<()>;
}
