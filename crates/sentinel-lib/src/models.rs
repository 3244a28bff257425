//! Core data models for the ad monitoring loop

use serde::{Deserialize, Serialize};

/// An independently schedulable advertising entity, as listed by the platform.
///
/// `status` and `effective_status` are kept as the raw platform strings since
/// the platform defines more states than this system acts on; only units whose
/// effective status is `ACTIVE` are ever monitored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdUnit {
    pub id: String,
    pub name: String,
    pub adset_id: String,
    pub campaign_id: String,
    pub status: String,
    pub effective_status: String,
}

/// Lifecycle status values this system writes back to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Active,
    Paused,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Active => "ACTIVE",
            UnitStatus::Paused => "PAUSED",
        }
    }
}

/// Which budget representation a budget group carries.
///
/// The scale action must write back the same field it read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetField {
    Daily,
    Lifetime,
}

impl BudgetField {
    /// The platform field name for this budget representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetField::Daily => "daily_budget",
            BudgetField::Lifetime => "lifetime_budget",
        }
    }
}

impl std::fmt::Display for BudgetField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parent of one or more ad units; holds the spend budget.
///
/// Budgets are integer minor currency units. Exactly one of the two fields is
/// expected to be non-zero; whichever is set is "the" budget for scaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetGroup {
    pub id: String,
    pub name: String,
    pub daily_budget: u64,
    pub lifetime_budget: u64,
}

impl BudgetGroup {
    /// The budget field in use and its current amount, or `None` when the
    /// group has neither field set.
    pub fn active_budget(&self) -> Option<(BudgetField, u64)> {
        if self.daily_budget > 0 {
            Some((BudgetField::Daily, self.daily_budget))
        } else if self.lifetime_budget > 0 {
            Some((BudgetField::Lifetime, self.lifetime_budget))
        } else {
            None
        }
    }
}

/// Time window an insights query aggregates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightsWindow {
    /// Since midnight in the account timezone; resets daily. Used for the
    /// intraday kill checks.
    Today,
    /// A trailing multi-day window ending today. Used by reporting only.
    TrailingDays(u32),
}

/// Read-only, windowed performance aggregate for one ad unit.
///
/// `ctr` and `cpc` are taken from the platform as-is so decisions stay
/// consistent with what advertisers see in the platform UI. `roas` is the
/// only locally derived metric: revenue / spend when spend is positive,
/// otherwise zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub impressions: u64,
    pub clicks: u64,
    pub spend: f64,
    /// Click-through rate, in percent.
    pub ctr: f64,
    /// Cost per click, in currency units.
    pub cpc: f64,
    pub conversions: u64,
    pub revenue: f64,
    pub roas: f64,
}

/// Why a unit was killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillReason {
    NoClicks,
    LowCtr,
    CpcExceeded,
    RoasBelowMinimum,
}

impl KillReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            KillReason::NoClicks => "no_clicks",
            KillReason::LowCtr => "low_ctr",
            KillReason::CpcExceeded => "cpc_exceeded",
            KillReason::RoasBelowMinimum => "roas_below_minimum",
        }
    }
}

impl std::fmt::Display for KillReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one unit's snapshot against the tier policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Kill(KillReason),
    Scale,
    Keep,
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Kill(_) => "kill",
            Decision::Scale => "scale",
            Decision::Keep => "keep",
        }
    }

    pub fn kill_reason(&self) -> Option<KillReason> {
        match self {
            Decision::Kill(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Aggregate counters for one orchestration cycle.
///
/// Every unit considered lands in exactly one of kept/paused/scaled/errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub total: usize,
    pub kept: usize,
    pub paused: usize,
    pub scaled: usize,
    pub errors: usize,
}

impl CycleSummary {
    /// Whether the cycle changed any platform state.
    pub fn changed(&self) -> bool {
        self.paused > 0 || self.scaled > 0
    }
}
