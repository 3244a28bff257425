//! Multi-tier performance decision policy
//!
//! A pure, ordered, short-circuiting evaluation: the first matching tier
//! wins. The order matters: a dead ad (tier 1) must never reach the ratio
//! tiers, because zero clicks makes CPC and ROAS degenerate.
//!
//! Each tier pairs a minimum sample-size gate (impressions or spend) with a
//! quality condition; below the gate the unit is left alone even if the
//! ratio momentarily looks bad.

use serde::{Deserialize, Serialize};

use crate::models::{Decision, KillReason, PerformanceSnapshot};

/// Tier thresholds. Values are configurable; the tier order is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Tier 1: impressions at which a zero-click unit is killed.
    pub min_impressions_for_check: u64,
    /// Tier 2: impressions at which CTR becomes trustworthy.
    pub ctr_check_impressions: u64,
    /// Tier 2: minimum acceptable CTR, percent.
    pub min_ctr_percent: f64,
    /// Tier 3: spend at which CPC becomes trustworthy.
    pub cpc_check_spend: f64,
    /// Tier 3: maximum acceptable cost per click.
    pub max_cpc: f64,
    /// Tier 4: spend at which ROAS becomes trustworthy.
    pub roas_check_spend: f64,
    /// Tier 4: minimum acceptable ROAS.
    pub min_roas: f64,
    /// Winner: minimum CTR, percent.
    pub winner_min_ctr: f64,
    /// Winner: minimum ROAS.
    pub winner_min_roas: f64,
    /// Budget multiplier applied to winners.
    pub scale_rate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_impressions_for_check: 500,
            ctr_check_impressions: 1000,
            min_ctr_percent: 0.5,
            cpc_check_spend: 5000.0,
            max_cpc: 500.0,
            roas_check_spend: 10_000.0,
            min_roas: 2.0,
            winner_min_ctr: 1.5,
            winner_min_roas: 4.0,
            scale_rate: 1.5,
        }
    }
}

/// Evaluate one snapshot against the tier policy.
///
/// Total: every snapshot yields exactly one of kill/scale/keep.
pub fn decide(snapshot: &PerformanceSnapshot, thresholds: &Thresholds) -> Decision {
    // Tier 1: enough exposure, not a single click.
    if snapshot.impressions >= thresholds.min_impressions_for_check && snapshot.clicks == 0 {
        return Decision::Kill(KillReason::NoClicks);
    }

    // Tier 2: CTR below floor once impressions make it meaningful.
    if snapshot.impressions >= thresholds.ctr_check_impressions
        && snapshot.ctr < thresholds.min_ctr_percent
    {
        return Decision::Kill(KillReason::LowCtr);
    }

    // Tier 3: clicks cost too much once spend makes CPC meaningful.
    if snapshot.spend >= thresholds.cpc_check_spend && snapshot.cpc > thresholds.max_cpc {
        return Decision::Kill(KillReason::CpcExceeded);
    }

    // Tier 4: return too low once spend makes ROAS meaningful.
    if snapshot.spend >= thresholds.roas_check_spend && snapshot.roas < thresholds.min_roas {
        return Decision::Kill(KillReason::RoasBelowMinimum);
    }

    // Winner: strong CTR and ROAS simultaneously.
    if snapshot.ctr >= thresholds.winner_min_ctr && snapshot.roas >= thresholds.winner_min_roas {
        return Decision::Scale;
    }

    Decision::Keep
}
