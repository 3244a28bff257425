//! Action execution for per-unit decisions
//!
//! Applies a [`Decision`](crate::models::Decision) to a unit: pausing it,
//! scaling its parent budget, or leaving it alone. Every state change emits
//! a best-effort notification; notification failure never fails the action.

use std::sync::Arc;

use tracing::debug;

use crate::error::{PlatformError, PlatformResult};
use crate::models::{AdUnit, KillReason, UnitStatus};
use crate::notify::SlackNotifier;
use crate::observability::EventLogger;
use crate::platform::{PlatformReadApi, PlatformWriteApi};

/// Strategy seam for budget scaling.
///
/// The stock behavior scales a winner on every cycle it still qualifies,
/// which compounds 1.5x per cycle with no cooldown or ceiling. That matches
/// the current product behavior; this trait exists so a cooldown or ceiling
/// policy can be injected later without touching the decision engine.
pub trait ScalingPolicy: Send + Sync {
    /// Whether this unit may have its budget scaled right now.
    fn should_scale(&self, unit_id: &str) -> bool;

    /// Record that the unit's budget was scaled.
    fn record_scaled(&self, unit_id: &str);
}

/// Scales every qualifying winner on every cycle, unconditionally.
pub struct AlwaysScale;

impl ScalingPolicy for AlwaysScale {
    fn should_scale(&self, _unit_id: &str) -> bool {
        true
    }

    fn record_scaled(&self, _unit_id: &str) {}
}

/// Result of a scale attempt that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOutcome {
    Scaled { old_budget: u64, new_budget: u64 },
    /// The scaling policy declined; the unit is treated as kept.
    Skipped,
}

/// Applies decisions to units via the platform write API.
pub struct ActionExecutor {
    reads: Arc<dyn PlatformReadApi>,
    writes: Arc<dyn PlatformWriteApi>,
    notifier: Arc<SlackNotifier>,
    logger: EventLogger,
    scaling: Arc<dyn ScalingPolicy>,
    scale_rate: f64,
}

impl ActionExecutor {
    pub fn new(
        reads: Arc<dyn PlatformReadApi>,
        writes: Arc<dyn PlatformWriteApi>,
        notifier: Arc<SlackNotifier>,
        logger: EventLogger,
        scale_rate: f64,
    ) -> Self {
        Self {
            reads,
            writes,
            notifier,
            logger,
            scaling: Arc::new(AlwaysScale),
            scale_rate,
        }
    }

    /// Replace the scaling policy.
    pub fn with_scaling_policy(mut self, policy: Arc<dyn ScalingPolicy>) -> Self {
        self.scaling = policy;
        self
    }

    /// Pause a unit. On success the platform state is `PAUSED` and a
    /// notification goes out; on failure the unit is untouched and an error
    /// notification goes out instead.
    pub async fn pause(&self, unit: &AdUnit, reason: KillReason) -> PlatformResult<()> {
        match self.writes.set_status(&unit.id, UnitStatus::Paused).await {
            Ok(()) => {
                self.logger.log_unit_paused(&unit.id, &unit.name, reason);
                self.notifier.notify_unit_paused(unit, reason).await;
                Ok(())
            }
            Err(e) => {
                self.notifier
                    .notify_error(
                        &format!("Failed to pause ad: {e}"),
                        Some(&format!("pause({})", unit.id)),
                    )
                    .await;
                Err(e)
            }
        }
    }

    /// Scale the unit's parent budget by the configured rate.
    ///
    /// Reads whichever budget field is non-zero and writes the increased
    /// amount back to that same field. A group with neither field set is a
    /// `BudgetUnavailable` error and nothing is mutated.
    pub async fn scale_budget(&self, unit: &AdUnit) -> PlatformResult<ScaleOutcome> {
        if !self.scaling.should_scale(&unit.id) {
            debug!(unit_id = %unit.id, "Scaling policy declined, keeping unit");
            return Ok(ScaleOutcome::Skipped);
        }

        let result = self.scale_budget_inner(unit).await;
        match &result {
            Ok(ScaleOutcome::Scaled {
                old_budget,
                new_budget,
            }) => {
                self.notifier
                    .notify_budget_scaled(unit, *old_budget, *new_budget)
                    .await;
            }
            Ok(ScaleOutcome::Skipped) => {}
            Err(e) => {
                self.notifier
                    .notify_error(
                        &format!("Failed to scale budget: {e}"),
                        Some(&format!("scale_budget({})", unit.id)),
                    )
                    .await;
            }
        }
        result
    }

    async fn scale_budget_inner(&self, unit: &AdUnit) -> PlatformResult<ScaleOutcome> {
        let group = self.reads.get_budget_group(&unit.adset_id).await?;

        let (field, old_budget) =
            group
                .active_budget()
                .ok_or_else(|| PlatformError::BudgetUnavailable {
                    adset_id: group.id.clone(),
                })?;

        let new_budget = (old_budget as f64 * self.scale_rate) as u64;
        self.writes.set_budget(&group.id, field, new_budget).await?;
        self.scaling.record_scaled(&unit.id);

        self.logger
            .log_budget_scaled(&unit.id, &group.id, old_budget, new_budget);

        Ok(ScaleOutcome::Scaled {
            old_budget,
            new_budget,
        })
    }

    /// Leave the unit running. No platform call; exists to make the action
    /// taxonomy exhaustive.
    pub fn keep(&self, unit: &AdUnit) {
        debug!(unit_id = %unit.id, "Unit kept");
    }
}
