//! Error taxonomy for platform interactions
//!
//! Per-unit errors are recoverable at the batch level: the orchestrator
//! downgrades them to a counter increment and a log line. Only a failure to
//! list active units escalates out of a cycle.

use thiserror::Error;

pub type PlatformResult<T> = Result<T, PlatformError>;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// A read against the platform failed (listing, insights, budget group).
    #[error("platform read failed ({context}): {message}")]
    Read {
        context: &'static str,
        message: String,
    },

    /// The platform returned no insight rows for the unit. Not a failure:
    /// a freshly created unit legitimately has no data yet. The metrics
    /// fetcher maps this to an all-zero snapshot.
    #[error("no insight data for unit {unit_id}")]
    MetricsUnavailable { unit_id: String },

    /// A mutating call failed. The unit's platform state is left whatever it
    /// was before the attempt.
    #[error("platform write failed ({context}): {message}")]
    Write {
        context: &'static str,
        message: String,
    },

    /// A scale was attempted but the budget group has neither a daily nor a
    /// lifetime budget set. No mutation was attempted.
    #[error("budget group {adset_id} has no usable budget field")]
    BudgetUnavailable { adset_id: String },
}

impl PlatformError {
    pub fn read(context: &'static str, message: impl std::fmt::Display) -> Self {
        PlatformError::Read {
            context,
            message: message.to_string(),
        }
    }

    pub fn write(context: &'static str, message: impl std::fmt::Display) -> Self {
        PlatformError::Write {
            context,
            message: message.to_string(),
        }
    }

    pub fn is_metrics_unavailable(&self) -> bool {
        matches!(self, PlatformError::MetricsUnavailable { .. })
    }
}
