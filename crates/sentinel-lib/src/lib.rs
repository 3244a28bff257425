//! Core library for the ad performance kill-switch
//!
//! This crate provides the monitoring control loop:
//! - Performance snapshot retrieval from the advertising platform
//! - The multi-tier pause/scale/keep decision policy
//! - Action execution with best-effort Slack notifications
//! - Cycle orchestration with per-unit failure isolation
//! - Health checks and observability

pub mod cycle;
pub mod error;
pub mod executor;
pub mod health;
pub mod insights;
pub mod models;
pub mod notify;
pub mod observability;
pub mod platform;
pub mod policy;
pub mod report;

pub use cycle::{CycleOrchestrator, LastCycle, DEFAULT_MONITOR_INTERVAL_SECS};
pub use error::{PlatformError, PlatformResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EventLogger, MonitorMetrics};
pub use policy::Thresholds;
