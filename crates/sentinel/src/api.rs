//! HTTP API for health checks, Prometheus metrics, and cycle status

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use sentinel_lib::cycle::LastCycle;
use sentinel_lib::{HealthRegistry, MonitorMetrics};
use tokio::sync::RwLock;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health: HealthRegistry,
    pub metrics: MonitorMetrics,
    pub last_cycle: Arc<RwLock<Option<LastCycle>>>,
}

impl AppState {
    pub fn new(
        health: HealthRegistry,
        metrics: MonitorMetrics,
        last_cycle: Arc<RwLock<Option<LastCycle>>>,
    ) -> Self {
        Self {
            health,
            metrics,
            last_cycle,
        }
    }
}

/// Liveness probe: 200 while the agent is operational, 503 once a component
/// has failed outright.
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health.health().await;

    let status_code = if health.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

/// Readiness probe
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Most recent cycle summary; `null` until the first cycle completes.
async fn summary(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let last = state.last_cycle.read().await.clone();
    Json(last)
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/summary", get(summary))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
