//! HTTP API exposing health and metrics.

use crate::{HealthMonitor, HealthStatus, HeraldMetrics, ShutdownSignal};
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use herald_error::{HeraldResult, ServerError, ServerErrorKind};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// API state containing the metrics collectors and, optionally, the
/// health monitor behind `/health`.
#[derive(Debug, Clone)]
pub struct ApiState {
    metrics: HeraldMetrics,
    health: Option<Arc<HealthMonitor>>,
}

impl ApiState {
    /// Creates new API state.
    pub fn new(metrics: HeraldMetrics) -> Self {
        Self {
            metrics,
            health: None,
        }
    }

    /// Answer `/health` with a fresh check from `monitor`.
    pub fn with_health(mut self, monitor: Arc<HealthMonitor>) -> Self {
        self.health = Some(monitor);
        self
    }
}

/// Creates the metrics API router.
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        .route("/metrics/json", get(json_metrics))
        .with_state(state)
}

/// Bind `bind` and serve the router until `shutdown` fires.
pub async fn serve(bind: &str, state: ApiState, shutdown: ShutdownSignal) -> HeraldResult<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| ServerError::new(ServerErrorKind::Bind(format!("{bind}: {e}"))))?;
    info!(%bind, "Metrics API listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ServerError::new(ServerErrorKind::Io(e.to_string())))?;

    info!("Metrics API stopped");
    Ok(())
}

async fn health_check(State(state): State<ApiState>) -> Response {
    let Some(monitor) = state.health.as_ref() else {
        return (StatusCode::OK, Json(json!({"status": "ok"}))).into_response();
    };
    let report = monitor.check().await;
    let status = match report.status() {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (status, Json(report)).into_response()
}

async fn prometheus_metrics(State(state): State<ApiState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn json_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.metrics.snapshot()))
}
