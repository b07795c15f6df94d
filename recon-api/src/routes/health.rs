// Liveness, readiness and metrics endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::metrics::METRICS;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub db_connected: bool,
    pub queue_mode: &'static str,
    pub mirror_mode: &'static str,
}

/// GET /health - component snapshot.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_connected = state.store.ping().await;

    Json(HealthResponse {
        status: if db_connected { "healthy" } else { "degraded" },
        service: "recon-api",
        version: env!("CARGO_PKG_VERSION"),
        db_connected,
        queue_mode: if state.config.nats.url.is_some() {
            "jetstream"
        } else {
            "in-process"
        },
        mirror_mode: if state.config.redis.url.is_some() {
            "redis"
        } else {
            "disabled"
        },
    })
}

/// GET /health/ready - 503 until the authoritative store is reachable.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    if state.store.ping().await {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not ready" })),
        )
    }
}

/// GET /health/live - process is up.
pub async fn live() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// GET /metrics - Prometheus exposition format.
pub async fn metrics() -> Result<String, ApiError> {
    METRICS
        .export()
        .map_err(|e| ApiError::Internal(format!("failed to export metrics: {e}")))
}
