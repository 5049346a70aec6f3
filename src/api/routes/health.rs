//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (ready to serve traffic)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 once the record store answers queries.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match record_count(&state).await {
        Some(_) => StatusCode::OK,
        None => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let records = record_count(&state).await;
    let catalog_ok = !state.catalog().await.is_empty();

    let overall_status = match (records.is_some(), catalog_ok) {
        (true, true) => "healthy",
        (true, false) | (false, true) => "degraded",
        (false, false) => "unhealthy",
    };

    Json(HealthResponse {
        status: overall_status.to_string(),
        storage: if records.is_some() { "ok" } else { "error" }.to_string(),
        catalog: if catalog_ok { "ok" } else { "empty" }.to_string(),
        records: records.unwrap_or(0),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn record_count(state: &AppState) -> Option<u64> {
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || store.count()).await {
        Ok(Ok(count)) => Some(count),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Storage health check failed");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check task failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
