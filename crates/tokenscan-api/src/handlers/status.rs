use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::AppState;

const HEALTH_DEADLINE: Duration = Duration::from_secs(5);
const READY_DEADLINE: Duration = Duration::from_secs(2);

/// GET /health — liveness plus dependency status. The cache is
/// best-effort and never fails the check.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database_ok = tokio::time::timeout(
        HEALTH_DEADLINE,
        sqlx::query("SELECT 1").execute(&state.pool),
    )
    .await
    .map(|r| r.is_ok())
    .unwrap_or(false);

    let cache_status = match &state.cache {
        None => "disabled",
        Some(cache) => match tokio::time::timeout(HEALTH_DEADLINE, cache.health()).await {
            Ok(Ok(())) => "ok",
            _ => "unavailable",
        },
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database_ok { "ok" } else { "degraded" },
            "database": if database_ok { "ok" } else { "unavailable" },
            "cache": cache_status,
        })),
    )
}

/// GET /ready — readiness gate on the database.
pub async fn ready(State(state): State<Arc<AppState>>) -> StatusCode {
    let database_ok = tokio::time::timeout(
        READY_DEADLINE,
        sqlx::query("SELECT 1").execute(&state.pool),
    )
    .await
    .map(|r| r.is_ok())
    .unwrap_or(false);

    if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
