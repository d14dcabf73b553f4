use crate::api::MgmtState;
use crate::api::schemas::health::HealthResponse;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// Liveness probe: returns 200 OK as long as the server is running.
pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe: checks connectivity to the database and, when configured, the cache.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let (db_res, cache_res) = tokio::join!(state.health_service.check_db(), state.health_service.check_cache());

    let mut status_code = StatusCode::OK;
    let db_status = if let Err(e) = db_res {
        tracing::warn!(error = %e, component = "database", "Readiness probe failed");
        status_code = StatusCode::SERVICE_UNAVAILABLE;
        "error"
    } else {
        "ok"
    };

    let cache_status = match cache_res {
        Ok(Some(())) => "ok",
        Ok(None) => "disabled",
        Err(e) => {
            tracing::warn!(error = %e, component = "cache", "Readiness probe failed");
            status_code = StatusCode::SERVICE_UNAVAILABLE;
            "error"
        }
    };

    let response = HealthResponse {
        status: if status_code == StatusCode::OK { "ok" } else { "error" }.to_string(),
        database: db_status.to_string(),
        cache: cache_status.to_string(),
    };

    (status_code, Json(response))
}
