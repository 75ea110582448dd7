use crate::error::ServerResult;
use crate::state::{ServerMetadata, ServerState};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use std::time::SystemTime;

/// Global server start time for uptime calculation
static SERVER_START_TIME: once_cell::sync::Lazy<SystemTime> =
    once_cell::sync::Lazy::new(SystemTime::now);

fn uptime_seconds() -> u64 {
    SERVER_START_TIME
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Liveness: 200 whenever the process is serving.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "refmatch-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
    }))
}

/// Readiness: the index answers a count query.
///
/// A store that has become unreadable fails readiness with 500.
pub async fn readiness_check(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let engine = Arc::clone(&state.engine);
    let entries = tokio::task::spawn_blocking(move || engine.index().len())
        .await
        .map_err(|e| crate::error::ServerError::Internal(e.to_string()))??;

    let progress = state.engine.index().progress();
    let metadata = ServerMetadata {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime_seconds(),
    };

    Ok(Json(json!({
        "status": "ready",
        "service": "refmatch-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "server": metadata,
        "index_entries": entries,
        "load": {
            "lines_read": progress.lines_read(),
            "values_written": progress.values_written(),
        },
        "cache": state.engine.cache_stats(),
    })))
}
