//! API route handlers
//!
//! - `health`: liveness and readiness checks
//! - `lookup`: single lookups and file processing

pub mod health;
pub mod lookup;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API version and base info (`GET /`).
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "refmatch server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "POST /lookup",
            "POST /process-file",
            "GET /health",
            "GET /ready"
        ]
    })))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
