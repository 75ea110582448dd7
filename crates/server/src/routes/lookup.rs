use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use matcher::MatchType;
use refmatch::{run_job, JobReport, JobSpec};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Single lookup request
#[derive(Debug, Deserialize, Serialize)]
pub struct LookupRequest {
    pub search_string: String,
}

/// Single lookup response
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct LookupResponse {
    pub found: bool,
    pub matched_value: String,
    pub match_type: MatchType,
    pub cache_hit: bool,
}

/// File processing request
#[derive(Debug, Deserialize, Serialize)]
pub struct ProcessFileRequest {
    pub input_file_path: PathBuf,
    /// Candidate name columns; the first one present in the header is used.
    #[serde(default)]
    pub search_columns: Vec<String>,
}

/// Look up one string (`POST /lookup`).
///
/// The scan is a blocking store read, so it runs on the blocking pool.
pub async fn lookup(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<LookupRequest>, JsonRejection>,
) -> ServerResult<impl IntoResponse> {
    let Json(request) = payload?;
    let engine = Arc::clone(&state.engine);

    let lookup = tokio::task::spawn_blocking(move || engine.lookup_detailed(&request.search_string))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(Json(LookupResponse {
        found: lookup.result.found,
        matched_value: lookup.result.matched_value,
        match_type: lookup.result.match_type,
        cache_hit: lookup.cache_hit,
    }))
}

/// Run the batch pipeline over a CSV file on the server's filesystem
/// (`POST /process-file`). The file is replaced with the processed output.
pub async fn process_file(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<ProcessFileRequest>, JsonRejection>,
) -> ServerResult<Json<JobReport>> {
    let Json(request) = payload?;
    if request.input_file_path.as_os_str().is_empty() {
        return Err(ServerError::BadRequest(
            "input_file_path must not be empty".to_string(),
        ));
    }

    let spec = JobSpec::new(request.input_file_path)
        .with_search_columns(request.search_columns)
        .with_pipeline(state.config.pipeline);
    tracing::info!(path = %spec.input_path.display(), "processing file");

    let engine = Arc::clone(&state.engine);
    let report = tokio::task::spawn_blocking(move || run_job(&engine, &spec))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(Json(report))
}
