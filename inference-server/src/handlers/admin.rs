use axum::Json;
use axum::extract::State;
use inference_model::{CleanupFilter, CleanupSummary, Stats};

use crate::AppState;
use crate::errors::AppResult;

pub async fn stats(State(state): State<AppState>) -> AppResult<Json<Stats>> {
    let stats = state.job_service.admin_stats().await?;
    Ok(Json(stats))
}

pub async fn cleanup(
    State(state): State<AppState>,
    Json(filter): Json<CleanupFilter>,
) -> AppResult<Json<CleanupSummary>> {
    let summary = state.job_service.admin_cleanup(filter).await?;
    Ok(Json(summary))
}
