use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use inference_model::{Job, JobId};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::errors::AppResult;

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub media_id: String,
    pub priority: Option<i32>,
}

pub async fn submit_job(
    State(state): State<AppState>,
    Extension(identity): Extension<inference_core::Identity>,
    Path(task_type): Path<String>,
    Json(body): Json<SubmitJobRequest>,
) -> AppResult<(StatusCode, Json<Job>)> {
    let job = state
        .job_service
        .submit(&task_type, body.media_id, body.priority, identity.subject_id)
        .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<Job>> {
    let job = state.job_service.get(JobId::from(job_id)).await?;
    Ok(Json(job))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.job_service.delete(JobId::from(job_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
