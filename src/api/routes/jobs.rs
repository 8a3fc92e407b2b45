//! Transcription job endpoints.
//!
//! A job status query is also the reconciliation trigger: the handler
//! asks the task queue for its current signal and advances the persisted
//! job before answering.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};

use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;
use crate::db::{self, JobRepository};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/:job_id", get(get_job))
        .with_state(state)
}

async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let db_path = state.db_path.clone();
    let jobs = tokio::task::spawn_blocking(move || {
        let conn = db::open(&db_path)?;
        JobRepository::list(&conn)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    Ok(Json(json!({ "jobs": jobs })))
}

async fn get_job(
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let job = state.worker.reconcile_job(&job_id).await?;

    match job {
        Some(job) => Ok(Json(json!({ "job": job }))),
        None => Err(ApiError::not_found(format!("job {} not found", job_id))),
    }
}
