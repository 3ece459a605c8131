//! Analysis trigger and polling handlers

use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Extension, Json};
use loghunter::models::{AnalysisResult, JobStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
  pub cluster_id: String,
}

#[derive(Debug, Serialize)]
struct PollResponse {
  job_id: Uuid,
  status: JobStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  error_message: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  result: Option<AnalysisResult>,
}

/// POST /api/v1/analyze: create a job and return 202 with its id
pub async fn trigger(
  State(state): State<AppState>,
  Extension(auth): Extension<AuthContext>,
  Json(body): Json<AnalyzeBody>,
) -> Result<Response, ApiError> {
  let cluster_id = Uuid::parse_str(&body.cluster_id)
    .map_err(|_| ApiError::bad_request("INVALID_CLUSTER_ID", "cluster_id must be a UUID"))?;

  let cluster = state
    .store
    .get_error_cluster(cluster_id, auth.tenant_id)
    .await
    .map_err(|e| {
      if e.is_not_found() {
        ApiError::not_found("CLUSTER_NOT_FOUND", "Cluster not found")
      } else {
        e.into()
      }
    })?;

  let job = state.service.trigger_analysis(&cluster).await?;

  Ok(response::accepted(json!({ "job_id": job.id })))
}

/// GET /api/v1/analyze/{job_id}: poll a job, joining the result when
/// completed
pub async fn poll(
  State(state): State<AppState>,
  Extension(auth): Extension<AuthContext>,
  Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
  let job_id = Uuid::parse_str(&job_id)
    .map_err(|_| ApiError::bad_request("INVALID_JOB_ID", "job_id must be a UUID"))?;

  let polled = state
    .service
    .poll_job(job_id, auth.tenant_id)
    .await
    .map_err(|e| {
      if e.is_not_found() {
        ApiError::not_found("JOB_NOT_FOUND", "Job not found")
      } else {
        e.into()
      }
    })?;

  Ok(response::json(PollResponse {
    job_id: polled.job.id,
    status: polled.job.status,
    error_message: polled.job.error_message,
    result: polled.result,
  }))
}
