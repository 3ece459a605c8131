//! Cluster listing and detail handlers

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Extension;
use chrono::DateTime;
use loghunter::store::{ClusterFilter, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::response::{self, PaginationMeta};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
  pub service: Option<String>,
  pub namespace: Option<String>,
  pub level: Option<String>,
  /// RFC-3339 lower bound on last_seen_at
  pub since: Option<String>,
  pub page: Option<u64>,
  pub limit: Option<u64>,
}

/// GET /api/v1/clusters: tenant-scoped, filtered, paginated listing
pub async fn list(
  State(state): State<AppState>,
  Extension(auth): Extension<AuthContext>,
  Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
  let since = match &query.since {
    Some(raw) => Some(
      DateTime::parse_from_rfc3339(raw)
        .map_err(|_| {
          ApiError::bad_request("VALIDATION_ERROR", "since must be a valid RFC3339 timestamp")
        })?
        .to_utc(),
    ),
    None => None,
  };

  let page = query.page.unwrap_or(1).max(1);
  let limit = query
    .limit
    .unwrap_or(DEFAULT_PAGE_SIZE)
    .clamp(1, MAX_PAGE_SIZE);

  let filter = ClusterFilter {
    tenant_id: auth.tenant_id,
    service: query.service,
    namespace: query.namespace,
    level: query.level,
    since,
    page,
    limit,
  };

  let (clusters, total) = state.store.list_error_clusters(filter).await?;

  Ok(response::collection(
    clusters,
    PaginationMeta::new(page, limit, total),
  ))
}

/// GET /api/v1/clusters/{id}: cluster plus its most recent analysis
/// when present
pub async fn get(
  State(state): State<AppState>,
  Extension(auth): Extension<AuthContext>,
  Path(cluster_id): Path<String>,
) -> Result<Response, ApiError> {
  let cluster_id = Uuid::parse_str(&cluster_id)
    .map_err(|_| ApiError::bad_request("INVALID_CLUSTER_ID", "cluster id must be a UUID"))?;

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

  let analysis = match state.store.get_analysis_result_by_cluster(cluster_id).await {
    Ok(result) => Some(result),
    Err(e) if e.is_not_found() => None,
    Err(e) => return Err(e.into()),
  };

  Ok(response::json(json!({
    "cluster": cluster,
    "analysis": analysis,
  })))
}
