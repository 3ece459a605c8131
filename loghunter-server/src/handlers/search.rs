//! Smart search handler

use axum::extract::State;
use axum::response::Response;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use loghunter::service::SearchRequest;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::response;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 500;
const MIN_LIMIT: usize = 10;
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct SearchBody {
  /// Free-text keyword, matched as an exact substring
  pub query: Option<String>,
  pub service: Option<String>,
  pub namespace: Option<String>,
  #[serde(default)]
  pub levels: Vec<String>,
  pub start: Option<String>,
  pub end: Option<String>,
  pub limit: Option<usize>,
}

/// POST /api/v1/search: keyword search, results clustered by
/// fingerprint
pub async fn search(
  State(state): State<AppState>,
  Extension(auth): Extension<AuthContext>,
  Json(body): Json<SearchBody>,
) -> Result<Response, ApiError> {
  let keyword = body
    .query
    .filter(|q| !q.trim().is_empty())
    .ok_or_else(|| ApiError::bad_request("INVALID_QUERY", "query must be non-empty"))?;

  // The keyword flows to the backend verbatim inside back-tick
  // delimiters, so the delimiter itself cannot appear in it
  if keyword.contains('`') {
    return Err(ApiError::bad_request(
      "INVALID_QUERY",
      "query must not contain back-tick characters",
    ));
  }

  let service = body
    .service
    .filter(|s| !s.is_empty())
    .ok_or_else(|| ApiError::bad_request("VALIDATION_ERROR", "service is required"))?;

  let start = parse_timestamp(body.start.as_deref(), "start")?;
  let end = parse_timestamp(body.end.as_deref(), "end")?;

  let namespace = body
    .namespace
    .filter(|ns| !ns.is_empty())
    .unwrap_or_else(|| "default".to_string());

  let limit = body
    .limit
    .unwrap_or(DEFAULT_LIMIT)
    .clamp(MIN_LIMIT, MAX_LIMIT);

  let outcome = state
    .service
    .search(SearchRequest {
      tenant_id: auth.tenant_id,
      service,
      namespace,
      keyword,
      levels: body.levels,
      start,
      end,
      limit,
    })
    .await?;

  Ok(response::json(json!({
    "clusters": outcome.clusters,
    "cluster_count": outcome.clusters.len(),
    "lines_scanned": outcome.lines_scanned,
  })))
}

fn parse_timestamp(raw: Option<&str>, field: &'static str) -> Result<DateTime<Utc>, ApiError> {
  let raw = raw
    .filter(|s| !s.is_empty())
    .ok_or_else(|| ApiError::bad_request("INVALID_REQUEST", format!("{} is required", field)))?;
  DateTime::parse_from_rfc3339(raw)
    .map(|dt| dt.to_utc())
    .map_err(|_| {
      ApiError::bad_request(
        "INVALID_REQUEST",
        format!("{} must be a valid RFC3339 timestamp", field),
      )
    })
}
