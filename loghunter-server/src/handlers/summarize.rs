//! Log summarization handler

use axum::extract::State;
use axum::response::Response;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use loghunter::service::SummarizeParams;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::response;
use crate::state::AppState;

const DEFAULT_MAX_LINES: usize = 500;
const MIN_MAX_LINES: usize = 10;
const MAX_MAX_LINES: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct SummarizeBody {
  pub service: Option<String>,
  pub namespace: Option<String>,
  pub start: Option<String>,
  pub end: Option<String>,
  pub max_lines: Option<usize>,
}

/// POST /api/v1/summarize: synchronous summarization of a log window
pub async fn summarize(
  State(state): State<AppState>,
  Extension(auth): Extension<AuthContext>,
  Json(body): Json<SummarizeBody>,
) -> Result<Response, ApiError> {
  let service = body
    .service
    .filter(|s| !s.is_empty())
    .ok_or_else(|| ApiError::bad_request("INVALID_REQUEST", "service is required"))?;

  let start = parse_required_timestamp(body.start.as_deref(), "start")?;
  let end = parse_required_timestamp(body.end.as_deref(), "end")?;

  let namespace = body
    .namespace
    .filter(|ns| !ns.is_empty())
    .unwrap_or_else(|| "default".to_string());

  let max_lines = body
    .max_lines
    .unwrap_or(DEFAULT_MAX_LINES)
    .clamp(MIN_MAX_LINES, MAX_MAX_LINES);

  let outcome = state
    .service
    .summarize(SummarizeParams {
      tenant_id: auth.tenant_id,
      service,
      namespace,
      start,
      end,
      max_lines,
    })
    .await?;

  Ok(response::json(json!({
    "summary": outcome.summary,
    "lines_analyzed": outcome.lines_analyzed,
    "time_range": {
      "from": outcome.from.to_rfc3339(),
      "to": outcome.to.to_rfc3339(),
    },
    "provider": outcome.provider,
    "model": outcome.model,
  })))
}

fn parse_required_timestamp(
  raw: Option<&str>,
  field: &'static str,
) -> Result<DateTime<Utc>, ApiError> {
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
