//! Health check handler

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::json;

use crate::response::{self, error_body};
use crate::state::AppState;

/// GET /api/v1/health: unauthenticated store and cache liveness check
pub async fn health(State(state): State<AppState>) -> Response {
  let database = match state.store.ping().await {
    Ok(()) => "ok",
    Err(e) => {
      tracing::warn!(error = %e, "database health check failed");
      "degraded"
    }
  };
  let cache = match state.cache.ping().await {
    Ok(()) => "ok",
    Err(e) => {
      tracing::warn!(error = %e, "cache health check failed");
      "degraded"
    }
  };

  let services = json!({ "database": database, "cache": cache });
  if database != "ok" || cache != "ok" {
    return error_body(
      StatusCode::SERVICE_UNAVAILABLE,
      "DEGRADED",
      "One or more services degraded",
      Some(services),
    );
  }

  response::json(json!({ "status": "ok", "services": services }))
}
