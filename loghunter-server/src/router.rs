//! Router construction
//!
//! Builds the axum router with the middleware stack: tracing and a panic
//! barrier globally, authentication and rate limiting on protected
//! routes, and the admin scope check on credential management.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::Router;
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{analyze, clusters, health, keys, search, summarize};
use crate::middleware::{authenticate, rate_limit, require_admin};
use crate::state::AppState;

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
  let admin = Router::new()
    .route("/admin/keys", post(keys::create).get(keys::list))
    .route("/admin/keys/{id}", delete(keys::revoke))
    .route_layer(from_fn(require_admin));

  let protected = Router::new()
    .route("/analyze", post(analyze::trigger))
    .route("/analyze/{job_id}", get(analyze::poll))
    .route("/clusters", get(clusters::list))
    .route("/clusters/{id}", get(clusters::get))
    .route("/summarize", post(summarize::summarize))
    .route("/search", post(search::search))
    .merge(admin)
    .route_layer(from_fn_with_state(state.clone(), rate_limit))
    .route_layer(from_fn_with_state(state.clone(), authenticate));

  let api = Router::new()
    .route("/health", get(health::health))
    .merge(protected);

  Router::new()
    .nest("/api/v1", api)
    .layer(TraceLayer::new_for_http())
    .layer(CatchPanicLayer::custom(handle_panic))
    .with_state(state)
}

/// Render an in-handler panic as a JSON 500 instead of tearing the
/// connection down
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
  let detail = if let Some(s) = err.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = err.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  };
  tracing::error!(panic = %detail, "panic recovered in request handler");

  let body = json!({
    "error": { "code": "INTERNAL_ERROR", "message": "An unexpected error occurred" }
  });
  Response::builder()
    .status(StatusCode::INTERNAL_SERVER_ERROR)
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(body.to_string()))
    .unwrap()
}
