//! JSON response envelopes
//!
//! All responses share the transport envelope: single resources under
//! `data`, collections under `data` + `meta`, errors under `error` with
//! an UPPER_SNAKE code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// Pagination metadata for collection responses
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
  pub page: u64,
  pub limit: u64,
  pub total: u64,
  pub has_next: bool,
}

impl PaginationMeta {
  /// Derive metadata from normalized pagination inputs and the total
  /// row count
  pub fn new(page: u64, limit: u64, total: u64) -> Self {
    Self {
      page,
      limit,
      total,
      has_next: page * limit < total,
    }
  }
}

/// 200 with `{ "data": ... }`
pub fn json<T: Serialize>(data: T) -> Response {
  (StatusCode::OK, Json(json!({ "data": data }))).into_response()
}

/// 201 with `{ "data": ... }`
pub fn created<T: Serialize>(data: T) -> Response {
  (StatusCode::CREATED, Json(json!({ "data": data }))).into_response()
}

/// 202 with `{ "data": ... }`
pub fn accepted<T: Serialize>(data: T) -> Response {
  (StatusCode::ACCEPTED, Json(json!({ "data": data }))).into_response()
}

/// 200 with `{ "data": [...], "meta": {...} }`
pub fn collection<T: Serialize>(data: Vec<T>, meta: PaginationMeta) -> Response {
  (StatusCode::OK, Json(json!({ "data": data, "meta": meta }))).into_response()
}

/// Error envelope `{ "error": { "code", "message", "details?" } }`
pub fn error_body(
  status: StatusCode,
  code: &str,
  message: &str,
  details: Option<Value>,
) -> Response {
  let mut error = json!({ "code": code, "message": message });
  if let Some(details) = details {
    error["details"] = details;
  }
  (status, Json(json!({ "error": error }))).into_response()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pagination_meta_has_next() {
    let meta = PaginationMeta::new(1, 20, 45);
    assert!(meta.has_next);

    let meta = PaginationMeta::new(3, 20, 45);
    assert!(!meta.has_next);

    let meta = PaginationMeta::new(1, 20, 20);
    assert!(!meta.has_next);

    let meta = PaginationMeta::new(1, 20, 0);
    assert!(!meta.has_next);
  }

  #[test]
  fn test_envelopes_carry_status() {
    assert_eq!(json("x").status(), StatusCode::OK);
    assert_eq!(created("x").status(), StatusCode::CREATED);
    assert_eq!(accepted("x").status(), StatusCode::ACCEPTED);
    assert_eq!(
      error_body(StatusCode::NOT_FOUND, "JOB_NOT_FOUND", "gone", None).status(),
      StatusCode::NOT_FOUND
    );
  }
}
