//! Authentication, scope-check and rate-limiting middleware
//!
//! Authentication looks up candidates by key prefix and verifies the
//! full raw token against the stored Argon2 hash. Rate limiting uses a
//! per-credential sliding minute window backed by the cache and fails
//! open on cache errors.

use argon2::password_hash::PasswordHash;
use argon2::{Argon2, PasswordVerifier};
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, RETRY_AFTER};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use loghunter::cache::keys::rate_limit_key;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Number of raw-token characters used as the lookup prefix
pub const KEY_PREFIX_LEN: usize = 8;

/// Width of the rate-limit window
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Authenticated request context, set by the auth middleware
#[derive(Debug, Clone)]
pub struct AuthContext {
  pub tenant_id: Uuid,
  pub key_prefix: String,
  pub scopes: Vec<String>,
}

impl AuthContext {
  pub fn has_scope(&self, scope: &str) -> bool {
    self.scopes.iter().any(|s| s == scope)
  }
}

/// Validate the Bearer token and attach the auth context to the request
pub async fn authenticate(
  State(state): State<AppState>,
  mut req: Request,
  next: Next,
) -> Response {
  let Some(raw_token) = extract_bearer_token(&req) else {
    return ApiError::unauthorized("Missing or invalid Authorization header").into_response();
  };

  // A syntactically present but too-short token is rejected the same way
  if raw_token.len() < KEY_PREFIX_LEN {
    return ApiError::unauthorized("Invalid API key format").into_response();
  }
  let prefix = &raw_token[..KEY_PREFIX_LEN];

  let candidates = match state.store.get_api_keys_by_prefix(prefix).await {
    Ok(candidates) => candidates,
    Err(e) => {
      tracing::error!(error = %e, "api key lookup failed");
      return ApiError::internal().into_response();
    }
  };

  let argon2 = Argon2::default();
  for key in candidates {
    let Ok(parsed_hash) = PasswordHash::new(&key.key_hash) else {
      continue;
    };
    if argon2
      .verify_password(raw_token.as_bytes(), &parsed_hash)
      .is_ok()
    {
      req.extensions_mut().insert(AuthContext {
        tenant_id: key.tenant_id,
        key_prefix: prefix.to_string(),
        scopes: key.scopes.clone(),
      });

      // Stamp last_used_at asynchronously, off the request path
      let store = state.store.clone();
      let key_id = key.id;
      tokio::spawn(async move {
        if let Err(e) = store.update_api_key_last_used(key_id).await {
          tracing::warn!(key_id = %key_id, error = %e, "failed to stamp api key last_used_at");
        }
      });

      return next.run(req).await;
    }
  }

  ApiError::unauthorized("Invalid API key").into_response()
}

/// Apply the per-credential sliding-window rate limit
///
/// On a cache error the request is allowed and no rate-limit headers are
/// emitted (fail open).
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
  let Some(auth) = req.extensions().get::<AuthContext>().cloned() else {
    // No auth context means the auth middleware did not run; pass through
    return next.run(req).await;
  };

  let key = rate_limit_key(&auth.key_prefix);
  let count = match state.cache.incr_with_expiry(&key, RATE_LIMIT_WINDOW).await {
    Ok(count) => count,
    Err(e) => {
      tracing::warn!(error = %e, "rate limit counter unavailable, allowing request");
      return next.run(req).await;
    }
  };

  let limit = state.rate_limit_per_minute;
  let remaining = (limit - count).max(0);
  let reset = Utc::now().timestamp() + RATE_LIMIT_WINDOW.as_secs() as i64;

  if count > limit {
    let mut resp = error_429().into_response();
    set_rate_limit_headers(&mut resp, limit, remaining, reset);
    resp
      .headers_mut()
      .insert(RETRY_AFTER, HeaderValue::from_static("60"));
    return resp;
  }

  let mut resp = next.run(req).await;
  set_rate_limit_headers(&mut resp, limit, remaining, reset);
  resp
}

/// Require the admin scope on the authenticated credential
pub async fn require_admin(req: Request, next: Next) -> Response {
  match req.extensions().get::<AuthContext>() {
    Some(auth) if auth.has_scope("admin") => next.run(req).await,
    Some(_) => ApiError::forbidden("Insufficient permissions").into_response(),
    None => ApiError::unauthorized("Missing authentication").into_response(),
  }
}

fn error_429() -> ApiError {
  ApiError::new(
    axum::http::StatusCode::TOO_MANY_REQUESTS,
    "RATE_LIMIT_EXCEEDED",
    "Too many requests",
  )
}

fn set_rate_limit_headers(resp: &mut Response, limit: i64, remaining: i64, reset: i64) {
  let headers = resp.headers_mut();
  headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
  headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
  headers.insert("X-RateLimit-Reset", HeaderValue::from(reset));
}

fn extract_bearer_token(req: &Request) -> Option<String> {
  let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
  let (scheme, token) = header.split_once(' ')?;
  if !scheme.eq_ignore_ascii_case("bearer") {
    return None;
  }
  let token = token.trim();
  if token.is_empty() {
    return None;
  }
  Some(token.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::body::Body;

  fn request_with_auth(value: &str) -> Request {
    Request::builder()
      .uri("/api/v1/clusters")
      .header(AUTHORIZATION, value)
      .body(Body::empty())
      .unwrap()
  }

  #[test]
  fn test_extract_bearer_token() {
    let req = request_with_auth("Bearer lh_abcdef123456");
    assert_eq!(
      extract_bearer_token(&req).as_deref(),
      Some("lh_abcdef123456")
    );

    // Scheme is case-insensitive
    let req = request_with_auth("bearer lh_abcdef123456");
    assert_eq!(
      extract_bearer_token(&req).as_deref(),
      Some("lh_abcdef123456")
    );
  }

  #[test]
  fn test_extract_bearer_token_rejects_other_schemes() {
    let req = request_with_auth("Basic dXNlcjpwYXNz");
    assert!(extract_bearer_token(&req).is_none());

    let req = request_with_auth("Bearer ");
    assert!(extract_bearer_token(&req).is_none());

    let req = Request::builder()
      .uri("/api/v1/clusters")
      .body(Body::empty())
      .unwrap();
    assert!(extract_bearer_token(&req).is_none());
  }

  #[test]
  fn test_auth_context_scopes() {
    let ctx = AuthContext {
      tenant_id: Uuid::new_v4(),
      key_prefix: "lh_12345".to_string(),
      scopes: vec!["read".to_string(), "admin".to_string()],
    };
    assert!(ctx.has_scope("admin"));
    assert!(!ctx.has_scope("write"));
  }
}
