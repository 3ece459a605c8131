//! Admin API key management handlers
//!
//! The raw token is generated here, returned exactly once in the
//! creation response, and stored only as a prefix plus an Argon2 hash.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Extension, Json};
use chrono::Utc;
use loghunter::models::ApiKey;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::{AuthContext, KEY_PREFIX_LEN};
use crate::response;
use crate::state::AppState;

/// Prefix that makes raw keys recognizable at a glance
const TOKEN_PREFIX: &str = "lh_";

/// Length of the random portion of a raw key
const TOKEN_RANDOM_LENGTH: usize = 32;

const VALID_SCOPES: [&str; 3] = ["read", "write", "admin"];

#[derive(Debug, Deserialize)]
pub struct CreateKeyBody {
  pub name: Option<String>,
  #[serde(default)]
  pub scopes: Vec<String>,
}

/// POST /api/v1/admin/keys: create a key, returning the raw token once
pub async fn create(
  State(state): State<AppState>,
  Extension(auth): Extension<AuthContext>,
  Json(body): Json<CreateKeyBody>,
) -> Result<Response, ApiError> {
  let name = body
    .name
    .filter(|n| !n.trim().is_empty())
    .ok_or_else(|| ApiError::bad_request("VALIDATION_ERROR", "name is required"))?;

  if body.scopes.is_empty() {
    return Err(ApiError::bad_request(
      "VALIDATION_ERROR",
      "at least one scope is required",
    ));
  }
  for scope in &body.scopes {
    if !VALID_SCOPES.contains(&scope.as_str()) {
      return Err(ApiError::bad_request(
        "VALIDATION_ERROR",
        format!("unknown scope {:?}: must be one of read, write, admin", scope),
      ));
    }
  }

  let raw_token = generate_raw_token();
  let key_hash = hash_token(&raw_token)?;

  let now = Utc::now();
  let key = ApiKey {
    id: Uuid::new_v4(),
    tenant_id: auth.tenant_id,
    name,
    key_hash,
    key_prefix: raw_token[..KEY_PREFIX_LEN].to_string(),
    scopes: body.scopes,
    last_used_at: None,
    revoked_at: None,
    created_at: now,
    updated_at: now,
  };

  state.store.create_api_key(&key).await?;

  Ok(response::created(json!({
    "id": key.id,
    "name": key.name,
    "key": raw_token,
    "key_prefix": key.key_prefix,
    "scopes": key.scopes,
    "created_at": key.created_at,
  })))
}

/// GET /api/v1/admin/keys: list active keys; never includes the raw
/// token or the stored hash
pub async fn list(
  State(state): State<AppState>,
  Extension(auth): Extension<AuthContext>,
) -> Result<Response, ApiError> {
  let keys = state.store.list_api_keys(auth.tenant_id).await?;
  Ok(response::json(keys))
}

/// DELETE /api/v1/admin/keys/{id}: soft-revoke a key
pub async fn revoke(
  State(state): State<AppState>,
  Extension(auth): Extension<AuthContext>,
  Path(key_id): Path<String>,
) -> Result<Response, ApiError> {
  let key_id = Uuid::parse_str(&key_id)
    .map_err(|_| ApiError::bad_request("VALIDATION_ERROR", "key id must be a UUID"))?;

  state
    .store
    .revoke_api_key(key_id, auth.tenant_id)
    .await
    .map_err(|e| {
      if e.is_not_found() {
        ApiError::not_found("KEY_NOT_FOUND", "API key not found")
      } else {
        e.into()
      }
    })?;

  Ok(response::json(json!({ "id": key_id, "revoked": true })))
}

fn generate_raw_token() -> String {
  let mut rng = rand::thread_rng();
  let random: String = (0..TOKEN_RANDOM_LENGTH)
    .map(|_| {
      let idx = rng.gen_range(0..62);
      match idx {
        0..=9 => (b'0' + idx) as char,
        10..=35 => (b'a' + idx - 10) as char,
        _ => (b'A' + idx - 36) as char,
      }
    })
    .collect();
  format!("{}{}", TOKEN_PREFIX, random)
}

fn hash_token(raw: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(raw.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| {
      tracing::error!(error = %e, "failed to hash api key");
      ApiError::internal()
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use argon2::{password_hash::PasswordHash, PasswordVerifier};

  #[test]
  fn test_generate_raw_token_shape() {
    let token = generate_raw_token();
    assert!(token.starts_with(TOKEN_PREFIX));
    assert_eq!(token.len(), TOKEN_PREFIX.len() + TOKEN_RANDOM_LENGTH);
    assert!(token[TOKEN_PREFIX.len()..]
      .chars()
      .all(|c| c.is_ascii_alphanumeric()));

    // Two tokens never collide in practice
    assert_ne!(token, generate_raw_token());
  }

  #[test]
  fn test_hash_token_verifies_round_trip() {
    let token = generate_raw_token();
    let hash = hash_token(&token).unwrap();

    let parsed = PasswordHash::new(&hash).unwrap();
    assert!(Argon2::default()
      .verify_password(token.as_bytes(), &parsed)
      .is_ok());
    assert!(Argon2::default()
      .verify_password(b"wrong-token", &parsed)
      .is_err());
  }
}
