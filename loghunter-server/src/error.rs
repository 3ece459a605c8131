//! Error types for the LogHunter server
//!
//! `ServerError` covers startup failures; `ApiError` is the request-path
//! error that maps core error kinds to HTTP statuses and UPPER_SNAKE
//! codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;

use crate::response::error_body;

/// Startup / wiring errors for the server binary
#[derive(Error, Debug)]
pub enum ServerError {
  /// Core library error
  #[error("{0}")]
  Core(#[from] loghunter::Error),

  /// Configuration error
  #[error("Configuration error: {0}")]
  Config(String),

  /// IO error
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

impl ServerError {
  /// Create a configuration error
  pub fn config<S: Into<String>>(msg: S) -> Self {
    Self::Config(msg.into())
  }
}

/// Request-path API error: status, stable code, message, optional details
#[derive(Debug)]
pub struct ApiError {
  pub status: StatusCode,
  pub code: &'static str,
  pub message: String,
  pub details: Option<Value>,
}

impl ApiError {
  pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
    Self {
      status,
      code,
      message: message.into(),
      details: None,
    }
  }

  pub fn with_details(mut self, details: Value) -> Self {
    self.details = Some(details);
    self
  }

  pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
    Self::new(StatusCode::BAD_REQUEST, code, message)
  }

  pub fn unauthorized(message: impl Into<String>) -> Self {
    Self::new(StatusCode::UNAUTHORIZED, "INVALID_TOKEN", message)
  }

  pub fn forbidden(message: impl Into<String>) -> Self {
    Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
  }

  pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
    Self::new(StatusCode::NOT_FOUND, code, message)
  }

  pub fn internal() -> Self {
    Self::new(
      StatusCode::INTERNAL_SERVER_ERROR,
      "INTERNAL_ERROR",
      "An unexpected error occurred",
    )
  }
}

impl From<loghunter::Error> for ApiError {
  fn from(err: loghunter::Error) -> Self {
    use loghunter::Error;
    match err {
      Error::Validation { message } => Self::bad_request("VALIDATION_ERROR", message),
      Error::NotFound { resource } => Self::not_found(
        "RESOURCE_NOT_FOUND",
        format!("Resource not found: {}", resource),
      ),
      Error::DuplicateKey { message } => {
        Self::new(StatusCode::CONFLICT, "DUPLICATE_KEY", message)
      }
      Error::NoLogsFound => Self::not_found(
        "NO_LOGS_FOUND",
        "No logs found for the given parameters",
      ),
      Error::LokiUnreachable(_) => Self::new(
        StatusCode::BAD_GATEWAY,
        "LOKI_UNREACHABLE",
        "The log backend is not reachable",
      ),
      Error::LokiTimeout(_) => Self::new(
        StatusCode::GATEWAY_TIMEOUT,
        "LOKI_UNREACHABLE",
        "The log backend timed out",
      ),
      Error::LokiQueryError { status } => Self::new(
        StatusCode::BAD_GATEWAY,
        "LOKI_QUERY_ERROR",
        format!("The log backend rejected the query (status {})", status),
      ),
      Error::ProviderUnavailable(_) | Error::InvalidResponse(_) => Self::new(
        StatusCode::BAD_GATEWAY,
        "AI_PROVIDER_UNAVAILABLE",
        "The AI provider is not available",
      ),
      Error::InferenceTimeout => Self::new(
        StatusCode::GATEWAY_TIMEOUT,
        "AI_INFERENCE_TIMEOUT",
        "AI inference took too long and was cancelled",
      ),
      Error::Redis(_)
      | Error::Database(_)
      | Error::Serialization(_)
      | Error::InvalidTransition { .. }
      | Error::Config { .. }
      | Error::Other { .. } => Self::internal(),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    error_body(self.status, self.code, &self.message, self.details)
  }
}
