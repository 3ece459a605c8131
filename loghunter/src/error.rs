//! 错误处理模块
//! Error handling module
//!
//! 定义了 LogHunter 核心库使用的各种错误类型
//! Defines the error types used across the LogHunter core library

use thiserror::Error;

use crate::models::JobStatus;

/// LogHunter 库的结果类型
/// Result type for the LogHunter library
pub type Result<T> = std::result::Result<T, Error>;

/// LogHunter 错误类型
/// LogHunter error type
#[derive(Error, Debug)]
pub enum Error {
  /// Redis connection error
  #[error("Redis error: {0}")]
  Redis(#[from] redis::RedisError),

  /// SeaORM 数据库错误
  /// SeaORM database error
  #[error("Database error: {0}")]
  Database(#[from] sea_orm::DbErr),

  /// 序列化错误
  /// Serialization error
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// 资源未找到错误
  /// Resource not found error
  #[error("Resource not found: {resource}")]
  NotFound { resource: String },

  /// 唯一约束冲突错误
  /// Unique constraint violation error
  #[error("Duplicate key violation: {message}")]
  DuplicateKey { message: String },

  /// 非法的作业状态转换
  /// Invalid job status transition
  #[error("Invalid job status transition: {from} -> {to}")]
  InvalidTransition { from: JobStatus, to: JobStatus },

  /// 输入校验错误
  /// Input validation error
  #[error("Validation error: {message}")]
  Validation { message: String },

  /// Loki 不可达（DNS、连接、读取失败）
  /// Loki unreachable (DNS, connect, read failure)
  #[error("Loki unreachable: {0}")]
  LokiUnreachable(String),

  /// Loki 查询超时或取消
  /// Loki query timeout or cancellation
  #[error("Loki query timeout: {0}")]
  LokiTimeout(String),

  /// Loki 返回非 2xx 状态
  /// Loki returned a non-2xx status
  #[error("Loki query error: status {status}")]
  LokiQueryError { status: u16 },

  /// AI 提供方不可用
  /// AI provider unavailable
  #[error("AI provider unavailable: {0}")]
  ProviderUnavailable(String),

  /// AI 推理超时或取消
  /// AI inference timeout or cancellation
  #[error("AI inference timeout")]
  InferenceTimeout,

  /// AI 提供方返回了无法解析的响应
  /// AI provider returned an unparseable response
  #[error("AI provider returned invalid response: {0}")]
  InvalidResponse(String),

  /// 查询结果为空
  /// No logs matched the query
  #[error("No logs found for the given parameters")]
  NoLogsFound,

  /// 配置错误
  /// Configuration error
  #[error("Configuration error: {message}")]
  Config { message: String },

  /// 其他错误
  /// Other error
  #[error("{message}")]
  Other { message: String },
}

impl Error {
  /// 创建资源未找到错误
  /// Create a not-found error
  pub fn not_found<S: Into<String>>(resource: S) -> Self {
    Self::NotFound {
      resource: resource.into(),
    }
  }

  /// 创建唯一约束冲突错误
  /// Create a duplicate-key error
  pub fn duplicate<S: Into<String>>(message: S) -> Self {
    Self::DuplicateKey {
      message: message.into(),
    }
  }

  /// 创建输入校验错误
  /// Create a validation error
  pub fn validation<S: Into<String>>(message: S) -> Self {
    Self::Validation {
      message: message.into(),
    }
  }

  /// 创建配置错误
  /// Create a configuration error
  pub fn config<S: Into<String>>(message: S) -> Self {
    Self::Config {
      message: message.into(),
    }
  }

  /// 创建其他错误
  /// Create another type of error
  pub fn other<S: Into<String>>(message: S) -> Self {
    Self::Other {
      message: message.into(),
    }
  }

  /// 检查错误是否表示资源缺失
  /// Check whether the error means the resource is absent
  pub fn is_not_found(&self) -> bool {
    matches!(self, Error::NotFound { .. })
  }

  /// 检查错误是否为上游（Loki / AI）故障
  /// Check whether the error is an upstream (Loki / AI) failure
  pub fn is_upstream(&self) -> bool {
    matches!(
      self,
      Error::LokiUnreachable(_)
        | Error::LokiTimeout(_)
        | Error::LokiQueryError { .. }
        | Error::ProviderUnavailable(_)
        | Error::InferenceTimeout
        | Error::InvalidResponse(_)
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_creation() {
    let err = Error::not_found("tenant");
    assert!(matches!(err, Error::NotFound { .. }));
    assert!(err.is_not_found());

    let err = Error::validation("cluster id is required");
    assert!(matches!(err, Error::Validation { .. }));

    let err = Error::config("DATABASE_URL is required");
    assert!(matches!(err, Error::Config { .. }));
  }

  #[test]
  fn test_error_display() {
    let err = Error::InvalidTransition {
      from: JobStatus::Completed,
      to: JobStatus::Running,
    };
    assert_eq!(
      err.to_string(),
      "Invalid job status transition: completed -> running"
    );

    let err = Error::LokiQueryError { status: 500 };
    assert_eq!(err.to_string(), "Loki query error: status 500");
  }

  #[test]
  fn test_error_is_upstream() {
    assert!(Error::InferenceTimeout.is_upstream());
    assert!(Error::LokiUnreachable("connection refused".into()).is_upstream());
    assert!(!Error::NoLogsFound.is_upstream());
    assert!(!Error::not_found("job").is_upstream());
  }
}
