//! Loki 客户端模块
//! Loki client module
//!
//! 定义了与日志后端交互的抽象层以及 HTTP 实现
//! Defines the abstraction layer for the log backend plus the HTTP
//! implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::LogLine;

mod http;
mod mock;

pub use http::HttpLokiClient;
pub use mock::MockLokiClient;

/// 查询方向
/// Query direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
  /// 最新的在前
  /// Newest first
  #[default]
  Backward,
  /// 最旧的在前
  /// Oldest first
  Forward,
}

impl Direction {
  /// 转换为 Loki API 的方向参数
  /// Convert to the Loki API direction parameter
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Backward => "backward",
      Self::Forward => "forward",
    }
  }
}

/// 范围查询请求参数
/// Range query request parameters
#[derive(Debug, Clone)]
pub struct QueryRangeRequest {
  pub query: String,
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
  /// 最大返回行数；0 表示省略该参数
  /// Maximum number of lines; 0 omits the parameter
  pub limit: usize,
  pub direction: Direction,
}

/// Loki 查询接口
/// Loki query trait
#[async_trait]
pub trait LokiClient: Send + Sync {
  /// 执行范围查询，返回扁平的日志行序列
  /// Execute a range query, returning a flat sequence of log lines
  async fn query_range(&self, req: QueryRangeRequest) -> Result<Vec<LogLine>>;

  /// 返回全部标签名
  /// Return all label names
  async fn labels(&self) -> Result<Vec<String>>;

  /// 返回某个标签的全部取值
  /// Return all values of a label
  async fn label_values(&self, label: &str) -> Result<Vec<String>>;

  /// 存活检查
  /// Liveness check
  async fn ready(&self) -> Result<()>;
}
