//! Loki 模拟客户端
//! Mock Loki client
//!
//! 返回预先配置的日志行，不访问任何外部服务；供测试使用
//! Returns preconfigured log lines without touching any external
//! service; used by tests

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::loki::{LokiClient, QueryRangeRequest};
use crate::models::LogLine;

/// 模拟 Loki 客户端
/// Mock Loki client
#[derive(Default)]
pub struct MockLokiClient {
  lines: Vec<LogLine>,
  labels: Vec<String>,
  fail_with_query_error: bool,
  /// 记录收到的最后一个查询，供断言使用
  /// Records the last query received, for assertions
  last_query: Mutex<Option<QueryRangeRequest>>,
}

impl MockLokiClient {
  /// 创建返回给定日志行的客户端
  /// Create a client that returns the given log lines
  pub fn with_lines(lines: Vec<LogLine>) -> Self {
    Self {
      lines,
      ..Default::default()
    }
  }

  /// 创建所有查询都失败的客户端
  /// Create a client whose queries always fail
  pub fn failing() -> Self {
    Self {
      fail_with_query_error: true,
      ..Default::default()
    }
  }

  /// 设置标签名列表
  /// Set the label name list
  pub fn with_labels(mut self, labels: Vec<String>) -> Self {
    self.labels = labels;
    self
  }

  /// 取出记录的最后一个查询
  /// Take the last recorded query
  pub async fn last_query(&self) -> Option<QueryRangeRequest> {
    self.last_query.lock().await.clone()
  }
}

#[async_trait]
impl LokiClient for MockLokiClient {
  async fn query_range(&self, req: QueryRangeRequest) -> Result<Vec<LogLine>> {
    *self.last_query.lock().await = Some(req);
    if self.fail_with_query_error {
      return Err(Error::LokiQueryError { status: 500 });
    }
    Ok(self.lines.clone())
  }

  async fn labels(&self) -> Result<Vec<String>> {
    Ok(self.labels.clone())
  }

  async fn label_values(&self, _label: &str) -> Result<Vec<String>> {
    Ok(self.labels.clone())
  }

  async fn ready(&self) -> Result<()> {
    if self.fail_with_query_error {
      return Err(Error::LokiUnreachable("mock loki down".to_string()));
    }
    Ok(())
  }
}
