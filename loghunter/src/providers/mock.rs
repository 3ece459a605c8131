//! 模拟提供方
//! Mock provider
//!
//! 返回确定性的分析结果，不访问任何外部服务；供测试和本地开发使用。
//! 还提供失败、崩溃和阻塞等行为变体，用于演练编排器的失败路径。
//! Returns deterministic analysis results without touching any external
//! service; used by tests and local development. Also offers failing,
//! panicking and hanging behavior variants to exercise the
//! orchestrator's failure paths.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{AnalysisRequest, AnalysisResult, LogLine};
use crate::providers::Provider;

/// 模拟提供方的行为
/// Mock provider behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
  /// 返回确定性结果
  /// Return deterministic results
  Success,
  /// 返回 provider_unavailable 错误
  /// Return a provider-unavailable error
  Unavailable,
  /// 返回 invalid_response 错误
  /// Return an invalid-response error
  InvalidResponse,
  /// 在调用中崩溃
  /// Panic inside the call
  Panic,
  /// 阻塞直到被取消
  /// Block until cancelled
  Hang,
}

/// 模拟提供方
/// Mock provider
#[derive(Debug)]
pub struct MockProvider {
  behavior: Behavior,
  root_cause: String,
  confidence: f64,
  summary: String,
  suggested_action: Option<String>,
}

impl MockProvider {
  /// 创建返回默认结果的模拟提供方
  /// Create a mock provider with default responses
  pub fn new() -> Self {
    Self {
      behavior: Behavior::Success,
      root_cause: "Simulated root cause from mock provider".to_string(),
      confidence: 0.85,
      summary: "Mock analysis summary for testing".to_string(),
      suggested_action: Some("Check application logs for more context".to_string()),
    }
  }

  /// 覆盖分析响应的字段
  /// Override the analysis response fields
  pub fn with_analysis(
    mut self,
    root_cause: impl Into<String>,
    confidence: f64,
    summary: impl Into<String>,
  ) -> Self {
    self.root_cause = root_cause.into();
    self.confidence = confidence;
    self.summary = summary.into();
    self
  }

  /// 创建总是返回 provider_unavailable 的模拟提供方
  /// Create a mock provider that always returns provider-unavailable
  pub fn failing() -> Self {
    Self {
      behavior: Behavior::Unavailable,
      ..Self::new()
    }
  }

  /// 创建总是返回 invalid_response 的模拟提供方
  /// Create a mock provider that always returns invalid-response
  pub fn invalid() -> Self {
    Self {
      behavior: Behavior::InvalidResponse,
      ..Self::new()
    }
  }

  /// 创建在调用中崩溃的模拟提供方
  /// Create a mock provider that panics inside the call
  pub fn panicking() -> Self {
    Self {
      behavior: Behavior::Panic,
      ..Self::new()
    }
  }

  /// 创建阻塞直到取消的模拟提供方
  /// Create a mock provider that blocks until cancelled
  pub fn hanging() -> Self {
    Self {
      behavior: Behavior::Hang,
      ..Self::new()
    }
  }

  async fn act(&self) -> Result<()> {
    match self.behavior {
      Behavior::Success => Ok(()),
      Behavior::Unavailable => Err(Error::ProviderUnavailable(
        "mock provider is unavailable".to_string(),
      )),
      Behavior::InvalidResponse => Err(Error::InvalidResponse(
        "mock provider produced garbage".to_string(),
      )),
      Behavior::Panic => panic!("mock provider crashed"),
      Behavior::Hang => {
        std::future::pending::<()>().await;
        unreachable!()
      }
    }
  }
}

impl Default for MockProvider {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Provider for MockProvider {
  fn name(&self) -> &str {
    "mock"
  }

  fn model(&self) -> &str {
    "mock-v1"
  }

  async fn analyze(&self, req: AnalysisRequest) -> Result<AnalysisResult> {
    self.act().await?;
    Ok(AnalysisResult {
      id: Uuid::new_v4(),
      cluster_id: req.cluster.id,
      tenant_id: req.cluster.tenant_id,
      job_id: Uuid::nil(),
      provider: self.name().to_string(),
      model: self.model().to_string(),
      root_cause: self.root_cause.clone(),
      confidence: self.confidence,
      summary: self.summary.clone(),
      suggested_action: self.suggested_action.clone(),
      created_at: Utc::now(),
    })
  }

  async fn summarize(&self, logs: &[LogLine]) -> Result<String> {
    self.act().await?;
    Ok(format!(
      "Mock summary: processed {} log entries for testing",
      logs.len()
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;
  use std::collections::HashMap;

  fn sample_request() -> AnalysisRequest {
    let now = Utc::now();
    AnalysisRequest {
      cluster: crate::models::ErrorCluster {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        service: "api".to_string(),
        namespace: "prod".to_string(),
        fingerprint: "fp".to_string(),
        level: "error".to_string(),
        first_seen_at: now,
        last_seen_at: now,
        count: 1,
        sample_message: "boom".to_string(),
        created_at: now,
        updated_at: now,
      },
      context_logs: vec![],
    }
  }

  #[tokio::test]
  async fn test_mock_analyze_defaults() {
    let provider = MockProvider::new();
    let req = sample_request();
    let result = provider.analyze(req.clone()).await.unwrap();

    assert_eq!(result.provider, "mock");
    assert_eq!(result.model, "mock-v1");
    assert_eq!(result.cluster_id, req.cluster.id);
    assert_eq!(result.confidence, 0.85);
    assert!(result.suggested_action.is_some());
  }

  #[tokio::test]
  async fn test_mock_analyze_override() {
    let provider = MockProvider::new().with_analysis("OOM", 1.5, "Out of memory");
    let result = provider.analyze(sample_request()).await.unwrap();

    // 钳制发生在编排器，模拟提供方按原样返回
    // Clamping happens in the orchestrator; the mock returns as-is
    assert_eq!(result.root_cause, "OOM");
    assert_eq!(result.confidence, 1.5);
  }

  #[tokio::test]
  async fn test_mock_failing_variants() {
    let err = MockProvider::failing()
      .analyze(sample_request())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::ProviderUnavailable(_)));

    let err = MockProvider::invalid()
      .summarize(&[])
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidResponse(_)));
  }

  #[tokio::test]
  async fn test_mock_summarize_counts_lines() {
    let provider = MockProvider::new();
    let lines = vec![LogLine {
      timestamp: Utc::now(),
      message: "hello".to_string(),
      labels: HashMap::new(),
      level: "info".to_string(),
    }];
    let summary = provider.summarize(&lines).await.unwrap();
    assert!(summary.contains("1 log entries"));
  }
}
