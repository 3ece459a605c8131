//! 数据模型模块
//! Data model module
//!
//! 定义了 LogHunter 各组件之间共享的数据结构。所有持久化实体都归属于一个租户。
//! Defines the data structures shared across LogHunter components. Every
//! persisted entity belongs to exactly one tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 租户，表示一个组织或团队
/// Tenant, representing an organization or team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
  pub id: Uuid,
  pub name: String,
  /// 发送 Loki 查询时使用的 X-Scope-OrgID
  /// X-Scope-OrgID used when issuing Loki queries
  pub loki_org_id: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// API 密钥，用于 CLI 和 API 访问认证
/// API key used for CLI and API access authentication
///
/// 原始密钥仅在创建时返回一次；存储的是前缀和慢哈希
/// The raw key is returned once at creation; only the prefix and a slow
/// hash are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
  pub id: Uuid,
  pub tenant_id: Uuid,
  pub name: String,
  /// 完整原始密钥的慢哈希，绝不对外暴露
  /// Slow hash of the full raw key, never exposed
  #[serde(skip_serializing)]
  pub key_hash: String,
  /// 原始密钥的前 8 个字符，用作查找索引
  /// First 8 characters of the raw key, used as a lookup index
  pub key_prefix: String,
  pub scopes: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_used_at: Option<DateTime<Utc>>,
  /// 软撤销时间；Some 表示密钥已失效
  /// Soft-revocation time; Some means the key is no longer active
  #[serde(skip_serializing)]
  pub revoked_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl ApiKey {
  /// 检查密钥是否携带指定作用域
  /// Check whether the key carries the given scope
  pub fn has_scope(&self, scope: &str) -> bool {
    self.scopes.iter().any(|s| s == scope)
  }
}

/// 单条日志行，仅存在于请求路径中，从不持久化
/// A single log line; exists only inside a request path, never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
  pub timestamp: DateTime<Utc>,
  pub message: String,
  pub labels: HashMap<String, String>,
  pub level: String,
}

/// 错误聚类：同一租户/服务/命名空间内共享指纹的日志行的去重分组
/// Error cluster: a deduplicated group of log lines sharing a fingerprint
/// within a tenant/service/namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCluster {
  pub id: Uuid,
  pub tenant_id: Uuid,
  pub service: String,
  pub namespace: String,
  pub fingerprint: String,
  /// 观测到的最高严重级别
  /// Highest severity ever observed
  pub level: String,
  pub first_seen_at: DateTime<Utc>,
  pub last_seen_at: DateTime<Utc>,
  pub count: i64,
  pub sample_message: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// 作业状态
/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
  /// 作业已创建，等待执行
  /// Job is created and waiting to run
  Pending,
  /// 作业正在执行
  /// Job is running
  Running,
  /// 作业执行成功（终态）
  /// Job finished successfully (terminal)
  Completed,
  /// 作业执行失败（终态）
  /// Job failed (terminal)
  Failed,
}

impl JobStatus {
  /// 将作业状态转换为字符串
  /// Convert job status to string
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Running => "running",
      Self::Completed => "completed",
      Self::Failed => "failed",
    }
  }

  /// 检查是否为终态
  /// Check whether the status is terminal
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Completed | Self::Failed)
  }

  /// 检查状态机是否允许转换到目标状态
  /// Check whether the state machine allows a transition to the target
  ///
  /// 允许的转换：pending -> running, running -> completed, running -> failed
  /// Allowed transitions: pending -> running, running -> completed,
  /// running -> failed
  pub fn can_transition_to(&self, next: JobStatus) -> bool {
    matches!(
      (self, next),
      (Self::Pending, Self::Running)
        | (Self::Running, Self::Completed)
        | (Self::Running, Self::Failed)
    )
  }
}

impl FromStr for JobStatus {
  type Err = ();

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s {
      "pending" => Ok(Self::Pending),
      "running" => Ok(Self::Running),
      "completed" => Ok(Self::Completed),
      "failed" => Ok(Self::Failed),
      _ => Err(()),
    }
  }
}

impl fmt::Display for JobStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// 异步作业，追踪一次 AI 分析或总结的执行
/// Async job, tracking one AI analysis or summarization run
///
/// API 在 POST /api/v1/analyze 上返回 job_id；客户端轮询
/// GET /api/v1/analyze/{job_id} 直到状态进入终态。
/// The API returns a job_id on POST /api/v1/analyze; clients poll
/// GET /api/v1/analyze/{job_id} until the status is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
  pub id: Uuid,
  pub tenant_id: Uuid,
  #[serde(rename = "type")]
  pub job_type: String,
  pub status: JobStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cluster_id: Option<Uuid>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error_message: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub started_at: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Job {
  /// 创建一个挂起状态的分析作业
  /// Create a pending analysis job
  pub fn new_analysis(tenant_id: Uuid, cluster_id: Uuid) -> Self {
    let now = Utc::now();
    Self {
      id: Uuid::new_v4(),
      tenant_id,
      job_type: "analysis".to_string(),
      status: JobStatus::Pending,
      cluster_id: Some(cluster_id),
      error_message: None,
      started_at: None,
      completed_at: None,
      created_at: now,
      updated_at: now,
    }
  }
}

/// AI 分析请求：一个错误聚类加上上下文日志行
/// AI analysis request: an error cluster plus context log lines
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
  pub cluster: ErrorCluster,
  pub context_logs: Vec<LogLine>,
}

/// AI 分析结果
/// AI analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
  pub id: Uuid,
  pub cluster_id: Uuid,
  pub tenant_id: Uuid,
  pub job_id: Uuid,
  pub provider: String,
  pub model: String,
  pub root_cause: String,
  /// 置信度，持久化前被钳制到 [0, 1]
  /// Confidence, clamped to [0, 1] before persisting
  pub confidence: f64,
  pub summary: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub suggested_action: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_job_status_conversion() {
    assert_eq!("pending".parse::<JobStatus>(), Ok(JobStatus::Pending));
    assert_eq!("failed".parse::<JobStatus>(), Ok(JobStatus::Failed));
    assert!("invalid".parse::<JobStatus>().is_err());

    assert_eq!(JobStatus::Running.as_str(), "running");
    assert_eq!(JobStatus::Completed.to_string(), "completed");
  }

  #[test]
  fn test_job_status_transitions() {
    assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
    assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
    assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));

    // 终态不允许任何转换
    // Terminal states permit no transitions
    assert!(!JobStatus::Completed.can_transition_to(JobStatus::Running));
    assert!(!JobStatus::Failed.can_transition_to(JobStatus::Pending));
    assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
    assert!(!JobStatus::Pending.can_transition_to(JobStatus::Failed));
  }

  #[test]
  fn test_job_status_terminal() {
    assert!(JobStatus::Completed.is_terminal());
    assert!(JobStatus::Failed.is_terminal());
    assert!(!JobStatus::Pending.is_terminal());
    assert!(!JobStatus::Running.is_terminal());
  }

  #[test]
  fn test_new_analysis_job() {
    let tenant_id = Uuid::new_v4();
    let cluster_id = Uuid::new_v4();
    let job = Job::new_analysis(tenant_id, cluster_id);

    assert_eq!(job.tenant_id, tenant_id);
    assert_eq!(job.cluster_id, Some(cluster_id));
    assert_eq!(job.job_type, "analysis");
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.started_at.is_none());
    assert!(job.completed_at.is_none());
  }

  #[test]
  fn test_api_key_scopes() {
    let now = Utc::now();
    let key = ApiKey {
      id: Uuid::new_v4(),
      tenant_id: Uuid::new_v4(),
      name: "ci".to_string(),
      key_hash: "hash".to_string(),
      key_prefix: "lh_12345".to_string(),
      scopes: vec!["read".to_string(), "write".to_string()],
      last_used_at: None,
      revoked_at: None,
      created_at: now,
      updated_at: now,
    };

    assert!(key.has_scope("read"));
    assert!(key.has_scope("write"));
    assert!(!key.has_scope("admin"));
  }

  #[test]
  fn test_api_key_serialization_hides_hash() {
    let now = Utc::now();
    let key = ApiKey {
      id: Uuid::new_v4(),
      tenant_id: Uuid::new_v4(),
      name: "ci".to_string(),
      key_hash: "super-secret-hash".to_string(),
      key_prefix: "lh_12345".to_string(),
      scopes: vec!["read".to_string()],
      last_used_at: None,
      revoked_at: None,
      created_at: now,
      updated_at: now,
    };

    let json = serde_json::to_string(&key).unwrap();
    assert!(!json.contains("super-secret-hash"));
    assert!(!json.contains("key_hash"));
    assert!(json.contains("key_prefix"));
  }
}
