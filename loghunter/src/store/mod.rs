//! 数据存储模块
//! Data store module
//!
//! 定义了持久化层的抽象接口。每个查询都显式携带租户标识；不存在跨租户
//! 读取路径。
//! Defines the persistence abstraction. Every query carries an explicit
//! tenant identifier; there is no cross-tenant read path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AnalysisResult, ApiKey, ErrorCluster, Job, JobStatus, Tenant};

pub mod entity;
mod memory;
mod sql;

pub use memory::MemoryStore;
pub use sql::{connect, SqlStore};

/// 列表查询的默认页大小
/// Default page size for list queries
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// 列表查询的页大小上限
/// Page size ceiling for list queries
pub const MAX_PAGE_SIZE: u64 = 100;

/// 错误聚类列表过滤器
/// Error cluster list filter
#[derive(Debug, Clone)]
pub struct ClusterFilter {
  pub tenant_id: Uuid,
  pub service: Option<String>,
  pub namespace: Option<String>,
  pub level: Option<String>,
  pub since: Option<DateTime<Utc>>,
  /// 页码，从 1 开始
  /// Page number, 1-indexed
  pub page: u64,
  pub limit: u64,
}

impl ClusterFilter {
  /// 创建仅按租户过滤的过滤器
  /// Create a filter scoped only by tenant
  pub fn new(tenant_id: Uuid) -> Self {
    Self {
      tenant_id,
      service: None,
      namespace: None,
      level: None,
      since: None,
      page: 1,
      limit: DEFAULT_PAGE_SIZE,
    }
  }

  /// 规范化分页参数：页码至少为 1，页大小在 [1, 100] 内，0 取默认值
  /// Normalize pagination: page is at least 1, limit falls into
  /// [1, 100], 0 takes the default
  pub fn normalized(mut self) -> Self {
    if self.limit == 0 {
      self.limit = DEFAULT_PAGE_SIZE;
    }
    if self.limit > MAX_PAGE_SIZE {
      self.limit = MAX_PAGE_SIZE;
    }
    if self.page == 0 {
      self.page = 1;
    }
    self
  }
}

/// 作业状态更新的可选字段
/// Optional fields for a job status update
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
  pub error_message: Option<String>,
  pub cluster_id: Option<Uuid>,
}

impl JobUpdate {
  /// 携带错误信息的更新
  /// Update carrying an error message
  pub fn with_error<S: Into<String>>(message: S) -> Self {
    Self {
      error_message: Some(message.into()),
      ..Default::default()
    }
  }

  /// 携带聚类引用的更新
  /// Update carrying a cluster reference
  pub fn with_cluster(cluster_id: Uuid) -> Self {
    Self {
      cluster_id: Some(cluster_id),
      ..Default::default()
    }
  }
}

/// 数据访问接口，所有数据库操作都经由此处
/// Data access trait; all database operations go through here
#[async_trait]
pub trait Store: Send + Sync {
  /// 存活检查
  /// Liveness check
  async fn ping(&self) -> Result<()>;

  /// 返回种子化的默认租户
  /// Return the seeded default tenant
  async fn get_default_tenant(&self) -> Result<Tenant>;

  /// 按前缀查找所有未撤销的 API 密钥
  /// Find all non-revoked API keys by prefix
  async fn get_api_keys_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>>;

  /// 刷新密钥的最后使用时间
  /// Stamp the key's last-used time
  async fn update_api_key_last_used(&self, id: Uuid) -> Result<()>;

  /// 创建 API 密钥；(tenant, name) 冲突返回 duplicate 错误
  /// Create an API key; a (tenant, name) conflict yields a duplicate
  /// error
  async fn create_api_key(&self, key: &ApiKey) -> Result<()>;

  /// 列出租户的全部未撤销密钥
  /// List all non-revoked keys of a tenant
  async fn list_api_keys(&self, tenant_id: Uuid) -> Result<Vec<ApiKey>>;

  /// 软撤销密钥；无匹配的活跃密钥时返回 not_found
  /// Soft-revoke a key; not_found when no active key matches
  async fn revoke_api_key(&self, id: Uuid, tenant_id: Uuid) -> Result<()>;

  /// 插入或合并错误聚类
  /// Insert or merge an error cluster
  ///
  /// 唯一键冲突时累加 count、推进 last_seen_at，并返回保留原 id 的
  /// 规范行
  /// On a unique-key conflict the counts are added, last_seen_at
  /// advances, and the canonical row (original id preserved) is
  /// returned
  async fn upsert_error_cluster(&self, cluster: &ErrorCluster) -> Result<ErrorCluster>;

  /// 分页列出错误聚类，返回 (行, 总数)
  /// List error clusters with pagination, returning (rows, total)
  async fn list_error_clusters(&self, filter: ClusterFilter) -> Result<(Vec<ErrorCluster>, u64)>;

  /// 按 id 读取租户内的错误聚类
  /// Get an error cluster by id within the tenant
  async fn get_error_cluster(&self, id: Uuid, tenant_id: Uuid) -> Result<ErrorCluster>;

  /// 返回租户内匹配给定指纹的聚类
  /// Return clusters within the tenant matching the given fingerprints
  async fn get_clusters_by_fingerprints(
    &self,
    tenant_id: Uuid,
    fingerprints: &[String],
  ) -> Result<Vec<ErrorCluster>>;

  /// 创建分析结果；每个作业至多一条
  /// Create an analysis result; at most one per job
  async fn create_analysis_result(&self, result: &AnalysisResult) -> Result<()>;

  /// 按作业 id 读取分析结果
  /// Get the analysis result by job id
  async fn get_analysis_result_by_job(&self, job_id: Uuid) -> Result<AnalysisResult>;

  /// 按聚类 id 读取最近的分析结果
  /// Get the most recent analysis result by cluster id
  async fn get_analysis_result_by_cluster(&self, cluster_id: Uuid) -> Result<AnalysisResult>;

  /// 创建作业
  /// Create a job
  async fn create_job(&self, job: &Job) -> Result<()>;

  /// 按 id 读取租户内的作业
  /// Get a job by id within the tenant
  async fn get_job(&self, id: Uuid, tenant_id: Uuid) -> Result<Job>;

  /// 更新作业状态
  /// Update the job status
  ///
  /// 校验状态机转换；进入 running 时写入 started_at，进入终态时写入
  /// completed_at，并设置附带的错误信息或聚类引用
  /// Validates the state-machine transition; stamps started_at on
  /// entering running and completed_at on entering a terminal state,
  /// and sets any supplied error message or cluster reference
  async fn update_job_status(&self, id: Uuid, status: JobStatus, update: JobUpdate) -> Result<()>;
}
