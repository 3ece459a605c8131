//! Postgres 存储实现
//! Postgres store implementation
//!
//! 基于 SeaORM 实现 Store 接口。唯一约束在存储层强制执行，冲突以
//! duplicate 错误类别浮出。
//! Implements the Store trait with SeaORM. Unique constraints are
//! enforced at the storage layer; conflicts surface as the duplicate
//! error kind.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
  ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectOptions, Database, DatabaseConnection,
  EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{AnalysisResult, ApiKey, ErrorCluster, Job, JobStatus, Tenant};
use crate::store::entity::{analysis_results, api_keys, error_clusters, jobs, tenants};
use crate::store::{ClusterFilter, JobUpdate, Store};

/// 建立数据库连接池
/// Establish the database connection pool
///
/// 空闲连接按生命周期上限回收
/// Idle connections are recycled on a lifetime bound
pub async fn connect(
  url: &str,
  max_connections: u32,
  min_connections: u32,
  max_lifetime: Duration,
) -> Result<DatabaseConnection> {
  let mut opts = ConnectOptions::new(url.to_string());
  opts
    .max_connections(max_connections)
    .min_connections(min_connections)
    .max_lifetime(max_lifetime)
    .sqlx_logging(false);
  let db = Database::connect(opts).await?;
  db.ping().await?;
  Ok(db)
}

/// Postgres 存储
/// Postgres store
#[derive(Clone)]
pub struct SqlStore {
  db: DatabaseConnection,
}

impl SqlStore {
  /// 从已有连接创建存储
  /// Create a store from an existing connection
  pub fn new(db: DatabaseConnection) -> Self {
    Self { db }
  }
}

fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
  matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[async_trait]
impl Store for SqlStore {
  async fn ping(&self) -> Result<()> {
    self.db.ping().await?;
    Ok(())
  }

  async fn get_default_tenant(&self) -> Result<Tenant> {
    tenants::Entity::find()
      .filter(tenants::Column::Name.eq("default"))
      .one(&self.db)
      .await?
      .map(Tenant::from)
      .ok_or_else(|| Error::not_found("default tenant"))
  }

  async fn get_api_keys_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>> {
    let rows = api_keys::Entity::find()
      .filter(api_keys::Column::KeyPrefix.eq(prefix))
      .filter(api_keys::Column::RevokedAt.is_null())
      .all(&self.db)
      .await?;
    Ok(rows.into_iter().map(ApiKey::from).collect())
  }

  async fn update_api_key_last_used(&self, id: Uuid) -> Result<()> {
    let now = Utc::now();
    api_keys::Entity::update_many()
      .col_expr(api_keys::Column::LastUsedAt, Expr::value(Some(now)))
      .col_expr(api_keys::Column::UpdatedAt, Expr::value(now))
      .filter(api_keys::Column::Id.eq(id))
      .exec(&self.db)
      .await?;
    Ok(())
  }

  async fn create_api_key(&self, key: &ApiKey) -> Result<()> {
    let active = api_keys::ActiveModel {
      id: Set(key.id),
      tenant_id: Set(key.tenant_id),
      name: Set(key.name.clone()),
      key_hash: Set(key.key_hash.clone()),
      key_prefix: Set(key.key_prefix.clone()),
      scopes: Set(key.scopes.clone()),
      last_used_at: Set(key.last_used_at),
      revoked_at: Set(key.revoked_at),
      created_at: Set(key.created_at),
      updated_at: Set(key.updated_at),
    };
    match active.insert(&self.db).await {
      Ok(_) => Ok(()),
      Err(e) if is_unique_violation(&e) => Err(Error::duplicate(format!(
        "api key \"{}\" already exists for tenant",
        key.name
      ))),
      Err(e) => Err(e.into()),
    }
  }

  async fn list_api_keys(&self, tenant_id: Uuid) -> Result<Vec<ApiKey>> {
    let rows = api_keys::Entity::find()
      .filter(api_keys::Column::TenantId.eq(tenant_id))
      .filter(api_keys::Column::RevokedAt.is_null())
      .order_by_desc(api_keys::Column::CreatedAt)
      .all(&self.db)
      .await?;
    Ok(rows.into_iter().map(ApiKey::from).collect())
  }

  async fn revoke_api_key(&self, id: Uuid, tenant_id: Uuid) -> Result<()> {
    let now = Utc::now();
    let res = api_keys::Entity::update_many()
      .col_expr(api_keys::Column::RevokedAt, Expr::value(Some(now)))
      .col_expr(api_keys::Column::UpdatedAt, Expr::value(now))
      .filter(api_keys::Column::Id.eq(id))
      .filter(api_keys::Column::TenantId.eq(tenant_id))
      .filter(api_keys::Column::RevokedAt.is_null())
      .exec(&self.db)
      .await?;
    if res.rows_affected == 0 {
      return Err(Error::not_found(format!("api key {}", id)));
    }
    Ok(())
  }

  async fn upsert_error_cluster(&self, cluster: &ErrorCluster) -> Result<ErrorCluster> {
    let active = error_clusters::ActiveModel {
      id: Set(cluster.id),
      tenant_id: Set(cluster.tenant_id),
      service: Set(cluster.service.clone()),
      namespace: Set(cluster.namespace.clone()),
      fingerprint: Set(cluster.fingerprint.clone()),
      level: Set(cluster.level.clone()),
      first_seen_at: Set(cluster.first_seen_at),
      last_seen_at: Set(cluster.last_seen_at),
      count: Set(cluster.count),
      sample_message: Set(cluster.sample_message.clone()),
      created_at: Set(cluster.created_at),
      updated_at: Set(cluster.updated_at),
    };

    match active.insert(&self.db).await {
      Ok(row) => Ok(row.into()),
      Err(e) if is_unique_violation(&e) => self.merge_cluster(cluster).await,
      Err(e) => Err(e.into()),
    }
  }

  async fn list_error_clusters(&self, filter: ClusterFilter) -> Result<(Vec<ErrorCluster>, u64)> {
    let filter = filter.normalized();

    let mut query =
      error_clusters::Entity::find().filter(error_clusters::Column::TenantId.eq(filter.tenant_id));
    if let Some(service) = &filter.service {
      query = query.filter(error_clusters::Column::Service.eq(service));
    }
    if let Some(namespace) = &filter.namespace {
      query = query.filter(error_clusters::Column::Namespace.eq(namespace));
    }
    if let Some(level) = &filter.level {
      query = query.filter(error_clusters::Column::Level.eq(level));
    }
    if let Some(since) = filter.since {
      query = query.filter(error_clusters::Column::LastSeenAt.gte(since));
    }

    let total = query.clone().count(&self.db).await?;
    let rows = query
      .order_by_desc(error_clusters::Column::LastSeenAt)
      .paginate(&self.db, filter.limit)
      .fetch_page(filter.page - 1)
      .await?;

    Ok((rows.into_iter().map(ErrorCluster::from).collect(), total))
  }

  async fn get_error_cluster(&self, id: Uuid, tenant_id: Uuid) -> Result<ErrorCluster> {
    error_clusters::Entity::find()
      .filter(error_clusters::Column::Id.eq(id))
      .filter(error_clusters::Column::TenantId.eq(tenant_id))
      .one(&self.db)
      .await?
      .map(ErrorCluster::from)
      .ok_or_else(|| Error::not_found(format!("error cluster {}", id)))
  }

  async fn get_clusters_by_fingerprints(
    &self,
    tenant_id: Uuid,
    fingerprints: &[String],
  ) -> Result<Vec<ErrorCluster>> {
    if fingerprints.is_empty() {
      return Ok(Vec::new());
    }
    let rows = error_clusters::Entity::find()
      .filter(error_clusters::Column::TenantId.eq(tenant_id))
      .filter(error_clusters::Column::Fingerprint.is_in(fingerprints.to_vec()))
      .all(&self.db)
      .await?;
    Ok(rows.into_iter().map(ErrorCluster::from).collect())
  }

  async fn create_analysis_result(&self, result: &AnalysisResult) -> Result<()> {
    let active = analysis_results::ActiveModel {
      id: Set(result.id),
      cluster_id: Set(result.cluster_id),
      tenant_id: Set(result.tenant_id),
      job_id: Set(result.job_id),
      provider: Set(result.provider.clone()),
      model: Set(result.model.clone()),
      root_cause: Set(result.root_cause.clone()),
      confidence: Set(result.confidence),
      summary: Set(result.summary.clone()),
      suggested_action: Set(result.suggested_action.clone()),
      created_at: Set(result.created_at),
    };
    match active.insert(&self.db).await {
      Ok(_) => Ok(()),
      Err(e) if is_unique_violation(&e) => Err(Error::duplicate(format!(
        "analysis result already exists for job {}",
        result.job_id
      ))),
      Err(e) => Err(e.into()),
    }
  }

  async fn get_analysis_result_by_job(&self, job_id: Uuid) -> Result<AnalysisResult> {
    analysis_results::Entity::find()
      .filter(analysis_results::Column::JobId.eq(job_id))
      .one(&self.db)
      .await?
      .map(AnalysisResult::from)
      .ok_or_else(|| Error::not_found(format!("analysis result for job {}", job_id)))
  }

  async fn get_analysis_result_by_cluster(&self, cluster_id: Uuid) -> Result<AnalysisResult> {
    analysis_results::Entity::find()
      .filter(analysis_results::Column::ClusterId.eq(cluster_id))
      .order_by_desc(analysis_results::Column::CreatedAt)
      .one(&self.db)
      .await?
      .map(AnalysisResult::from)
      .ok_or_else(|| Error::not_found(format!("analysis result for cluster {}", cluster_id)))
  }

  async fn create_job(&self, job: &Job) -> Result<()> {
    let active = jobs::ActiveModel {
      id: Set(job.id),
      tenant_id: Set(job.tenant_id),
      job_type: Set(job.job_type.clone()),
      status: Set(job.status.into()),
      cluster_id: Set(job.cluster_id),
      error_message: Set(job.error_message.clone()),
      started_at: Set(job.started_at),
      completed_at: Set(job.completed_at),
      created_at: Set(job.created_at),
      updated_at: Set(job.updated_at),
    };
    active.insert(&self.db).await?;
    Ok(())
  }

  async fn get_job(&self, id: Uuid, tenant_id: Uuid) -> Result<Job> {
    jobs::Entity::find()
      .filter(jobs::Column::Id.eq(id))
      .filter(jobs::Column::TenantId.eq(tenant_id))
      .one(&self.db)
      .await?
      .map(Job::from)
      .ok_or_else(|| Error::not_found(format!("job {}", id)))
  }

  async fn update_job_status(&self, id: Uuid, status: JobStatus, update: JobUpdate) -> Result<()> {
    // 转换在事务内校验，作业的状态变更经由存储串行化
    // The transition is validated inside a transaction; state changes
    // for a job are serialized through the store
    let txn = self.db.begin().await?;

    let job = jobs::Entity::find_by_id(id)
      .one(&txn)
      .await?
      .ok_or_else(|| Error::not_found(format!("job {}", id)))?;

    let current: JobStatus = job.status.clone().into();
    if !current.can_transition_to(status) {
      return Err(Error::InvalidTransition {
        from: current,
        to: status,
      });
    }

    let now = Utc::now();
    let mut active: jobs::ActiveModel = job.into();
    active.status = Set(status.into());
    active.updated_at = Set(now);
    if status == JobStatus::Running {
      active.started_at = Set(Some(now));
    }
    if status.is_terminal() {
      active.completed_at = Set(Some(now));
    }
    if let Some(message) = update.error_message {
      active.error_message = Set(Some(message));
    }
    if let Some(cluster_id) = update.cluster_id {
      active.cluster_id = Set(Some(cluster_id));
    }
    active.update(&txn).await?;

    txn.commit().await?;
    Ok(())
  }
}

impl SqlStore {
  /// 唯一键冲突后的合并路径：count 原子累加，last_seen_at 只向前推进
  /// Merge path after a unique-key conflict: count is added atomically
  /// and last_seen_at only moves forward
  async fn merge_cluster(&self, cluster: &ErrorCluster) -> Result<ErrorCluster> {
    let now = Utc::now();

    error_clusters::Entity::update_many()
      .col_expr(
        error_clusters::Column::Count,
        Expr::col(error_clusters::Column::Count).add(cluster.count),
      )
      .col_expr(error_clusters::Column::UpdatedAt, Expr::value(now))
      .filter(error_clusters::Column::TenantId.eq(cluster.tenant_id))
      .filter(error_clusters::Column::Service.eq(cluster.service.clone()))
      .filter(error_clusters::Column::Namespace.eq(cluster.namespace.clone()))
      .filter(error_clusters::Column::Fingerprint.eq(cluster.fingerprint.clone()))
      .exec(&self.db)
      .await?;

    error_clusters::Entity::update_many()
      .col_expr(
        error_clusters::Column::LastSeenAt,
        Expr::value(cluster.last_seen_at),
      )
      .filter(error_clusters::Column::TenantId.eq(cluster.tenant_id))
      .filter(error_clusters::Column::Service.eq(cluster.service.clone()))
      .filter(error_clusters::Column::Namespace.eq(cluster.namespace.clone()))
      .filter(error_clusters::Column::Fingerprint.eq(cluster.fingerprint.clone()))
      .filter(error_clusters::Column::LastSeenAt.lt(cluster.last_seen_at))
      .exec(&self.db)
      .await?;

    error_clusters::Entity::find()
      .filter(error_clusters::Column::TenantId.eq(cluster.tenant_id))
      .filter(error_clusters::Column::Service.eq(cluster.service.clone()))
      .filter(error_clusters::Column::Namespace.eq(cluster.namespace.clone()))
      .filter(error_clusters::Column::Fingerprint.eq(cluster.fingerprint.clone()))
      .one(&self.db)
      .await?
      .map(ErrorCluster::from)
      .ok_or_else(|| Error::not_found(format!("error cluster {}", cluster.fingerprint)))
  }
}

// --- 实体与模型之间的转换 / Conversions between entities and models ---

impl From<tenants::Model> for Tenant {
  fn from(m: tenants::Model) -> Self {
    Self {
      id: m.id,
      name: m.name,
      loki_org_id: m.loki_org_id,
      created_at: m.created_at,
      updated_at: m.updated_at,
    }
  }
}

impl From<api_keys::Model> for ApiKey {
  fn from(m: api_keys::Model) -> Self {
    Self {
      id: m.id,
      tenant_id: m.tenant_id,
      name: m.name,
      key_hash: m.key_hash,
      key_prefix: m.key_prefix,
      scopes: m.scopes,
      last_used_at: m.last_used_at,
      revoked_at: m.revoked_at,
      created_at: m.created_at,
      updated_at: m.updated_at,
    }
  }
}

impl From<error_clusters::Model> for ErrorCluster {
  fn from(m: error_clusters::Model) -> Self {
    Self {
      id: m.id,
      tenant_id: m.tenant_id,
      service: m.service,
      namespace: m.namespace,
      fingerprint: m.fingerprint,
      level: m.level,
      first_seen_at: m.first_seen_at,
      last_seen_at: m.last_seen_at,
      count: m.count,
      sample_message: m.sample_message,
      created_at: m.created_at,
      updated_at: m.updated_at,
    }
  }
}

impl From<jobs::Model> for Job {
  fn from(m: jobs::Model) -> Self {
    Self {
      id: m.id,
      tenant_id: m.tenant_id,
      job_type: m.job_type,
      status: m.status.into(),
      cluster_id: m.cluster_id,
      error_message: m.error_message,
      started_at: m.started_at,
      completed_at: m.completed_at,
      created_at: m.created_at,
      updated_at: m.updated_at,
    }
  }
}

impl From<analysis_results::Model> for AnalysisResult {
  fn from(m: analysis_results::Model) -> Self {
    Self {
      id: m.id,
      cluster_id: m.cluster_id,
      tenant_id: m.tenant_id,
      job_id: m.job_id,
      provider: m.provider,
      model: m.model,
      root_cause: m.root_cause,
      confidence: m.confidence,
      summary: m.summary,
      suggested_action: m.suggested_action,
      created_at: m.created_at,
    }
  }
}

impl From<jobs::JobStatus> for JobStatus {
  fn from(s: jobs::JobStatus) -> Self {
    match s {
      jobs::JobStatus::Pending => Self::Pending,
      jobs::JobStatus::Running => Self::Running,
      jobs::JobStatus::Completed => Self::Completed,
      jobs::JobStatus::Failed => Self::Failed,
    }
  }
}

impl From<JobStatus> for jobs::JobStatus {
  fn from(s: JobStatus) -> Self {
    match s {
      JobStatus::Pending => Self::Pending,
      JobStatus::Running => Self::Running,
      JobStatus::Completed => Self::Completed,
      JobStatus::Failed => Self::Failed,
    }
  }
}
