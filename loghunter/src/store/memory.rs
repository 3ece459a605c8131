//! 内存存储实现
//! In-memory store implementation
//!
//! 使用内存数据结构实现 Store 接口的全部语义（唯一约束、状态机校验、
//! 租户隔离），不依赖任何外部服务，主要用于测试
//! Implements the full Store semantics (unique constraints,
//! state-machine validation, tenant isolation) with in-memory data
//! structures and no external service dependencies; primarily used by
//! tests

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{AnalysisResult, ApiKey, ErrorCluster, Job, JobStatus, Tenant};
use crate::store::{ClusterFilter, JobUpdate, Store};

#[derive(Default)]
struct Inner {
  tenants: Vec<Tenant>,
  api_keys: Vec<ApiKey>,
  clusters: Vec<ErrorCluster>,
  jobs: Vec<Job>,
  results: Vec<AnalysisResult>,
}

/// 内存存储
/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
  inner: RwLock<Inner>,
}

impl MemoryStore {
  /// 创建空存储
  /// Create an empty store
  pub fn new() -> Self {
    Self::default()
  }

  /// 写入租户（测试播种用）
  /// Insert a tenant (test seeding)
  pub async fn seed_tenant(&self, tenant: Tenant) {
    self.inner.write().await.tenants.push(tenant);
  }

  /// 创建并播种一个名为 default 的租户
  /// Create and seed a tenant named "default"
  pub async fn seed_default_tenant(&self) -> Tenant {
    let now = Utc::now();
    let tenant = Tenant {
      id: Uuid::new_v4(),
      name: "default".to_string(),
      loki_org_id: "default".to_string(),
      created_at: now,
      updated_at: now,
    };
    self.seed_tenant(tenant.clone()).await;
    tenant
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn ping(&self) -> Result<()> {
    Ok(())
  }

  async fn get_default_tenant(&self) -> Result<Tenant> {
    self
      .inner
      .read()
      .await
      .tenants
      .iter()
      .find(|t| t.name == "default")
      .cloned()
      .ok_or_else(|| Error::not_found("default tenant"))
  }

  async fn get_api_keys_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>> {
    Ok(
      self
        .inner
        .read()
        .await
        .api_keys
        .iter()
        .filter(|k| k.key_prefix == prefix && k.revoked_at.is_none())
        .cloned()
        .collect(),
    )
  }

  async fn update_api_key_last_used(&self, id: Uuid) -> Result<()> {
    let mut inner = self.inner.write().await;
    if let Some(key) = inner.api_keys.iter_mut().find(|k| k.id == id) {
      let now = Utc::now();
      key.last_used_at = Some(now);
      key.updated_at = now;
    }
    Ok(())
  }

  async fn create_api_key(&self, key: &ApiKey) -> Result<()> {
    let mut inner = self.inner.write().await;
    // 唯一约束：(tenant, name) 在未撤销的密钥中唯一
    // Unique constraint: (tenant, name) among non-revoked keys
    if inner
      .api_keys
      .iter()
      .any(|k| k.tenant_id == key.tenant_id && k.name == key.name && k.revoked_at.is_none())
    {
      return Err(Error::duplicate(format!(
        "api key \"{}\" already exists for tenant",
        key.name
      )));
    }
    inner.api_keys.push(key.clone());
    Ok(())
  }

  async fn list_api_keys(&self, tenant_id: Uuid) -> Result<Vec<ApiKey>> {
    let mut keys: Vec<ApiKey> = self
      .inner
      .read()
      .await
      .api_keys
      .iter()
      .filter(|k| k.tenant_id == tenant_id && k.revoked_at.is_none())
      .cloned()
      .collect();
    keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(keys)
  }

  async fn revoke_api_key(&self, id: Uuid, tenant_id: Uuid) -> Result<()> {
    let mut inner = self.inner.write().await;
    let key = inner
      .api_keys
      .iter_mut()
      .find(|k| k.id == id && k.tenant_id == tenant_id && k.revoked_at.is_none())
      .ok_or_else(|| Error::not_found(format!("api key {}", id)))?;
    let now = Utc::now();
    key.revoked_at = Some(now);
    key.updated_at = now;
    Ok(())
  }

  async fn upsert_error_cluster(&self, cluster: &ErrorCluster) -> Result<ErrorCluster> {
    let mut inner = self.inner.write().await;
    if let Some(existing) = inner.clusters.iter_mut().find(|c| {
      c.tenant_id == cluster.tenant_id
        && c.service == cluster.service
        && c.namespace == cluster.namespace
        && c.fingerprint == cluster.fingerprint
    }) {
      // 合并：count 累加，last_seen_at 取较晚者，原 id 保留
      // Merge: counts are added, last_seen_at takes the later value,
      // the original id is preserved
      existing.count += cluster.count;
      if cluster.last_seen_at > existing.last_seen_at {
        existing.last_seen_at = cluster.last_seen_at;
      }
      existing.updated_at = Utc::now();
      return Ok(existing.clone());
    }
    inner.clusters.push(cluster.clone());
    Ok(cluster.clone())
  }

  async fn list_error_clusters(&self, filter: ClusterFilter) -> Result<(Vec<ErrorCluster>, u64)> {
    let filter = filter.normalized();
    let inner = self.inner.read().await;

    let mut rows: Vec<ErrorCluster> = inner
      .clusters
      .iter()
      .filter(|c| c.tenant_id == filter.tenant_id)
      .filter(|c| filter.service.as_ref().is_none_or(|s| &c.service == s))
      .filter(|c| filter.namespace.as_ref().is_none_or(|n| &c.namespace == n))
      .filter(|c| filter.level.as_ref().is_none_or(|l| &c.level == l))
      .filter(|c| filter.since.is_none_or(|since| c.last_seen_at >= since))
      .cloned()
      .collect();
    rows.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));

    let total = rows.len() as u64;
    let offset = ((filter.page - 1) * filter.limit) as usize;
    let rows = rows
      .into_iter()
      .skip(offset)
      .take(filter.limit as usize)
      .collect();

    Ok((rows, total))
  }

  async fn get_error_cluster(&self, id: Uuid, tenant_id: Uuid) -> Result<ErrorCluster> {
    self
      .inner
      .read()
      .await
      .clusters
      .iter()
      .find(|c| c.id == id && c.tenant_id == tenant_id)
      .cloned()
      .ok_or_else(|| Error::not_found(format!("error cluster {}", id)))
  }

  async fn get_clusters_by_fingerprints(
    &self,
    tenant_id: Uuid,
    fingerprints: &[String],
  ) -> Result<Vec<ErrorCluster>> {
    Ok(
      self
        .inner
        .read()
        .await
        .clusters
        .iter()
        .filter(|c| c.tenant_id == tenant_id && fingerprints.contains(&c.fingerprint))
        .cloned()
        .collect(),
    )
  }

  async fn create_analysis_result(&self, result: &AnalysisResult) -> Result<()> {
    let mut inner = self.inner.write().await;
    if inner.results.iter().any(|r| r.job_id == result.job_id) {
      return Err(Error::duplicate(format!(
        "analysis result already exists for job {}",
        result.job_id
      )));
    }
    inner.results.push(result.clone());
    Ok(())
  }

  async fn get_analysis_result_by_job(&self, job_id: Uuid) -> Result<AnalysisResult> {
    self
      .inner
      .read()
      .await
      .results
      .iter()
      .find(|r| r.job_id == job_id)
      .cloned()
      .ok_or_else(|| Error::not_found(format!("analysis result for job {}", job_id)))
  }

  async fn get_analysis_result_by_cluster(&self, cluster_id: Uuid) -> Result<AnalysisResult> {
    self
      .inner
      .read()
      .await
      .results
      .iter()
      .filter(|r| r.cluster_id == cluster_id)
      .max_by_key(|r| r.created_at)
      .cloned()
      .ok_or_else(|| Error::not_found(format!("analysis result for cluster {}", cluster_id)))
  }

  async fn create_job(&self, job: &Job) -> Result<()> {
    self.inner.write().await.jobs.push(job.clone());
    Ok(())
  }

  async fn get_job(&self, id: Uuid, tenant_id: Uuid) -> Result<Job> {
    self
      .inner
      .read()
      .await
      .jobs
      .iter()
      .find(|j| j.id == id && j.tenant_id == tenant_id)
      .cloned()
      .ok_or_else(|| Error::not_found(format!("job {}", id)))
  }

  async fn update_job_status(&self, id: Uuid, status: JobStatus, update: JobUpdate) -> Result<()> {
    let mut inner = self.inner.write().await;
    let job = inner
      .jobs
      .iter_mut()
      .find(|j| j.id == id)
      .ok_or_else(|| Error::not_found(format!("job {}", id)))?;

    if !job.status.can_transition_to(status) {
      return Err(Error::InvalidTransition {
        from: job.status,
        to: status,
      });
    }

    let now = Utc::now();
    job.status = status;
    job.updated_at = now;
    if status == JobStatus::Running {
      job.started_at = Some(now);
    }
    if status.is_terminal() {
      job.completed_at = Some(now);
    }
    if let Some(message) = update.error_message {
      job.error_message = Some(message);
    }
    if let Some(cluster_id) = update.cluster_id {
      job.cluster_id = Some(cluster_id);
    }
    Ok(())
  }
}
