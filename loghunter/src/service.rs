//! 分析编排器模块
//! Analysis orchestrator module
//!
//! 接收分析/总结意图，创建作业，在截止时间内异步执行推理，持久化结果并
//! 暴露轮询。触发调用在推理开始前立即返回；后台任务自带崩溃屏障，并且
//! 总是把作业状态收尾到终态。
//! Accepts analysis/summarization intents, creates jobs, runs inference
//! asynchronously under a deadline, persists results and exposes
//! polling. The trigger call returns before inference starts; the
//! background task owns a panic barrier and always closes out the job
//! state.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::FutureExt;
use sha2::{Digest, Sha256};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::{keys, Cache};
use crate::cluster::{cluster_lines, truncate_utf8};
use crate::error::{Error, Result};
use crate::logql::{DetectionParams, QueryBuilder, SearchParams};
use crate::loki::{Direction, LokiClient, QueryRangeRequest};
use crate::models::{AnalysisRequest, AnalysisResult, ErrorCluster, Job, JobStatus};
use crate::providers::Provider;
use crate::store::{JobUpdate, Store};

/// 作业状态镜像在缓存中的保留时间
/// How long job status mirrors are retained in the cache
pub const JOB_STATUS_TTL: Duration = Duration::from_secs(30 * 60);

/// 搜索结果在缓存中的保留时间
/// How long search results are retained in the cache
const SEARCH_CACHE_TTL: Duration = Duration::from_secs(60);

/// 检测查询在聚类窗口前后扩展的分钟数
/// Minutes the detection query extends around the cluster window
const CONTEXT_WINDOW_MINUTES: i64 = 5;

/// 上下文日志的行数上限
/// Line limit for context logs
const CONTEXT_LOG_LIMIT: usize = 1000;

const MAX_ROOT_CAUSE_BYTES: usize = 4000;
const MAX_SUMMARY_BYTES: usize = 2000;
const MAX_LINE_BYTES: usize = 500;

/// 总结请求的已校验参数
/// Validated parameters for a summarization request
#[derive(Debug, Clone)]
pub struct SummarizeParams {
  pub tenant_id: Uuid,
  pub service: String,
  pub namespace: String,
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
  pub max_lines: usize,
}

/// 总结操作的输出
/// Output of a summarization operation
#[derive(Debug, Clone)]
pub struct SummarizeOutcome {
  pub summary: String,
  pub lines_analyzed: usize,
  pub from: DateTime<Utc>,
  pub to: DateTime<Utc>,
  pub provider: String,
  pub model: String,
}

/// 搜索请求的已校验参数
/// Validated parameters for a search request
#[derive(Debug, Clone)]
pub struct SearchRequest {
  pub tenant_id: Uuid,
  pub service: String,
  pub namespace: String,
  pub keyword: String,
  pub levels: Vec<String>,
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
  pub limit: usize,
}

/// 搜索操作的输出
/// Output of a search operation
#[derive(Debug, Clone)]
pub struct SearchOutcome {
  /// 按 (count, 严重度) 降序排列的聚类
  /// Clusters ordered by (count, severity) descending
  pub clusters: Vec<ErrorCluster>,
  pub lines_scanned: usize,
  pub from_cache: bool,
}

/// 作业轮询的结果：作业本身，以及完成时的分析结果
/// Result of a job poll: the job itself plus the analysis result when
/// completed
#[derive(Debug, Clone)]
pub struct PolledJob {
  pub job: Job,
  pub result: Option<AnalysisResult>,
}

/// 分析编排器
/// Analysis orchestrator
///
/// 所有字段都可廉价克隆，服务整体按值捕获进后台任务
/// All fields are cheap to clone; the service is captured by value into
/// background tasks
#[derive(Clone)]
pub struct AnalysisService {
  store: Arc<dyn Store>,
  cache: Arc<dyn Cache>,
  loki: Arc<dyn LokiClient>,
  provider: Arc<dyn Provider>,
  inference_timeout: Duration,
  /// 后台任务的根取消令牌，与 HTTP 请求的生命周期无关
  /// Root cancellation token for background tasks, independent of any
  /// HTTP request lifetime
  shutdown: CancellationToken,
}

impl AnalysisService {
  /// 创建新的分析编排器
  /// Create a new analysis orchestrator
  pub fn new(
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    loki: Arc<dyn LokiClient>,
    provider: Arc<dyn Provider>,
    inference_timeout: Duration,
    shutdown: CancellationToken,
  ) -> Self {
    Self {
      store,
      cache,
      loki,
      provider,
      inference_timeout,
      shutdown,
    }
  }

  /// 创建挂起作业并在后台任务中派发分析，立即返回作业句柄
  /// Create a pending job and dispatch the analysis in a background
  /// task, returning the job handle immediately
  pub async fn trigger_analysis(&self, cluster: &ErrorCluster) -> Result<Job> {
    if cluster.id == Uuid::nil() {
      return Err(Error::validation("invalid cluster: id is required"));
    }

    let job = Job::new_analysis(cluster.tenant_id, cluster.id);
    self.store.create_job(&job).await?;

    if let Err(e) = self
      .cache
      .set_job_status(job.id, JobStatus::Pending, JOB_STATUS_TTL)
      .await
    {
      tracing::warn!(job_id = %job.id, error = %e, "failed to mirror pending job status");
    }

    let service = self.clone();
    let cluster = cluster.clone();
    let job_id = job.id;
    tokio::spawn(async move {
      service.run_analysis(cluster, job_id).await;
    });

    Ok(job)
  }

  /// 读取作业并在终态时合并分析结果；租户不匹配呈现为 not_found
  /// Read the job and join the analysis result in a terminal state; a
  /// tenant mismatch presents as not_found
  pub async fn poll_job(&self, job_id: Uuid, tenant_id: Uuid) -> Result<PolledJob> {
    let job = self.store.get_job(job_id, tenant_id).await?;

    let result = if job.status == JobStatus::Completed {
      match self.store.get_analysis_result_by_job(job_id).await {
        Ok(result) => Some(result),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e),
      }
    } else {
      None
    };

    Ok(PolledJob { job, result })
  }

  /// 同步的日志总结路径
  /// Synchronous log summarization path
  pub async fn summarize(&self, params: SummarizeParams) -> Result<SummarizeOutcome> {
    let query = QueryBuilder.search_query(&SearchParams {
      service: params.service.clone(),
      namespace: params.namespace.clone(),
      ..Default::default()
    });

    let mut logs = self
      .loki
      .query_range(QueryRangeRequest {
        query,
        start: params.start,
        end: params.end,
        limit: params.max_lines,
        direction: Direction::Backward,
      })
      .await?;

    if logs.is_empty() {
      return Err(Error::NoLogsFound);
    }

    // 发送给提供方之前截断超长消息
    // Truncate long messages before sending them to the provider
    for line in &mut logs {
      if line.message.len() > MAX_LINE_BYTES {
        line.message = truncate_utf8(&line.message, MAX_LINE_BYTES).to_string();
      }
    }

    let lines_analyzed = logs.len();
    let summary = self
      .with_inference_deadline(self.provider.summarize(&logs))
      .await?;

    Ok(SummarizeOutcome {
      summary,
      lines_analyzed,
      from: params.start,
      to: params.end,
      provider: self.provider.name().to_string(),
      model: self.provider.model().to_string(),
    })
  }

  /// 带缓存记忆的日志搜索：命中的行按指纹聚类返回
  /// Cached log search: matching lines are returned clustered by
  /// fingerprint
  pub async fn search(&self, req: SearchRequest) -> Result<SearchOutcome> {
    let cache_key = keys::search_result_key(req.tenant_id, &search_filter_hash(&req));

    if let Ok(Some(bytes)) = self.cache.get(&cache_key).await {
      if let Ok(cached) = serde_json::from_slice::<CachedSearch>(&bytes) {
        return Ok(SearchOutcome {
          clusters: cached.clusters,
          lines_scanned: cached.lines_scanned,
          from_cache: true,
        });
      }
    }

    let query = QueryBuilder.search_query(&SearchParams {
      service: req.service.clone(),
      namespace: req.namespace.clone(),
      levels: req.levels.clone(),
      keyword: req.keyword.clone(),
    });

    let lines = self
      .loki
      .query_range(QueryRangeRequest {
        query,
        start: req.start,
        end: req.end,
        limit: req.limit,
        direction: Direction::Backward,
      })
      .await?;

    let lines_scanned = lines.len();
    let clusters = cluster_lines(&lines, req.tenant_id, &req.service, &req.namespace);

    let cached = CachedSearch {
      clusters: clusters.clone(),
      lines_scanned,
    };
    if let Ok(bytes) = serde_json::to_vec(&cached) {
      if let Err(e) = self.cache.set(&cache_key, &bytes, SEARCH_CACHE_TTL).await {
        tracing::warn!(error = %e, "failed to cache search result");
      }
    }

    Ok(SearchOutcome {
      clusters,
      lines_scanned,
      from_cache: false,
    })
  }

  /// 后台分析任务入口，安装崩溃屏障
  /// Background analysis task entrypoint; installs the panic barrier
  ///
  /// 任务内的任何崩溃都被捕获、记录，并作为以 "panic:" 开头的 failed
  /// 状态落库；任务绝不向调度器传播异常退出
  /// Any panic inside the task is caught, logged and recorded as a
  /// failed status whose message starts with "panic:"; the task never
  /// propagates an abnormal exit to the scheduler
  async fn run_analysis(self, cluster: ErrorCluster, job_id: Uuid) {
    let task = self.clone().analyze_job(cluster, job_id);
    if let Err(payload) = AssertUnwindSafe(task).catch_unwind().await {
      let message = panic_message(payload);
      tracing::error!(job_id = %job_id, panic = %message, "panic in analysis task");
      self
        .fail_job(job_id, format!("panic: {}", message))
        .await;
    }
  }

  /// 执行一次完整的分析：取日志、推理、钳制与截断、落库、收尾
  /// Run one full analysis: fetch logs, infer, clamp and truncate,
  /// persist, close out
  async fn analyze_job(self, cluster: ErrorCluster, job_id: Uuid) {
    self
      .mark_job(job_id, JobStatus::Running, JobUpdate::default())
      .await;

    let query = QueryBuilder.detection_query(&DetectionParams {
      service: cluster.service.clone(),
      namespace: cluster.namespace.clone(),
      levels: Vec::new(),
    });

    let logs = match self
      .loki
      .query_range(QueryRangeRequest {
        query,
        start: cluster.first_seen_at - ChronoDuration::minutes(CONTEXT_WINDOW_MINUTES),
        end: cluster.last_seen_at + ChronoDuration::minutes(CONTEXT_WINDOW_MINUTES),
        limit: CONTEXT_LOG_LIMIT,
        direction: Direction::Backward,
      })
      .await
    {
      Ok(logs) => logs,
      Err(e) => {
        self.fail_job(job_id, format!("fetching logs: {}", e)).await;
        return;
      }
    };

    let request = AnalysisRequest {
      cluster: cluster.clone(),
      context_logs: logs,
    };
    let mut result = match self
      .with_inference_deadline(self.provider.analyze(request))
      .await
    {
      Ok(result) => result,
      Err(e) => {
        self.fail_job(job_id, e.to_string()).await;
        return;
      }
    };

    result.confidence = result.confidence.clamp(0.0, 1.0);
    result.root_cause = truncate_utf8(&result.root_cause, MAX_ROOT_CAUSE_BYTES).to_string();
    result.summary = truncate_utf8(&result.summary, MAX_SUMMARY_BYTES).to_string();

    result.id = Uuid::new_v4();
    result.job_id = job_id;
    result.cluster_id = cluster.id;
    result.tenant_id = cluster.tenant_id;
    result.provider = self.provider.name().to_string();
    result.created_at = Utc::now();

    if let Err(e) = self.store.create_analysis_result(&result).await {
      self.fail_job(job_id, format!("storing result: {}", e)).await;
      return;
    }

    self
      .mark_job(
        job_id,
        JobStatus::Completed,
        JobUpdate::with_cluster(cluster.id),
      )
      .await;
  }

  /// 在推理截止时间与根取消令牌下执行提供方调用
  /// Run a provider call under the inference deadline and the root
  /// cancellation token
  ///
  /// 超时与取消都以 inference_timeout 浮出
  /// Both timeout and cancellation surface as inference_timeout
  async fn with_inference_deadline<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
      res = tokio::time::timeout(self.inference_timeout, fut) => match res {
        Ok(inner) => inner,
        Err(_) => Err(Error::InferenceTimeout),
      },
      _ = self.shutdown.cancelled() => Err(Error::InferenceTimeout),
    }
  }

  /// 写入状态转换：先存储后缓存；缓存是非权威提示
  /// Record a transition: store before cache; the cache is a
  /// non-authoritative hint
  async fn mark_job(&self, job_id: Uuid, status: JobStatus, update: JobUpdate) {
    if let Err(e) = self.store.update_job_status(job_id, status, update).await {
      tracing::warn!(job_id = %job_id, status = %status, error = %e, "job status update failed");
    }
    if let Err(e) = self.cache.set_job_status(job_id, status, JOB_STATUS_TTL).await {
      tracing::warn!(job_id = %job_id, status = %status, error = %e, "job status mirror failed");
    }
  }

  async fn fail_job(&self, job_id: Uuid, message: String) {
    self
      .mark_job(job_id, JobStatus::Failed, JobUpdate::with_error(message))
      .await;
  }
}

/// 序列化到缓存中的搜索结果
/// Search result as serialized into the cache
#[derive(serde::Serialize, serde::Deserialize)]
struct CachedSearch {
  clusters: Vec<ErrorCluster>,
  lines_scanned: usize,
}

/// 计算搜索过滤器的稳定哈希，作为缓存键的一部分
/// Compute a stable hash of the search filter, used in the cache key
fn search_filter_hash(req: &SearchRequest) -> String {
  let mut hasher = Sha256::new();
  hasher.update(req.service.as_bytes());
  hasher.update([0]);
  hasher.update(req.namespace.as_bytes());
  hasher.update([0]);
  hasher.update(req.keyword.as_bytes());
  hasher.update([0]);
  hasher.update(req.levels.join(",").as_bytes());
  hasher.update([0]);
  hasher.update(req.start.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
  hasher.update(req.end.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
  hasher.update(req.limit.to_be_bytes());
  format!("{:x}", hasher.finalize())
}

/// 从崩溃负载中提取可读信息
/// Extract a readable message from a panic payload
fn panic_message(payload: Box<dyn Any + Send>) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryCache;
  use crate::loki::MockLokiClient;
  use crate::models::LogLine;
  use crate::providers::MockProvider;
  use crate::store::MemoryStore;
  use std::collections::HashMap;

  fn sample_cluster(tenant_id: Uuid) -> ErrorCluster {
    let now = Utc::now();
    ErrorCluster {
      id: Uuid::new_v4(),
      tenant_id,
      service: "api".to_string(),
      namespace: "prod".to_string(),
      fingerprint: "fp".to_string(),
      level: "error".to_string(),
      first_seen_at: now - ChronoDuration::minutes(10),
      last_seen_at: now,
      count: 3,
      sample_message: "connection refused".to_string(),
      created_at: now,
      updated_at: now,
    }
  }

  fn sample_lines(n: usize) -> Vec<LogLine> {
    (0..n)
      .map(|i| LogLine {
        timestamp: Utc::now(),
        message: format!("error line {}", i),
        labels: HashMap::new(),
        level: "error".to_string(),
      })
      .collect()
  }

  struct Harness {
    store: Arc<MemoryStore>,
    cache: Arc<MemoryCache>,
    service: AnalysisService,
  }

  fn harness(provider: MockProvider, loki: MockLokiClient, timeout: Duration) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let service = AnalysisService::new(
      store.clone(),
      cache.clone(),
      Arc::new(loki),
      Arc::new(provider),
      timeout,
      CancellationToken::new(),
    );
    Harness {
      store,
      cache,
      service,
    }
  }

  async fn wait_for_terminal(store: &MemoryStore, job_id: Uuid, tenant_id: Uuid) -> Job {
    for _ in 0..200 {
      let job = store.get_job(job_id, tenant_id).await.unwrap();
      if job.status.is_terminal() {
        return job;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job never reached a terminal state");
  }

  #[tokio::test]
  async fn test_trigger_returns_pending_job_immediately() {
    let h = harness(
      MockProvider::new(),
      MockLokiClient::with_lines(sample_lines(2)),
      Duration::from_secs(5),
    );
    let cluster = sample_cluster(Uuid::new_v4());

    let job = h.service.trigger_analysis(&cluster).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.cluster_id, Some(cluster.id));
    assert_eq!(job.tenant_id, cluster.tenant_id);
  }

  #[tokio::test]
  async fn test_trigger_rejects_nil_cluster_id() {
    let h = harness(
      MockProvider::new(),
      MockLokiClient::default(),
      Duration::from_secs(5),
    );
    let mut cluster = sample_cluster(Uuid::new_v4());
    cluster.id = Uuid::nil();

    let err = h.service.trigger_analysis(&cluster).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
  }

  #[tokio::test]
  async fn test_successful_analysis_completes_job_and_persists_result() {
    let h = harness(
      MockProvider::new().with_analysis("OOM", 0.85, "Out of memory"),
      MockLokiClient::with_lines(sample_lines(3)),
      Duration::from_secs(5),
    );
    let cluster = sample_cluster(Uuid::new_v4());

    let job = h.service.trigger_analysis(&cluster).await.unwrap();
    let done = wait_for_terminal(&h.store, job.id, cluster.tenant_id).await;

    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());
    assert_eq!(done.cluster_id, Some(cluster.id));

    let result = h.store.get_analysis_result_by_job(job.id).await.unwrap();
    assert_eq!(result.root_cause, "OOM");
    assert_eq!(result.confidence, 0.85);
    assert_eq!(result.provider, "mock");
    assert_eq!(result.cluster_id, cluster.id);
    assert_eq!(result.tenant_id, cluster.tenant_id);

    // 缓存镜像跟随终态
    // The cache mirror follows the terminal state
    assert_eq!(
      h.cache.get_job_status(job.id).await.unwrap(),
      Some(JobStatus::Completed)
    );
  }

  #[tokio::test]
  async fn test_detection_query_window_and_limit() {
    let loki = Arc::new(MockLokiClient::with_lines(sample_lines(1)));
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let service = AnalysisService::new(
      store.clone(),
      cache,
      loki.clone(),
      Arc::new(MockProvider::new()),
      Duration::from_secs(5),
      CancellationToken::new(),
    );
    let cluster = sample_cluster(Uuid::new_v4());

    let job = service.trigger_analysis(&cluster).await.unwrap();
    wait_for_terminal(&store, job.id, cluster.tenant_id).await;

    let query = loki.last_query().await.unwrap();
    assert_eq!(query.query, r#"{service="api", namespace="prod"}"#);
    assert_eq!(query.limit, 1000);
    assert_eq!(
      query.start,
      cluster.first_seen_at - ChronoDuration::minutes(5)
    );
    assert_eq!(query.end, cluster.last_seen_at + ChronoDuration::minutes(5));
  }

  #[tokio::test]
  async fn test_confidence_is_clamped() {
    let h = harness(
      MockProvider::new().with_analysis("OOM", 1.5, "s"),
      MockLokiClient::with_lines(sample_lines(1)),
      Duration::from_secs(5),
    );
    let cluster = sample_cluster(Uuid::new_v4());

    let job = h.service.trigger_analysis(&cluster).await.unwrap();
    wait_for_terminal(&h.store, job.id, cluster.tenant_id).await;

    let result = h.store.get_analysis_result_by_job(job.id).await.unwrap();
    assert_eq!(result.confidence, 1.0);

    let h = harness(
      MockProvider::new().with_analysis("OOM", -0.3, "s"),
      MockLokiClient::with_lines(sample_lines(1)),
      Duration::from_secs(5),
    );
    let cluster = sample_cluster(Uuid::new_v4());
    let job = h.service.trigger_analysis(&cluster).await.unwrap();
    wait_for_terminal(&h.store, job.id, cluster.tenant_id).await;
    let result = h.store.get_analysis_result_by_job(job.id).await.unwrap();
    assert_eq!(result.confidence, 0.0);
  }

  #[tokio::test]
  async fn test_result_fields_are_truncated_at_utf8_boundaries() {
    let long_cause = "根".repeat(2000); // 6000 bytes
    let long_summary = "因".repeat(1000); // 3000 bytes
    let h = harness(
      MockProvider::new().with_analysis(long_cause, 0.5, long_summary),
      MockLokiClient::with_lines(sample_lines(1)),
      Duration::from_secs(5),
    );
    let cluster = sample_cluster(Uuid::new_v4());

    let job = h.service.trigger_analysis(&cluster).await.unwrap();
    wait_for_terminal(&h.store, job.id, cluster.tenant_id).await;

    let result = h.store.get_analysis_result_by_job(job.id).await.unwrap();
    assert!(result.root_cause.len() <= 4000);
    assert!(result.summary.len() <= 2000);
    // 截断后仍是合法的 UTF-8 字符串
    // Still valid UTF-8 after truncation
    assert!(result.root_cause.is_char_boundary(result.root_cause.len()));
  }

  #[tokio::test]
  async fn test_loki_failure_fails_job() {
    let h = harness(
      MockProvider::new(),
      MockLokiClient::failing(),
      Duration::from_secs(5),
    );
    let cluster = sample_cluster(Uuid::new_v4());

    let job = h.service.trigger_analysis(&cluster).await.unwrap();
    let done = wait_for_terminal(&h.store, job.id, cluster.tenant_id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done
      .error_message
      .as_deref()
      .unwrap()
      .starts_with("fetching logs:"));
    assert!(h.store.get_analysis_result_by_job(job.id).await.is_err());
  }

  #[tokio::test]
  async fn test_provider_failure_fails_job() {
    let h = harness(
      MockProvider::failing(),
      MockLokiClient::with_lines(sample_lines(1)),
      Duration::from_secs(5),
    );
    let cluster = sample_cluster(Uuid::new_v4());

    let job = h.service.trigger_analysis(&cluster).await.unwrap();
    let done = wait_for_terminal(&h.store, job.id, cluster.tenant_id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done
      .error_message
      .as_deref()
      .unwrap()
      .contains("unavailable"));
    assert_eq!(
      h.cache.get_job_status(job.id).await.unwrap(),
      Some(JobStatus::Failed)
    );
  }

  #[tokio::test]
  async fn test_panic_in_provider_is_recovered() {
    let h = harness(
      MockProvider::panicking(),
      MockLokiClient::with_lines(sample_lines(1)),
      Duration::from_secs(5),
    );
    let cluster = sample_cluster(Uuid::new_v4());

    let job = h.service.trigger_analysis(&cluster).await.unwrap();
    let done = wait_for_terminal(&h.store, job.id, cluster.tenant_id).await;

    // 进程存活，作业以 panic: 前缀收尾，缓存镜像为 failed
    // The process survives, the job closes out with a panic: prefix and
    // the cache mirror reads failed
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error_message.as_deref().unwrap().starts_with("panic:"));
    assert!(done
      .error_message
      .as_deref()
      .unwrap()
      .contains("mock provider crashed"));
    assert_eq!(
      h.cache.get_job_status(job.id).await.unwrap(),
      Some(JobStatus::Failed)
    );
  }

  #[tokio::test]
  async fn test_hanging_provider_hits_inference_deadline() {
    let h = harness(
      MockProvider::hanging(),
      MockLokiClient::with_lines(sample_lines(1)),
      Duration::from_millis(50),
    );
    let cluster = sample_cluster(Uuid::new_v4());

    let job = h.service.trigger_analysis(&cluster).await.unwrap();
    let done = wait_for_terminal(&h.store, job.id, cluster.tenant_id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error_message.as_deref().unwrap().contains("timeout"));
  }

  #[tokio::test]
  async fn test_shutdown_cancellation_surfaces_as_timeout() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let shutdown = CancellationToken::new();
    let service = AnalysisService::new(
      store.clone(),
      cache,
      Arc::new(MockLokiClient::with_lines(sample_lines(1))),
      Arc::new(MockProvider::hanging()),
      Duration::from_secs(3600),
      shutdown.clone(),
    );
    let cluster = sample_cluster(Uuid::new_v4());

    let job = service.trigger_analysis(&cluster).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel();

    let done = wait_for_terminal(&store, job.id, cluster.tenant_id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error_message.as_deref().unwrap().contains("timeout"));
  }

  #[tokio::test]
  async fn test_poll_job_tenant_isolation() {
    let h = harness(
      MockProvider::new(),
      MockLokiClient::with_lines(sample_lines(1)),
      Duration::from_secs(5),
    );
    let cluster = sample_cluster(Uuid::new_v4());

    let job = h.service.trigger_analysis(&cluster).await.unwrap();
    wait_for_terminal(&h.store, job.id, cluster.tenant_id).await;

    // 其他租户永远得不到 200，而是 not_found
    // A different tenant never sees the job; it reads as not_found
    let err = h
      .service
      .poll_job(job.id, Uuid::new_v4())
      .await
      .unwrap_err();
    assert!(err.is_not_found());

    let polled = h
      .service
      .poll_job(job.id, cluster.tenant_id)
      .await
      .unwrap();
    assert_eq!(polled.job.status, JobStatus::Completed);
    assert!(polled.result.is_some());
  }

  #[tokio::test]
  async fn test_poll_pending_job_has_no_result() {
    let h = harness(
      MockProvider::hanging(),
      MockLokiClient::with_lines(sample_lines(1)),
      Duration::from_secs(3600),
    );
    let cluster = sample_cluster(Uuid::new_v4());

    let job = h.service.trigger_analysis(&cluster).await.unwrap();
    let polled = h
      .service
      .poll_job(job.id, cluster.tenant_id)
      .await
      .unwrap();
    assert!(!polled.job.status.is_terminal());
    assert!(polled.result.is_none());
  }

  #[tokio::test]
  async fn test_summarize_happy_path() {
    let h = harness(
      MockProvider::new(),
      MockLokiClient::with_lines(sample_lines(7)),
      Duration::from_secs(5),
    );

    let start = Utc::now() - ChronoDuration::hours(1);
    let end = Utc::now();
    let outcome = h
      .service
      .summarize(SummarizeParams {
        tenant_id: Uuid::new_v4(),
        service: "api".to_string(),
        namespace: "prod".to_string(),
        start,
        end,
        max_lines: 500,
      })
      .await
      .unwrap();

    assert_eq!(outcome.lines_analyzed, 7);
    assert_eq!(outcome.provider, "mock");
    assert_eq!(outcome.model, "mock-v1");
    assert_eq!(outcome.from, start);
    assert_eq!(outcome.to, end);
    assert!(outcome.summary.contains("7 log entries"));
  }

  #[tokio::test]
  async fn test_summarize_no_logs_found() {
    let h = harness(
      MockProvider::new(),
      MockLokiClient::with_lines(vec![]),
      Duration::from_secs(5),
    );

    let err = h
      .service
      .summarize(SummarizeParams {
        tenant_id: Uuid::new_v4(),
        service: "api".to_string(),
        namespace: "prod".to_string(),
        start: Utc::now() - ChronoDuration::hours(1),
        end: Utc::now(),
        max_lines: 500,
      })
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NoLogsFound));
  }

  #[tokio::test]
  async fn test_search_clusters_and_caches() {
    let lines = vec![
      sample_lines(1).remove(0),
      sample_lines(1).remove(0),
    ];
    let h = harness(
      MockProvider::new(),
      MockLokiClient::with_lines(lines),
      Duration::from_secs(5),
    );

    let req = SearchRequest {
      tenant_id: Uuid::new_v4(),
      service: "api".to_string(),
      namespace: "prod".to_string(),
      keyword: "error".to_string(),
      levels: vec![],
      start: Utc::now() - ChronoDuration::hours(1),
      end: Utc::now(),
      limit: 100,
    };

    let first = h.service.search(req.clone()).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.lines_scanned, 2);
    assert!(!first.clusters.is_empty());

    let second = h.service.search(req).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.lines_scanned, first.lines_scanned);
    assert_eq!(second.clusters.len(), first.clusters.len());
  }
}
