//! 临时缓存模块
//! Ephemeral cache module
//!
//! 带 TTL 的快速键值缓存，用于查询结果记忆、作业状态可见性和滑动窗口
//! 计数。缓存是非权威的：未命中不是错误，速率限制在缓存故障时放行。
//! Fast key/value cache with TTL, used for query-result memoization, job
//! status visibility and sliding-window counters. The cache is
//! non-authoritative: a miss is not an error, and rate limiting fails
//! open on cache errors.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;
use crate::models::JobStatus;

pub mod keys;
mod memory;
mod redis;

pub use memory::MemoryCache;
pub use redis::RedisCache;

/// 缓存接口，所有实现必须对并发访问安全
/// Cache trait; implementations must be safe for concurrent access
#[async_trait]
pub trait Cache: Send + Sync {
  /// 写入带 TTL 的键值
  /// Set a key with a TTL
  async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

  /// 读取键值；缺失返回 None 而不是错误
  /// Get a key; absence returns None, never an error
  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

  /// 删除键
  /// Delete a key
  async fn delete(&self, key: &str) -> Result<()>;

  /// 存活检查
  /// Liveness check
  async fn ping(&self) -> Result<()>;

  /// 写入作业状态镜像
  /// Mirror a job status
  async fn set_job_status(&self, job_id: Uuid, status: JobStatus, ttl: Duration) -> Result<()>;

  /// 读取作业状态镜像
  /// Read a mirrored job status
  async fn get_job_status(&self, job_id: Uuid) -> Result<Option<JobStatus>>;

  /// 原子地递增计数器并刷新其过期时间，返回递增后的值
  /// Atomically increment a counter and refresh its expiry, returning
  /// the incremented value
  ///
  /// 用于速率限制的滑动窗口
  /// Intended for rate-limit sliding windows
  async fn incr_with_expiry(&self, key: &str, expiry: Duration) -> Result<i64>;
}
