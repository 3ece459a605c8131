//! 内存缓存实现
//! In-memory cache implementation
//!
//! 使用内存数据结构实现缓存语义（含真实 TTL 过期），不依赖任何外部服务，
//! 主要用于测试
//! Implements the cache semantics (including real TTL expiry) with
//! in-memory data structures and no external service dependencies;
//! primarily used by tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::cache::{keys, Cache};
use crate::error::Result;
use crate::models::JobStatus;

struct Entry {
  value: Vec<u8>,
  expires_at: Instant,
}

impl Entry {
  fn is_expired(&self) -> bool {
    Instant::now() >= self.expires_at
  }
}

/// 内存缓存
/// In-memory cache
#[derive(Default)]
pub struct MemoryCache {
  entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
  /// 创建空缓存
  /// Create an empty cache
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Cache for MemoryCache {
  async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
    let mut entries = self.entries.write().await;
    entries.insert(
      key.to_string(),
      Entry {
        value: value.to_vec(),
        expires_at: Instant::now() + ttl,
      },
    );
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    // 惰性淘汰过期条目
    // Expired entries are evicted lazily
    let mut entries = self.entries.write().await;
    match entries.get(key) {
      Some(entry) if entry.is_expired() => {
        entries.remove(key);
        Ok(None)
      }
      Some(entry) => Ok(Some(entry.value.clone())),
      None => Ok(None),
    }
  }

  async fn delete(&self, key: &str) -> Result<()> {
    let mut entries = self.entries.write().await;
    entries.remove(key);
    Ok(())
  }

  async fn ping(&self) -> Result<()> {
    Ok(())
  }

  async fn set_job_status(&self, job_id: Uuid, status: JobStatus, ttl: Duration) -> Result<()> {
    self
      .set(&keys::job_status_key(job_id), status.as_str().as_bytes(), ttl)
      .await
  }

  async fn get_job_status(&self, job_id: Uuid) -> Result<Option<JobStatus>> {
    let value = self.get(&keys::job_status_key(job_id)).await?;
    Ok(
      value
        .and_then(|v| String::from_utf8(v).ok())
        .and_then(|s| JobStatus::from_str(&s).ok()),
    )
  }

  async fn incr_with_expiry(&self, key: &str, expiry: Duration) -> Result<i64> {
    let mut entries = self.entries.write().await;
    let current = match entries.get(key) {
      Some(entry) if !entry.is_expired() => String::from_utf8(entry.value.clone())
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0),
      _ => 0,
    };
    let next = current + 1;
    entries.insert(
      key.to_string(),
      Entry {
        value: next.to_string().into_bytes(),
        expires_at: Instant::now() + expiry,
      },
    );
    Ok(next)
  }
}
