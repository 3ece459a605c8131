//! Redis 缓存实现
//! Redis cache implementation
//!
//! 基于单个多路复用异步连接，而非每次调用建连的连接池
//! Built on a single multiplexed async connection rather than a
//! per-call connection pool

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::cache::{keys, Cache};
use crate::error::Result;
use crate::models::JobStatus;

/// Redis 缓存
/// Redis cache
#[derive(Clone)]
pub struct RedisCache {
  conn: MultiplexedConnection,
}

impl RedisCache {
  /// 从 Redis URL 建立连接
  /// Connect from a Redis URL
  pub async fn connect(redis_url: &str) -> Result<Self> {
    let client = redis::Client::open(redis_url)?;
    let conn = client.get_multiplexed_async_connection().await?;
    Ok(Self { conn })
  }

  /// 从已有连接创建
  /// Create from an existing connection
  pub fn from_connection(conn: MultiplexedConnection) -> Self {
    Self { conn }
  }
}

#[async_trait]
impl Cache for RedisCache {
  async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
    let mut conn = self.conn.clone();
    let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let mut conn = self.conn.clone();
    let value: Option<Vec<u8>> = conn.get(key).await?;
    Ok(value)
  }

  async fn delete(&self, key: &str) -> Result<()> {
    let mut conn = self.conn.clone();
    let _: i64 = conn.del(key).await?;
    Ok(())
  }

  async fn ping(&self) -> Result<()> {
    let mut conn = self.conn.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;
    Ok(())
  }

  async fn set_job_status(&self, job_id: Uuid, status: JobStatus, ttl: Duration) -> Result<()> {
    let mut conn = self.conn.clone();
    let _: () = conn
      .set_ex(keys::job_status_key(job_id), status.as_str(), ttl.as_secs())
      .await?;
    Ok(())
  }

  async fn get_job_status(&self, job_id: Uuid) -> Result<Option<JobStatus>> {
    let mut conn = self.conn.clone();
    let value: Option<String> = conn.get(keys::job_status_key(job_id)).await?;
    Ok(value.and_then(|s| JobStatus::from_str(&s).ok()))
  }

  async fn incr_with_expiry(&self, key: &str, expiry: Duration) -> Result<i64> {
    let mut conn = self.conn.clone();
    // MULTI/EXEC 保证 INCR 与 EXPIRE 的原子性
    // MULTI/EXEC makes INCR and EXPIRE atomic
    let mut pipe = redis::pipe();
    pipe
      .atomic()
      .incr(key, 1)
      .expire(key, expiry.as_secs() as i64)
      .ignore();
    let (count,): (i64,) = pipe.query_async(&mut conn).await?;
    Ok(count)
  }
}
