//! 缓存键名方案
//! Cache key scheme
//!
//! 键名带命名空间前缀并按租户隔离；即使不透明标识符相同，不同命名空间的
//! 键也不会冲突。
//! Keys carry a namespace prefix and are tenant-isolated; keys from
//! different namespaces never collide, even for identical opaque
//! identifiers.

use uuid::Uuid;

/// Loki 查询结果缓存键
/// Loki query result cache key
pub fn loki_query_key(tenant_id: Uuid, query_hash: &str) -> String {
  format!("loki:query:{}:{}", tenant_id, query_hash)
}

/// Loki 搜索结果缓存键
/// Loki search result cache key
pub fn search_result_key(tenant_id: Uuid, filter_hash: &str) -> String {
  format!("loki:search:{}:{}", tenant_id, filter_hash)
}

/// 作业状态缓存键
/// Job status cache key
pub fn job_status_key(job_id: Uuid) -> String {
  format!("job:{}", job_id)
}

/// 速率限制计数器键
/// Rate-limit counter key
pub fn rate_limit_key(key_prefix: &str) -> String {
  format!("ratelimit:{}", key_prefix)
}
