//! API 密钥实体
//! API key entity

use sea_orm::entity::prelude::*;

/// API 密钥实体模型
/// API key entity model
///
/// 存储前缀索引和 Argon2 慢哈希，绝不存储原始密钥
/// Stores the prefix index and a slow Argon2 hash, never the raw key
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  /// 租户 ID，用于多租户隔离
  /// Tenant ID for multi-tenancy isolation
  pub tenant_id: Uuid,
  pub name: String,
  pub key_hash: String,
  pub key_prefix: String,
  pub scopes: Vec<String>,
  pub last_used_at: Option<DateTimeUtc>,
  /// 软撤销时间；非空表示密钥已失效
  /// Soft-revocation time; non-null means the key is inactive
  pub revoked_at: Option<DateTimeUtc>,
  pub created_at: DateTimeUtc,
  pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
