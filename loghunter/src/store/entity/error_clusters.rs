//! 错误聚类实体
//! Error cluster entity

use sea_orm::entity::prelude::*;

/// 错误聚类实体模型
/// Error cluster entity model
///
/// (tenant_id, service, namespace, fingerprint) 上有复合唯一索引
/// Composite unique index on (tenant_id, service, namespace, fingerprint)
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "error_clusters")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  /// 租户 ID，用于多租户隔离
  /// Tenant ID for multi-tenancy isolation
  pub tenant_id: Uuid,
  pub service: String,
  pub namespace: String,
  pub fingerprint: String,
  pub level: String,
  pub first_seen_at: DateTimeUtc,
  pub last_seen_at: DateTimeUtc,
  pub count: i64,
  #[sea_orm(column_type = "Text")]
  pub sample_message: String,
  pub created_at: DateTimeUtc,
  pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
