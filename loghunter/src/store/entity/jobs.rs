//! 作业实体
//! Job entity

use sea_orm::entity::prelude::*;

/// 作业状态枚举
/// Job status enum
#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum JobStatus {
  #[sea_orm(string_value = "pending")]
  Pending,
  #[sea_orm(string_value = "running")]
  Running,
  #[sea_orm(string_value = "completed")]
  Completed,
  #[sea_orm(string_value = "failed")]
  Failed,
}

/// 作业实体模型
/// Job entity model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  /// 租户 ID，用于多租户隔离
  /// Tenant ID for multi-tenancy isolation
  pub tenant_id: Uuid,
  pub job_type: String,
  pub status: JobStatus,
  pub cluster_id: Option<Uuid>,
  pub error_message: Option<String>,
  pub started_at: Option<DateTimeUtc>,
  pub completed_at: Option<DateTimeUtc>,
  pub created_at: DateTimeUtc,
  pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
