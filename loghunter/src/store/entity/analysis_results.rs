//! 分析结果实体
//! Analysis result entity

use sea_orm::entity::prelude::*;

/// 分析结果实体模型
/// Analysis result entity model
///
/// job_id 上有唯一约束：每个作业至多一条结果
/// Unique constraint on job_id: at most one result per job
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "analysis_results")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub cluster_id: Uuid,
  /// 租户 ID，用于多租户隔离
  /// Tenant ID for multi-tenancy isolation
  pub tenant_id: Uuid,
  #[sea_orm(unique)]
  pub job_id: Uuid,
  pub provider: String,
  pub model: String,
  #[sea_orm(column_type = "Text")]
  pub root_cause: String,
  pub confidence: f64,
  #[sea_orm(column_type = "Text")]
  pub summary: String,
  #[sea_orm(column_type = "Text", nullable)]
  pub suggested_action: Option<String>,
  pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
