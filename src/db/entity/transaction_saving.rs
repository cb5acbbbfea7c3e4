use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only record of the fee saved by one executed scheduled
/// transaction. Never updated or deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_savings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub chain: String,
    pub scheduled_transaction_id: Uuid,
    pub tx_hash: String,
    pub fee_rate_used: f64,
    pub fee_usd: f64,
    pub baseline_fee_usd: f64,
    pub savings_usd: f64,
    pub savings_percentage: f64,
    pub optimal_timing: bool,
    pub executed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
