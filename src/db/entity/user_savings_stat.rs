use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Rolling per-user savings aggregate, upserted by the savings ledger on
/// every completed scheduled transaction.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_savings_stats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub total_transactions: i32,
    pub scheduled_transactions: i32,
    pub total_savings_usd: f64,
    pub average_savings_per_tx_usd: f64,
    pub best_single_saving_usd: f64,
    pub savings_per_chain: Json,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
