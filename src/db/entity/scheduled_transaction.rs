use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scheduled_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub chain: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: String,
    pub token_address: Option<String>,
    pub token_symbol: String,
    pub priority: i32,
    pub memo: Option<String>,
    pub scheduled_for: DateTimeUtc,
    pub expires_at: DateTimeUtc,
    pub optimal_gas_threshold: Option<f64>,
    // Ciphertext of the signing credential; None means the row is a
    // hint-only plan that cannot be auto-executed. Nulled in the same
    // update that moves the row into a terminal state.
    #[serde(skip_serializing)]
    pub encrypted_auth: Option<String>,
    pub auth_erased_at: Option<DateTimeUtc>,
    pub status: String, // "pending", "executing", "completed", "failed", "expired", "cancelled"
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub estimated_fee_rate: f64,
    pub estimated_fee_usd: f64,
    pub realized_fee_rate: Option<f64>,
    pub realized_fee_usd: Option<f64>,
    pub realized_savings_usd: Option<f64>,
    pub tx_hash: Option<String>,
    // Hash of a submission whose confirmation timed out; checked before
    // any re-dispatch so a landed transfer is never re-sent.
    pub submitted_tx_hash: Option<String>,
    pub block_number: Option<i64>,
    pub executed_at: Option<DateTimeUtc>,
    pub recurring_rule_id: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
