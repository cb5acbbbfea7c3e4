use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait,
    ActiveValue,
    ColumnTrait,
    DatabaseConnection,
    EntityTrait,
    QueryFilter,
    QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::enums::{RuleStatus, ScheduleStatus};
use crate::error::{AppError, Result};

pub mod entity;
pub use entity::*;

#[cfg(test)]
pub mod memory;

// ─── ScheduleStore ──────────────────────────────────────────────────

/// New scheduled transaction. The id is chosen by the caller before
/// insertion because the credential ciphertext is bound to it.
#[derive(Debug, Clone)]
pub struct NewSchedule {
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
    pub scheduled_for: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub optimal_gas_threshold: Option<f64>,
    pub encrypted_auth: Option<String>,
    pub estimated_fee_rate: f64,
    pub estimated_fee_usd: f64,
    pub recurring_rule_id: Option<Uuid>,
}

/// Fields written alongside a lifecycle transition. Unset fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct TransitionUpdate {
    pub error_message: Option<String>,
    pub increment_retry: bool,
    pub realized_fee_rate: Option<f64>,
    pub realized_fee_usd: Option<f64>,
    pub realized_savings_usd: Option<f64>,
    pub tx_hash: Option<String>,
    /// Some(Some(h)) records a timed-out submission hash, Some(None)
    /// clears it once resolved.
    pub submitted_tx_hash: Option<Option<String>>,
    pub block_number: Option<i64>,
    pub executed_at: Option<DateTime<Utc>>,
}

/// Durable record of deferred transfers. The conditional `transition` is
/// the engine's only concurrency-safety mechanism: a failed transition
/// means another tick claimed the row, and callers must skip it silently.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn create(&self, new: NewSchedule) -> Result<scheduled_transaction::Model>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<scheduled_transaction::Model>>;

    /// Pending rows that are due and not yet past their deadline, ordered
    /// by priority descending then scheduled_for ascending.
    async fn list_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<scheduled_transaction::Model>>;

    /// Pending rows whose deadline has passed, oldest deadline first.
    async fn list_past_deadline(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<scheduled_transaction::Model>>;

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<ScheduleStatus>,
    ) -> Result<Vec<scheduled_transaction::Model>>;

    /// Compare-and-set status update. Returns false when the row was not
    /// in `from` (race lost) - not an error. A transition into a terminal
    /// state erases the credential ciphertext in the same update.
    async fn transition(
        &self,
        id: Uuid,
        from: ScheduleStatus,
        to: ScheduleStatus,
        update: TransitionUpdate,
    ) -> Result<bool>;

    /// Expire a pending row whose deadline has passed. Returns whether the
    /// row was expired by this call.
    async fn mark_expired_if_past_deadline(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// Attach a sealed credential to a hint-only row, making it
    /// auto-executable.
    async fn attach_auth(&self, id: Uuid, ciphertext: String) -> Result<()>;

    /// Cancel a still-pending row owned by `user_id`. Cancellation is
    /// terminal, so the credential is erased.
    async fn cancel(&self, id: Uuid, user_id: &str) -> Result<bool>;

    /// Row already materialized for a recurrence boundary, if any.
    async fn find_by_rule_boundary(
        &self,
        rule_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> Result<Option<scheduled_transaction::Model>>;
}

// ─── SavingsLedger ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewSaving {
    pub user_id: String,
    pub chain: String,
    pub scheduled_transaction_id: Uuid,
    pub tx_hash: String,
    pub fee_rate_used: f64,
    pub fee_usd: f64,
    pub baseline_fee_usd: f64,
    pub executed_at: DateTime<Utc>,
}

impl NewSaving {
    pub fn savings_usd(&self) -> f64 {
        (self.baseline_fee_usd - self.fee_usd).max(0.0)
    }

    pub fn savings_percentage(&self) -> f64 {
        if self.baseline_fee_usd > 0.0 {
            self.savings_usd() / self.baseline_fee_usd * 100.0
        } else {
            0.0
        }
    }
}

/// Append-only savings ledger plus the derived per-user aggregate.
#[async_trait]
pub trait SavingsLedger: Send + Sync {
    async fn record(&self, saving: NewSaving) -> Result<()>;

    async fn stats_for_user(&self, user_id: &str) -> Result<Option<user_savings_stat::Model>>;

    async fn recent_for_user(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<transaction_saving::Model>>;
}

// ─── RuleStore ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewRule {
    pub user_id: String,
    pub chain: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: String,
    pub token_address: Option<String>,
    pub token_symbol: String,
    pub frequency: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub next_execution: DateTime<Utc>,
    pub use_optimal_timing: bool,
    pub label: String,
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn create(&self, new: NewRule) -> Result<recurring_rule::Model>;

    /// Active rules whose next cadence boundary has passed.
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<recurring_rule::Model>>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<recurring_rule::Model>>;

    async fn advance(&self, id: Uuid, next_execution: DateTime<Utc>) -> Result<()>;

    async fn set_status(&self, id: Uuid, status: RuleStatus) -> Result<()>;

    async fn cancel(&self, id: Uuid, user_id: &str) -> Result<bool>;
}

// ─── Postgres implementations ───────────────────────────────────────

pub struct ScheduleRepository {
    db: DatabaseConnection,
}

impl ScheduleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ScheduleStore for ScheduleRepository {
    async fn create(&self, new: NewSchedule) -> Result<scheduled_transaction::Model> {
        if new.scheduled_for > new.expires_at {
            return Err(AppError::InvalidInput(
                "scheduled_for must not be after expires_at".to_string(),
            ));
        }

        let now = Utc::now();

        let row = scheduled_transaction::ActiveModel {
            id: ActiveValue::Set(new.id),
            user_id: ActiveValue::Set(new.user_id),
            chain: ActiveValue::Set(new.chain),
            from_address: ActiveValue::Set(new.from_address),
            to_address: ActiveValue::Set(new.to_address),
            amount: ActiveValue::Set(new.amount),
            token_address: ActiveValue::Set(new.token_address),
            token_symbol: ActiveValue::Set(new.token_symbol),
            priority: ActiveValue::Set(new.priority),
            memo: ActiveValue::Set(new.memo),
            scheduled_for: ActiveValue::Set(new.scheduled_for),
            expires_at: ActiveValue::Set(new.expires_at),
            optimal_gas_threshold: ActiveValue::Set(new.optimal_gas_threshold),
            encrypted_auth: ActiveValue::Set(new.encrypted_auth),
            auth_erased_at: ActiveValue::Set(None),
            status: ActiveValue::Set(ScheduleStatus::Pending.to_string()),
            retry_count: ActiveValue::Set(0),
            error_message: ActiveValue::Set(None),
            estimated_fee_rate: ActiveValue::Set(new.estimated_fee_rate),
            estimated_fee_usd: ActiveValue::Set(new.estimated_fee_usd),
            realized_fee_rate: ActiveValue::Set(None),
            realized_fee_usd: ActiveValue::Set(None),
            realized_savings_usd: ActiveValue::Set(None),
            tx_hash: ActiveValue::Set(None),
            submitted_tx_hash: ActiveValue::Set(None),
            block_number: ActiveValue::Set(None),
            executed_at: ActiveValue::Set(None),
            recurring_rule_id: ActiveValue::Set(new.recurring_rule_id),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        let row = row.insert(&self.db).await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<scheduled_transaction::Model>> {
        let row = scheduled_transaction::Entity::find_by_id(id).one(&self.db).await?;
        Ok(row)
    }

    async fn list_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<scheduled_transaction::Model>> {
        let rows = scheduled_transaction::Entity::find()
            .filter(scheduled_transaction::Column::Status.eq(ScheduleStatus::Pending.as_str()))
            .filter(scheduled_transaction::Column::ScheduledFor.lte(now))
            .filter(scheduled_transaction::Column::ExpiresAt.gt(now))
            .order_by_desc(scheduled_transaction::Column::Priority)
            .order_by_asc(scheduled_transaction::Column::ScheduledFor)
            .limit(limit)
            .all(&self.db).await?;

        Ok(rows)
    }

    async fn list_past_deadline(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<scheduled_transaction::Model>> {
        let rows = scheduled_transaction::Entity::find()
            .filter(scheduled_transaction::Column::Status.eq(ScheduleStatus::Pending.as_str()))
            .filter(scheduled_transaction::Column::ExpiresAt.lte(now))
            .order_by_asc(scheduled_transaction::Column::ExpiresAt)
            .limit(limit)
            .all(&self.db).await?;

        Ok(rows)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<ScheduleStatus>,
    ) -> Result<Vec<scheduled_transaction::Model>> {
        let mut query = scheduled_transaction::Entity::find()
            .filter(scheduled_transaction::Column::UserId.eq(user_id));

        if let Some(s) = status {
            query = query.filter(scheduled_transaction::Column::Status.eq(s.as_str()));
        }

        let rows = query
            .order_by_asc(scheduled_transaction::Column::ScheduledFor)
            .all(&self.db).await?;
        Ok(rows)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: ScheduleStatus,
        to: ScheduleStatus,
        update: TransitionUpdate,
    ) -> Result<bool> {
        let now = Utc::now();

        // Single conditional UPDATE: the WHERE status = $from clause is
        // the per-row lock. rows_affected = 0 means another tick won.
        let mut stmt = scheduled_transaction::Entity::update_many()
            .col_expr(scheduled_transaction::Column::Status, Expr::value(to.as_str()))
            .col_expr(scheduled_transaction::Column::UpdatedAt, Expr::value(now))
            .filter(scheduled_transaction::Column::Id.eq(id))
            .filter(scheduled_transaction::Column::Status.eq(from.as_str()));

        if let Some(msg) = update.error_message {
            stmt = stmt.col_expr(
                scheduled_transaction::Column::ErrorMessage,
                Expr::value(Some(msg))
            );
        }
        if update.increment_retry {
            stmt = stmt.col_expr(
                scheduled_transaction::Column::RetryCount,
                Expr::col(scheduled_transaction::Column::RetryCount).add(1)
            );
        }
        if let Some(rate) = update.realized_fee_rate {
            stmt = stmt.col_expr(
                scheduled_transaction::Column::RealizedFeeRate,
                Expr::value(Some(rate))
            );
        }
        if let Some(usd) = update.realized_fee_usd {
            stmt = stmt.col_expr(
                scheduled_transaction::Column::RealizedFeeUsd,
                Expr::value(Some(usd))
            );
        }
        if let Some(savings) = update.realized_savings_usd {
            stmt = stmt.col_expr(
                scheduled_transaction::Column::RealizedSavingsUsd,
                Expr::value(Some(savings))
            );
        }
        if let Some(hash) = update.tx_hash {
            stmt = stmt.col_expr(
                scheduled_transaction::Column::TxHash,
                Expr::value(Some(hash))
            );
        }
        if let Some(submitted) = update.submitted_tx_hash {
            stmt = stmt.col_expr(
                scheduled_transaction::Column::SubmittedTxHash,
                Expr::value(submitted)
            );
        }
        if let Some(block) = update.block_number {
            stmt = stmt.col_expr(
                scheduled_transaction::Column::BlockNumber,
                Expr::value(Some(block))
            );
        }
        if let Some(executed) = update.executed_at {
            stmt = stmt.col_expr(
                scheduled_transaction::Column::ExecutedAt,
                Expr::value(Some(executed))
            );
        }

        // Terminal outcomes erase the credential atomically with the
        // status change - no branch can leave a decryptable secret behind.
        if to.is_terminal() {
            stmt = stmt
                .col_expr(
                    scheduled_transaction::Column::EncryptedAuth,
                    Expr::value(None::<String>)
                )
                .col_expr(
                    scheduled_transaction::Column::AuthErasedAt,
                    Expr::value(Some(now))
                );
        }

        let result = stmt.exec(&self.db).await?;
        Ok(result.rows_affected == 1)
    }

    async fn mark_expired_if_past_deadline(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let result = scheduled_transaction::Entity::update_many()
            .col_expr(
                scheduled_transaction::Column::Status,
                Expr::value(ScheduleStatus::Expired.as_str())
            )
            .col_expr(scheduled_transaction::Column::UpdatedAt, Expr::value(now))
            .col_expr(scheduled_transaction::Column::EncryptedAuth, Expr::value(None::<String>))
            .col_expr(scheduled_transaction::Column::AuthErasedAt, Expr::value(Some(now)))
            .filter(scheduled_transaction::Column::Id.eq(id))
            .filter(scheduled_transaction::Column::Status.eq(ScheduleStatus::Pending.as_str()))
            .filter(scheduled_transaction::Column::ExpiresAt.lte(now))
            .exec(&self.db).await?;

        Ok(result.rows_affected == 1)
    }

    async fn attach_auth(&self, id: Uuid, ciphertext: String) -> Result<()> {
        let result = scheduled_transaction::Entity::update_many()
            .col_expr(
                scheduled_transaction::Column::EncryptedAuth,
                Expr::value(Some(ciphertext))
            )
            .col_expr(scheduled_transaction::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(scheduled_transaction::Column::Id.eq(id))
            .filter(scheduled_transaction::Column::Status.eq(ScheduleStatus::Pending.as_str()))
            .exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(AppError::ScheduleNotFound);
        }
        Ok(())
    }

    async fn cancel(&self, id: Uuid, user_id: &str) -> Result<bool> {
        let now = Utc::now();
        let result = scheduled_transaction::Entity::update_many()
            .col_expr(
                scheduled_transaction::Column::Status,
                Expr::value(ScheduleStatus::Cancelled.as_str())
            )
            .col_expr(scheduled_transaction::Column::UpdatedAt, Expr::value(now))
            .col_expr(scheduled_transaction::Column::EncryptedAuth, Expr::value(None::<String>))
            .col_expr(scheduled_transaction::Column::AuthErasedAt, Expr::value(Some(now)))
            .filter(scheduled_transaction::Column::Id.eq(id))
            .filter(scheduled_transaction::Column::UserId.eq(user_id))
            .filter(scheduled_transaction::Column::Status.eq(ScheduleStatus::Pending.as_str()))
            .exec(&self.db).await?;

        Ok(result.rows_affected == 1)
    }

    async fn find_by_rule_boundary(
        &self,
        rule_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> Result<Option<scheduled_transaction::Model>> {
        let row = scheduled_transaction::Entity::find()
            .filter(scheduled_transaction::Column::RecurringRuleId.eq(rule_id))
            .filter(scheduled_transaction::Column::ScheduledFor.eq(scheduled_for))
            .one(&self.db).await?;
        Ok(row)
    }
}

pub struct SavingsRepository {
    db: DatabaseConnection,
}

impl SavingsRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SavingsLedger for SavingsRepository {
    async fn record(&self, saving: NewSaving) -> Result<()> {
        let savings_usd = saving.savings_usd();
        let savings_percentage = saving.savings_percentage();

        let row = transaction_saving::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            user_id: ActiveValue::Set(saving.user_id.clone()),
            chain: ActiveValue::Set(saving.chain.clone()),
            scheduled_transaction_id: ActiveValue::Set(saving.scheduled_transaction_id),
            tx_hash: ActiveValue::Set(saving.tx_hash.clone()),
            fee_rate_used: ActiveValue::Set(saving.fee_rate_used),
            fee_usd: ActiveValue::Set(saving.fee_usd),
            baseline_fee_usd: ActiveValue::Set(saving.baseline_fee_usd),
            savings_usd: ActiveValue::Set(savings_usd),
            savings_percentage: ActiveValue::Set(savings_percentage),
            optimal_timing: ActiveValue::Set(savings_usd > 0.0),
            executed_at: ActiveValue::Set(saving.executed_at),
        };
        row.insert(&self.db).await?;

        // Upsert the per-user aggregate
        let existing = user_savings_stat::Entity::find_by_id(saving.user_id.clone())
            .one(&self.db).await?;

        let now = Utc::now();
        match existing {
            Some(stats) => {
                let total = stats.total_savings_usd + savings_usd;
                let count = stats.total_transactions + 1;
                let mut per_chain: serde_json::Map<String, serde_json::Value> = stats.savings_per_chain
                    .as_object()
                    .cloned()
                    .unwrap_or_default();
                let chain_total = per_chain
                    .get(&saving.chain)
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0) + savings_usd;
                per_chain.insert(saving.chain.clone(), serde_json::json!(chain_total));

                let mut active: user_savings_stat::ActiveModel = stats.clone().into();
                active.total_transactions = ActiveValue::Set(count);
                active.scheduled_transactions = ActiveValue::Set(stats.scheduled_transactions + 1);
                active.total_savings_usd = ActiveValue::Set(total);
                active.average_savings_per_tx_usd = ActiveValue::Set(total / (count as f64));
                active.best_single_saving_usd = ActiveValue::Set(
                    stats.best_single_saving_usd.max(savings_usd)
                );
                active.savings_per_chain = ActiveValue::Set(serde_json::Value::Object(per_chain));
                active.updated_at = ActiveValue::Set(now);
                active.update(&self.db).await?;
            }
            None => {
                let stats = user_savings_stat::ActiveModel {
                    user_id: ActiveValue::Set(saving.user_id.clone()),
                    total_transactions: ActiveValue::Set(1),
                    scheduled_transactions: ActiveValue::Set(1),
                    total_savings_usd: ActiveValue::Set(savings_usd),
                    average_savings_per_tx_usd: ActiveValue::Set(savings_usd),
                    best_single_saving_usd: ActiveValue::Set(savings_usd),
                    savings_per_chain: ActiveValue::Set(
                        serde_json::json!({ saving.chain.clone(): savings_usd })
                    ),
                    updated_at: ActiveValue::Set(now),
                };
                stats.insert(&self.db).await?;
            }
        }

        Ok(())
    }

    async fn stats_for_user(&self, user_id: &str) -> Result<Option<user_savings_stat::Model>> {
        let stats = user_savings_stat::Entity::find_by_id(user_id.to_string()).one(&self.db).await?;
        Ok(stats)
    }

    async fn recent_for_user(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<transaction_saving::Model>> {
        let rows = transaction_saving::Entity::find()
            .filter(transaction_saving::Column::UserId.eq(user_id))
            .filter(transaction_saving::Column::ExecutedAt.gte(since))
            .order_by_desc(transaction_saving::Column::ExecutedAt)
            .all(&self.db).await?;
        Ok(rows)
    }
}

pub struct RuleRepository {
    db: DatabaseConnection,
}

impl RuleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RuleStore for RuleRepository {
    async fn create(&self, new: NewRule) -> Result<recurring_rule::Model> {
        let now = Utc::now();

        let rule = recurring_rule::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            user_id: ActiveValue::Set(new.user_id),
            chain: ActiveValue::Set(new.chain),
            from_address: ActiveValue::Set(new.from_address),
            to_address: ActiveValue::Set(new.to_address),
            amount: ActiveValue::Set(new.amount),
            token_address: ActiveValue::Set(new.token_address),
            token_symbol: ActiveValue::Set(new.token_symbol),
            frequency: ActiveValue::Set(new.frequency),
            start_date: ActiveValue::Set(new.start_date),
            end_date: ActiveValue::Set(new.end_date),
            next_execution: ActiveValue::Set(new.next_execution),
            use_optimal_timing: ActiveValue::Set(new.use_optimal_timing),
            label: ActiveValue::Set(new.label),
            status: ActiveValue::Set(RuleStatus::Active.to_string()),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        let rule = rule.insert(&self.db).await?;
        Ok(rule)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<recurring_rule::Model>> {
        let rules = recurring_rule::Entity::find()
            .filter(recurring_rule::Column::Status.eq(RuleStatus::Active.as_str()))
            .filter(recurring_rule::Column::NextExecution.lte(now))
            .all(&self.db).await?;
        Ok(rules)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<recurring_rule::Model>> {
        let rules = recurring_rule::Entity::find()
            .filter(recurring_rule::Column::UserId.eq(user_id))
            .order_by_asc(recurring_rule::Column::NextExecution)
            .all(&self.db).await?;
        Ok(rules)
    }

    async fn advance(&self, id: Uuid, next_execution: DateTime<Utc>) -> Result<()> {
        recurring_rule::Entity::update_many()
            .col_expr(recurring_rule::Column::NextExecution, Expr::value(next_execution))
            .col_expr(recurring_rule::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(recurring_rule::Column::Id.eq(id))
            .exec(&self.db).await?;
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: RuleStatus) -> Result<()> {
        recurring_rule::Entity::update_many()
            .col_expr(recurring_rule::Column::Status, Expr::value(status.as_str()))
            .col_expr(recurring_rule::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(recurring_rule::Column::Id.eq(id))
            .exec(&self.db).await?;
        Ok(())
    }

    async fn cancel(&self, id: Uuid, user_id: &str) -> Result<bool> {
        let result = recurring_rule::Entity::update_many()
            .col_expr(
                recurring_rule::Column::Status,
                Expr::value(RuleStatus::Cancelled.as_str())
            )
            .col_expr(recurring_rule::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(recurring_rule::Column::Id.eq(id))
            .filter(recurring_rule::Column::UserId.eq(user_id))
            .filter(recurring_rule::Column::Status.eq(RuleStatus::Active.as_str()))
            .exec(&self.db).await?;

        Ok(result.rows_affected == 1)
    }
}
