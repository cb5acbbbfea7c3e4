//! In-memory store implementations mirroring the Postgres repositories,
//! used by executor and recurrence tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::enums::{RuleStatus, ScheduleStatus};
use crate::error::{AppError, Result};

use super::{
    recurring_rule,
    scheduled_transaction,
    transaction_saving,
    user_savings_stat,
    NewRule,
    NewSaving,
    NewSchedule,
    RuleStore,
    SavingsLedger,
    ScheduleStore,
    TransitionUpdate,
};

#[derive(Default)]
pub struct MemoryScheduleStore {
    rows: Mutex<HashMap<Uuid, scheduled_transaction::Model>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, row: scheduled_transaction::Model) {
        self.rows.lock().unwrap().insert(row.id, row);
    }

    pub fn get(&self, id: Uuid) -> Option<scheduled_transaction::Model> {
        self.rows.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn create(&self, new: NewSchedule) -> Result<scheduled_transaction::Model> {
        if new.scheduled_for > new.expires_at {
            return Err(AppError::InvalidInput(
                "scheduled_for must not be after expires_at".to_string(),
            ));
        }
        let now = Utc::now();
        let row = scheduled_transaction::Model {
            id: new.id,
            user_id: new.user_id,
            chain: new.chain,
            from_address: new.from_address,
            to_address: new.to_address,
            amount: new.amount,
            token_address: new.token_address,
            token_symbol: new.token_symbol,
            priority: new.priority,
            memo: new.memo,
            scheduled_for: new.scheduled_for,
            expires_at: new.expires_at,
            optimal_gas_threshold: new.optimal_gas_threshold,
            encrypted_auth: new.encrypted_auth,
            auth_erased_at: None,
            status: ScheduleStatus::Pending.to_string(),
            retry_count: 0,
            error_message: None,
            estimated_fee_rate: new.estimated_fee_rate,
            estimated_fee_usd: new.estimated_fee_usd,
            realized_fee_rate: None,
            realized_fee_usd: None,
            realized_savings_usd: None,
            tx_hash: None,
            submitted_tx_hash: None,
            block_number: None,
            executed_at: None,
            recurring_rule_id: new.recurring_rule_id,
            created_at: now,
            updated_at: now,
        };
        self.seed(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<scheduled_transaction::Model>> {
        Ok(self.get(id))
    }

    async fn list_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<scheduled_transaction::Model>> {
        let rows = self.rows.lock().unwrap();
        let mut due: Vec<_> = rows
            .values()
            .filter(|r| {
                r.status == ScheduleStatus::Pending.as_str()
                    && r.scheduled_for <= now
                    && r.expires_at > now
            })
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            b.priority.cmp(&a.priority).then(a.scheduled_for.cmp(&b.scheduled_for))
        });
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn list_past_deadline(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<scheduled_transaction::Model>> {
        let rows = self.rows.lock().unwrap();
        let mut overdue: Vec<_> = rows
            .values()
            .filter(|r| r.status == ScheduleStatus::Pending.as_str() && r.expires_at <= now)
            .cloned()
            .collect();
        overdue.sort_by_key(|r| r.expires_at);
        overdue.truncate(limit as usize);
        Ok(overdue)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<ScheduleStatus>,
    ) -> Result<Vec<scheduled_transaction::Model>> {
        let rows = self.rows.lock().unwrap();
        let mut out: Vec<_> = rows
            .values()
            .filter(|r| r.user_id == user_id)
            .filter(|r| status.map_or(true, |s| r.status == s.as_str()))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.scheduled_for);
        Ok(out)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: ScheduleStatus,
        to: ScheduleStatus,
        update: TransitionUpdate,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&id) else {
            return Ok(false);
        };
        if row.status != from.as_str() {
            return Ok(false);
        }

        let now = Utc::now();
        row.status = to.to_string();
        row.updated_at = now;
        if let Some(msg) = update.error_message {
            row.error_message = Some(msg);
        }
        if update.increment_retry {
            row.retry_count += 1;
        }
        if let Some(rate) = update.realized_fee_rate {
            row.realized_fee_rate = Some(rate);
        }
        if let Some(usd) = update.realized_fee_usd {
            row.realized_fee_usd = Some(usd);
        }
        if let Some(savings) = update.realized_savings_usd {
            row.realized_savings_usd = Some(savings);
        }
        if let Some(hash) = update.tx_hash {
            row.tx_hash = Some(hash);
        }
        if let Some(submitted) = update.submitted_tx_hash {
            row.submitted_tx_hash = submitted;
        }
        if let Some(block) = update.block_number {
            row.block_number = Some(block);
        }
        if let Some(executed) = update.executed_at {
            row.executed_at = Some(executed);
        }
        if to.is_terminal() {
            row.encrypted_auth = None;
            row.auth_erased_at = Some(now);
        }
        Ok(true)
    }

    async fn mark_expired_if_past_deadline(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&id) else {
            return Ok(false);
        };
        if row.status != ScheduleStatus::Pending.as_str() || row.expires_at > now {
            return Ok(false);
        }
        row.status = ScheduleStatus::Expired.to_string();
        row.encrypted_auth = None;
        row.auth_erased_at = Some(now);
        row.updated_at = now;
        Ok(true)
    }

    async fn attach_auth(&self, id: Uuid, ciphertext: String) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(row) if row.status == ScheduleStatus::Pending.as_str() => {
                row.encrypted_auth = Some(ciphertext);
                row.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(AppError::ScheduleNotFound),
        }
    }

    async fn cancel(&self, id: Uuid, user_id: &str) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&id) else {
            return Ok(false);
        };
        if row.user_id != user_id || row.status != ScheduleStatus::Pending.as_str() {
            return Ok(false);
        }
        let now = Utc::now();
        row.status = ScheduleStatus::Cancelled.to_string();
        row.encrypted_auth = None;
        row.auth_erased_at = Some(now);
        row.updated_at = now;
        Ok(true)
    }

    async fn find_by_rule_boundary(
        &self,
        rule_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> Result<Option<scheduled_transaction::Model>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .find(|r| r.recurring_rule_id == Some(rule_id) && r.scheduled_for == scheduled_for)
            .cloned())
    }
}

#[derive(Default)]
pub struct MemorySavingsLedger {
    records: Mutex<Vec<NewSaving>>,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl MemorySavingsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<NewSaving> {
        self.records.lock().unwrap().clone()
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl SavingsLedger for MemorySavingsLedger {
    async fn record(&self, saving: NewSaving) -> Result<()> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::Internal("ledger write refused".to_string()));
        }
        self.records.lock().unwrap().push(saving);
        Ok(())
    }

    async fn stats_for_user(&self, user_id: &str) -> Result<Option<user_savings_stat::Model>> {
        let records = self.records.lock().unwrap();
        let mine: Vec<_> = records.iter().filter(|r| r.user_id == user_id).collect();
        if mine.is_empty() {
            return Ok(None);
        }
        let total: f64 = mine.iter().map(|r| r.savings_usd()).sum();
        let best = mine.iter().map(|r| r.savings_usd()).fold(0.0_f64, f64::max);
        let mut per_chain = serde_json::Map::new();
        for r in &mine {
            let entry = per_chain.get(&r.chain).and_then(|v| v.as_f64()).unwrap_or(0.0);
            per_chain.insert(r.chain.clone(), serde_json::json!(entry + r.savings_usd()));
        }
        Ok(Some(user_savings_stat::Model {
            user_id: user_id.to_string(),
            total_transactions: mine.len() as i32,
            scheduled_transactions: mine.len() as i32,
            total_savings_usd: total,
            average_savings_per_tx_usd: total / (mine.len() as f64),
            best_single_saving_usd: best,
            savings_per_chain: serde_json::Value::Object(per_chain),
            updated_at: Utc::now(),
        }))
    }

    async fn recent_for_user(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<transaction_saving::Model>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id && r.executed_at >= since)
            .map(|r| transaction_saving::Model {
                id: Uuid::new_v4(),
                user_id: r.user_id.clone(),
                chain: r.chain.clone(),
                scheduled_transaction_id: r.scheduled_transaction_id,
                tx_hash: r.tx_hash.clone(),
                fee_rate_used: r.fee_rate_used,
                fee_usd: r.fee_usd,
                baseline_fee_usd: r.baseline_fee_usd,
                savings_usd: r.savings_usd(),
                savings_percentage: r.savings_percentage(),
                optimal_timing: r.savings_usd() > 0.0,
                executed_at: r.executed_at,
            })
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryRuleStore {
    rules: Mutex<HashMap<Uuid, recurring_rule::Model>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, rule: recurring_rule::Model) {
        self.rules.lock().unwrap().insert(rule.id, rule);
    }

    pub fn get(&self, id: Uuid) -> Option<recurring_rule::Model> {
        self.rules.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn create(&self, new: NewRule) -> Result<recurring_rule::Model> {
        let now = Utc::now();
        let rule = recurring_rule::Model {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            chain: new.chain,
            from_address: new.from_address,
            to_address: new.to_address,
            amount: new.amount,
            token_address: new.token_address,
            token_symbol: new.token_symbol,
            frequency: new.frequency,
            start_date: new.start_date,
            end_date: new.end_date,
            next_execution: new.next_execution,
            use_optimal_timing: new.use_optimal_timing,
            label: new.label,
            status: RuleStatus::Active.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.seed(rule.clone());
        Ok(rule)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<recurring_rule::Model>> {
        let rules = self.rules.lock().unwrap();
        Ok(rules
            .values()
            .filter(|r| r.status == RuleStatus::Active.as_str() && r.next_execution <= now)
            .cloned()
            .collect())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<recurring_rule::Model>> {
        let rules = self.rules.lock().unwrap();
        let mut out: Vec<_> = rules
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.next_execution);
        Ok(out)
    }

    async fn advance(&self, id: Uuid, next_execution: DateTime<Utc>) -> Result<()> {
        let mut rules = self.rules.lock().unwrap();
        if let Some(rule) = rules.get_mut(&id) {
            rule.next_execution = next_execution;
            rule.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: RuleStatus) -> Result<()> {
        let mut rules = self.rules.lock().unwrap();
        if let Some(rule) = rules.get_mut(&id) {
            rule.status = status.to_string();
            rule.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn cancel(&self, id: Uuid, user_id: &str) -> Result<bool> {
        let mut rules = self.rules.lock().unwrap();
        let Some(rule) = rules.get_mut(&id) else {
            return Ok(false);
        };
        if rule.user_id != user_id || rule.status != RuleStatus::Active.as_str() {
            return Ok(false);
        }
        rule.status = RuleStatus::Cancelled.to_string();
        rule.updated_at = Utc::now();
        Ok(true)
    }
}
