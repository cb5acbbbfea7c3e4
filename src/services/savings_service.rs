use std::sync::Arc;

use chrono::{ DateTime, Duration, Utc };
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::db::{ scheduled_transaction, NewSaving, SavingsLedger };
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct RecentSaving {
    pub scheduled_transaction_id: Uuid,
    pub chain: String,
    pub tx_hash: String,
    pub savings_usd: f64,
    pub savings_percentage: f64,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavingsStats {
    pub user_id: String,
    pub total_transactions: i32,
    pub scheduled_transactions: i32,
    pub total_savings_usd: f64,
    pub average_savings_per_tx_usd: f64,
    pub best_single_saving_usd: f64,
    pub savings_per_chain: serde_json::Value,
    pub recent: Vec<RecentSaving>,
}

impl SavingsStats {
    fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_transactions: 0,
            scheduled_transactions: 0,
            total_savings_usd: 0.0,
            average_savings_per_tx_usd: 0.0,
            best_single_saving_usd: 0.0,
            savings_per_chain: serde_json::json!({}),
            recent: Vec::new(),
        }
    }
}

/// Records realized savings after each completed execution and serves the
/// per-user aggregate.
pub struct SavingsService {
    ledger: Arc<dyn SavingsLedger>,
}

impl SavingsService {
    pub fn new(ledger: Arc<dyn SavingsLedger>) -> Self {
        Self { ledger }
    }

    /// Ledger entry for a completed execution. Returns the clamped
    /// savings amount (a fee above baseline records as zero savings, not
    /// negative).
    pub async fn record_execution(
        &self,
        tx: &scheduled_transaction::Model,
        tx_hash: &str,
        fee_rate_used: f64,
        fee_usd: f64,
        baseline_fee_usd: f64,
        executed_at: DateTime<Utc>,
    ) -> Result<f64> {
        let saving = NewSaving {
            user_id: tx.user_id.clone(),
            chain: tx.chain.clone(),
            scheduled_transaction_id: tx.id,
            tx_hash: tx_hash.to_string(),
            fee_rate_used,
            fee_usd,
            baseline_fee_usd,
            executed_at,
        };
        let savings_usd = saving.savings_usd();

        self.ledger.record(saving).await?;
        info!(
            schedule_id = %tx.id,
            user_id = %tx.user_id,
            savings_usd,
            "recorded execution savings"
        );
        Ok(savings_usd)
    }

    /// Aggregate stats plus the last 30 days of individual savings.
    pub async fn stats(&self, user_id: &str) -> Result<SavingsStats> {
        let Some(stats) = self.ledger.stats_for_user(user_id).await? else {
            return Ok(SavingsStats::empty(user_id));
        };

        let since = Utc::now() - Duration::days(30);
        let recent = self.ledger
            .recent_for_user(user_id, since).await?
            .into_iter()
            .map(|row| RecentSaving {
                scheduled_transaction_id: row.scheduled_transaction_id,
                chain: row.chain,
                tx_hash: row.tx_hash,
                savings_usd: row.savings_usd,
                savings_percentage: row.savings_percentage,
                executed_at: row.executed_at,
            })
            .collect();

        Ok(SavingsStats {
            user_id: stats.user_id,
            total_transactions: stats.total_transactions,
            scheduled_transactions: stats.scheduled_transactions,
            total_savings_usd: stats.total_savings_usd,
            average_savings_per_tx_usd: stats.average_savings_per_tx_usd,
            best_single_saving_usd: stats.best_single_saving_usd,
            savings_per_chain: stats.savings_per_chain,
            recent,
        })
    }
}
