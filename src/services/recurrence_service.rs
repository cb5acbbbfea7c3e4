use std::sync::Arc;

use chrono::{ DateTime, Duration, Utc };
use tracing::{ info, warn };
use uuid::Uuid;

use crate::db::{ recurring_rule, NewSchedule, RuleStore, ScheduleStore };
use crate::enums::{ Chain, Frequency, RuleStatus };
use crate::error::Result;
use crate::fees::FeeQuoter;
use crate::services::comparison_service::ComparisonService;
use crate::services::price_service::PriceService;

/// Materialized rows stay executable for this long past their boundary.
const EXECUTION_WINDOW_HOURS: i64 = 24;
/// Headroom over the current rate when a rule opts into optimal timing.
const THRESHOLD_HEADROOM: f64 = 1.1;

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct RecurrenceSummary {
    pub materialized: usize,
    pub completed: usize,
    pub skipped: usize,
}

/// Turns recurring rules into concrete scheduled rows at each cadence
/// boundary. Materialized rows carry no credential; the user attaches one
/// before the row can auto-execute.
pub struct RecurrenceGenerator {
    rules: Arc<dyn RuleStore>,
    schedules: Arc<dyn ScheduleStore>,
    fees: Arc<dyn FeeQuoter>,
    prices: Arc<PriceService>,
}

impl RecurrenceGenerator {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        schedules: Arc<dyn ScheduleStore>,
        fees: Arc<dyn FeeQuoter>,
        prices: Arc<PriceService>,
    ) -> Self {
        Self { rules, schedules, fees, prices }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<RecurrenceSummary> {
        let due = self.rules.list_due(now).await?;
        let mut summary = RecurrenceSummary::default();

        for rule in due {
            if let Err(err) = self.materialize(&rule, now, &mut summary).await {
                warn!(rule_id = %rule.id, error = %err, "rule materialization failed");
                summary.skipped += 1;
            }
        }

        Ok(summary)
    }

    /// Walks every boundary the rule has passed, one row per boundary, so
    /// a generator that fell behind catches up in a single run.
    async fn materialize(
        &self,
        rule: &recurring_rule::Model,
        now: DateTime<Utc>,
        summary: &mut RecurrenceSummary,
    ) -> Result<()> {
        let frequency: Frequency = rule.frequency.parse()?;
        let mut boundary = rule.next_execution;

        while boundary <= now {
            // Boundary past the rule's end date: the rule has run its
            // course.
            if rule.end_date.is_some_and(|end| boundary > end) {
                self.rules.set_status(rule.id, RuleStatus::Completed).await?;
                info!(rule_id = %rule.id, "recurring rule completed");
                summary.completed += 1;
                return Ok(());
            }

            // Rules on optimal timing land in the overnight lull instead
            // of at the raw cadence instant.
            let scheduled_for = if rule.use_optimal_timing {
                ComparisonService::next_cheap_window(boundary)
            } else {
                boundary
            };

            // A crashed previous run may have created the row already; the
            // boundary check (backed by a unique index) makes re-runs safe.
            let already = self.schedules.find_by_rule_boundary(rule.id, scheduled_for).await?;
            if already.is_some() {
                summary.skipped += 1;
            } else {
                self.create_row(rule, boundary, scheduled_for).await?;
                summary.materialized += 1;
            }

            boundary = frequency.next_boundary(boundary);
            if rule.end_date.is_some_and(|end| boundary > end) {
                self.rules.set_status(rule.id, RuleStatus::Completed).await?;
                return Ok(());
            }
            self.rules.advance(rule.id, boundary).await?;
        }

        Ok(())
    }

    async fn create_row(
        &self,
        rule: &recurring_rule::Model,
        boundary: DateTime<Utc>,
        scheduled_for: DateTime<Utc>,
    ) -> Result<()> {
        let chain: Chain = rule.chain.parse()?;
        let quote = self.fees.quote(chain).await;
        let spot = self.prices.spot_usd(chain).await;
        let estimated_fee_usd = ComparisonService::transfer_fee_usd(chain, quote.standard, spot);

        let threshold = if rule.use_optimal_timing {
            Some(quote.standard * THRESHOLD_HEADROOM)
        } else {
            None
        };

        let row = self.schedules.create(NewSchedule {
            id: Uuid::new_v4(),
            user_id: rule.user_id.clone(),
            chain: rule.chain.clone(),
            from_address: rule.from_address.clone(),
            to_address: rule.to_address.clone(),
            amount: rule.amount.clone(),
            token_address: rule.token_address.clone(),
            token_symbol: rule.token_symbol.clone(),
            priority: 0,
            memo: Some(rule.label.clone()),
            scheduled_for,
            expires_at: boundary + Duration::hours(EXECUTION_WINDOW_HOURS),
            optimal_gas_threshold: threshold,
            encrypted_auth: None,
            estimated_fee_rate: quote.standard,
            estimated_fee_usd,
            recurring_rule_id: Some(rule.id),
        }).await?;

        info!(rule_id = %rule.id, schedule_id = %row.id, %boundary, "materialized recurring send");
        Ok(())
    }
}
