use std::sync::Arc;

use chrono::{ DateTime, Utc };
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{ debug, info, warn };

use crate::chains::{ DispatchError, DispatchReceipt, DispatchRequest, DispatchRoute };
use crate::config::SchedulerConfig;
use crate::crypto::CredentialVault;
use crate::db::{ scheduled_transaction, ScheduleStore, TransitionUpdate };
use crate::enums::{ Chain, ScheduleStatus };
use crate::error::{ AppError, Result };
use crate::fees::FeeQuoter;
use crate::services::notification_service::{ EventKind, Notifier, ScheduleEvent };
use crate::services::{ PriceService, SavingsService };

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct TickSummary {
    pub executed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub expired: usize,
    pub total: usize,
}

enum RowOutcome {
    Executed,
    Failed,
    Skipped,
}

/// Drives one execution tick: claims due rows with a conditional status
/// update, dispatches them on chain and settles the outcome. Every step
/// is safe to re-run; overlapping ticks race on the claim and the loser
/// skips.
pub struct TickExecutor {
    store: Arc<dyn ScheduleStore>,
    savings: Arc<SavingsService>,
    fees: Arc<dyn FeeQuoter>,
    prices: Arc<PriceService>,
    router: Arc<dyn DispatchRoute>,
    vault: Arc<CredentialVault>,
    notifier: Option<Arc<dyn Notifier>>,
    scheduler: SchedulerConfig,
}

impl TickExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        savings: Arc<SavingsService>,
        fees: Arc<dyn FeeQuoter>,
        prices: Arc<PriceService>,
        router: Arc<dyn DispatchRoute>,
        vault: Arc<CredentialVault>,
        notifier: Option<Arc<dyn Notifier>>,
        scheduler: SchedulerConfig,
    ) -> Self {
        Self { store, savings, fees, prices, router, vault, notifier, scheduler }
    }

    pub async fn run(self: &Arc<Self>, now: DateTime<Utc>) -> Result<TickSummary> {
        let expired = self.sweep_expired(now).await?;

        let due = self.store.list_due(now, self.scheduler.batch_limit).await?;
        let mut summary = TickSummary {
            total: due.len(),
            expired,
            ..TickSummary::default()
        };

        if due.is_empty() {
            return Ok(summary);
        }
        info!(total = summary.total, "tick started");

        let semaphore = Arc::new(Semaphore::new(self.scheduler.tick_concurrency));
        let mut tasks: JoinSet<RowOutcome> = JoinSet::new();

        for row in due {
            let permit = semaphore
                .clone()
                .acquire_owned().await
                .map_err(|e| AppError::Internal(format!("semaphore closed: {}", e)))?;
            let executor = Arc::clone(self);
            tasks.spawn(async move {
                let _permit = permit;
                executor.process_row(row, now).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(RowOutcome::Executed) => {
                    summary.executed += 1;
                }
                Ok(RowOutcome::Failed) => {
                    summary.failed += 1;
                }
                Ok(RowOutcome::Skipped) => {
                    summary.skipped += 1;
                }
                Err(e) => {
                    warn!(error = %e, "row task panicked");
                    summary.failed += 1;
                }
            }
        }

        info!(
            executed = summary.executed,
            failed = summary.failed,
            skipped = summary.skipped,
            "tick finished"
        );
        Ok(summary)
    }

    /// Past-deadline pending rows go to `expired` before any dispatch work,
    /// erasing their credential. Losing the conditional update to a
    /// concurrent sweep just skips the row.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let overdue = self.store.list_past_deadline(now, self.scheduler.batch_limit).await?;
        let mut expired = 0;

        for row in overdue {
            if self.store.mark_expired_if_past_deadline(row.id, now).await? {
                info!(schedule_id = %row.id, expires_at = %row.expires_at, "scheduled transaction expired");
                self.notify(&row, EventKind::ScheduledTxExpired, None, None, None).await;
                expired += 1;
            }
        }

        Ok(expired)
    }

    async fn process_row(
        &self,
        row: scheduled_transaction::Model,
        now: DateTime<Utc>,
    ) -> RowOutcome {
        match self.try_process_row(row, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "row processing aborted");
                RowOutcome::Failed
            }
        }
    }

    async fn try_process_row(
        &self,
        row: scheduled_transaction::Model,
        now: DateTime<Utc>,
    ) -> Result<RowOutcome> {
        let chain: Chain = row.chain.parse()?;

        // Rows materialized from a recurring rule carry no credential
        // until the user attaches one.
        let Some(encrypted_auth) = row.encrypted_auth.clone() else {
            debug!(schedule_id = %row.id, "row has no credential attached, waiting");
            return Ok(RowOutcome::Skipped);
        };

        let quote = self.fees.quote(chain).await;

        // Fee gate: wait for the market unless the deadline forces the
        // issue.
        if let Some(threshold) = row.optimal_gas_threshold {
            if quote.standard > threshold {
                debug!(
                    schedule_id = %row.id,
                    current = quote.standard,
                    threshold,
                    "fee above threshold, deferring"
                );
                return Ok(RowOutcome::Skipped);
            }
        }

        // Claim. Losing the race means another tick owns the row.
        let claimed = self.store.transition(
            row.id,
            ScheduleStatus::Pending,
            ScheduleStatus::Executing,
            TransitionUpdate::default()
        ).await?;
        if !claimed {
            debug!(schedule_id = %row.id, "row claimed by another tick");
            return Ok(RowOutcome::Skipped);
        }

        // A hash from an earlier timed-out submission means the transfer
        // may already be on chain. Resolve it before spending again.
        if let Some(submitted) = row.submitted_tx_hash.clone() {
            let adapter = self.router.adapter(chain);
            match adapter.check_receipt(chain, &submitted).await {
                Ok(Some(receipt)) => {
                    info!(schedule_id = %row.id, tx_hash = %receipt.tx_hash, "earlier submission confirmed");
                    return self.complete(&row, chain, &receipt, now).await;
                }
                Ok(None) => {
                    debug!(schedule_id = %row.id, "earlier submission not found, re-dispatching");
                }
                Err(e) => {
                    return self.retry_or_fail(&row, e.to_string(), None).await;
                }
            }
        }

        let credential = match self.vault.unseal(&encrypted_auth, row.id) {
            Ok(credential) => credential,
            Err(e) => {
                // An undecryptable credential will never decrypt; retrying
                // is pointless.
                return self.fail_terminally(&row, format!("credential unusable: {}", e)).await;
            }
        };

        let request = DispatchRequest {
            chain,
            from_address: row.from_address.clone(),
            to_address: row.to_address.clone(),
            amount: row.amount.clone(),
            token_address: row.token_address.clone(),
            fee_rate: quote.standard,
        };

        let adapter = self.router.adapter(chain);
        match adapter.dispatch(&credential, &request).await {
            Ok(receipt) => self.complete(&row, chain, &receipt, now).await,
            Err(DispatchError::Timeout { tx_hash }) => {
                self.retry_or_fail(&row, "confirmation timed out".to_string(), tx_hash).await
            }
            Err(e @ DispatchError::NotImplemented(_)) | Err(e @ DispatchError::CredentialMismatch) => {
                self.fail_terminally(&row, e.to_string()).await
            }
            Err(e) => self.retry_or_fail(&row, e.to_string(), None).await,
        }
    }

    /// Terminal success: persist realized costs, erase the credential and
    /// book the savings against the fee estimated at scheduling time.
    async fn complete(
        &self,
        row: &scheduled_transaction::Model,
        chain: Chain,
        receipt: &DispatchReceipt,
        now: DateTime<Utc>,
    ) -> Result<RowOutcome> {
        let spot = self.prices.spot_usd(chain).await;
        let realized_fee_usd = receipt.fee_native * spot;
        let savings_usd = (row.estimated_fee_usd - realized_fee_usd).max(0.0);

        let updated = self.store.transition(
            row.id,
            ScheduleStatus::Executing,
            ScheduleStatus::Completed,
            TransitionUpdate {
                tx_hash: Some(receipt.tx_hash.clone()),
                submitted_tx_hash: Some(None),
                block_number: receipt.block_number,
                realized_fee_rate: Some(receipt.fee_rate),
                realized_fee_usd: Some(realized_fee_usd),
                realized_savings_usd: Some(savings_usd),
                executed_at: Some(now),
                ..TransitionUpdate::default()
            }
        ).await?;
        if !updated {
            warn!(schedule_id = %row.id, "completion lost the row, leaving as is");
            return Ok(RowOutcome::Skipped);
        }

        // The transfer is on chain; a ledger write failure must not turn a
        // completed row into a reported failure.
        if
            let Err(e) = self.savings.record_execution(
                row,
                &receipt.tx_hash,
                receipt.fee_rate,
                realized_fee_usd,
                row.estimated_fee_usd,
                now
            ).await
        {
            warn!(schedule_id = %row.id, error = %e, "savings ledger write failed");
        }

        info!(
            schedule_id = %row.id,
            tx_hash = %receipt.tx_hash,
            realized_fee_usd,
            savings_usd,
            "scheduled transaction executed"
        );
        self.notify(
            row,
            EventKind::ScheduledTxExecuted,
            Some(receipt.tx_hash.clone()),
            Some(savings_usd),
            None
        ).await;
        Ok(RowOutcome::Executed)
    }

    /// Transient failure: return the row to pending for the next tick, or
    /// give up once the retry budget is spent. A timed-out submission
    /// hash rides along so the next attempt can check the chain first.
    async fn retry_or_fail(
        &self,
        row: &scheduled_transaction::Model,
        error: String,
        submitted_tx_hash: Option<String>,
    ) -> Result<RowOutcome> {
        let attempts = row.retry_count + 1;
        if attempts >= self.scheduler.max_retries {
            return self.fail_terminally(row, format!("{} (attempt {})", error, attempts)).await;
        }

        warn!(schedule_id = %row.id, attempt = attempts, error = %error, "execution failed, will retry");
        self.store.transition(
            row.id,
            ScheduleStatus::Executing,
            ScheduleStatus::Pending,
            TransitionUpdate {
                error_message: Some(error),
                increment_retry: true,
                submitted_tx_hash: submitted_tx_hash.map(Some),
                ..TransitionUpdate::default()
            }
        ).await?;
        Ok(RowOutcome::Failed)
    }

    async fn fail_terminally(
        &self,
        row: &scheduled_transaction::Model,
        error: String,
    ) -> Result<RowOutcome> {
        warn!(schedule_id = %row.id, error = %error, "scheduled transaction failed permanently");
        self.store.transition(
            row.id,
            ScheduleStatus::Executing,
            ScheduleStatus::Failed,
            TransitionUpdate {
                error_message: Some(error.clone()),
                increment_retry: true,
                ..TransitionUpdate::default()
            }
        ).await?;
        self.notify(row, EventKind::ScheduledTxFailed, None, None, Some(error)).await;
        Ok(RowOutcome::Failed)
    }

    async fn notify(
        &self,
        row: &scheduled_transaction::Model,
        kind: EventKind,
        tx_hash: Option<String>,
        savings_usd: Option<f64>,
        error: Option<String>,
    ) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        notifier.notify(ScheduleEvent {
            kind,
            user_id: row.user_id.clone(),
            schedule_id: row.id,
            chain: row.chain.clone(),
            amount: row.amount.clone(),
            token_symbol: row.token_symbol.clone(),
            tx_hash,
            savings_usd,
            error,
        }).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;
    use crate::crypto::Credential;
    use crate::db::memory::{ MemorySavingsLedger, MemoryScheduleStore };
    use crate::db::NewSchedule;
    use crate::enums::FeeSource;
    use crate::fees::FeeQuote;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const KEY: [u8; 32] = [7u8; 32];

    #[derive(Clone)]
    enum Script {
        Succeed,
        Fail,
        Timeout(&'static str),
        NotImplemented,
    }

    struct MockAdapter {
        script: Script,
        receipt_lookup: Option<DispatchReceipt>,
        dispatches: Mutex<Vec<String>>,
        lookups: Mutex<Vec<String>>,
    }

    impl MockAdapter {
        fn new(script: Script) -> Self {
            Self {
                script,
                receipt_lookup: None,
                dispatches: Mutex::new(Vec::new()),
                lookups: Mutex::new(Vec::new()),
            }
        }

        fn with_lookup(mut self, receipt: DispatchReceipt) -> Self {
            self.receipt_lookup = Some(receipt);
            self
        }

        fn dispatch_count(&self) -> usize {
            self.dispatches.lock().unwrap().len()
        }
    }

    fn receipt(tx_hash: &str) -> DispatchReceipt {
        DispatchReceipt {
            tx_hash: tx_hash.to_string(),
            fee_native: 0.0003,
            fee_rate: 14.0,
            block_number: Some(1_234_567),
        }
    }

    #[async_trait]
    impl crate::chains::DispatchAdapter for MockAdapter {
        async fn dispatch(
            &self,
            _credential: &Credential,
            request: &DispatchRequest,
        ) -> std::result::Result<DispatchReceipt, DispatchError> {
            self.dispatches.lock().unwrap().push(request.to_address.clone());
            match &self.script {
                Script::Succeed => Ok(receipt("0xexecuted")),
                Script::Fail => Err(DispatchError::Failed("rpc exploded".to_string())),
                Script::Timeout(hash) =>
                    Err(DispatchError::Timeout {
                        tx_hash: Some(hash.to_string()),
                    }),
                Script::NotImplemented =>
                    Err(DispatchError::NotImplemented("broadcast is not wired up".to_string())),
            }
        }

        async fn check_receipt(
            &self,
            _chain: Chain,
            tx_hash: &str,
        ) -> std::result::Result<Option<DispatchReceipt>, DispatchError> {
            self.lookups.lock().unwrap().push(tx_hash.to_string());
            Ok(self.receipt_lookup.clone())
        }
    }

    struct StubRoute(Arc<MockAdapter>);

    impl DispatchRoute for StubRoute {
        fn adapter(&self, _chain: Chain) -> Arc<dyn crate::chains::DispatchAdapter> {
            self.0.clone()
        }
    }

    struct StubQuoter {
        standard: f64,
    }

    #[async_trait]
    impl FeeQuoter for StubQuoter {
        async fn quote(&self, chain: Chain) -> FeeQuote {
            FeeQuote {
                chain,
                slow: self.standard * 0.8,
                standard: self.standard,
                fast: self.standard * 1.25,
                unit: chain.fee_unit(),
                source: FeeSource::Api,
                fetched_at: Utc::now(),
            }
        }
    }

    struct Harness {
        store: Arc<MemoryScheduleStore>,
        ledger: Arc<MemorySavingsLedger>,
        adapter: Arc<MockAdapter>,
        vault: Arc<CredentialVault>,
        executor: Arc<TickExecutor>,
    }

    async fn harness(script: Script, standard_fee: f64) -> Harness {
        harness_with_adapter(Arc::new(MockAdapter::new(script)), standard_fee).await
    }

    async fn harness_with_adapter(adapter: Arc<MockAdapter>, standard_fee: f64) -> Harness {
        let store = Arc::new(MemoryScheduleStore::new());
        let ledger = Arc::new(MemorySavingsLedger::new());
        let vault = Arc::new(CredentialVault::new(&KEY).unwrap());
        let prices = Arc::new(PriceService::new());
        prices.preload("ETH", 3000.0).await;

        let executor = Arc::new(
            TickExecutor::new(
                store.clone() as Arc<dyn ScheduleStore>,
                Arc::new(SavingsService::new(ledger.clone())),
                Arc::new(StubQuoter { standard: standard_fee }),
                prices,
                Arc::new(StubRoute(adapter.clone())),
                vault.clone(),
                None,
                SchedulerConfig::default()
            )
        );

        Harness { store, ledger, adapter, vault, executor }
    }

    struct RowSpec {
        threshold: Option<f64>,
        sealed: bool,
        retry_count: i32,
        submitted_tx_hash: Option<String>,
        expired: bool,
    }

    impl Default for RowSpec {
        fn default() -> Self {
            Self {
                threshold: None,
                sealed: true,
                retry_count: 0,
                submitted_tx_hash: None,
                expired: false,
            }
        }
    }

    async fn seed_row(h: &Harness, spec: RowSpec) -> scheduled_transaction::Model {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let encrypted_auth = if spec.sealed {
            Some(h.vault.seal(&Credential::new(TEST_MNEMONIC.to_string()), id).unwrap())
        } else {
            None
        };
        let expires_at = if spec.expired {
            now - Duration::minutes(1)
        } else {
            now + Duration::hours(12)
        };

        let mut row = h.store
            .create(NewSchedule {
                id,
                user_id: "user-1".to_string(),
                chain: "ETH".to_string(),
                from_address: "0x9858EfFD232B4033E47d90003D41EC34EcaEda94".to_string(),
                to_address: "0x1111111111111111111111111111111111111111".to_string(),
                amount: "0.5".to_string(),
                token_address: None,
                token_symbol: "ETH".to_string(),
                priority: 0,
                memo: None,
                scheduled_for: now - Duration::hours(2),
                expires_at: now + Duration::hours(12),
                optimal_gas_threshold: spec.threshold,
                encrypted_auth,
                estimated_fee_rate: 30.0,
                estimated_fee_usd: 2.0,
                recurring_rule_id: None,
            }).await
            .unwrap();

        // Adjust fields the constructor does not expose
        row.retry_count = spec.retry_count;
        row.submitted_tx_hash = spec.submitted_tx_hash;
        row.expires_at = expires_at;
        h.store.seed(row.clone());
        row
    }

    #[tokio::test]
    async fn executes_due_row_and_erases_credential() {
        let h = harness(Script::Succeed, 20.0).await;
        let row = seed_row(&h, RowSpec::default()).await;

        let summary = h.executor.run(Utc::now()).await.unwrap();
        assert_eq!(summary.executed, 1);
        assert_eq!(summary.total, 1);

        let stored = h.store.get(row.id).unwrap();
        assert_eq!(stored.status, ScheduleStatus::Completed.as_str());
        assert_eq!(stored.tx_hash.as_deref(), Some("0xexecuted"));
        assert_eq!(stored.encrypted_auth, None);
        assert!(stored.auth_erased_at.is_some());
        assert!(stored.executed_at.is_some());
        // 0.0003 ETH at $3000 = $0.90 against a $2.00 estimate
        assert!((stored.realized_fee_usd.unwrap() - 0.9).abs() < 1e-9);
        assert!((stored.realized_savings_usd.unwrap() - 1.1).abs() < 1e-9);

        let recorded = h.ledger.recorded();
        assert_eq!(recorded.len(), 1);
        assert!((recorded[0].baseline_fee_usd - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn fee_above_threshold_defers_row() {
        let h = harness(Script::Succeed, 50.0).await;
        let row = seed_row(&h, RowSpec { threshold: Some(40.0), ..RowSpec::default() }).await;

        let summary = h.executor.run(Utc::now()).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(h.adapter.dispatch_count(), 0);

        let stored = h.store.get(row.id).unwrap();
        assert_eq!(stored.status, ScheduleStatus::Pending.as_str());
        assert!(stored.encrypted_auth.is_some());
    }

    #[tokio::test]
    async fn fee_under_threshold_executes() {
        let h = harness(Script::Succeed, 30.0).await;
        let row = seed_row(&h, RowSpec { threshold: Some(40.0), ..RowSpec::default() }).await;

        let summary = h.executor.run(Utc::now()).await.unwrap();
        assert_eq!(summary.executed, 1);
        assert_eq!(h.store.get(row.id).unwrap().status, ScheduleStatus::Completed.as_str());
    }

    #[tokio::test]
    async fn hint_only_row_waits_for_credential() {
        let h = harness(Script::Succeed, 20.0).await;
        let row = seed_row(&h, RowSpec { sealed: false, ..RowSpec::default() }).await;

        let summary = h.executor.run(Utc::now()).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(h.adapter.dispatch_count(), 0);
        assert_eq!(h.store.get(row.id).unwrap().status, ScheduleStatus::Pending.as_str());
    }

    #[tokio::test]
    async fn claimed_row_is_skipped_silently() {
        let h = harness(Script::Succeed, 20.0).await;
        let row = seed_row(&h, RowSpec::default()).await;

        // Another tick claims the row between listing and claiming
        h.store
            .transition(
                row.id,
                ScheduleStatus::Pending,
                ScheduleStatus::Executing,
                TransitionUpdate::default()
            ).await
            .unwrap();

        let outcome = h.executor.process_row(row.clone(), Utc::now()).await;
        assert!(matches!(outcome, RowOutcome::Skipped));
        assert_eq!(h.adapter.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn transient_failure_returns_row_to_pending_with_credential() {
        let h = harness(Script::Fail, 20.0).await;
        let row = seed_row(&h, RowSpec::default()).await;

        let summary = h.executor.run(Utc::now()).await.unwrap();
        assert_eq!(summary.failed, 1);

        let stored = h.store.get(row.id).unwrap();
        assert_eq!(stored.status, ScheduleStatus::Pending.as_str());
        assert_eq!(stored.retry_count, 1);
        assert!(stored.error_message.as_deref().unwrap().contains("rpc exploded"));
        // Retryable rows keep their credential
        assert!(stored.encrypted_auth.is_some());
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_fails_terminally() {
        let h = harness(Script::Fail, 20.0).await;
        let row = seed_row(&h, RowSpec { retry_count: 2, ..RowSpec::default() }).await;

        let summary = h.executor.run(Utc::now()).await.unwrap();
        assert_eq!(summary.failed, 1);

        let stored = h.store.get(row.id).unwrap();
        assert_eq!(stored.status, ScheduleStatus::Failed.as_str());
        assert_eq!(stored.encrypted_auth, None);
        assert!(stored.auth_erased_at.is_some());
    }

    #[tokio::test]
    async fn timeout_records_submitted_hash_for_next_tick() {
        let h = harness(Script::Timeout("0xsubmitted"), 20.0).await;
        let row = seed_row(&h, RowSpec::default()).await;

        h.executor.run(Utc::now()).await.unwrap();

        let stored = h.store.get(row.id).unwrap();
        assert_eq!(stored.status, ScheduleStatus::Pending.as_str());
        assert_eq!(stored.submitted_tx_hash.as_deref(), Some("0xsubmitted"));
        assert_eq!(stored.retry_count, 1);
    }

    #[tokio::test]
    async fn confirmed_earlier_submission_completes_without_redispatch() {
        let adapter = Arc::new(
            MockAdapter::new(Script::Succeed).with_lookup(receipt("0xsubmitted"))
        );
        let h = harness_with_adapter(adapter, 20.0).await;
        let row = seed_row(&h, RowSpec {
            submitted_tx_hash: Some("0xsubmitted".to_string()),
            ..RowSpec::default()
        }).await;

        let summary = h.executor.run(Utc::now()).await.unwrap();
        assert_eq!(summary.executed, 1);
        assert_eq!(h.adapter.dispatch_count(), 0);

        let stored = h.store.get(row.id).unwrap();
        assert_eq!(stored.status, ScheduleStatus::Completed.as_str());
        assert_eq!(stored.tx_hash.as_deref(), Some("0xsubmitted"));
        assert_eq!(stored.submitted_tx_hash, None);
        assert_eq!(h.ledger.recorded().len(), 1);
    }

    #[tokio::test]
    async fn unconfirmed_earlier_submission_redispatches() {
        let h = harness(Script::Succeed, 20.0).await;
        let row = seed_row(&h, RowSpec {
            submitted_tx_hash: Some("0xlost".to_string()),
            ..RowSpec::default()
        }).await;

        let summary = h.executor.run(Utc::now()).await.unwrap();
        assert_eq!(summary.executed, 1);
        assert_eq!(h.adapter.dispatch_count(), 1);
        assert_eq!(h.adapter.lookups.lock().unwrap().as_slice(), ["0xlost"]);

        let stored = h.store.get(row.id).unwrap();
        assert_eq!(stored.tx_hash.as_deref(), Some("0xexecuted"));
        assert_eq!(stored.submitted_tx_hash, None);
    }

    #[tokio::test]
    async fn undecryptable_credential_fails_without_dispatch() {
        let h = harness(Script::Succeed, 20.0).await;
        let row = seed_row(&h, RowSpec::default()).await;
        // Ciphertext sealed for a different row id will not unseal
        let other_id = Uuid::new_v4();
        let wrong = h.vault.seal(&Credential::new(TEST_MNEMONIC.to_string()), other_id).unwrap();
        h.store.attach_auth(row.id, wrong).await.unwrap();

        let summary = h.executor.run(Utc::now()).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(h.adapter.dispatch_count(), 0);

        let stored = h.store.get(row.id).unwrap();
        assert_eq!(stored.status, ScheduleStatus::Failed.as_str());
        assert_eq!(stored.encrypted_auth, None);
    }

    #[tokio::test]
    async fn not_implemented_fails_without_retry() {
        let h = harness(Script::NotImplemented, 20.0).await;
        let row = seed_row(&h, RowSpec::default()).await;

        h.executor.run(Utc::now()).await.unwrap();

        let stored = h.store.get(row.id).unwrap();
        assert_eq!(stored.status, ScheduleStatus::Failed.as_str());
        assert!(stored.error_message.as_deref().unwrap().contains("not implemented"));
    }

    #[tokio::test]
    async fn past_deadline_row_expires_through_tick() {
        let h = harness(Script::Succeed, 20.0).await;
        let row = seed_row(&h, RowSpec { expired: true, ..RowSpec::default() }).await;

        let summary = h.executor.run(Utc::now()).await.unwrap();
        assert_eq!(summary.expired, 1);
        assert_eq!(summary.total, 0);

        let stored = h.store.get(row.id).unwrap();
        assert_eq!(stored.status, ScheduleStatus::Expired.as_str());
        assert_eq!(stored.encrypted_auth, None);
        assert!(stored.auth_erased_at.is_some());
        assert_eq!(h.adapter.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn tick_expires_overdue_rows_alongside_live_ones() {
        let h = harness(Script::Succeed, 20.0).await;
        let stale = seed_row(&h, RowSpec { expired: true, ..RowSpec::default() }).await;
        let live = seed_row(&h, RowSpec::default()).await;

        let summary = h.executor.run(Utc::now()).await.unwrap();
        assert_eq!(summary.expired, 1);
        assert_eq!(summary.executed, 1);

        assert_eq!(h.store.get(stale.id).unwrap().status, ScheduleStatus::Expired.as_str());
        assert_eq!(h.store.get(live.id).unwrap().status, ScheduleStatus::Completed.as_str());
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let h = harness(Script::Succeed, 20.0).await;
        let row = seed_row(&h, RowSpec::default()).await;

        let (a, b) = tokio::join!(
            h.store.transition(
                row.id,
                ScheduleStatus::Pending,
                ScheduleStatus::Executing,
                TransitionUpdate::default()
            ),
            h.store.transition(
                row.id,
                ScheduleStatus::Pending,
                ScheduleStatus::Executing,
                TransitionUpdate::default()
            )
        );
        let wins = [a.unwrap(), b.unwrap()];
        assert_eq!(wins.iter().filter(|w| **w).count(), 1);
        assert_eq!(h.store.get(row.id).unwrap().status, ScheduleStatus::Executing.as_str());
    }

    #[tokio::test]
    async fn ledger_failure_does_not_mask_completion() {
        let h = harness(Script::Succeed, 20.0).await;
        let row = seed_row(&h, RowSpec::default()).await;
        h.ledger.fail_writes();

        let summary = h.executor.run(Utc::now()).await.unwrap();
        assert_eq!(summary.executed, 1);
        assert_eq!(summary.failed, 0);

        let stored = h.store.get(row.id).unwrap();
        assert_eq!(stored.status, ScheduleStatus::Completed.as_str());
        assert_eq!(stored.tx_hash.as_deref(), Some("0xexecuted"));
        assert!(h.ledger.recorded().is_empty());
    }

    #[tokio::test]
    async fn batch_executes_multiple_rows() {
        let h = harness(Script::Succeed, 20.0).await;
        for _ in 0..5 {
            seed_row(&h, RowSpec::default()).await;
        }

        let summary = h.executor.run(Utc::now()).await.unwrap();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.executed, 5);
        assert_eq!(h.ledger.recorded().len(), 5);
    }
}
