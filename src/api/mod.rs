use std::sync::Arc;

pub mod cron;
pub mod smart_send;

use crate::crypto::CredentialVault;
use crate::db::{ RuleStore, ScheduleStore };
use crate::executor::TickExecutor;
use crate::fees::FeeQuoter;
use crate::services::{ ComparisonService, PriceService, RecurrenceGenerator, SavingsService };

#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<TickExecutor>,
    pub recurrence: Arc<RecurrenceGenerator>,
    pub comparison: Arc<ComparisonService>,
    pub savings: Arc<SavingsService>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub rules: Arc<dyn RuleStore>,
    pub vault: Arc<CredentialVault>,
    pub fees: Arc<dyn FeeQuoter>,
    pub prices: Arc<PriceService>,
    pub cron_secret: Arc<String>,
}
