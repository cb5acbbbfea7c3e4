pub mod scheduled_transaction;
pub mod recurring_rule;
pub mod transaction_saving;
pub mod user_savings_stat;

pub use scheduled_transaction::Entity as ScheduledTransaction;
pub use recurring_rule::Entity as RecurringRule;
pub use transaction_saving::Entity as TransactionSaving;
pub use user_savings_stat::Entity as UserSavingsStat;
