pub use sea_orm_migration::prelude::*;

mod m20240201_000001_create_scheduled_transactions_table;
mod m20240202_000001_create_recurring_rules_table;
mod m20240203_000001_create_transaction_savings_table;
mod m20240204_000001_create_user_savings_stats_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240201_000001_create_scheduled_transactions_table::Migration),
            Box::new(m20240202_000001_create_recurring_rules_table::Migration),
            Box::new(m20240203_000001_create_transaction_savings_table::Migration),
            Box::new(m20240204_000001_create_user_savings_stats_table::Migration)
        ]
    }
}
