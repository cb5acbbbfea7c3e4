use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(UserSavingsStat::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(UserSavingsStat::UserId)
                        .string()
                        .not_null()
                        .primary_key()
                )
                .col(
                    ColumnDef::new(UserSavingsStat::TotalTransactions)
                        .integer()
                        .not_null()
                        .default(0)
                )
                .col(
                    ColumnDef::new(UserSavingsStat::ScheduledTransactions)
                        .integer()
                        .not_null()
                        .default(0)
                )
                .col(
                    ColumnDef::new(UserSavingsStat::TotalSavingsUsd)
                        .double()
                        .not_null()
                        .default(0.0)
                )
                .col(
                    ColumnDef::new(UserSavingsStat::AverageSavingsPerTxUsd)
                        .double()
                        .not_null()
                        .default(0.0)
                )
                .col(
                    ColumnDef::new(UserSavingsStat::BestSingleSavingUsd)
                        .double()
                        .not_null()
                        .default(0.0)
                )
                .col(
                    ColumnDef::new(UserSavingsStat::SavingsPerChain)
                        .json_binary()
                        .not_null()
                        .extra("DEFAULT '{}'::jsonb".to_string())
                )
                .col(
                    ColumnDef::new(UserSavingsStat::UpdatedAt)
                        .timestamp()
                        .not_null()
                        .extra("DEFAULT NOW()".to_string())
                )
                .to_owned()
        ).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(UserSavingsStat::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum UserSavingsStat {
    Table,
    UserId,
    TotalTransactions,
    ScheduledTransactions,
    TotalSavingsUsd,
    AverageSavingsPerTxUsd,
    BestSingleSavingUsd,
    SavingsPerChain,
    UpdatedAt,
}
