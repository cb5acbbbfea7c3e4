use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(TransactionSaving::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(TransactionSaving::Id)
                        .uuid()
                        .not_null()
                        .primary_key()
                        .extra("DEFAULT gen_random_uuid()".to_string())
                )
                .col(ColumnDef::new(TransactionSaving::UserId).string().not_null())
                .col(ColumnDef::new(TransactionSaving::Chain).string_len(20).not_null())
                .col(ColumnDef::new(TransactionSaving::ScheduledTransactionId).uuid().not_null())
                .col(ColumnDef::new(TransactionSaving::TxHash).string().not_null())
                .col(ColumnDef::new(TransactionSaving::FeeRateUsed).double().not_null())
                .col(ColumnDef::new(TransactionSaving::FeeUsd).double().not_null())
                .col(ColumnDef::new(TransactionSaving::BaselineFeeUsd).double().not_null())
                .col(ColumnDef::new(TransactionSaving::SavingsUsd).double().not_null())
                .col(ColumnDef::new(TransactionSaving::SavingsPercentage).double().not_null())
                .col(ColumnDef::new(TransactionSaving::OptimalTiming).boolean().not_null())
                .col(ColumnDef::new(TransactionSaving::ExecutedAt).timestamp().not_null())
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .name("idx_transaction_savings_user_id")
                .table(TransactionSaving::Table)
                .col(TransactionSaving::UserId)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .name("idx_transaction_savings_executed_at")
                .table(TransactionSaving::Table)
                .col(TransactionSaving::ExecutedAt)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(TransactionSaving::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum TransactionSaving {
    Table,
    Id,
    UserId,
    Chain,
    ScheduledTransactionId,
    TxHash,
    FeeRateUsed,
    FeeUsd,
    BaselineFeeUsd,
    SavingsUsd,
    SavingsPercentage,
    OptimalTiming,
    ExecutedAt,
}
