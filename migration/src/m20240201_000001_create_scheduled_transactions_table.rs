use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(ScheduledTransaction::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(ScheduledTransaction::Id)
                        .uuid()
                        .not_null()
                        .primary_key()
                        .extra("DEFAULT gen_random_uuid()".to_string())
                )
                .col(ColumnDef::new(ScheduledTransaction::UserId).string().not_null())
                .col(ColumnDef::new(ScheduledTransaction::Chain).string_len(20).not_null())
                .col(ColumnDef::new(ScheduledTransaction::FromAddress).string().not_null())
                .col(ColumnDef::new(ScheduledTransaction::ToAddress).string().not_null())
                .col(ColumnDef::new(ScheduledTransaction::Amount).string_len(50).not_null())
                .col(ColumnDef::new(ScheduledTransaction::TokenAddress).string().null())
                .col(ColumnDef::new(ScheduledTransaction::TokenSymbol).string_len(20).not_null())
                .col(
                    ColumnDef::new(ScheduledTransaction::Priority)
                        .integer()
                        .not_null()
                        .default(0)
                )
                .col(ColumnDef::new(ScheduledTransaction::Memo).text().null())
                .col(ColumnDef::new(ScheduledTransaction::ScheduledFor).timestamp().not_null())
                .col(ColumnDef::new(ScheduledTransaction::ExpiresAt).timestamp().not_null())
                .col(ColumnDef::new(ScheduledTransaction::OptimalGasThreshold).double().null())
                .col(ColumnDef::new(ScheduledTransaction::EncryptedAuth).text().null())
                .col(ColumnDef::new(ScheduledTransaction::AuthErasedAt).timestamp().null())
                .col(ColumnDef::new(ScheduledTransaction::Status).string_len(20).not_null())
                .col(
                    ColumnDef::new(ScheduledTransaction::RetryCount)
                        .integer()
                        .not_null()
                        .default(0)
                )
                .col(ColumnDef::new(ScheduledTransaction::ErrorMessage).text().null())
                .col(
                    ColumnDef::new(ScheduledTransaction::EstimatedFeeRate)
                        .double()
                        .not_null()
                        .default(0.0)
                )
                .col(
                    ColumnDef::new(ScheduledTransaction::EstimatedFeeUsd)
                        .double()
                        .not_null()
                        .default(0.0)
                )
                .col(ColumnDef::new(ScheduledTransaction::RealizedFeeRate).double().null())
                .col(ColumnDef::new(ScheduledTransaction::RealizedFeeUsd).double().null())
                .col(ColumnDef::new(ScheduledTransaction::RealizedSavingsUsd).double().null())
                .col(ColumnDef::new(ScheduledTransaction::TxHash).string().null())
                .col(ColumnDef::new(ScheduledTransaction::SubmittedTxHash).string().null())
                .col(ColumnDef::new(ScheduledTransaction::BlockNumber).big_integer().null())
                .col(ColumnDef::new(ScheduledTransaction::ExecutedAt).timestamp().null())
                .col(ColumnDef::new(ScheduledTransaction::RecurringRuleId).uuid().null())
                .col(
                    ColumnDef::new(ScheduledTransaction::CreatedAt)
                        .timestamp()
                        .not_null()
                        .extra("DEFAULT NOW()".to_string())
                )
                .col(
                    ColumnDef::new(ScheduledTransaction::UpdatedAt)
                        .timestamp()
                        .not_null()
                        .extra("DEFAULT NOW()".to_string())
                )
                .to_owned()
        ).await?;

        // Create indexes
        manager.create_index(
            Index::create()
                .name("idx_scheduled_tx_user_id")
                .table(ScheduledTransaction::Table)
                .col(ScheduledTransaction::UserId)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .name("idx_scheduled_tx_status_scheduled_for")
                .table(ScheduledTransaction::Table)
                .col(ScheduledTransaction::Status)
                .col(ScheduledTransaction::ScheduledFor)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .name("idx_scheduled_tx_rule_boundary")
                .table(ScheduledTransaction::Table)
                .col(ScheduledTransaction::RecurringRuleId)
                .col(ScheduledTransaction::ScheduledFor)
                .unique()
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ScheduledTransaction::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum ScheduledTransaction {
    Table,
    Id,
    UserId,
    Chain,
    FromAddress,
    ToAddress,
    Amount,
    TokenAddress,
    TokenSymbol,
    Priority,
    Memo,
    ScheduledFor,
    ExpiresAt,
    OptimalGasThreshold,
    EncryptedAuth,
    AuthErasedAt,
    Status,
    RetryCount,
    ErrorMessage,
    EstimatedFeeRate,
    EstimatedFeeUsd,
    RealizedFeeRate,
    RealizedFeeUsd,
    RealizedSavingsUsd,
    TxHash,
    SubmittedTxHash,
    BlockNumber,
    ExecutedAt,
    RecurringRuleId,
    CreatedAt,
    UpdatedAt,
}
