use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(RecurringRule::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(RecurringRule::Id)
                        .uuid()
                        .not_null()
                        .primary_key()
                        .extra("DEFAULT gen_random_uuid()".to_string())
                )
                .col(ColumnDef::new(RecurringRule::UserId).string().not_null())
                .col(ColumnDef::new(RecurringRule::Chain).string_len(20).not_null())
                .col(ColumnDef::new(RecurringRule::FromAddress).string().not_null())
                .col(ColumnDef::new(RecurringRule::ToAddress).string().not_null())
                .col(ColumnDef::new(RecurringRule::Amount).string_len(50).not_null())
                .col(ColumnDef::new(RecurringRule::TokenAddress).string().null())
                .col(ColumnDef::new(RecurringRule::TokenSymbol).string_len(20).not_null())
                .col(ColumnDef::new(RecurringRule::Frequency).string_len(20).not_null())
                .col(ColumnDef::new(RecurringRule::StartDate).timestamp().not_null())
                .col(ColumnDef::new(RecurringRule::EndDate).timestamp().null())
                .col(ColumnDef::new(RecurringRule::NextExecution).timestamp().not_null())
                .col(
                    ColumnDef::new(RecurringRule::UseOptimalTiming)
                        .boolean()
                        .not_null()
                        .default(true)
                )
                .col(ColumnDef::new(RecurringRule::Label).string().not_null())
                .col(ColumnDef::new(RecurringRule::Status).string_len(20).not_null())
                .col(
                    ColumnDef::new(RecurringRule::CreatedAt)
                        .timestamp()
                        .not_null()
                        .extra("DEFAULT NOW()".to_string())
                )
                .col(
                    ColumnDef::new(RecurringRule::UpdatedAt)
                        .timestamp()
                        .not_null()
                        .extra("DEFAULT NOW()".to_string())
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .name("idx_recurring_rules_status_next_execution")
                .table(RecurringRule::Table)
                .col(RecurringRule::Status)
                .col(RecurringRule::NextExecution)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .name("idx_recurring_rules_user_id")
                .table(RecurringRule::Table)
                .col(RecurringRule::UserId)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(RecurringRule::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum RecurringRule {
    Table,
    Id,
    UserId,
    Chain,
    FromAddress,
    ToAddress,
    Amount,
    TokenAddress,
    TokenSymbol,
    Frequency,
    StartDate,
    EndDate,
    NextExecution,
    UseOptimalTiming,
    Label,
    Status,
    CreatedAt,
    UpdatedAt,
}
