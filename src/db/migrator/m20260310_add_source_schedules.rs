use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SourceSchedules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SourceSchedules::SourceId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SourceSchedules::NextDueAt)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SourceSchedules::LastRunAt).string().null())
                    .col(ColumnDef::new(SourceSchedules::LastError).text().null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SourceSchedules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SourceSchedules {
    Table,
    SourceId,
    NextDueAt,
    LastRunAt,
    LastError,
}
