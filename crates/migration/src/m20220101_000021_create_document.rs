//! Create `document` table.
//! Every catalog and content entity lives here, partitioned by `collection`.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Document::Table)
                    .if_not_exists()
                    .col(uuid(Document::Id).primary_key())
                    .col(string_len(Document::Collection, 32))
                    .col(string_len_null(Document::Code, 128))
                    .col(json_binary_null(Document::Name))
                    .col(uuid_null(Document::ParentId))
                    .col(boolean(Document::IsActive))
                    .col(json_binary(Document::Data))
                    .col(integer(Document::Version).default(0))
                    .col(timestamp_with_time_zone(Document::CreatedAt))
                    .col(timestamp_with_time_zone(Document::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Document::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Document {
    Table,
    Id,
    Collection,
    Code,
    Name,
    ParentId,
    IsActive,
    Data,
    Version,
    CreatedAt,
    UpdatedAt,
}
