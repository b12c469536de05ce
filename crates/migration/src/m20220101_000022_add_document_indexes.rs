use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Code is unique within a collection; NULL codes (content types) never collide
        manager
            .create_index(
                Index::create()
                    .name("uniq_document_collection_code")
                    .table(Document::Table)
                    .col(Document::Collection)
                    .col(Document::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Child listing and cascade lookups
        manager
            .create_index(
                Index::create()
                    .name("idx_document_collection_parent")
                    .table(Document::Table)
                    .col(Document::Collection)
                    .col(Document::ParentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_document_collection_active")
                    .table(Document::Table)
                    .col(Document::Collection)
                    .col(Document::IsActive)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_document_collection_active").table(Document::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_document_collection_parent").table(Document::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("uniq_document_collection_code").table(Document::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Document {
    Table,
    Collection,
    Code,
    ParentId,
    IsActive,
}
