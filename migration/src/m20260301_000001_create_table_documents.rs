use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Documents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Documents::CollectionId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Documents::DocumentId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Documents::Data).json().not_null())
                    .col(
                        ColumnDef::new(Documents::CreatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .col(
                        ColumnDef::new(Documents::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .primary_key(
                        Index::create()
                            .col(Documents::CollectionId)
                            .col(Documents::DocumentId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_documents_collection_id")
                    .table(Documents::Table)
                    .col(Documents::CollectionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_documents_collection_id")
                    .table(Documents::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Documents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Documents {
    Table,
    CollectionId,
    DocumentId,
    Data,
    CreatedAt,
    UpdatedAt,
}
