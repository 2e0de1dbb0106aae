use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StoreSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StoreSettings::StoreId)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StoreSettings::StoreName).string().not_null())
                    .col(
                        ColumnDef::new(StoreSettings::AffectStockOnQuotation)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(StoreSettings::QuotationStockCutover)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StoreSettings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StoreSettings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StoreSettings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum StoreSettings {
    Table,
    StoreId,
    StoreName,
    AffectStockOnQuotation,
    QuotationStockCutover,
    CreatedAt,
    UpdatedAt,
}
