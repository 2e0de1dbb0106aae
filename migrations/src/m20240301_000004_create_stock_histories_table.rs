use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StockHistories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockHistories::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockHistories::Date)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockHistories::StoreId).uuid().not_null())
                    .col(ColumnDef::new(StockHistories::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(StockHistories::ReferenceType)
                            .string_len(40)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockHistories::ReferenceId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockHistories::ReferenceCode)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockHistories::Quantity)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockHistories::Stock)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockHistories::UnitPrice)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockHistories::UnitDiscount)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockHistories::VatPercent)
                            .decimal_len(7, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockHistories::VatAmount)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockHistories::NetPrice)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockHistories::Profit)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockHistories::WarehouseId).uuid().null())
                    .col(
                        ColumnDef::new(StockHistories::WarehouseCode)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockHistories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockHistories::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // The stream key: every point-in-time lookup and recompute scan
        // filters on (store_id, product_id) and orders by date.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_stock_histories_stream")
                    .table(StockHistories::Table)
                    .col(StockHistories::StoreId)
                    .col(StockHistories::ProductId)
                    .col(StockHistories::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_stock_histories_reference")
                    .table(StockHistories::Table)
                    .col(StockHistories::ReferenceId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockHistories::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum StockHistories {
    Table,
    Id,
    Date,
    StoreId,
    ProductId,
    ReferenceType,
    ReferenceId,
    ReferenceCode,
    Quantity,
    Stock,
    UnitPrice,
    UnitDiscount,
    VatPercent,
    VatAmount,
    NetPrice,
    Profit,
    WarehouseId,
    WarehouseCode,
    CreatedAt,
    UpdatedAt,
}
