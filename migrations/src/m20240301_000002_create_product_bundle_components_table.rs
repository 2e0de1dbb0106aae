use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProductBundleComponents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductBundleComponents::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductBundleComponents::BundleProductId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductBundleComponents::ComponentProductId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductBundleComponents::Quantity)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductBundleComponents::PurchasePricePercent)
                            .decimal_len(7, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProductBundleComponents::RetailPricePercent)
                            .decimal_len(7, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProductBundleComponents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductBundleComponents::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bundle_components_bundle_product")
                            .from(
                                ProductBundleComponents::Table,
                                ProductBundleComponents::BundleProductId,
                            )
                            .to(Products::Table, Products::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bundle_components_component_product")
                            .from(
                                ProductBundleComponents::Table,
                                ProductBundleComponents::ComponentProductId,
                            )
                            .to(Products::Table, Products::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_bundle_components_bundle_product")
                    .table(ProductBundleComponents::Table)
                    .col(ProductBundleComponents::BundleProductId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(ProductBundleComponents::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
enum ProductBundleComponents {
    Table,
    Id,
    BundleProductId,
    ComponentProductId,
    Quantity,
    PurchasePricePercent,
    RetailPricePercent,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Products {
    Table,
    Id,
}
