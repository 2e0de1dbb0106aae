pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_products_table;
mod m20240301_000002_create_product_bundle_components_table;
mod m20240301_000003_create_store_settings_table;
mod m20240301_000004_create_stock_histories_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_products_table::Migration),
            Box::new(m20240301_000002_create_product_bundle_components_table::Migration),
            Box::new(m20240301_000003_create_store_settings_table::Migration),
            Box::new(m20240301_000004_create_stock_histories_table::Migration),
        ]
    }
}
