use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The slice of the product catalog the ledger needs: pricing for
/// profit/apportionment, the opening balance, and the bundle flag.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,
    pub sku: String,

    pub purchase_price: Decimal,
    pub retail_price: Decimal,

    /// Pre-stream baseline for the running stock level.
    pub opening_stock: Decimal,

    /// Bundle/kit products fan events out to their components.
    pub is_bundle: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_bundle_component::Entity")]
    BundleComponents,
}

impl Related<super::product_bundle_component::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BundleComponents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
