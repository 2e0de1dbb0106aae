use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One component line of a bundle/kit product.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_bundle_components")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub bundle_product_id: Uuid,
    pub component_product_id: Uuid,

    /// Units of the component per unit of the bundle.
    pub quantity: Decimal,

    /// Share of the bundle's monetary fields attributed to this component,
    /// as a percentage. The purchase percent apportions vendor-side
    /// documents, the retail percent customer-side ones.
    pub purchase_price_percent: Decimal,
    pub retail_price_percent: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::BundleProductId",
        to = "super::product::Column::Id"
    )]
    BundleProduct,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ComponentProductId",
        to = "super::product::Column::Id"
    )]
    ComponentProduct,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BundleProduct.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
