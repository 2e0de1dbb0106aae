use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

use super::store_setting::QuotationStockPolicy;

/// Business events that contribute to a product's stock history stream.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(40))")]
pub enum StockReferenceType {
    #[sea_orm(string_value = "sales")]
    Sales,
    #[sea_orm(string_value = "sales_return")]
    SalesReturn,
    #[sea_orm(string_value = "purchase")]
    Purchase,
    #[sea_orm(string_value = "purchase_return")]
    PurchaseReturn,
    #[sea_orm(string_value = "delivery_note")]
    DeliveryNote,
    #[sea_orm(string_value = "quotation")]
    Quotation,
    #[sea_orm(string_value = "quotation_invoice")]
    QuotationInvoice,
    #[sea_orm(string_value = "quotation_sales_return")]
    QuotationSalesReturn,
    #[sea_orm(string_value = "stock_adjustment_by_adding")]
    StockAdjustmentByAdding,
    #[sea_orm(string_value = "stock_adjustment_by_removing")]
    StockAdjustmentByRemoving,
}

impl StockReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockReferenceType::Sales => "sales",
            StockReferenceType::SalesReturn => "sales_return",
            StockReferenceType::Purchase => "purchase",
            StockReferenceType::PurchaseReturn => "purchase_return",
            StockReferenceType::DeliveryNote => "delivery_note",
            StockReferenceType::Quotation => "quotation",
            StockReferenceType::QuotationInvoice => "quotation_invoice",
            StockReferenceType::QuotationSalesReturn => "quotation_sales_return",
            StockReferenceType::StockAdjustmentByAdding => "stock_adjustment_by_adding",
            StockReferenceType::StockAdjustmentByRemoving => "stock_adjustment_by_removing",
        }
    }

    /// Whether the document faces a customer (sales side) rather than a
    /// vendor. Drives which bundle price percentage apportions component
    /// monetary fields.
    pub fn is_customer_side(&self) -> bool {
        matches!(
            self,
            StockReferenceType::Sales
                | StockReferenceType::SalesReturn
                | StockReferenceType::DeliveryNote
                | StockReferenceType::Quotation
                | StockReferenceType::QuotationInvoice
                | StockReferenceType::QuotationSalesReturn
        )
    }

    /// Signed effect of one event on the running stock level.
    ///
    /// This is the only place in the crate where the per-event sign rules
    /// live. Entry creation and cascade recompute both call it; the
    /// quotation-linked variants consult the store policy and the event date,
    /// every other variant is unconditional.
    pub fn stock_delta(
        &self,
        quantity: Decimal,
        policy: &QuotationStockPolicy,
        event_date: DateTime<Utc>,
    ) -> Decimal {
        match self {
            StockReferenceType::Sales => -quantity,
            StockReferenceType::SalesReturn => quantity,
            StockReferenceType::Purchase => quantity,
            StockReferenceType::PurchaseReturn => -quantity,
            StockReferenceType::StockAdjustmentByAdding => quantity,
            StockReferenceType::StockAdjustmentByRemoving => -quantity,
            // Recorded for the paper trail only; stock is unaffected.
            StockReferenceType::DeliveryNote | StockReferenceType::Quotation => Decimal::ZERO,
            StockReferenceType::QuotationInvoice => {
                if policy.affects_stock_on(event_date) {
                    -quantity
                } else {
                    Decimal::ZERO
                }
            }
            StockReferenceType::QuotationSalesReturn => {
                if policy.affects_stock_on(event_date) {
                    quantity
                } else {
                    Decimal::ZERO
                }
            }
        }
    }
}

/// One ledger entry: a single business event against one product at one
/// store. Entries partition into independent streams by
/// `(store_id, product_id)`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_histories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Business-effective timestamp of the event, not creation time.
    pub date: DateTime<Utc>,

    pub store_id: Uuid,
    pub product_id: Uuid,

    pub reference_type: StockReferenceType,

    /// Source document link.
    pub reference_id: Uuid,
    pub reference_code: String,

    /// Magnitude of the event. Always non-negative; the sign is derived by
    /// [`StockReferenceType::stock_delta`], never stored.
    pub quantity: Decimal,

    /// Derived snapshot: running stock immediately after this event in
    /// chronological stream order. Rewritten by the cascade recompute
    /// engine; never an authoritative input.
    pub stock: Decimal,

    // Monetary fields are computed once at creation from the source line
    // item and are not touched by recompute.
    pub unit_price: Decimal,
    pub unit_discount: Decimal,
    pub vat_percent: Decimal,
    pub vat_amount: Decimal,
    pub net_price: Decimal,
    pub profit: Decimal,

    /// Optional sub-location tag, informational.
    pub warehouse_id: Option<Uuid>,
    pub warehouse_code: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
