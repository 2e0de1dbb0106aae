use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-store configuration consumed by the stock delta policy.
///
/// Read fresh on every delta evaluation, including during recompute, so a
/// settings change applies to already-recorded quotation entries the next
/// time their stream is recalculated.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub store_id: Uuid,

    pub store_name: String,

    /// Whether quotation invoices (and their returns) move stock at all.
    pub affect_stock_on_quotation: bool,

    /// Events dated before this point never move stock via quotations,
    /// even with the flag enabled.
    pub quotation_stock_cutover: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Snapshot of the quotation-related settings handed to the delta policy.
///
/// A store without a settings row gets the default: quotations never affect
/// stock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotationStockPolicy {
    pub affect_stock_on_quotation: bool,
    pub quotation_stock_cutover: Option<DateTime<Utc>>,
}

impl QuotationStockPolicy {
    /// True when a quotation-linked event dated `event_date` moves stock.
    pub fn affects_stock_on(&self, event_date: DateTime<Utc>) -> bool {
        self.affect_stock_on_quotation
            && self
                .quotation_stock_cutover
                .map_or(true, |cutover| event_date >= cutover)
    }
}

impl From<Model> for QuotationStockPolicy {
    fn from(model: Model) -> Self {
        Self {
            affect_stock_on_quotation: model.affect_stock_on_quotation,
            quotation_stock_cutover: model.quotation_stock_cutover,
        }
    }
}
