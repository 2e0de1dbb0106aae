use crate::{
    config::LedgerConfig,
    db::DbPool,
    entities::{
        product::Entity as Product,
        product_bundle_component::{self, Entity as ProductBundleComponent},
        stock_history::{self, Entity as StockHistory, StockReferenceType},
        store_setting::{Entity as StoreSetting, QuotationStockPolicy},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::stock_recompute::RecomputeQueue,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, instrument};
use uuid::Uuid;

/// A finalized business document, as handed over by document-lifecycle code
/// the moment it transitions to posted.
#[derive(Debug, Clone)]
pub struct StockDocument {
    pub reference_id: Uuid,
    pub reference_code: String,
    pub reference_type: StockReferenceType,

    /// Business-effective date of the document, not the wall clock.
    pub date: DateTime<Utc>,

    pub store_id: Uuid,
    pub warehouse_id: Option<Uuid>,
    pub warehouse_code: Option<String>,

    pub lines: Vec<StockDocumentLine>,
}

/// One line item of a finalized document.
#[derive(Debug, Clone)]
pub struct StockDocumentLine {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub unit_discount: Decimal,
    pub vat_percent: Decimal,
}

/// Records finalized documents into per-(store, product) stock history
/// streams and answers point-in-time stock queries.
///
/// Creation of a document's entries is a single transaction: either every
/// line item (and every bundle component) lands, or none do. The cascade
/// recompute that follows is scheduled on the per-stream queue after commit
/// and never blocks the caller.
#[derive(Clone)]
pub struct StockHistoryService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    recompute: RecomputeQueue,
    config: LedgerConfig,
}

impl StockHistoryService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        recompute: RecomputeQueue,
        config: LedgerConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            recompute,
            config,
        }
    }

    /// Turns a finalized document into ledger entries, one per line item
    /// plus one per bundle component, and schedules a cascade recompute for
    /// every touched stream.
    ///
    /// Idempotent per document: if entries for this `reference_id` already
    /// exist the call is a no-op and returns an empty list.
    #[instrument(
        skip(self, document),
        fields(
            reference_id = %document.reference_id,
            reference_type = document.reference_type.as_str(),
            store_id = %document.store_id,
        )
    )]
    pub async fn record_document(
        &self,
        document: &StockDocument,
    ) -> Result<Vec<stock_history::Model>, ServiceError> {
        validate_document(document)?;

        if self.exists_by_reference(document.reference_id).await? {
            info!("stock history already recorded for reference, skipping");
            return Ok(Vec::new());
        }

        let doc = document.clone();
        let create = self
            .db
            .transaction::<_, Vec<stock_history::Model>, ServiceError>(move |txn| {
                Box::pin(async move { create_document_entries(txn, &doc).await })
            });

        let entries = self
            .with_timeout(self.config.document_timeout(), async {
                create.await.map_err(unwrap_transaction_error)
            })
            .await?;

        counter!("stock_ledger.entries_recorded", entries.len() as u64);
        info!(entry_count = entries.len(), "stock history recorded");

        // The document is rarely the chronological tail of its streams, so
        // every touched stream gets a cascade pass from the document date.
        let mut touched: Vec<(Uuid, Uuid)> = entries
            .iter()
            .map(|entry| (entry.store_id, entry.product_id))
            .collect();
        touched.sort_unstable();
        touched.dedup();
        for (store_id, product_id) in touched {
            self.recompute
                .schedule(store_id, product_id, document.date)
                .await;
        }

        self.event_sender
            .send(Event::StockHistoryRecorded {
                reference_id: document.reference_id,
                reference_type: document.reference_type.clone(),
                store_id: document.store_id,
                entry_count: entries.len(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(entries)
    }

    /// Running stock for `(store, product)` as of `as_of`: the snapshot of
    /// the latest entry dated at or before that point, or the product's
    /// opening balance when the stream is empty there.
    #[instrument(skip(self))]
    pub async fn stock_as_of(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<Decimal, ServiceError> {
        self.with_timeout(
            self.config.lookup_timeout(),
            stock_as_of_on(self.db.as_ref(), store_id, product_id, as_of),
        )
        .await
    }

    /// Idempotency guard: whether any entries exist for a source document.
    #[instrument(skip(self))]
    pub async fn exists_by_reference(&self, reference_id: Uuid) -> Result<bool, ServiceError> {
        let count = self
            .with_timeout(self.config.lookup_timeout(), async {
                StockHistory::find()
                    .filter(stock_history::Column::ReferenceId.eq(reference_id))
                    .count(self.db.as_ref())
                    .await
                    .map_err(ServiceError::read("count stock history entries by reference"))
            })
            .await?;

        Ok(count > 0)
    }

    /// Removes every entry tied to a voided or about-to-be-edited document.
    ///
    /// Idempotent: clearing an already-clear reference removes nothing and
    /// is not an error. Callers editing a document must follow up with
    /// [`Self::record_document`]; a clear with no recreate leaves the
    /// stream's later snapshots stale until the next cascade.
    #[instrument(skip(self))]
    pub async fn clear_by_reference(&self, reference_id: Uuid) -> Result<u64, ServiceError> {
        let result = self
            .with_timeout(self.config.document_timeout(), async {
                StockHistory::delete_many()
                    .filter(stock_history::Column::ReferenceId.eq(reference_id))
                    .exec(self.db.as_ref())
                    .await
                    .map_err(ServiceError::write("delete stock history entries by reference"))
            })
            .await?;

        if result.rows_affected > 0 {
            counter!("stock_ledger.entries_cleared", result.rows_affected);
            info!(
                entries_removed = result.rows_affected,
                "stock history cleared for reference"
            );
            self.event_sender
                .send(Event::StockHistoryCleared {
                    reference_id,
                    entries_removed: result.rows_affected,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(result.rows_affected)
    }

    /// Full stream for `(store, product)` in chronological order, for
    /// reporting and reconciliation.
    #[instrument(skip(self))]
    pub async fn stream_entries(
        &self,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<stock_history::Model>, ServiceError> {
        self.with_timeout(self.config.lookup_timeout(), async {
            StockHistory::find()
                .filter(stock_history::Column::StoreId.eq(store_id))
                .filter(stock_history::Column::ProductId.eq(product_id))
                .order_by(stock_history::Column::Date, Order::Asc)
                .order_by(stock_history::Column::CreatedAt, Order::Asc)
                .all(self.db.as_ref())
                .await
                .map_err(ServiceError::read("load stock history stream"))
        })
        .await
    }

    async fn with_timeout<T>(
        &self,
        limit: Duration,
        operation: impl std::future::Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        match timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(limit)),
        }
    }
}

pub(crate) fn unwrap_transaction_error(error: TransactionError<ServiceError>) -> ServiceError {
    match error {
        TransactionError::Connection(db_err) => {
            ServiceError::write("begin stock history transaction")(db_err)
        }
        TransactionError::Transaction(service_err) => service_err,
    }
}

/// Point-in-time query against any connection (pool or open transaction).
///
/// Ties on `date` are broken by `created_at`, so the answer is the snapshot
/// of whichever same-dated entry was recorded last.
pub(crate) async fn stock_as_of_on<C: ConnectionTrait>(
    conn: &C,
    store_id: Uuid,
    product_id: Uuid,
    as_of: DateTime<Utc>,
) -> Result<Decimal, ServiceError> {
    let latest = StockHistory::find()
        .filter(stock_history::Column::StoreId.eq(store_id))
        .filter(stock_history::Column::ProductId.eq(product_id))
        .filter(stock_history::Column::Date.lte(as_of))
        .order_by(stock_history::Column::Date, Order::Desc)
        .order_by(stock_history::Column::CreatedAt, Order::Desc)
        .one(conn)
        .await
        .map_err(ServiceError::read("load latest stock snapshot"))?;

    if let Some(entry) = latest {
        return Ok(entry.stock);
    }

    let product = Product::find_by_id(product_id)
        .one(conn)
        .await
        .map_err(ServiceError::read("load product opening stock"))?
        .ok_or_else(|| ServiceError::product_not_found(product_id))?;

    Ok(product.opening_stock)
}

/// Current quotation policy for a store, read fresh for every delta
/// evaluation. Missing settings row means quotations never move stock.
pub(crate) async fn quotation_policy_on<C: ConnectionTrait>(
    conn: &C,
    store_id: Uuid,
) -> Result<QuotationStockPolicy, ServiceError> {
    let setting = StoreSetting::find_by_id(store_id)
        .one(conn)
        .await
        .map_err(ServiceError::read("load store settings"))?;

    Ok(setting.map(QuotationStockPolicy::from).unwrap_or_default())
}

fn validate_document(document: &StockDocument) -> Result<(), ServiceError> {
    if document.lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "stock document has no line items".to_string(),
        ));
    }
    for line in &document.lines {
        if line.quantity < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "negative quantity {} for product {}",
                line.quantity, line.product_id
            )));
        }
    }
    Ok(())
}

async fn create_document_entries<C: ConnectionTrait>(
    txn: &C,
    document: &StockDocument,
) -> Result<Vec<stock_history::Model>, ServiceError> {
    let mut entries = Vec::new();

    for line in &document.lines {
        let product = Product::find_by_id(line.product_id)
            .one(txn)
            .await
            .map_err(ServiceError::read("load product for stock history"))?
            .ok_or_else(|| ServiceError::product_not_found(line.product_id))?;

        let entry = insert_entry(
            txn,
            document,
            line.product_id,
            line.quantity,
            line.unit_price,
            line.unit_discount,
            line.vat_percent,
            product.purchase_price,
        )
        .await?;
        entries.push(entry);

        if product.is_bundle {
            entries.extend(fan_out_bundle(txn, document, line).await?);
        }
    }

    Ok(entries)
}

/// Repeats the per-line recording for each component of a bundle product:
/// quantities scale by the component multiplier, unit monetary fields by
/// the component's configured price share.
async fn fan_out_bundle<C: ConnectionTrait>(
    txn: &C,
    document: &StockDocument,
    line: &StockDocumentLine,
) -> Result<Vec<stock_history::Model>, ServiceError> {
    let components = ProductBundleComponent::find()
        .filter(product_bundle_component::Column::BundleProductId.eq(line.product_id))
        .all(txn)
        .await
        .map_err(ServiceError::read("load bundle components"))?;

    let mut entries = Vec::with_capacity(components.len());

    for component in components {
        let component_product = Product::find_by_id(component.component_product_id)
            .one(txn)
            .await
            .map_err(ServiceError::read("load bundle component product"))?
            .ok_or_else(|| ServiceError::product_not_found(component.component_product_id))?;

        let quantity = round_precise(line.quantity * component.quantity);

        let percent = if document.reference_type.is_customer_side() {
            component.retail_price_percent
        } else {
            component.purchase_price_percent
        };
        let share = round_precise(percent / Decimal::ONE_HUNDRED);
        let unit_price = round_precise(line.unit_price * share);
        let unit_discount = round_precise(line.unit_discount * share);

        let entry = insert_entry(
            txn,
            document,
            component.component_product_id,
            quantity,
            unit_price,
            unit_discount,
            line.vat_percent,
            component_product.purchase_price,
        )
        .await?;
        entries.push(entry);
    }

    Ok(entries)
}

#[allow(clippy::too_many_arguments)]
async fn insert_entry<C: ConnectionTrait>(
    txn: &C,
    document: &StockDocument,
    product_id: Uuid,
    quantity: Decimal,
    unit_price: Decimal,
    unit_discount: Decimal,
    vat_percent: Decimal,
    cost_price: Decimal,
) -> Result<stock_history::Model, ServiceError> {
    // Reads inside the creation transaction see entries inserted earlier in
    // the same document, so repeated products accumulate correctly.
    let stock_before = stock_as_of_on(txn, document.store_id, product_id, document.date).await?;
    let policy = quotation_policy_on(txn, document.store_id).await?;
    let delta = document
        .reference_type
        .stock_delta(quantity, &policy, document.date);

    let monetary = line_monetary(
        &document.reference_type,
        quantity,
        unit_price,
        unit_discount,
        vat_percent,
        cost_price,
    );

    let now = Utc::now();
    let entry = stock_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        date: Set(document.date),
        store_id: Set(document.store_id),
        product_id: Set(product_id),
        reference_type: Set(document.reference_type.clone()),
        reference_id: Set(document.reference_id),
        reference_code: Set(document.reference_code.clone()),
        quantity: Set(quantity),
        stock: Set(stock_before + delta),
        unit_price: Set(monetary.unit_price),
        unit_discount: Set(monetary.unit_discount),
        vat_percent: Set(monetary.vat_percent),
        vat_amount: Set(monetary.vat_amount),
        net_price: Set(monetary.net_price),
        profit: Set(monetary.profit),
        warehouse_id: Set(document.warehouse_id),
        warehouse_code: Set(document.warehouse_code.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    entry
        .insert(txn)
        .await
        .map_err(ServiceError::write("insert stock history entry"))
}

struct LineMonetary {
    unit_price: Decimal,
    unit_discount: Decimal,
    vat_percent: Decimal,
    vat_amount: Decimal,
    net_price: Decimal,
    profit: Decimal,
}

/// Monetary fields for one entry, in two rounding stages: aggregates are
/// carried at 8 decimals so per-line drift cannot accumulate, and only the
/// persisted fields are collapsed to 2 decimals at the end.
fn line_monetary(
    reference_type: &StockReferenceType,
    quantity: Decimal,
    unit_price: Decimal,
    unit_discount: Decimal,
    vat_percent: Decimal,
    cost_price: Decimal,
) -> LineMonetary {
    let unit_net = round_precise(unit_price - unit_discount);
    let net_total = round_precise(unit_net * quantity);
    let vat_amount = round_precise(net_total * vat_percent / Decimal::ONE_HUNDRED);

    // Line items carry no cost, so profit/loss is derived against the
    // catalog purchase price. Vendor-side and informational documents book
    // no margin; returns reverse the margin of the sale they undo.
    let margin = round_precise((unit_net - cost_price) * quantity);
    let profit = match reference_type {
        StockReferenceType::Sales | StockReferenceType::QuotationInvoice => margin,
        StockReferenceType::SalesReturn | StockReferenceType::QuotationSalesReturn => -margin,
        _ => Decimal::ZERO,
    };

    LineMonetary {
        unit_price: round_posted(unit_price),
        unit_discount: round_posted(unit_discount),
        vat_percent,
        vat_amount: round_posted(vat_amount),
        net_price: round_posted(net_total),
        profit: round_posted(profit),
    }
}

/// High-precision intermediate rounding (8 decimals).
fn round_precise(value: Decimal) -> Decimal {
    value.round_dp(8)
}

/// Posted/display rounding (2 decimals).
fn round_posted(value: Decimal) -> Decimal {
    value.round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn monetary_fields_round_to_two_decimals() {
        let monetary = line_monetary(
            &StockReferenceType::Sales,
            dec!(3),
            dec!(19.99),
            dec!(0.333),
            dec!(15),
            dec!(12.50),
        );

        // unit_net = 19.657, net_total = 58.971, vat = 8.84565
        assert_eq!(monetary.net_price, dec!(58.97));
        assert_eq!(monetary.vat_amount, dec!(8.85));
        assert_eq!(monetary.unit_price, dec!(19.99));
        assert_eq!(monetary.unit_discount, dec!(0.33));
        // margin = (19.657 - 12.50) * 3 = 21.471
        assert_eq!(monetary.profit, dec!(21.47));
    }

    #[test]
    fn intermediates_keep_eight_decimals_before_posting() {
        // 1/3-ish shares would drift if collapsed to 2 decimals early.
        let share = round_precise(dec!(33.33) / Decimal::ONE_HUNDRED);
        assert_eq!(share, dec!(0.3333));

        let unit_price = round_precise(dec!(10) * dec!(0.33333333));
        assert_eq!(unit_price, dec!(3.3333333));
        assert_eq!(round_posted(unit_price), dec!(3.33));
    }

    #[test]
    fn purchases_book_no_profit() {
        let monetary = line_monetary(
            &StockReferenceType::Purchase,
            dec!(10),
            dec!(8),
            dec!(0),
            dec!(0),
            dec!(8),
        );
        assert_eq!(monetary.profit, Decimal::ZERO);
        assert_eq!(monetary.net_price, dec!(80));
    }

    #[test]
    fn sales_returns_reverse_margin() {
        let sale = line_monetary(
            &StockReferenceType::Sales,
            dec!(2),
            dec!(15),
            dec!(0),
            dec!(0),
            dec!(10),
        );
        let sales_return = line_monetary(
            &StockReferenceType::SalesReturn,
            dec!(2),
            dec!(15),
            dec!(0),
            dec!(0),
            dec!(10),
        );
        assert_eq!(sale.profit, dec!(10));
        assert_eq!(sales_return.profit, dec!(-10));
    }

    #[test]
    fn documents_without_lines_are_rejected() {
        let document = StockDocument {
            reference_id: Uuid::new_v4(),
            reference_code: "SAL-1".to_string(),
            reference_type: StockReferenceType::Sales,
            date: Utc::now(),
            store_id: Uuid::new_v4(),
            warehouse_id: None,
            warehouse_code: None,
            lines: Vec::new(),
        };
        assert!(matches!(
            validate_document(&document),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn negative_quantities_are_rejected() {
        let document = StockDocument {
            reference_id: Uuid::new_v4(),
            reference_code: "SAL-2".to_string(),
            reference_type: StockReferenceType::Sales,
            date: Utc::now(),
            store_id: Uuid::new_v4(),
            warehouse_id: None,
            warehouse_code: None,
            lines: vec![StockDocumentLine {
                product_id: Uuid::new_v4(),
                quantity: dec!(-1),
                unit_price: dec!(10),
                unit_discount: Decimal::ZERO,
                vat_percent: Decimal::ZERO,
            }],
        };
        assert!(matches!(
            validate_document(&document),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
