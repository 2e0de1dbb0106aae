#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use migrations::{Migrator, MigratorTrait};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use std::sync::Arc;
use stock_ledger::config::LedgerConfig;
use stock_ledger::entities::{
    product, product_bundle_component, store_setting, store_setting::QuotationStockPolicy,
};
use stock_ledger::events;
use stock_ledger::services::stock_history::{StockDocument, StockDocumentLine};
use stock_ledger::StockLedger;
use uuid::Uuid;

pub struct TestContext {
    pub ledger: StockLedger,
    pub db: Arc<DatabaseConnection>,
    pub store_id: Uuid,
}

/// Fresh in-memory database with the real migrations applied, a drained
/// event channel, and a store to hang documents off.
pub async fn setup() -> TestContext {
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    // A single connection keeps every session on the same in-memory
    // database.
    options.max_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    let db = Arc::new(db);

    let (event_sender, receiver) = events::event_channel(256);
    tokio::spawn(events::process_events(receiver));

    let ledger = StockLedger::new(db.clone(), event_sender, LedgerConfig::default());

    TestContext {
        ledger,
        db,
        store_id: Uuid::new_v4(),
    }
}

/// A fixed business day inside one month, noon UTC.
pub fn day(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, n, 12, 0, 0).unwrap()
}

/// A barrier date later than any `day()` used in tests: flushing the
/// recompute queue at this date runs a pass that touches nothing, but
/// waits out every previously scheduled pass for the stream.
pub async fn quiesce(ctx: &TestContext, product_id: Uuid) {
    ctx.ledger
        .recompute()
        .flush(ctx.store_id, product_id, day(28))
        .await
        .expect("flush recompute queue");
}

pub async fn insert_product(
    ctx: &TestContext,
    name: &str,
    opening_stock: Decimal,
    purchase_price: Decimal,
    retail_price: Decimal,
    is_bundle: bool,
) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();
    product::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        sku: Set(format!("SKU-{}", &id.to_string()[..8])),
        purchase_price: Set(purchase_price),
        retail_price: Set(retail_price),
        opening_stock: Set(opening_stock),
        is_bundle: Set(is_bundle),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(ctx.db.as_ref())
    .await
    .expect("insert product");
    id
}

pub async fn insert_bundle_component(
    ctx: &TestContext,
    bundle_product_id: Uuid,
    component_product_id: Uuid,
    quantity: Decimal,
    purchase_price_percent: Decimal,
    retail_price_percent: Decimal,
) {
    let now = Utc::now();
    product_bundle_component::ActiveModel {
        id: Set(Uuid::new_v4()),
        bundle_product_id: Set(bundle_product_id),
        component_product_id: Set(component_product_id),
        quantity: Set(quantity),
        purchase_price_percent: Set(purchase_price_percent),
        retail_price_percent: Set(retail_price_percent),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(ctx.db.as_ref())
    .await
    .expect("insert bundle component");
}

/// Replaces the store's settings row.
pub async fn set_store_settings(
    ctx: &TestContext,
    affect_stock_on_quotation: bool,
    quotation_stock_cutover: Option<DateTime<Utc>>,
) {
    store_setting::Entity::delete_many()
        .filter(store_setting::Column::StoreId.eq(ctx.store_id))
        .exec(ctx.db.as_ref())
        .await
        .expect("clear store settings");

    let now = Utc::now();
    store_setting::ActiveModel {
        store_id: Set(ctx.store_id),
        store_name: Set("Main store".to_string()),
        affect_stock_on_quotation: Set(affect_stock_on_quotation),
        quotation_stock_cutover: Set(quotation_stock_cutover),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(ctx.db.as_ref())
    .await
    .expect("insert store settings");
}

pub fn line(product_id: Uuid, quantity: Decimal, unit_price: Decimal) -> StockDocumentLine {
    line_with_pricing(product_id, quantity, unit_price, Decimal::ZERO, Decimal::ZERO)
}

pub fn line_with_pricing(
    product_id: Uuid,
    quantity: Decimal,
    unit_price: Decimal,
    unit_discount: Decimal,
    vat_percent: Decimal,
) -> StockDocumentLine {
    StockDocumentLine {
        product_id,
        quantity,
        unit_price,
        unit_discount,
        vat_percent,
    }
}

pub fn document(
    ctx: &TestContext,
    reference_type: stock_ledger::entities::stock_history::StockReferenceType,
    date: DateTime<Utc>,
    lines: Vec<StockDocumentLine>,
) -> StockDocument {
    let reference_id = Uuid::new_v4();
    StockDocument {
        reference_id,
        reference_code: format!("DOC-{}", &reference_id.to_string()[..8]),
        reference_type,
        date,
        store_id: ctx.store_id,
        warehouse_id: None,
        warehouse_code: None,
        lines,
    }
}

/// Asserts `stock[i] == stock[i-1] + delta(type[i], qty[i])` across the
/// whole stream, against the store's current policy and the product's
/// opening balance.
pub async fn assert_chain_invariant(ctx: &TestContext, product_id: Uuid) {
    let product = product::Entity::find_by_id(product_id)
        .one(ctx.db.as_ref())
        .await
        .expect("load product")
        .expect("product exists");

    let policy = store_setting::Entity::find_by_id(ctx.store_id)
        .one(ctx.db.as_ref())
        .await
        .expect("load settings")
        .map(QuotationStockPolicy::from)
        .unwrap_or_default();

    let entries = ctx
        .ledger
        .history()
        .stream_entries(ctx.store_id, product_id)
        .await
        .expect("load stream");

    let mut running = product.opening_stock;
    for entry in entries {
        running += entry
            .reference_type
            .stock_delta(entry.quantity, &policy, entry.date);
        assert_eq!(
            entry.stock, running,
            "chain invariant broken at {:?} entry {} dated {}",
            entry.reference_type, entry.id, entry.date
        );
    }
}
