//! Integration tests for the cascade recompute engine and its
//! per-stream worker queue
//!
//! Tests cover:
//! - Chain invariant across mixed, out-of-order event streams
//! - Informational event types leaving stock untouched
//! - Policy re-evaluation during recompute (not creation-time policy)
//! - Serialized recompute under concurrent document recording
//! - Manual stream reprocessing as the repair path

mod common;

use common::*;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use stock_ledger::entities::stock_history;
use stock_ledger::entities::stock_history::StockReferenceType;
use tokio::task::JoinSet;

#[tokio::test]
async fn mixed_out_of_order_stream_satisfies_chain_invariant() {
    let ctx = setup().await;
    let product_id = insert_product(&ctx, "Widget", dec!(10), dec!(4), dec!(9), false).await;

    // Deliberately not in chronological order.
    let events = [
        (StockReferenceType::Sales, 6, dec!(3)),
        (StockReferenceType::Purchase, 2, dec!(5)),
        (StockReferenceType::SalesReturn, 8, dec!(1)),
        (StockReferenceType::StockAdjustmentByAdding, 4, dec!(2)),
        (StockReferenceType::DeliveryNote, 5, dec!(9)),
        (StockReferenceType::PurchaseReturn, 7, dec!(4)),
        (StockReferenceType::Quotation, 3, dec!(2)),
        (StockReferenceType::StockAdjustmentByRemoving, 9, dec!(1)),
    ];
    for (reference_type, event_day, quantity) in events {
        let doc = document(
            &ctx,
            reference_type,
            day(event_day),
            vec![line(product_id, quantity, dec!(9))],
        );
        ctx.ledger.history().record_document(&doc).await.unwrap();
    }

    quiesce(&ctx, product_id).await;
    assert_chain_invariant(&ctx, product_id).await;

    // 10 + 5 + 2 - 3 - 4 + 1 - 1, with delivery and quotation contributing
    // nothing.
    let stock = ctx
        .ledger
        .history()
        .stock_as_of(ctx.store_id, product_id, day(27))
        .await
        .unwrap();
    assert_eq!(stock, dec!(10));
}

#[tokio::test]
async fn informational_events_record_quantity_but_not_stock() {
    let ctx = setup().await;
    let product_id = insert_product(&ctx, "Widget", dec!(100), dec!(4), dec!(9), false).await;

    let delivery = document(
        &ctx,
        StockReferenceType::DeliveryNote,
        day(2),
        vec![line(product_id, dec!(7), dec!(9))],
    );
    let entries = ctx.ledger.history().record_document(&delivery).await.unwrap();
    assert_eq!(entries[0].quantity, dec!(7));
    assert_eq!(entries[0].stock, dec!(100));

    quiesce(&ctx, product_id).await;
    let stock = ctx
        .ledger
        .history()
        .stock_as_of(ctx.store_id, product_id, day(3))
        .await
        .unwrap();
    assert_eq!(stock, dec!(100));
}

#[tokio::test]
async fn recompute_applies_current_policy_not_creation_time_policy() {
    let ctx = setup().await;
    let product_id = insert_product(&ctx, "Widget", dec!(100), dec!(4), dec!(9), false).await;
    set_store_settings(&ctx, true, None).await;

    let invoice = document(
        &ctx,
        StockReferenceType::QuotationInvoice,
        day(2),
        vec![line(product_id, dec!(20), dec!(9))],
    );
    let entries = ctx.ledger.history().record_document(&invoice).await.unwrap();
    assert_eq!(entries[0].stock, dec!(80));
    quiesce(&ctx, product_id).await;

    // Flip the flag off: a reprocess must rewrite the snapshot under the
    // policy as it stands now.
    set_store_settings(&ctx, false, None).await;
    let updated = ctx
        .ledger
        .recompute()
        .reprocess(ctx.store_id, product_id)
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let stream = ctx
        .ledger
        .history()
        .stream_entries(ctx.store_id, product_id)
        .await
        .unwrap();
    assert_eq!(stream[0].stock, dec!(100));
    assert_eq!(stream[0].quantity, dec!(20));

    // And back again.
    set_store_settings(&ctx, true, None).await;
    let updated = ctx
        .ledger
        .recompute()
        .reprocess(ctx.store_id, product_id)
        .await
        .unwrap();
    assert_eq!(updated, 1);
    assert_chain_invariant(&ctx, product_id).await;
}

#[tokio::test]
async fn concurrent_documents_on_one_stream_do_not_lose_updates() {
    let ctx = setup().await;
    let product_id = insert_product(&ctx, "Widget", dec!(0), dec!(4), dec!(9), false).await;

    let mut tasks = JoinSet::new();
    for event_day in 1..=8u32 {
        let ledger = ctx.ledger.clone();
        let doc = document(
            &ctx,
            StockReferenceType::Purchase,
            day(event_day),
            vec![line(product_id, dec!(10), dec!(4))],
        );
        tasks.spawn(async move { ledger.history().record_document(&doc).await });
    }
    while let Some(result) = tasks.join_next().await {
        result.expect("task").expect("record document");
    }

    quiesce(&ctx, product_id).await;
    assert_chain_invariant(&ctx, product_id).await;

    let stock = ctx
        .ledger
        .history()
        .stock_as_of(ctx.store_id, product_id, day(27))
        .await
        .unwrap();
    assert_eq!(stock, dec!(80));
}

#[tokio::test]
async fn reprocess_repairs_a_manually_corrupted_snapshot() {
    let ctx = setup().await;
    let product_id = insert_product(&ctx, "Widget", dec!(100), dec!(4), dec!(9), false).await;

    let doc = document(
        &ctx,
        StockReferenceType::Sales,
        day(3),
        vec![line(product_id, dec!(10), dec!(9))],
    );
    ctx.ledger.history().record_document(&doc).await.unwrap();
    quiesce(&ctx, product_id).await;

    // Corrupt the derived snapshot out-of-band, as a failed partial pass
    // would leave it.
    let entry = ctx
        .ledger
        .history()
        .stream_entries(ctx.store_id, product_id)
        .await
        .unwrap()
        .remove(0);
    let mut active: stock_history::ActiveModel = entry.into();
    active.stock = Set(dec!(12345));
    active.update(ctx.db.as_ref()).await.unwrap();

    let updated = ctx
        .ledger
        .recompute()
        .reprocess(ctx.store_id, product_id)
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let stream = ctx
        .ledger
        .history()
        .stream_entries(ctx.store_id, product_id)
        .await
        .unwrap();
    assert_eq!(stream[0].stock, dec!(90));
    assert_chain_invariant(&ctx, product_id).await;
}
