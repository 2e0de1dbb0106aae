use crate::{
    db::DbPool,
    entities::stock_history::{self, Entity as StockHistory},
    errors::ServiceError,
    events::{Event, EventSender},
    services::stock_history::{quotation_policy_on, stock_as_of_on, unwrap_transaction_error},
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Recalculates derived stock snapshots for one stream after an
/// out-of-order insertion or removal.
#[derive(Clone)]
pub struct StockRecomputeEngine {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl StockRecomputeEngine {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Rewrites the snapshots of every entry dated strictly after `after`
    /// in `(store, product)`, in chronological order, inside a single
    /// transaction. Returns how many entries changed.
    ///
    /// The baseline is the point-in-time stock at `after`; each entry's new
    /// snapshot feeds the next, and the delta of every entry is
    /// re-evaluated against the store's *current* quotation policy, not the
    /// policy at original creation time. Running in a transaction keeps
    /// half-updated streams invisible to point-in-time queries.
    #[instrument(skip(self))]
    pub async fn recompute_stream(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        let (updated, stock_after) = self
            .db
            .transaction::<_, (u64, Decimal), ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut running = stock_as_of_on(txn, store_id, product_id, after).await?;

                    let entries = StockHistory::find()
                        .filter(stock_history::Column::StoreId.eq(store_id))
                        .filter(stock_history::Column::ProductId.eq(product_id))
                        .filter(stock_history::Column::Date.gt(after))
                        .order_by(stock_history::Column::Date, Order::Asc)
                        .order_by(stock_history::Column::CreatedAt, Order::Asc)
                        .all(txn)
                        .await
                        .map_err(ServiceError::read("load stock history stream"))?;

                    let mut updated = 0u64;
                    for entry in entries {
                        let policy = quotation_policy_on(txn, store_id).await?;
                        let delta =
                            entry
                                .reference_type
                                .stock_delta(entry.quantity, &policy, entry.date);
                        running += delta;

                        // Entry i must be final before entry i+1 is touched;
                        // quantity, date, and monetary fields never change.
                        if entry.stock != running {
                            let mut active: stock_history::ActiveModel = entry.into();
                            active.stock = Set(running);
                            active.updated_at = Set(Utc::now());
                            active
                                .update(txn)
                                .await
                                .map_err(ServiceError::write("update stock snapshot"))?;
                            updated += 1;
                        }
                    }

                    Ok((updated, running))
                })
            })
            .await
            .map_err(unwrap_transaction_error)?;

        counter!("stock_ledger.recompute_passes", 1);
        if updated > 0 {
            info!(updated, %stock_after, "stock stream recomputed");
            self.event_sender
                .send(Event::StockStreamRecomputed {
                    store_id,
                    product_id,
                    entries_updated: updated,
                    stock_after,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(updated)
    }
}

struct RecomputeRequest {
    after: DateTime<Utc>,
    ack: Option<oneshot::Sender<Result<u64, ServiceError>>>,
}

/// Serializes recompute passes per `(store, product)` stream.
///
/// Two detached recomputes on the same stream could interleave their
/// read-modify-write cycles and lose updates, so every stream gets a
/// dedicated worker task fed by a bounded channel: requests for one stream
/// run strictly one at a time, streams recompute in parallel with each
/// other. Workers are spawned lazily on first touch and live for the
/// lifetime of the queue.
#[derive(Clone)]
pub struct RecomputeQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    engine: StockRecomputeEngine,
    workers: DashMap<(Uuid, Uuid), mpsc::Sender<RecomputeRequest>>,
    queue_depth: usize,
}

impl RecomputeQueue {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, queue_depth: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                engine: StockRecomputeEngine::new(db, event_sender),
                workers: DashMap::new(),
                queue_depth,
            }),
        }
    }

    /// Fire-and-forget: enqueue a recompute for the stream and return as
    /// soon as it is queued. A failed pass is logged and counted, never
    /// surfaced to the caller that triggered it.
    pub async fn schedule(&self, store_id: Uuid, product_id: Uuid, after: DateTime<Utc>) {
        self.enqueue(
            store_id,
            product_id,
            RecomputeRequest { after, ack: None },
        )
        .await;
    }

    /// Enqueue a recompute and wait for it to finish, returning its result.
    /// Because the worker is serial, this also waits out every previously
    /// queued pass for the stream — repair jobs and tests use it to reach
    /// quiescence.
    pub async fn flush(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        let (ack, done) = oneshot::channel();
        self.enqueue(
            store_id,
            product_id,
            RecomputeRequest {
                after,
                ack: Some(ack),
            },
        )
        .await;

        done.await
            .map_err(|_| ServiceError::InternalError("recompute worker went away".to_string()))?
    }

    /// Recompute the whole stream from its opening balance, serialized with
    /// any in-flight passes. The manual repair path for streams left stale
    /// by a failed detached pass.
    pub async fn reprocess(&self, store_id: Uuid, product_id: Uuid) -> Result<u64, ServiceError> {
        self.flush(store_id, product_id, DateTime::<Utc>::MIN_UTC)
            .await
    }

    async fn enqueue(&self, store_id: Uuid, product_id: Uuid, request: RecomputeRequest) {
        let mut request = request;
        loop {
            let sender = self.worker_for(store_id, product_id);
            match sender.send(request).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    // Worker died (panicked pass); replace it and retry.
                    warn!(%store_id, %product_id, "recompute worker gone, respawning");
                    self.inner.workers.remove(&(store_id, product_id));
                    request = returned;
                }
            }
        }
    }

    fn worker_for(&self, store_id: Uuid, product_id: Uuid) -> mpsc::Sender<RecomputeRequest> {
        self.inner
            .workers
            .entry((store_id, product_id))
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel(self.inner.queue_depth);
                let engine = self.inner.engine.clone();
                tokio::spawn(stream_worker(engine, store_id, product_id, rx));
                tx
            })
            .clone()
    }
}

async fn stream_worker(
    engine: StockRecomputeEngine,
    store_id: Uuid,
    product_id: Uuid,
    mut rx: mpsc::Receiver<RecomputeRequest>,
) {
    while let Some(request) = rx.recv().await {
        let result = engine
            .recompute_stream(store_id, product_id, request.after)
            .await;

        if let Err(err) = &result {
            counter!("stock_ledger.recompute_failures", 1);
            error!(%store_id, %product_id, error = %err, "stock recompute pass failed");
        }

        if let Some(ack) = request.ack {
            // The flush caller may have given up; that is fine.
            let _ = ack.send(result);
        }
    }
}
