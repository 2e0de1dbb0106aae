use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::entities::stock_history::StockReferenceType;

/// Events emitted by the ledger for downstream consumers (reporting,
/// notifications, audit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A finalized document's line items were turned into ledger entries.
    StockHistoryRecorded {
        reference_id: Uuid,
        reference_type: StockReferenceType,
        store_id: Uuid,
        entry_count: usize,
    },

    /// A cascade pass rewrote snapshots in one stream.
    StockStreamRecomputed {
        store_id: Uuid,
        product_id: Uuid,
        entries_updated: u64,
        stock_after: Decimal,
    },

    /// All entries of a voided/edited document were removed.
    StockHistoryCleared {
        reference_id: Uuid,
        entries_removed: u64,
    },

    /// Generic event for custom messages
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    },
}

impl Event {
    /// Create a generic event with string data
    pub fn with_data(data: String) -> Self {
        Event::Generic {
            message: data,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a bounded event channel and its sending half.
pub fn event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Spawn this on the runtime
/// when no richer consumer is wired up; the sender side fails once the
/// receiver is gone, so something must always drain it.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StockHistoryRecorded {
                reference_id,
                entry_count,
                ..
            } => {
                info!(%reference_id, entry_count, "stock history recorded");
            }
            Event::StockStreamRecomputed {
                store_id,
                product_id,
                entries_updated,
                ..
            } => {
                info!(%store_id, %product_id, entries_updated, "stock stream recomputed");
            }
            Event::StockHistoryCleared {
                reference_id,
                entries_removed,
            } => {
                info!(%reference_id, entries_removed, "stock history cleared");
            }
            Event::Generic { message, .. } => {
                info!(message = %message, "ledger event");
            }
        }
    }
}
