//! Product Stock History Ledger
//!
//! This crate records every inventory-affecting business event as an
//! append-only, per-(store, product) time series and keeps the derived
//! running-stock snapshots consistent under out-of-order insertions,
//! edits, and voids. It is an internal library: document-lifecycle code
//! calls [`services::stock_history::StockHistoryService`] when a document
//! is finalized, voided, or edited; inventory and reporting code query it
//! for point-in-time stock.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod services;

use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::stock_history::StockHistoryService;
use crate::services::stock_recompute::RecomputeQueue;

/// Wires the ledger's services over one connection pool and event channel.
#[derive(Clone)]
pub struct StockLedger {
    db: Arc<DbPool>,
    history: StockHistoryService,
    recompute: RecomputeQueue,
}

impl StockLedger {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, config: LedgerConfig) -> Self {
        let event_sender = Arc::new(event_sender);
        let recompute = RecomputeQueue::new(
            db.clone(),
            event_sender.clone(),
            config.recompute_queue_depth,
        );
        let history =
            StockHistoryService::new(db.clone(), event_sender, recompute.clone(), config);
        Self {
            db,
            history,
            recompute,
        }
    }

    pub fn history(&self) -> &StockHistoryService {
        &self.history
    }

    pub fn recompute(&self) -> &RecomputeQueue {
        &self.recompute
    }

    pub fn db(&self) -> &Arc<DbPool> {
        &self.db
    }
}

pub mod prelude {
    pub use crate::config::{AppConfig, LedgerConfig};
    pub use crate::db::*;
    pub use crate::entities::stock_history::StockReferenceType;
    pub use crate::errors::ServiceError;
    pub use crate::events::*;
    pub use crate::services::stock_history::{
        StockDocument, StockDocumentLine, StockHistoryService,
    };
    pub use crate::services::stock_recompute::{RecomputeQueue, StockRecomputeEngine};
    pub use crate::StockLedger;
}
