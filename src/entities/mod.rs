//! Persistence entities for the stock history ledger.

pub mod product;
pub mod product_bundle_component;
pub mod stock_history;
pub mod store_setting;
