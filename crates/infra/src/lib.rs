//! Infrastructure layer: event store, ledger engine, config.

pub mod config;
pub mod event_store;
pub mod ledger;

#[cfg(test)]
mod integration_tests;

pub use config::{AppConfig, ConfigError};
pub use ledger::{LedgerError, RequestContext, StockLedger};
