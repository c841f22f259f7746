//! Service wiring: one event store and the ledger engine over it.

use std::sync::Arc;

use stockledger_infra::event_store::InMemoryEventStore;
use stockledger_infra::{AppConfig, StockLedger};

pub type Ledger = StockLedger<Arc<InMemoryEventStore>>;

/// Shared application services, handed to handlers as an `Extension`.
#[derive(Debug)]
pub struct AppServices {
    ledger: Ledger,
}

impl AppServices {
    /// In-memory wiring (dev/test). Data lives as long as the process.
    pub fn in_memory(config: &AppConfig) -> Self {
        let store = Arc::new(InMemoryEventStore::new());
        tracing::info!(
            max_conflict_retries = config.max_conflict_retries,
            "using in-memory event store"
        );
        Self {
            ledger: StockLedger::new(store, config.max_conflict_retries),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}
