//! Append-only event store boundary.
//!
//! Every ledger operation commits one [`ChangeSet`]: appends to any number of
//! aggregate streams plus uniqueness claims, all or nothing. The committed
//! events form the tenant's journal.

pub mod in_memory;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use query::{EventFilter, EventQuery, EventQueryResult, Pagination};
pub use r#trait::{ChangeSet, EventStore, EventStoreError, StoredEvent, StreamAppend, UniqueClaim};
