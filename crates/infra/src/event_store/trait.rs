use serde_json::Value as JsonValue;
use thiserror::Error;

use stockledger_core::{AggregateId, ExpectedVersion, TenantId};
use stockledger_events::EventEnvelope;
use std::sync::Arc;

/// A journal entry: a serialized domain event plus its stream metadata.
pub type StoredEvent = EventEnvelope<JsonValue>;

/// New events for one aggregate stream, with the version they were decided at.
///
/// Events must carry contiguous `sequence_number`s starting right after the
/// stream's current version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAppend {
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub expected_version: ExpectedVersion,
    pub events: Vec<StoredEvent>,
}

/// A value that must be unique within a tenant (e.g. a product's
/// name + warehouse pair). Claims are permanent once committed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueClaim {
    pub tenant_id: TenantId,
    pub scope: &'static str,
    pub key: String,
}

/// Everything one ledger operation writes. Committed all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub appends: Vec<StreamAppend>,
    pub claims: Vec<UniqueClaim>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.appends.iter().all(|a| a.events.is_empty()) && self.claims.is_empty()
    }
}

/// Event store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, isolation) as
/// opposed to domain errors (validation, stock guards, transitions).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only, tenant-scoped event store with multi-stream commits.
///
/// Streams are keyed by aggregate id; each stream is owned by exactly one
/// tenant and one aggregate type. Loading does not filter by tenant so the
/// caller can tell "not yours" apart from "does not exist".
///
/// `commit()` must:
/// - check every append's expected version against its stream
/// - reject cross-tenant or cross-type appends to an existing stream
/// - reject unique claims that are already held
/// - assign journal positions and persist every event, or nothing at all
pub trait EventStore: Send + Sync {
    fn commit(&self, changes: ChangeSet) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream of one aggregate, ordered by sequence number.
    /// Returns an empty vector if the stream does not exist.
    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Ids of a tenant's streams of the given aggregate type, oldest first.
    fn stream_ids(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<AggregateId>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn commit(&self, changes: ChangeSet) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).commit(changes)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(aggregate_id)
    }

    fn stream_ids(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<AggregateId>, EventStoreError> {
        (**self).stream_ids(tenant_id, aggregate_type)
    }
}
