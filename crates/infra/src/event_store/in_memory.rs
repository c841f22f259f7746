use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use stockledger_core::{AggregateId, TenantId};

use super::query::{EventFilter, EventQuery, EventQueryResult, Pagination};
use super::r#trait::{ChangeSet, EventStore, EventStoreError, StoredEvent, StreamAppend, UniqueClaim};

#[derive(Debug)]
struct Stream {
    tenant_id: TenantId,
    aggregate_type: String,
    /// Indexes into the journal, in sequence order.
    entries: Vec<usize>,
    version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    journal: Vec<StoredEvent>,
    streams: HashMap<AggregateId, Stream>,
    claims: HashSet<UniqueClaim>,
}

/// In-memory event store with a single global journal.
///
/// One `RwLock` guards everything, which makes multi-stream commits atomic.
/// Intended for tests/dev and the single-node service.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed journal entries across all tenants.
    pub fn journal_len(&self) -> usize {
        self.inner.read().map(|i| i.journal.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> EventStoreError {
    EventStoreError::Unavailable("lock poisoned".to_string())
}

fn validate_append(inner: &Inner, append: &StreamAppend) -> Result<(), EventStoreError> {
    let existing = inner.streams.get(&append.aggregate_id);

    if let Some(stream) = existing {
        if stream.tenant_id != append.tenant_id {
            return Err(EventStoreError::TenantIsolation(format!(
                "stream {} belongs to another tenant",
                append.aggregate_id
            )));
        }
        if stream.aggregate_type != append.aggregate_type {
            return Err(EventStoreError::AggregateTypeMismatch(format!(
                "stream aggregate_type is '{}', attempted append with '{}'",
                stream.aggregate_type, append.aggregate_type
            )));
        }
    }

    let current = existing.map(|s| s.version);
    if !append.expected_version.matches(current) {
        return Err(EventStoreError::Concurrency(format!(
            "stream {}: expected {:?}, found {current:?}",
            append.aggregate_id, append.expected_version
        )));
    }

    let mut next = current.unwrap_or(0) + 1;
    for (idx, e) in append.events.iter().enumerate() {
        if e.tenant_id() != append.tenant_id {
            return Err(EventStoreError::TenantIsolation(format!(
                "batch contains a foreign tenant_id (index {idx})"
            )));
        }
        if e.aggregate_id() != append.aggregate_id || e.aggregate_type() != append.aggregate_type {
            return Err(EventStoreError::InvalidAppend(format!(
                "batch mixes streams (index {idx})"
            )));
        }
        if e.sequence_number() != next {
            return Err(EventStoreError::InvalidAppend(format!(
                "expected sequence_number {next}, found {} (index {idx})",
                e.sequence_number()
            )));
        }
        next += 1;
    }

    Ok(())
}

impl EventStore for InMemoryEventStore {
    fn commit(&self, changes: ChangeSet) -> Result<Vec<StoredEvent>, EventStoreError> {
        if changes.is_empty() {
            return Ok(vec![]);
        }

        let mut guard = self.inner.write().map_err(poisoned)?;
        let inner = &mut *guard;

        // Validate everything before touching any state.
        let mut seen = HashSet::new();
        for append in &changes.appends {
            if !seen.insert(append.aggregate_id) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream {} appears twice in one commit",
                    append.aggregate_id
                )));
            }
            validate_append(inner, append)?;
        }

        let mut claimed = HashSet::new();
        for claim in &changes.claims {
            if inner.claims.contains(claim) || !claimed.insert(claim) {
                return Err(EventStoreError::UniqueViolation(format!(
                    "{} '{}' already exists",
                    claim.scope, claim.key
                )));
            }
        }

        let mut committed = Vec::new();
        for append in changes.appends {
            for event in append.events {
                let index = inner.journal.len();
                let stored = event.with_position(index as u64 + 1);
                let stream = inner
                    .streams
                    .entry(append.aggregate_id)
                    .or_insert_with(|| Stream {
                        tenant_id: append.tenant_id,
                        aggregate_type: append.aggregate_type.clone(),
                        entries: Vec::new(),
                        version: 0,
                    });
                stream.entries.push(index);
                stream.version = stored.sequence_number();
                inner.journal.push(stored.clone());
                committed.push(stored);
            }
        }
        inner.claims.extend(changes.claims);

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read().map_err(poisoned)?;

        Ok(inner
            .streams
            .get(&aggregate_id)
            .map(|s| s.entries.iter().map(|&i| inner.journal[i].clone()).collect())
            .unwrap_or_default())
    }

    fn stream_ids(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<AggregateId>, EventStoreError> {
        let inner = self.inner.read().map_err(poisoned)?;

        let mut ids: Vec<(usize, AggregateId)> = inner
            .streams
            .iter()
            .filter(|(_, s)| s.tenant_id == tenant_id && s.aggregate_type == aggregate_type)
            .filter_map(|(id, s)| s.entries.first().map(|&first| (first, *id)))
            .collect();
        ids.sort_unstable_by_key(|(first, _)| *first);

        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }
}

impl EventQuery for InMemoryEventStore {
    fn query_events(
        &self,
        tenant_id: TenantId,
        filter: &EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError> {
        let inner = self.inner.read().map_err(poisoned)?;

        let matching: Vec<&StoredEvent> = inner
            .journal
            .iter()
            .rev()
            .filter(|e| e.tenant_id() == tenant_id && filter.matches(e))
            .collect();

        let total = matching.len() as u64;
        let events: Vec<StoredEvent> = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        let has_more = u64::from(pagination.offset) + (events.len() as u64) < total;

        Ok(EventQueryResult {
            events,
            total,
            pagination,
            has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockledger_core::{ExpectedVersion, UserId};
    use uuid::Uuid;

    const TYPE: &str = "test.thing";

    fn event(tenant_id: TenantId, aggregate_id: AggregateId, sequence_number: u64) -> StoredEvent {
        StoredEvent::new(
            Uuid::now_v7(),
            tenant_id,
            UserId::new(),
            aggregate_id,
            TYPE,
            sequence_number,
            "test.thing.happened",
            1,
            Utc::now(),
            serde_json::json!({ "n": sequence_number }),
        )
    }

    fn append(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        expected_version: ExpectedVersion,
        sequence: std::ops::RangeInclusive<u64>,
    ) -> StreamAppend {
        StreamAppend {
            tenant_id,
            aggregate_id,
            aggregate_type: TYPE.to_string(),
            expected_version,
            events: sequence.map(|n| event(tenant_id, aggregate_id, n)).collect(),
        }
    }

    fn single(append: StreamAppend) -> ChangeSet {
        ChangeSet {
            appends: vec![append],
            claims: vec![],
        }
    }

    #[test]
    fn commit_assigns_journal_positions_and_loads_in_order() {
        let store = InMemoryEventStore::new();
        let tenant_id = TenantId::new();
        let id = AggregateId::new();

        let committed = store
            .commit(single(append(tenant_id, id, ExpectedVersion::Absent, 1..=2)))
            .unwrap();
        assert_eq!(
            committed.iter().map(|e| e.position()).collect::<Vec<_>>(),
            vec![1, 2]
        );

        store
            .commit(single(append(tenant_id, id, ExpectedVersion::Exact(2), 3..=3)))
            .unwrap();
        let stream = store.load_stream(id).unwrap();
        assert_eq!(
            stream.iter().map(|e| e.sequence_number()).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn stale_expected_version_is_a_conflict() {
        let store = InMemoryEventStore::new();
        let tenant_id = TenantId::new();
        let id = AggregateId::new();
        store
            .commit(single(append(tenant_id, id, ExpectedVersion::Absent, 1..=1)))
            .unwrap();

        let err = store
            .commit(single(append(tenant_id, id, ExpectedVersion::Absent, 2..=2)))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn failed_commit_writes_nothing() {
        let store = InMemoryEventStore::new();
        let tenant_id = TenantId::new();
        let (a, b) = (AggregateId::new(), AggregateId::new());
        store
            .commit(single(append(tenant_id, b, ExpectedVersion::Absent, 1..=1)))
            .unwrap();

        let err = store
            .commit(ChangeSet {
                appends: vec![
                    append(tenant_id, a, ExpectedVersion::Absent, 1..=1),
                    append(tenant_id, b, ExpectedVersion::Exact(5), 6..=6),
                ],
                claims: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert!(store.load_stream(a).unwrap().is_empty());
        assert_eq!(store.journal_len(), 1);
    }

    #[test]
    fn unique_claims_are_enforced() {
        let store = InMemoryEventStore::new();
        let tenant_id = TenantId::new();
        let claim = UniqueClaim {
            tenant_id,
            scope: "product",
            key: "-/Mesa".to_string(),
        };
        let with_claim = |id| ChangeSet {
            appends: vec![append(tenant_id, id, ExpectedVersion::Absent, 1..=1)],
            claims: vec![claim.clone()],
        };

        store.commit(with_claim(AggregateId::new())).unwrap();
        let err = store.commit(with_claim(AggregateId::new())).unwrap_err();
        assert!(matches!(err, EventStoreError::UniqueViolation(_)));
        assert_eq!(store.journal_len(), 1);

        let other_tenant = ChangeSet {
            appends: vec![],
            claims: vec![UniqueClaim {
                tenant_id: TenantId::new(),
                ..claim.clone()
            }],
        };
        store.commit(other_tenant).unwrap();
    }

    #[test]
    fn foreign_tenant_cannot_append_to_stream() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .commit(single(append(TenantId::new(), id, ExpectedVersion::Absent, 1..=1)))
            .unwrap();

        let err = store
            .commit(single(append(TenantId::new(), id, ExpectedVersion::Any, 2..=2)))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::TenantIsolation(_)));
    }

    #[test]
    fn query_is_tenant_scoped_newest_first() {
        let store = InMemoryEventStore::new();
        let (t1, t2) = (TenantId::new(), TenantId::new());
        let id = AggregateId::new();
        store
            .commit(single(append(t1, id, ExpectedVersion::Absent, 1..=3)))
            .unwrap();
        store
            .commit(single(append(t2, AggregateId::new(), ExpectedVersion::Absent, 1..=1)))
            .unwrap();

        let page = store
            .query_events(t1, &EventFilter::default(), Pagination::new(Some(2), None))
            .unwrap();
        assert_eq!(page.total, 3);
        assert!(page.has_more);
        assert_eq!(
            page.events.iter().map(|e| e.sequence_number()).collect::<Vec<_>>(),
            vec![3, 2]
        );

        assert_eq!(store.stream_ids(t1, TYPE).unwrap(), vec![id]);
    }
}
