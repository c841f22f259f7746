//! Journal query interface for inspection (the activity log).
//!
//! All queries are tenant-scoped and paginated by default.

use serde::{Deserialize, Serialize};
use stockledger_core::{AggregateId, TenantId};
use std::sync::Arc;

use crate::event_store::{EventStoreError, StoredEvent};

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 1000;

/// Pagination parameters for journal queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria for journal queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub aggregate_id: Option<AggregateId>,
    /// e.g. `"sales.sale"`.
    pub aggregate_type: Option<String>,
    /// e.g. `"inventory.product.stock_adjusted"`.
    pub event_type: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &StoredEvent) -> bool {
        self.aggregate_id.is_none_or(|id| event.aggregate_id() == id)
            && self
                .aggregate_type
                .as_deref()
                .is_none_or(|t| event.aggregate_type() == t)
            && self
                .event_type
                .as_deref()
                .is_none_or(|t| event.event_type() == t)
    }
}

/// One page of journal entries, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventQueryResult {
    pub events: Vec<StoredEvent>,
    /// Number of entries matching the filter across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

pub trait EventQuery: Send + Sync {
    /// Query a tenant's journal, newest entries first.
    fn query_events(
        &self,
        tenant_id: TenantId,
        filter: &EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError>;
}

impl<Q> EventQuery for Arc<Q>
where
    Q: EventQuery + ?Sized,
{
    fn query_events(
        &self,
        tenant_id: TenantId,
        filter: &EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError> {
        (**self).query_events(tenant_id, filter, pagination)
    }
}
