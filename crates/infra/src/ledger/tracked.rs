//! Rehydration of ledger aggregates from their event streams.

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use stockledger_core::{
    Aggregate, AggregateId, DomainError, TenantId, TenantScoped, ensure_same_tenant,
};
use stockledger_events::Event as DomainEvent;
use stockledger_inventory::{Product, ProductId};
use stockledger_movements::{Movement, MovementId};
use stockledger_sales::{Sale, SaleId};

use crate::event_store::{EventStore, StoredEvent};

use super::error::LedgerError;
use super::unit_of_work::{Staged, Staging};

pub const PRODUCT_TYPE: &str = "inventory.product";
pub const SALE_TYPE: &str = "sales.sale";
pub const MOVEMENT_TYPE: &str = "movements.movement";

/// An aggregate the ledger can load, stage and persist.
pub(crate) trait Tracked:
    Aggregate<Error = DomainError, Event: DomainEvent + Serialize + DeserializeOwned>
    + TenantScoped
    + Clone
{
    const AGGREGATE_TYPE: &'static str;
    /// Human name used in error messages.
    const LABEL: &'static str;

    fn empty_with(id: AggregateId) -> Self;

    fn is_gone(&self) -> bool;

    fn slot(staging: &mut Staging) -> &mut HashMap<AggregateId, Staged<Self>>;
}

impl Tracked for Product {
    const AGGREGATE_TYPE: &'static str = PRODUCT_TYPE;
    const LABEL: &'static str = "product";

    fn empty_with(id: AggregateId) -> Self {
        Product::empty(ProductId::new(id))
    }

    fn is_gone(&self) -> bool {
        false
    }

    fn slot(staging: &mut Staging) -> &mut HashMap<AggregateId, Staged<Self>> {
        &mut staging.products
    }
}

impl Tracked for Sale {
    const AGGREGATE_TYPE: &'static str = SALE_TYPE;
    const LABEL: &'static str = "sale";

    fn empty_with(id: AggregateId) -> Self {
        Sale::empty(SaleId::new(id))
    }

    fn is_gone(&self) -> bool {
        self.is_deleted()
    }

    fn slot(staging: &mut Staging) -> &mut HashMap<AggregateId, Staged<Self>> {
        &mut staging.sales
    }
}

impl Tracked for Movement {
    const AGGREGATE_TYPE: &'static str = MOVEMENT_TYPE;
    const LABEL: &'static str = "movement";

    fn empty_with(id: AggregateId) -> Self {
        Movement::empty(MovementId::new(id))
    }

    fn is_gone(&self) -> bool {
        self.is_deleted()
    }

    fn slot(staging: &mut Staging) -> &mut HashMap<AggregateId, Staged<Self>> {
        &mut staging.movements
    }
}

/// Replay a stream into a fresh aggregate.
///
/// A stream of a different aggregate type is reported as `NotFound`: the id
/// exists, just not as this kind of record.
pub(crate) fn rehydrate<A: Tracked>(
    aggregate_id: AggregateId,
    history: &[StoredEvent],
) -> Result<A, LedgerError> {
    let mut aggregate = A::empty_with(aggregate_id);

    if let Some(first) = history.first() {
        if first.aggregate_type() != A::AGGREGATE_TYPE {
            return Err(DomainError::not_found().into());
        }
    }

    let mut last = 0u64;
    for (idx, stored) in history.iter().enumerate() {
        if stored.aggregate_id() != aggregate_id || stored.aggregate_type() != A::AGGREGATE_TYPE {
            return Err(LedgerError::Corrupt(format!(
                "stream {aggregate_id} contains a foreign entry at index {idx}"
            )));
        }
        if stored.sequence_number() <= last {
            return Err(LedgerError::Corrupt(format!(
                "non-monotonic sequence_number in stream {aggregate_id} (last={last}, found={})",
                stored.sequence_number()
            )));
        }
        last = stored.sequence_number();

        let event: A::Event = serde_json::from_value(stored.payload().clone())
            .map_err(|e| LedgerError::Corrupt(e.to_string()))?;
        aggregate.apply(&event);
    }

    Ok(aggregate)
}

/// Load an aggregate the caller's tenant owns.
///
/// Missing or deleted records are `NotFound`; records of another tenant are
/// `PermissionDenied`.
pub(crate) fn load_owned<A: Tracked, S: EventStore + ?Sized>(
    store: &S,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
) -> Result<A, LedgerError> {
    let history = store.load_stream(aggregate_id)?;
    let aggregate: A = rehydrate(aggregate_id, &history)?;

    ensure_same_tenant(tenant_id, &aggregate, A::LABEL)?;
    if aggregate.is_gone() {
        return Err(DomainError::not_found().into());
    }
    Ok(aggregate)
}

/// Every live aggregate of one type the tenant owns, oldest first.
pub(crate) fn load_all<A: Tracked, S: EventStore + ?Sized>(
    store: &S,
    tenant_id: TenantId,
) -> Result<Vec<A>, LedgerError> {
    let mut out = Vec::new();
    for id in store.stream_ids(tenant_id, A::AGGREGATE_TYPE)? {
        let history = store.load_stream(id)?;
        let aggregate: A = rehydrate(id, &history)?;
        if !aggregate.is_gone() {
            out.push(aggregate);
        }
    }
    Ok(out)
}
