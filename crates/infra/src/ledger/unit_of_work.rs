//! One ledger operation's staged writes.
//!
//! Aggregates are loaded once per unit of work, commands are executed
//! against the staged copies, and every resulting event is committed in a
//! single [`ChangeSet`]. Dropping a unit of work without committing discards
//! everything, which is how a failed multi-line operation leaves stock
//! untouched.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};

use stockledger_core::{AggregateId, DomainError, ExpectedVersion};
use stockledger_inventory::{AdjustStock, Product, ProductCommand, StockEffect};
use stockledger_movements::{Movement, MovementCommand, MovementEvent, MovementId};
use stockledger_sales::{Sale, SaleCommand, SaleEvent, SaleId};

use crate::event_store::{ChangeSet, EventStore, StoredEvent, StreamAppend, UniqueClaim};

use super::RequestContext;
use super::error::LedgerError;
use super::tracked::{Tracked, load_owned};

pub(crate) struct Staged<A: Tracked> {
    aggregate: A,
    /// Version read from the store; `None` for aggregates created here.
    loaded_version: Option<u64>,
    pending: Vec<A::Event>,
}

impl<A: Tracked> Staged<A> {
    fn expected_version(&self) -> ExpectedVersion {
        match self.loaded_version {
            Some(v) => ExpectedVersion::Exact(v),
            None => ExpectedVersion::Absent,
        }
    }
}

#[derive(Default)]
pub(crate) struct Staging {
    pub(crate) products: HashMap<AggregateId, Staged<Product>>,
    pub(crate) sales: HashMap<AggregateId, Staged<Sale>>,
    pub(crate) movements: HashMap<AggregateId, Staged<Movement>>,
}

pub(crate) struct UnitOfWork<'s, S: ?Sized> {
    store: &'s S,
    ctx: RequestContext,
    now: DateTime<Utc>,
    staging: Staging,
    claims: Vec<UniqueClaim>,
    /// Aggregates in the order they first produced events.
    touched: Vec<AggregateId>,
}

impl<'s, S: EventStore + ?Sized> UnitOfWork<'s, S> {
    pub(crate) fn new(store: &'s S, ctx: RequestContext) -> Self {
        Self {
            store,
            ctx,
            now: Utc::now(),
            staging: Staging::default(),
            claims: Vec::new(),
            touched: Vec::new(),
        }
    }

    pub(crate) fn ctx(&self) -> RequestContext {
        self.ctx
    }

    /// Timestamp stamped on every event of this unit of work.
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn staged<A: Tracked>(&mut self, id: AggregateId) -> Result<&mut Staged<A>, LedgerError> {
        match A::slot(&mut self.staging).entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let aggregate: A = load_owned(self.store, self.ctx.tenant_id, id)?;
                let loaded_version = Some(aggregate.version());
                Ok(entry.insert(Staged {
                    aggregate,
                    loaded_version,
                    pending: Vec::new(),
                }))
            }
        }
    }

    fn touch(&mut self, id: AggregateId) {
        if !self.touched.contains(&id) {
            self.touched.push(id);
        }
    }

    /// Current (staged) state of an aggregate the tenant owns.
    pub(crate) fn get<A: Tracked>(&mut self, id: AggregateId) -> Result<&A, LedgerError> {
        Ok(&self.staged::<A>(id)?.aggregate)
    }

    pub(crate) fn execute<A: Tracked>(
        &mut self,
        id: AggregateId,
        command: &A::Command,
    ) -> Result<Vec<A::Event>, LedgerError> {
        let staged = self.staged::<A>(id)?;
        let events = staged.aggregate.execute(command)?;
        staged.pending.extend(events.iter().cloned());
        if !events.is_empty() {
            self.touch(id);
        }
        Ok(events)
    }

    /// Create a new aggregate from its creation command.
    pub(crate) fn create<A: Tracked>(
        &mut self,
        id: AggregateId,
        command: &A::Command,
    ) -> Result<Vec<A::Event>, LedgerError> {
        let slot = A::slot(&mut self.staging);
        if slot.contains_key(&id) {
            return Err(DomainError::conflict(format!("{} {id} already exists", A::LABEL)).into());
        }

        let mut aggregate = A::empty_with(id);
        let events = aggregate.execute(command)?;
        slot.insert(
            id,
            Staged {
                aggregate,
                loaded_version: None,
                pending: events.clone(),
            },
        );
        self.touch(id);
        Ok(events)
    }

    pub(crate) fn claim(&mut self, claim: UniqueClaim) {
        self.claims.push(claim);
    }

    pub(crate) fn execute_sale(
        &mut self,
        sale_id: SaleId,
        command: &SaleCommand,
    ) -> Result<Vec<SaleEvent>, LedgerError> {
        let events = self.execute::<Sale>(sale_id.0, command)?;
        let effects = events.iter().flat_map(SaleEvent::stock_effects).collect();
        self.apply_stock_effects(effects, sale_id.0)?;
        Ok(events)
    }

    pub(crate) fn execute_movement(
        &mut self,
        movement_id: MovementId,
        command: &MovementCommand,
    ) -> Result<Vec<MovementEvent>, LedgerError> {
        let events = self.execute::<Movement>(movement_id.0, command)?;
        let effects = events
            .iter()
            .flat_map(MovementEvent::stock_effects)
            .collect();
        self.apply_stock_effects(effects, movement_id.0)?;
        Ok(events)
    }

    /// Adjust product stock for each effect, in order. Any guard failure
    /// aborts the whole unit of work.
    fn apply_stock_effects(
        &mut self,
        effects: Vec<StockEffect>,
        reference: AggregateId,
    ) -> Result<(), LedgerError> {
        for effect in effects {
            let command = ProductCommand::AdjustStock(AdjustStock {
                tenant_id: self.ctx.tenant_id,
                product_id: effect.product_id,
                delta: effect.delta,
                reason: effect.reason,
                reference,
                occurred_at: self.now,
            });
            self.execute::<Product>(effect.product_id.0, &command)?;
        }
        Ok(())
    }

    /// Persist every staged event atomically.
    pub(crate) fn commit(mut self) -> Result<Vec<StoredEvent>, LedgerError> {
        let mut appends = Vec::new();
        appends.extend(self.appends_for::<Product>()?);
        appends.extend(self.appends_for::<Sale>()?);
        appends.extend(self.appends_for::<Movement>()?);

        let touched = &self.touched;
        appends.sort_by_key(|a| {
            touched
                .iter()
                .position(|id| *id == a.aggregate_id)
                .unwrap_or(usize::MAX)
        });

        let changes = ChangeSet {
            appends,
            claims: std::mem::take(&mut self.claims),
        };
        Ok(self.store.commit(changes)?)
    }

    fn appends_for<A: Tracked>(&mut self) -> Result<Vec<StreamAppend>, LedgerError> {
        let ctx = self.ctx;
        let mut appends = Vec::new();

        for (id, staged) in A::slot(&mut self.staging).iter() {
            if staged.pending.is_empty() {
                continue;
            }
            let base = staged.loaded_version.unwrap_or(0);
            let events = staged
                .pending
                .iter()
                .enumerate()
                .map(|(i, event)| {
                    StoredEvent::from_typed(
                        ctx.tenant_id,
                        ctx.actor,
                        *id,
                        A::AGGREGATE_TYPE,
                        base + i as u64 + 1,
                        event,
                    )
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| LedgerError::Corrupt(format!("payload serialization failed: {e}")))?;

            appends.push(StreamAppend {
                tenant_id: ctx.tenant_id,
                aggregate_id: *id,
                aggregate_type: A::AGGREGATE_TYPE.to_string(),
                expected_version: staged.expected_version(),
                events,
            });
        }

        Ok(appends)
    }
}
