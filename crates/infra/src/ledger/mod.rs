//! Stock ledger engine (application-level orchestration).
//!
//! Every operation runs the same pipeline:
//!
//! ```text
//! operation
//!   ↓
//! 1. Open a unit of work (tenant + actor scoped)
//!   ↓
//! 2. Load the aggregates it touches (tenant checked on load)
//!   ↓
//! 3. Execute commands: sale/movement first, then the product stock
//!    adjustments their events call for
//!   ↓
//! 4. Commit every stream append in one change set (optimistic versions)
//!   ↓
//! 5. On a version conflict, start over from step 1 with fresh state
//! ```
//!
//! A retried operation re-reads state, so a transition that already happened
//! fails its state check instead of moving stock a second time.

mod error;
mod input;
mod tracked;
mod unit_of_work;

use tracing::instrument;

use stockledger_core::{AggregateId, DomainError, TenantId, UserId};
use stockledger_inventory::{Product, ProductCommand, ProductId, RegisterProduct};
use stockledger_movements::{
    AcceptMovement, CreateMovement, DeleteMovement, Movement, MovementCommand, MovementId,
    RejectMovement, ReviseMovement,
};
use stockledger_sales::{
    AddSaleLine, CancelSale, CompleteSale, CreateSale, DeleteSale, Payment, RecordPayment,
    RemoveSaleLine, Sale, SaleCommand, SaleId, UpdateSaleLine,
};

use crate::event_store::{
    EventFilter, EventQuery, EventQueryResult, EventStore, Pagination, UniqueClaim,
};

pub use error::LedgerError;
pub use input::{
    MovementRevision, NewMovement, NewPayment, NewProduct, NewSale, SaleLineDraft, SaleLinePatch,
};
pub use tracked::{MOVEMENT_TYPE, PRODUCT_TYPE, SALE_TYPE};

use tracked::{load_all, load_owned};
use unit_of_work::UnitOfWork;

/// Who is asking: the tenant every record must belong to, and the user
/// recorded as the actor of every journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant_id: TenantId,
    pub actor: UserId,
}

impl RequestContext {
    pub fn new(tenant_id: TenantId, actor: UserId) -> Self {
        Self { tenant_id, actor }
    }
}

/// Stock/ledger consistency engine over an [`EventStore`].
#[derive(Debug)]
pub struct StockLedger<S> {
    store: S,
    max_conflict_retries: u32,
}

impl<S> StockLedger<S> {
    pub fn new(store: S, max_conflict_retries: u32) -> Self {
        Self {
            store,
            max_conflict_retries,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

fn product_claim(product: &Product) -> Option<UniqueClaim> {
    product
        .unique_key()
        .map(|(tenant_id, warehouse_id, name)| UniqueClaim {
            tenant_id,
            scope: "product",
            key: match warehouse_id {
                Some(w) => format!("{w}/{name}"),
                None => format!("-/{name}"),
            },
        })
}

fn add_sale_line<S: EventStore + ?Sized>(
    uow: &mut UnitOfWork<'_, S>,
    sale_id: SaleId,
    draft: &SaleLineDraft,
) -> Result<(), LedgerError> {
    let product = uow.get::<Product>(draft.product_id.0)?;
    let unit_price = draft.unit_price.unwrap_or(product.price());
    let discount = draft.discount.unwrap_or(product.discount());

    let command = SaleCommand::AddSaleLine(AddSaleLine {
        tenant_id: uow.ctx().tenant_id,
        sale_id,
        product_id: draft.product_id,
        quantity: draft.quantity,
        unit_price,
        discount,
        occurred_at: uow.now(),
    });
    uow.execute_sale(sale_id, &command)?;
    Ok(())
}

impl<S> StockLedger<S>
where
    S: EventStore + EventQuery,
{
    /// Run `op` in a fresh unit of work and commit it, retrying on
    /// optimistic concurrency conflicts.
    fn run<T>(
        &self,
        ctx: RequestContext,
        operation: &'static str,
        mut op: impl FnMut(&mut UnitOfWork<'_, S>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut attempt = 0u32;
        loop {
            let mut uow = UnitOfWork::new(&self.store, ctx);
            let out = op(&mut uow)?;

            match uow.commit() {
                Ok(committed) => {
                    tracing::info!(operation, events = committed.len(), "ledger operation committed");
                    return Ok(out);
                }
                Err(err) if err.is_concurrency() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::warn!(operation, attempt, error = %err, "concurrency conflict, retrying");
                }
                Err(err) => {
                    if err.is_concurrency() {
                        tracing::warn!(operation, attempt, error = %err, "giving up after concurrency conflicts");
                    }
                    return Err(err);
                }
            }
        }
    }

    // ---- products ----

    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor))]
    pub fn register_product(
        &self,
        ctx: RequestContext,
        input: NewProduct,
    ) -> Result<Product, LedgerError> {
        let product_id = ProductId::new(AggregateId::new());
        self.run(ctx, "register_product", |uow| {
            let command = ProductCommand::RegisterProduct(RegisterProduct {
                tenant_id: ctx.tenant_id,
                product_id,
                name: input.name.clone(),
                warehouse_id: input.warehouse_id,
                price: input.price,
                discount: input.discount,
                initial_stock: input.initial_stock,
                occurred_at: uow.now(),
            });
            uow.create::<Product>(product_id.0, &command)?;

            let product = uow.get::<Product>(product_id.0)?.clone();
            if let Some(claim) = product_claim(&product) {
                uow.claim(claim);
            }
            Ok(product)
        })
    }

    pub fn product(&self, ctx: RequestContext, product_id: ProductId) -> Result<Product, LedgerError> {
        load_owned(&self.store, ctx.tenant_id, product_id.0)
    }

    pub fn products(&self, ctx: RequestContext) -> Result<Vec<Product>, LedgerError> {
        load_all(&self.store, ctx.tenant_id)
    }

    // ---- sales ----

    /// Create a pending sale together with its lines, all or nothing.
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, lines = input.lines.len()))]
    pub fn create_sale(&self, ctx: RequestContext, input: NewSale) -> Result<Sale, LedgerError> {
        let sale_id = SaleId::new(AggregateId::new());
        self.run(ctx, "create_sale", |uow| {
            let command = SaleCommand::CreateSale(CreateSale {
                tenant_id: ctx.tenant_id,
                sale_id,
                user_id: input.user_id,
                origin: input.origin,
                occurred_at: uow.now(),
            });
            uow.create::<Sale>(sale_id.0, &command)?;

            for draft in &input.lines {
                add_sale_line(uow, sale_id, draft)?;
            }
            Ok(uow.get::<Sale>(sale_id.0)?.clone())
        })
    }

    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, sale_id = %sale_id, product_id = %draft.product_id))]
    pub fn create_sale_line_item(
        &self,
        ctx: RequestContext,
        sale_id: SaleId,
        draft: SaleLineDraft,
    ) -> Result<Sale, LedgerError> {
        self.run(ctx, "create_sale_line_item", |uow| {
            add_sale_line(uow, sale_id, &draft)?;
            Ok(uow.get::<Sale>(sale_id.0)?.clone())
        })
    }

    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, sale_id = %sale_id, line_no = line_no))]
    pub fn update_sale_line_item(
        &self,
        ctx: RequestContext,
        sale_id: SaleId,
        line_no: u32,
        patch: SaleLinePatch,
    ) -> Result<Sale, LedgerError> {
        self.run(ctx, "update_sale_line_item", |uow| {
            let command = SaleCommand::UpdateSaleLine(UpdateSaleLine {
                tenant_id: ctx.tenant_id,
                sale_id,
                line_no,
                quantity: patch.quantity,
                unit_price: patch.unit_price,
                discount: patch.discount,
                occurred_at: uow.now(),
            });
            uow.execute_sale(sale_id, &command)?;
            Ok(uow.get::<Sale>(sale_id.0)?.clone())
        })
    }

    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, sale_id = %sale_id, line_no = line_no))]
    pub fn delete_sale_line_item(
        &self,
        ctx: RequestContext,
        sale_id: SaleId,
        line_no: u32,
    ) -> Result<Sale, LedgerError> {
        self.run(ctx, "delete_sale_line_item", |uow| {
            let command = SaleCommand::RemoveSaleLine(RemoveSaleLine {
                tenant_id: ctx.tenant_id,
                sale_id,
                line_no,
                occurred_at: uow.now(),
            });
            uow.execute_sale(sale_id, &command)?;
            Ok(uow.get::<Sale>(sale_id.0)?.clone())
        })
    }

    /// Swap every line of a pending sale. Old lines are returned to stock
    /// before the new ones are taken out.
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, sale_id = %sale_id, lines = drafts.len()))]
    pub fn replace_sale_lines(
        &self,
        ctx: RequestContext,
        sale_id: SaleId,
        drafts: Vec<SaleLineDraft>,
    ) -> Result<Sale, LedgerError> {
        self.run(ctx, "replace_sale_lines", |uow| {
            let sale = uow.get::<Sale>(sale_id.0)?;
            if !sale.is_modifiable() {
                return Err(DomainError::invariant(format!(
                    "cannot modify lines of a {} sale",
                    sale.status()
                ))
                .into());
            }
            let line_nos: Vec<u32> = sale.lines().iter().map(|l| l.line_no).collect();

            for line_no in line_nos {
                let command = SaleCommand::RemoveSaleLine(RemoveSaleLine {
                    tenant_id: ctx.tenant_id,
                    sale_id,
                    line_no,
                    occurred_at: uow.now(),
                });
                uow.execute_sale(sale_id, &command)?;
            }
            for draft in &drafts {
                add_sale_line(uow, sale_id, draft)?;
            }
            Ok(uow.get::<Sale>(sale_id.0)?.clone())
        })
    }

    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, sale_id = %sale_id))]
    pub fn complete_sale(&self, ctx: RequestContext, sale_id: SaleId) -> Result<Sale, LedgerError> {
        self.run(ctx, "complete_sale", |uow| {
            let command = SaleCommand::CompleteSale(CompleteSale {
                tenant_id: ctx.tenant_id,
                sale_id,
                occurred_at: uow.now(),
            });
            uow.execute_sale(sale_id, &command)?;
            Ok(uow.get::<Sale>(sale_id.0)?.clone())
        })
    }

    /// Cancel a sale and return every line to stock. Cancelling a cancelled
    /// sale changes nothing.
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, sale_id = %sale_id))]
    pub fn cancel_sale(&self, ctx: RequestContext, sale_id: SaleId) -> Result<Sale, LedgerError> {
        self.run(ctx, "cancel_sale", |uow| {
            let command = SaleCommand::CancelSale(CancelSale {
                tenant_id: ctx.tenant_id,
                sale_id,
                occurred_at: uow.now(),
            });
            uow.execute_sale(sale_id, &command)?;
            Ok(uow.get::<Sale>(sale_id.0)?.clone())
        })
    }

    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, sale_id = %sale_id))]
    pub fn delete_sale(&self, ctx: RequestContext, sale_id: SaleId) -> Result<(), LedgerError> {
        self.run(ctx, "delete_sale", |uow| {
            let command = SaleCommand::DeleteSale(DeleteSale {
                tenant_id: ctx.tenant_id,
                sale_id,
                occurred_at: uow.now(),
            });
            uow.execute_sale(sale_id, &command)?;
            Ok(())
        })
    }

    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, sale_id = %sale_id))]
    pub fn record_payment(
        &self,
        ctx: RequestContext,
        sale_id: SaleId,
        input: NewPayment,
    ) -> Result<Sale, LedgerError> {
        self.run(ctx, "record_payment", |uow| {
            let command = SaleCommand::RecordPayment(RecordPayment {
                tenant_id: ctx.tenant_id,
                sale_id,
                payment: Payment {
                    amount: input.amount,
                    method: input.method,
                    reference: input.reference.clone(),
                    status: input.status,
                    recorded_at: uow.now(),
                },
                occurred_at: uow.now(),
            });
            uow.execute_sale(sale_id, &command)?;
            Ok(uow.get::<Sale>(sale_id.0)?.clone())
        })
    }

    pub fn sale(&self, ctx: RequestContext, sale_id: SaleId) -> Result<Sale, LedgerError> {
        load_owned(&self.store, ctx.tenant_id, sale_id.0)
    }

    pub fn sales(&self, ctx: RequestContext) -> Result<Vec<Sale>, LedgerError> {
        load_all(&self.store, ctx.tenant_id)
    }

    // ---- movements ----

    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, lines = input.lines.len()))]
    pub fn create_movement(
        &self,
        ctx: RequestContext,
        input: NewMovement,
    ) -> Result<Movement, LedgerError> {
        let movement_id = MovementId::new(AggregateId::new());
        self.run(ctx, "create_movement", |uow| {
            for line in &input.lines {
                uow.get::<Product>(line.product_id.0)?;
            }

            let command = MovementCommand::CreateMovement(CreateMovement {
                tenant_id: ctx.tenant_id,
                movement_id,
                supplier_id: input.supplier_id,
                destination: input.destination,
                arrival_at: input.arrival_at,
                notes: input.notes.clone(),
                transport_cost: input.transport_cost,
                lines: input.lines.clone(),
                occurred_at: uow.now(),
            });
            uow.create::<Movement>(movement_id.0, &command)?;
            Ok(uow.get::<Movement>(movement_id.0)?.clone())
        })
    }

    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, movement_id = %movement_id))]
    pub fn revise_movement(
        &self,
        ctx: RequestContext,
        movement_id: MovementId,
        revision: MovementRevision,
    ) -> Result<Movement, LedgerError> {
        self.run(ctx, "revise_movement", |uow| {
            for line in revision.lines.iter().flatten() {
                uow.get::<Product>(line.product_id.0)?;
            }

            let command = MovementCommand::ReviseMovement(ReviseMovement {
                tenant_id: ctx.tenant_id,
                movement_id,
                destination: revision.destination,
                arrival_at: revision.arrival_at,
                notes: revision.notes.clone(),
                transport_cost: revision.transport_cost,
                supplier_id: revision.supplier_id,
                lines: revision.lines.clone(),
                occurred_at: uow.now(),
            });
            uow.execute_movement(movement_id, &command)?;
            Ok(uow.get::<Movement>(movement_id.0)?.clone())
        })
    }

    /// Accept a pending movement and apply every line to stock, all lines
    /// or none.
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, movement_id = %movement_id))]
    pub fn accept_movement(
        &self,
        ctx: RequestContext,
        movement_id: MovementId,
    ) -> Result<Movement, LedgerError> {
        self.run(ctx, "accept_movement", |uow| {
            let command = MovementCommand::AcceptMovement(AcceptMovement {
                tenant_id: ctx.tenant_id,
                movement_id,
                occurred_at: uow.now(),
            });
            uow.execute_movement(movement_id, &command)?;
            Ok(uow.get::<Movement>(movement_id.0)?.clone())
        })
    }

    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, movement_id = %movement_id))]
    pub fn reject_movement(
        &self,
        ctx: RequestContext,
        movement_id: MovementId,
    ) -> Result<Movement, LedgerError> {
        self.run(ctx, "reject_movement", |uow| {
            let command = MovementCommand::RejectMovement(RejectMovement {
                tenant_id: ctx.tenant_id,
                movement_id,
                occurred_at: uow.now(),
            });
            uow.execute_movement(movement_id, &command)?;
            Ok(uow.get::<Movement>(movement_id.0)?.clone())
        })
    }

    /// Delete a movement, reversing its stock if it had been accepted.
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor, movement_id = %movement_id))]
    pub fn delete_movement(
        &self,
        ctx: RequestContext,
        movement_id: MovementId,
    ) -> Result<(), LedgerError> {
        self.run(ctx, "delete_movement", |uow| {
            let command = MovementCommand::DeleteMovement(DeleteMovement {
                tenant_id: ctx.tenant_id,
                movement_id,
                occurred_at: uow.now(),
            });
            uow.execute_movement(movement_id, &command)?;
            Ok(())
        })
    }

    pub fn movement(
        &self,
        ctx: RequestContext,
        movement_id: MovementId,
    ) -> Result<Movement, LedgerError> {
        load_owned(&self.store, ctx.tenant_id, movement_id.0)
    }

    pub fn movements(&self, ctx: RequestContext) -> Result<Vec<Movement>, LedgerError> {
        load_all(&self.store, ctx.tenant_id)
    }

    // ---- journal ----

    /// The tenant's committed ledger events, newest first.
    pub fn activity(
        &self,
        ctx: RequestContext,
        filter: &EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, LedgerError> {
        Ok(self.store.query_events(ctx.tenant_id, filter, pagination)?)
    }
}
