use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::money::{
    checked_subtotal, checked_sum, ensure_non_negative, ensure_positive, round_money,
};
use stockledger_core::entity::find_by_id;
use stockledger_core::{
    Aggregate, AggregateId, AggregateRoot, Discount, DomainError, Entity, TenantId,
    TenantScoped,
};
use stockledger_events::Event;
use stockledger_inventory::{ProductId, StockEffect, StockReason, WarehouseId};

/// Movement identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(pub AggregateId);

impl MovementId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Supplier reference. Suppliers are managed outside the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub AggregateId);

impl SupplierId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

/// Movement status lifecycle: `Pending -> Accepted | Rejected`, both final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementStatus {
    Pending,
    Accepted,
    Rejected,
}

impl core::fmt::Display for MovementStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            MovementStatus::Pending => "pending",
            MovementStatus::Accepted => "accepted",
            MovementStatus::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Direction of the stock change applied on acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Incoming,
    Outgoing,
}

impl MovementKind {
    /// Deliveries from a supplier bring stock in; everything else ships it out.
    pub fn for_supplier(supplier_id: Option<SupplierId>) -> Self {
        if supplier_id.is_some() {
            MovementKind::Incoming
        } else {
            MovementKind::Outgoing
        }
    }

    fn sign(self) -> i64 {
        match self {
            MovementKind::Incoming => 1,
            MovementKind::Outgoing => -1,
        }
    }
}

/// Movement line: product, supplied quantity and unit value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_value: Decimal,
    pub color: Option<String>,
}

impl Entity for MovementLine {
    type Id = u32;

    fn id(&self) -> &u32 {
        &self.line_no
    }
}

impl MovementLine {
    /// `quantity × unit_value`, saturating.
    pub fn value(&self) -> Decimal {
        Decimal::from(self.quantity).saturating_mul(self.unit_value)
    }
}

/// Line as supplied by a caller. `line_no` is only meaningful on revisions:
/// it names the existing line to overwrite, `None` adds a new line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementLineInput {
    pub line_no: Option<u32>,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_value: Decimal,
    pub color: Option<String>,
}

/// `Σ quantity × unit_value + transport_cost`, rounded once.
pub fn compute_total(lines: &[MovementLine], transport_cost: Decimal) -> Decimal {
    round_money(
        lines
            .iter()
            .map(MovementLine::value)
            .fold(transport_cost, Decimal::saturating_add),
    )
}

/// [`compute_total`] that rejects amounts which overflow.
pub fn checked_total(
    lines: &[MovementLine],
    transport_cost: Decimal,
) -> Result<Decimal, DomainError> {
    checked_sum(
        lines
            .iter()
            .map(|l| checked_subtotal(l.quantity, l.unit_value, Discount::NONE))
            .chain(std::iter::once(Ok(transport_cost))),
    )
    .map(round_money)
}

/// Aggregate root: Movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    id: MovementId,
    tenant_id: Option<TenantId>,
    supplier_id: Option<SupplierId>,
    destination: Option<WarehouseId>,
    arrival_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    transport_cost: Decimal,
    kind: MovementKind,
    status: MovementStatus,
    lines: Vec<MovementLine>,
    next_line_no: u32,
    total: Decimal,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Movement {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: MovementId) -> Self {
        Self {
            id,
            tenant_id: None,
            supplier_id: None,
            destination: None,
            arrival_at: None,
            notes: None,
            transport_cost: Decimal::ZERO,
            kind: MovementKind::Outgoing,
            status: MovementStatus::Pending,
            lines: Vec::new(),
            next_line_no: 1,
            total: Decimal::ZERO,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> MovementId {
        self.id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn destination(&self) -> Option<WarehouseId> {
        self.destination
    }

    pub fn arrival_at(&self) -> Option<DateTime<Utc>> {
        self.arrival_at
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn transport_cost(&self) -> Decimal {
        self.transport_cost
    }

    pub fn kind(&self) -> MovementKind {
        self.kind
    }

    pub fn status(&self) -> MovementStatus {
        self.status
    }

    pub fn lines(&self) -> &[MovementLine] {
        &self.lines
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn stock_changes(&self, sign: i64, reason: StockReason) -> Vec<StockEffect> {
        self.lines
            .iter()
            .map(|l| StockEffect::new(l.product_id, sign * l.quantity, reason))
            .collect()
    }
}

impl AggregateRoot for Movement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TenantScoped for Movement {
    fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }
}

/// Command: CreateMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMovement {
    pub tenant_id: TenantId,
    pub movement_id: MovementId,
    pub supplier_id: Option<SupplierId>,
    pub destination: Option<WarehouseId>,
    pub arrival_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub transport_cost: Decimal,
    pub lines: Vec<MovementLineInput>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReviseMovement.
///
/// Header fields left as `None` are kept. `supplier_id` is doubly optional:
/// `Some(None)` clears the supplier. `lines`, when present, is the complete
/// new line set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseMovement {
    pub tenant_id: TenantId,
    pub movement_id: MovementId,
    pub destination: Option<WarehouseId>,
    pub arrival_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub transport_cost: Option<Decimal>,
    pub supplier_id: Option<Option<SupplierId>>,
    pub lines: Option<Vec<MovementLineInput>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AcceptMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptMovement {
    pub tenant_id: TenantId,
    pub movement_id: MovementId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectMovement {
    pub tenant_id: TenantId,
    pub movement_id: MovementId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMovement {
    pub tenant_id: TenantId,
    pub movement_id: MovementId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementCommand {
    CreateMovement(CreateMovement),
    ReviseMovement(ReviseMovement),
    AcceptMovement(AcceptMovement),
    RejectMovement(RejectMovement),
    DeleteMovement(DeleteMovement),
}

/// Event: MovementCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementCreated {
    pub tenant_id: TenantId,
    pub movement_id: MovementId,
    pub supplier_id: Option<SupplierId>,
    pub kind: MovementKind,
    pub destination: Option<WarehouseId>,
    pub arrival_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub transport_cost: Decimal,
    pub lines: Vec<MovementLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MovementRevised. Carries the full post-revision header and lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRevised {
    pub tenant_id: TenantId,
    pub movement_id: MovementId,
    pub supplier_id: Option<SupplierId>,
    pub kind: MovementKind,
    pub destination: Option<WarehouseId>,
    pub arrival_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub transport_cost: Decimal,
    pub lines: Vec<MovementLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MovementAccepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementAccepted {
    pub tenant_id: TenantId,
    pub movement_id: MovementId,
    pub kind: MovementKind,
    pub applied: Vec<StockEffect>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MovementRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRejected {
    pub tenant_id: TenantId,
    pub movement_id: MovementId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MovementDeleted. `reversed` is empty unless the movement had been
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDeleted {
    pub tenant_id: TenantId,
    pub movement_id: MovementId,
    pub previous_status: MovementStatus,
    pub reversed: Vec<StockEffect>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementEvent {
    MovementCreated(MovementCreated),
    MovementRevised(MovementRevised),
    MovementAccepted(MovementAccepted),
    MovementRejected(MovementRejected),
    MovementDeleted(MovementDeleted),
}

impl MovementEvent {
    pub fn stock_effects(&self) -> Vec<StockEffect> {
        match self {
            MovementEvent::MovementAccepted(e) => e.applied.clone(),
            MovementEvent::MovementDeleted(e) => e.reversed.clone(),
            MovementEvent::MovementCreated(_)
            | MovementEvent::MovementRevised(_)
            | MovementEvent::MovementRejected(_) => Vec::new(),
        }
    }
}

impl Event for MovementEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MovementEvent::MovementCreated(_) => "movements.movement.created",
            MovementEvent::MovementRevised(_) => "movements.movement.revised",
            MovementEvent::MovementAccepted(_) => "movements.movement.accepted",
            MovementEvent::MovementRejected(_) => "movements.movement.rejected",
            MovementEvent::MovementDeleted(_) => "movements.movement.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MovementEvent::MovementCreated(e) => e.occurred_at,
            MovementEvent::MovementRevised(e) => e.occurred_at,
            MovementEvent::MovementAccepted(e) => e.occurred_at,
            MovementEvent::MovementRejected(e) => e.occurred_at,
            MovementEvent::MovementDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Movement {
    type Command = MovementCommand;
    type Event = MovementEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MovementEvent::MovementCreated(e) => {
                self.id = e.movement_id;
                self.tenant_id = Some(e.tenant_id);
                self.supplier_id = e.supplier_id;
                self.kind = e.kind;
                self.destination = e.destination;
                self.arrival_at = e.arrival_at;
                self.notes = e.notes.clone();
                self.transport_cost = e.transport_cost;
                self.status = MovementStatus::Pending;
                self.lines = e.lines.clone();
                self.created = true;
            }
            MovementEvent::MovementRevised(e) => {
                self.supplier_id = e.supplier_id;
                self.kind = e.kind;
                self.destination = e.destination;
                self.arrival_at = e.arrival_at;
                self.notes = e.notes.clone();
                self.transport_cost = e.transport_cost;
                self.lines = e.lines.clone();
            }
            MovementEvent::MovementAccepted(_) => {
                self.status = MovementStatus::Accepted;
            }
            MovementEvent::MovementRejected(_) => {
                self.status = MovementStatus::Rejected;
            }
            MovementEvent::MovementDeleted(_) => {
                self.deleted = true;
            }
        }

        if let Some(max) = self.lines.iter().map(|l| l.line_no).max() {
            self.next_line_no = self.next_line_no.max(max + 1);
        }
        self.total = compute_total(&self.lines, self.transport_cost);
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MovementCommand::CreateMovement(cmd) => self.handle_create(cmd),
            MovementCommand::ReviseMovement(cmd) => self.handle_revise(cmd),
            MovementCommand::AcceptMovement(cmd) => self.handle_accept(cmd),
            MovementCommand::RejectMovement(cmd) => self.handle_reject(cmd),
            MovementCommand::DeleteMovement(cmd) => self.handle_delete(cmd),
        }
    }
}

fn validate_line(input: &MovementLineInput) -> Result<(), DomainError> {
    if input.quantity <= 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    ensure_positive("unit_value", input.unit_value)
}

fn ensure_distinct_products(lines: &[MovementLine]) -> Result<(), DomainError> {
    for (i, line) in lines.iter().enumerate() {
        if lines[..i].iter().any(|l| l.product_id == line.product_id) {
            return Err(DomainError::conflict(format!(
                "product {} appears more than once on this movement",
                line.product_id
            )));
        }
    }
    Ok(())
}

impl Movement {
    fn ensure_exists(
        &self,
        tenant_id: TenantId,
        movement_id: MovementId,
    ) -> Result<(), DomainError> {
        if !self.is_created() || self.is_deleted() {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::permission_denied(
                "movement belongs to another tenant",
            ));
        }
        if self.id != movement_id {
            return Err(DomainError::invariant("movement_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateMovement) -> Result<Vec<MovementEvent>, DomainError> {
        if self.is_created() {
            return Err(DomainError::conflict("movement already exists"));
        }
        ensure_non_negative("transport_cost", cmd.transport_cost)?;

        let mut lines = Vec::with_capacity(cmd.lines.len());
        for (idx, input) in cmd.lines.iter().enumerate() {
            validate_line(input)?;
            lines.push(MovementLine {
                line_no: idx as u32 + 1,
                product_id: input.product_id,
                quantity: input.quantity,
                unit_value: input.unit_value,
                color: input.color.clone(),
            });
        }
        ensure_distinct_products(&lines)?;
        checked_total(&lines, cmd.transport_cost)?;

        Ok(vec![MovementEvent::MovementCreated(MovementCreated {
            tenant_id: cmd.tenant_id,
            movement_id: cmd.movement_id,
            supplier_id: cmd.supplier_id,
            kind: MovementKind::for_supplier(cmd.supplier_id),
            destination: cmd.destination,
            arrival_at: cmd.arrival_at,
            notes: cmd.notes.clone(),
            transport_cost: cmd.transport_cost,
            lines,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn revised_lines(&self, inputs: &[MovementLineInput]) -> Result<Vec<MovementLine>, DomainError> {
        let mut next_line_no = self.next_line_no;
        let mut lines = Vec::with_capacity(inputs.len());

        for input in inputs {
            validate_line(input)?;
            let line_no = match input.line_no {
                Some(line_no) => {
                    if find_by_id(&self.lines, &line_no).is_none() {
                        return Err(DomainError::validation(format!(
                            "movement has no line {line_no}"
                        )));
                    }
                    if find_by_id(&lines, &line_no).is_some() {
                        return Err(DomainError::validation(format!(
                            "line {line_no} is revised more than once"
                        )));
                    }
                    line_no
                }
                None => {
                    let line_no = next_line_no;
                    next_line_no += 1;
                    line_no
                }
            };
            lines.push(MovementLine {
                line_no,
                product_id: input.product_id,
                quantity: input.quantity,
                unit_value: input.unit_value,
                color: input.color.clone(),
            });
        }

        ensure_distinct_products(&lines)?;
        Ok(lines)
    }

    fn handle_revise(&self, cmd: &ReviseMovement) -> Result<Vec<MovementEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.movement_id)?;

        let touches_stock = cmd.supplier_id.is_some() || cmd.lines.is_some();
        if touches_stock && self.status != MovementStatus::Pending {
            return Err(DomainError::invariant(format!(
                "supplier and lines of a {} movement cannot be revised",
                self.status
            )));
        }

        let transport_cost = cmd.transport_cost.unwrap_or(self.transport_cost);
        ensure_non_negative("transport_cost", transport_cost)?;

        let lines = match &cmd.lines {
            Some(inputs) => self.revised_lines(inputs)?,
            None => self.lines.clone(),
        };
        checked_total(&lines, transport_cost)?;

        let (supplier_id, kind) = match cmd.supplier_id {
            Some(supplier_id) => (supplier_id, MovementKind::for_supplier(supplier_id)),
            None => (self.supplier_id, self.kind),
        };

        Ok(vec![MovementEvent::MovementRevised(MovementRevised {
            tenant_id: cmd.tenant_id,
            movement_id: cmd.movement_id,
            supplier_id,
            kind,
            destination: cmd.destination.or(self.destination),
            arrival_at: cmd.arrival_at.or(self.arrival_at),
            notes: cmd.notes.clone().or_else(|| self.notes.clone()),
            transport_cost,
            lines,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_accept(&self, cmd: &AcceptMovement) -> Result<Vec<MovementEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.movement_id)?;

        if self.status != MovementStatus::Pending {
            return Err(DomainError::invalid_transition(
                "movement",
                self.status,
                MovementStatus::Accepted,
            ));
        }

        Ok(vec![MovementEvent::MovementAccepted(MovementAccepted {
            tenant_id: cmd.tenant_id,
            movement_id: cmd.movement_id,
            kind: self.kind,
            applied: self.stock_changes(self.kind.sign(), StockReason::MovementAccepted),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectMovement) -> Result<Vec<MovementEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.movement_id)?;

        if self.status != MovementStatus::Pending {
            return Err(DomainError::invalid_transition(
                "movement",
                self.status,
                MovementStatus::Rejected,
            ));
        }

        Ok(vec![MovementEvent::MovementRejected(MovementRejected {
            tenant_id: cmd.tenant_id,
            movement_id: cmd.movement_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteMovement) -> Result<Vec<MovementEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.movement_id)?;

        let reversed = if self.status == MovementStatus::Accepted {
            self.stock_changes(-self.kind.sign(), StockReason::MovementDeleted)
        } else {
            Vec::new()
        };

        Ok(vec![MovementEvent::MovementDeleted(MovementDeleted {
            tenant_id: cmd.tenant_id,
            movement_id: cmd.movement_id,
            previous_status: self.status,
            reversed,
            occurred_at: cmd.occurred_at,
        })])
    }
}
