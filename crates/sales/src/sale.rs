use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::money::{
    checked_subtotal, checked_sum, discounted_subtotal, ensure_non_negative, round_money,
};
use stockledger_core::entity::find_by_id;
use stockledger_core::{
    Aggregate, AggregateId, AggregateRoot, Discount, DomainError, Entity, TenantId, TenantScoped,
    UserId,
};
use stockledger_events::Event;
use stockledger_inventory::{ProductId, StockEffect, StockReason};

use crate::payment::Payment;

/// Sale identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub AggregateId);

impl SaleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SaleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Sale status lifecycle.
///
/// `Pending -> Completed`, and `Pending | Completed -> Cancelled`. Nothing
/// ever returns to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Pending,
    Completed,
    Cancelled,
}

impl core::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Where the sale was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleOrigin {
    #[default]
    Manual,
    Marketplace,
}

/// Sale line: product, quantity, unit price and discount fraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub discount: Discount,
}

impl Entity for SaleLine {
    type Id = u32;

    fn id(&self) -> &u32 {
        &self.line_no
    }
}

impl SaleLine {
    /// Unrounded `quantity × unit_price × (1 − discount)`.
    pub fn subtotal(&self) -> Decimal {
        discounted_subtotal(self.quantity, self.unit_price, self.discount)
    }
}

/// Sum of line subtotals, rounded once to money scale.
pub fn compute_total(lines: &[SaleLine]) -> Decimal {
    round_money(
        lines
            .iter()
            .map(SaleLine::subtotal)
            .fold(Decimal::ZERO, Decimal::saturating_add),
    )
}

/// [`compute_total`] that rejects lines whose amounts overflow.
pub fn checked_total<'a, I>(lines: I) -> Result<Decimal, DomainError>
where
    I: IntoIterator<Item = &'a SaleLine>,
{
    checked_sum(
        lines
            .into_iter()
            .map(|l| checked_subtotal(l.quantity, l.unit_price, l.discount)),
    )
    .map(round_money)
}

/// Aggregate root: Sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    id: SaleId,
    tenant_id: Option<TenantId>,
    user_id: Option<UserId>,
    origin: SaleOrigin,
    status: SaleStatus,
    lines: Vec<SaleLine>,
    next_line_no: u32,
    total: Decimal,
    payment: Option<Payment>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Sale {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            tenant_id: None,
            user_id: None,
            origin: SaleOrigin::Manual,
            status: SaleStatus::Pending,
            lines: Vec::new(),
            next_line_no: 1,
            total: Decimal::ZERO,
            payment: None,
            created_at: None,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn origin(&self) -> SaleOrigin {
        self.origin
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn line(&self, line_no: u32) -> Option<&SaleLine> {
        find_by_id(&self.lines, &line_no)
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn payment(&self) -> Option<&Payment> {
        self.payment.as_ref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, SaleStatus::Pending)
    }

    fn recompute_total(&mut self) {
        self.total = compute_total(&self.lines);
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TenantScoped for Sale {
    fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }
}

/// Command: CreateSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub user_id: Option<UserId>,
    pub origin: SaleOrigin,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddSaleLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSaleLine {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub discount: Discount,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateSaleLine. `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSaleLine {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub line_no: u32,
    pub quantity: Option<i64>,
    pub unit_price: Option<Decimal>,
    pub discount: Option<Discount>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveSaleLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveSaleLine {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub payment: Payment,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    CreateSale(CreateSale),
    AddSaleLine(AddSaleLine),
    UpdateSaleLine(UpdateSaleLine),
    RemoveSaleLine(RemoveSaleLine),
    CompleteSale(CompleteSale),
    CancelSale(CancelSale),
    DeleteSale(DeleteSale),
    RecordPayment(RecordPayment),
}

/// Event: SaleCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCreated {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub user_id: Option<UserId>,
    pub origin: SaleOrigin,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleLineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineAdded {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub line: SaleLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleLineUpdated. Carries the previous quantity so the stock delta
/// can be derived from the event alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineUpdated {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub line_no: u32,
    pub product_id: ProductId,
    pub previous_quantity: i64,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub discount: Discount,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleLineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineRemoved {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCompleted {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCancelled {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub previous_status: SaleStatus,
    pub restocked: Vec<StockEffect>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleDeleted. `restocked` is empty for cancelled sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDeleted {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub restocked: Vec<StockEffect>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub payment: Payment,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SaleCreated(SaleCreated),
    SaleLineAdded(SaleLineAdded),
    SaleLineUpdated(SaleLineUpdated),
    SaleLineRemoved(SaleLineRemoved),
    SaleCompleted(SaleCompleted),
    SaleCancelled(SaleCancelled),
    SaleDeleted(SaleDeleted),
    PaymentRecorded(PaymentRecorded),
}

impl SaleEvent {
    /// Stock changes implied by this event. Selling takes stock out,
    /// returning a line puts it back.
    pub fn stock_effects(&self) -> Vec<StockEffect> {
        match self {
            SaleEvent::SaleLineAdded(e) => vec![StockEffect::new(
                e.line.product_id,
                -e.line.quantity,
                StockReason::SaleLineCreated,
            )],
            SaleEvent::SaleLineUpdated(e) => {
                let delta = e.previous_quantity - e.quantity;
                if delta == 0 {
                    Vec::new()
                } else {
                    vec![StockEffect::new(
                        e.product_id,
                        delta,
                        StockReason::SaleLineUpdated,
                    )]
                }
            }
            SaleEvent::SaleLineRemoved(e) => vec![StockEffect::new(
                e.product_id,
                e.quantity,
                StockReason::SaleLineDeleted,
            )],
            SaleEvent::SaleCancelled(e) => e.restocked.clone(),
            SaleEvent::SaleDeleted(e) => e.restocked.clone(),
            SaleEvent::SaleCreated(_)
            | SaleEvent::SaleCompleted(_)
            | SaleEvent::PaymentRecorded(_) => Vec::new(),
        }
    }
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleCreated(_) => "sales.sale.created",
            SaleEvent::SaleLineAdded(_) => "sales.sale.line_added",
            SaleEvent::SaleLineUpdated(_) => "sales.sale.line_updated",
            SaleEvent::SaleLineRemoved(_) => "sales.sale.line_removed",
            SaleEvent::SaleCompleted(_) => "sales.sale.completed",
            SaleEvent::SaleCancelled(_) => "sales.sale.cancelled",
            SaleEvent::SaleDeleted(_) => "sales.sale.deleted",
            SaleEvent::PaymentRecorded(_) => "sales.sale.payment_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SaleCreated(e) => e.occurred_at,
            SaleEvent::SaleLineAdded(e) => e.occurred_at,
            SaleEvent::SaleLineUpdated(e) => e.occurred_at,
            SaleEvent::SaleLineRemoved(e) => e.occurred_at,
            SaleEvent::SaleCompleted(e) => e.occurred_at,
            SaleEvent::SaleCancelled(e) => e.occurred_at,
            SaleEvent::SaleDeleted(e) => e.occurred_at,
            SaleEvent::PaymentRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SaleCreated(e) => {
                self.id = e.sale_id;
                self.tenant_id = Some(e.tenant_id);
                self.user_id = e.user_id;
                self.origin = e.origin;
                self.status = SaleStatus::Pending;
                self.lines.clear();
                self.next_line_no = 1;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            SaleEvent::SaleLineAdded(e) => {
                self.next_line_no = self.next_line_no.max(e.line.line_no + 1);
                self.lines.push(e.line.clone());
            }
            SaleEvent::SaleLineUpdated(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.quantity = e.quantity;
                    line.unit_price = e.unit_price;
                    line.discount = e.discount;
                }
            }
            SaleEvent::SaleLineRemoved(e) => {
                self.lines.retain(|l| l.line_no != e.line_no);
            }
            SaleEvent::SaleCompleted(_) => {
                self.status = SaleStatus::Completed;
            }
            SaleEvent::SaleCancelled(_) => {
                self.status = SaleStatus::Cancelled;
            }
            SaleEvent::SaleDeleted(_) => {
                self.deleted = true;
            }
            SaleEvent::PaymentRecorded(e) => {
                self.payment = Some(e.payment.clone());
            }
        }

        self.recompute_total();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::CreateSale(cmd) => self.handle_create(cmd),
            SaleCommand::AddSaleLine(cmd) => self.handle_add_line(cmd),
            SaleCommand::UpdateSaleLine(cmd) => self.handle_update_line(cmd),
            SaleCommand::RemoveSaleLine(cmd) => self.handle_remove_line(cmd),
            SaleCommand::CompleteSale(cmd) => self.handle_complete(cmd),
            SaleCommand::CancelSale(cmd) => self.handle_cancel(cmd),
            SaleCommand::DeleteSale(cmd) => self.handle_delete(cmd),
            SaleCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
        }
    }
}

impl Sale {
    fn ensure_exists(&self, tenant_id: TenantId, sale_id: SaleId) -> Result<(), DomainError> {
        if !self.is_created() || self.is_deleted() {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::permission_denied(
                "sale belongs to another tenant",
            ));
        }
        if self.id != sale_id {
            return Err(DomainError::invariant("sale_id mismatch"));
        }
        Ok(())
    }

    fn ensure_modifiable(&self) -> Result<(), DomainError> {
        if !self.is_modifiable() {
            return Err(DomainError::invariant(format!(
                "cannot modify lines of a {} sale",
                self.status
            )));
        }
        Ok(())
    }

    fn find_line(&self, line_no: u32) -> Result<&SaleLine, DomainError> {
        self.line(line_no).ok_or_else(DomainError::not_found)
    }

    fn restock_all(&self, reason: StockReason) -> Vec<StockEffect> {
        self.lines
            .iter()
            .map(|l| StockEffect::new(l.product_id, l.quantity, reason))
            .collect()
    }

    fn handle_create(&self, cmd: &CreateSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.is_created() {
            return Err(DomainError::conflict("sale already exists"));
        }

        Ok(vec![SaleEvent::SaleCreated(SaleCreated {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            user_id: cmd.user_id,
            origin: cmd.origin,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddSaleLine) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.sale_id)?;
        self.ensure_modifiable()?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        ensure_non_negative("unit_price", cmd.unit_price)?;

        if self.lines.iter().any(|l| l.product_id == cmd.product_id) {
            return Err(DomainError::conflict(format!(
                "product {} is already on this sale",
                cmd.product_id
            )));
        }

        let line = SaleLine {
            line_no: self.next_line_no,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            discount: cmd.discount,
        };
        checked_total(self.lines.iter().chain(std::iter::once(&line)))?;

        Ok(vec![SaleEvent::SaleLineAdded(SaleLineAdded {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            line,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_line(&self, cmd: &UpdateSaleLine) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.sale_id)?;
        self.ensure_modifiable()?;

        if cmd.quantity.is_none() && cmd.unit_price.is_none() && cmd.discount.is_none() {
            return Err(DomainError::validation("nothing to update"));
        }

        let line = self.find_line(cmd.line_no)?;
        let quantity = cmd.quantity.unwrap_or(line.quantity);
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let unit_price = cmd.unit_price.unwrap_or(line.unit_price);
        ensure_non_negative("unit_price", unit_price)?;
        let discount = cmd.discount.unwrap_or(line.discount);

        let updated = SaleLine {
            quantity,
            unit_price,
            discount,
            ..line.clone()
        };
        checked_total(self.lines.iter().map(|l| {
            if l.line_no == updated.line_no { &updated } else { l }
        }))?;

        Ok(vec![SaleEvent::SaleLineUpdated(SaleLineUpdated {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            line_no: line.line_no,
            product_id: line.product_id,
            previous_quantity: line.quantity,
            quantity,
            unit_price,
            discount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveSaleLine) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.sale_id)?;
        self.ensure_modifiable()?;

        let line = self.find_line(cmd.line_no)?;

        Ok(vec![SaleEvent::SaleLineRemoved(SaleLineRemoved {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            line_no: line.line_no,
            product_id: line.product_id,
            quantity: line.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteSale) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.sale_id)?;

        if self.status != SaleStatus::Pending {
            return Err(DomainError::invalid_transition(
                "sale",
                self.status,
                SaleStatus::Completed,
            ));
        }
        if self.lines.is_empty() {
            return Err(DomainError::invariant("cannot complete a sale without lines"));
        }

        Ok(vec![SaleEvent::SaleCompleted(SaleCompleted {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelSale) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.sale_id)?;

        // Cancelling twice must not restock twice.
        if self.status == SaleStatus::Cancelled {
            return Ok(Vec::new());
        }

        Ok(vec![SaleEvent::SaleCancelled(SaleCancelled {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            previous_status: self.status,
            restocked: self.restock_all(StockReason::SaleCancelled),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteSale) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.sale_id)?;

        let restocked = if self.status == SaleStatus::Cancelled {
            Vec::new()
        } else {
            self.restock_all(StockReason::SaleDeleted)
        };

        Ok(vec![SaleEvent::SaleDeleted(SaleDeleted {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            restocked,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_payment(&self, cmd: &RecordPayment) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.sale_id)?;

        if self.status == SaleStatus::Cancelled {
            return Err(DomainError::invariant(
                "cannot record a payment for a cancelled sale",
            ));
        }
        if self.payment.is_some() {
            return Err(DomainError::conflict("sale already has a payment"));
        }
        ensure_non_negative("amount", cmd.payment.amount)?;

        Ok(vec![SaleEvent::PaymentRecorded(PaymentRecorded {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            payment: cmd.payment.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
