use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::money::ensure_non_negative;
use stockledger_core::{
    Aggregate, AggregateId, AggregateRoot, Discount, DomainError, TenantId, TenantScoped,
};
use stockledger_events::Event;

/// Product identifier (tenant-scoped via the product's `tenant_id`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Warehouse ("almacén") identifier. Warehouses themselves are managed elsewhere.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarehouseId(pub AggregateId);

impl WarehouseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for WarehouseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Ledger operation that caused a stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    SaleLineCreated,
    SaleLineUpdated,
    SaleLineDeleted,
    SaleCancelled,
    SaleDeleted,
    MovementAccepted,
    MovementDeleted,
}

/// A stock change requested by a sale or movement transition.
///
/// Sales and movements only describe the change; it is applied by issuing
/// [`AdjustStock`] against the product inside the same unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEffect {
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: StockReason,
}

impl StockEffect {
    pub fn new(product_id: ProductId, delta: i64, reason: StockReason) -> Self {
        Self {
            product_id,
            delta,
            reason,
        }
    }
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    name: String,
    warehouse_id: Option<WarehouseId>,
    price: Decimal,
    discount: Discount,
    stock: i64,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-registered aggregate instance.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            warehouse_id: None,
            price: Decimal::ZERO,
            discount: Discount::NONE,
            stock: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn discount(&self) -> Discount {
        self.discount
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Key of the `(name, warehouse, tenant)` uniqueness constraint.
    pub fn unique_key(&self) -> Option<(TenantId, Option<WarehouseId>, &str)> {
        self.tenant_id
            .map(|tenant_id| (tenant_id, self.warehouse_id, self.name.as_str()))
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TenantScoped for Product {
    fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }
}

/// Command: RegisterProduct.
///
/// `discount` is clamped into `[0, 1]` rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: String,
    pub warehouse_id: Option<WarehouseId>,
    pub price: Decimal,
    pub discount: Decimal,
    pub initial_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock.
///
/// Positive deltas return goods to stock, negative deltas take them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: StockReason,
    /// The sale or movement that caused the adjustment.
    pub reference: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    RegisterProduct(RegisterProduct),
    AdjustStock(AdjustStock),
}

/// Event: ProductRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRegistered {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: String,
    pub warehouse_id: Option<WarehouseId>,
    pub price: Decimal,
    pub discount: Discount,
    pub initial_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    pub stock_after: i64,
    pub reason: StockReason,
    pub reference: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductRegistered(ProductRegistered),
    StockAdjusted(StockAdjusted),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductRegistered(_) => "inventory.product.registered",
            ProductEvent::StockAdjusted(_) => "inventory.product.stock_adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductRegistered(e) => e.occurred_at,
            ProductEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductRegistered(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.warehouse_id = e.warehouse_id;
                self.price = e.price;
                self.discount = e.discount;
                self.stock = e.initial_stock;
                self.created = true;
            }
            ProductEvent::StockAdjusted(e) => {
                self.stock = e.stock_after;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::RegisterProduct(cmd) => self.handle_register(cmd),
            ProductCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
        }
    }
}

impl Product {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::permission_denied(
                "product belongs to another tenant",
            ));
        }
        Ok(())
    }

    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.is_created() {
            return Err(DomainError::conflict("product already exists"));
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if name.chars().count() > 100 {
            return Err(DomainError::validation("name cannot exceed 100 characters"));
        }
        ensure_non_negative("price", cmd.price)?;
        if cmd.initial_stock < 0 {
            return Err(DomainError::validation("initial_stock cannot be negative"));
        }

        Ok(vec![ProductEvent::ProductRegistered(ProductRegistered {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            name: name.to_string(),
            warehouse_id: cmd.warehouse_id,
            price: cmd.price,
            discount: Discount::clamped(cmd.discount),
            initial_stock: cmd.initial_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.is_created() {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_product_id(cmd.product_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        let stock_after = self
            .stock
            .checked_add(cmd.delta)
            .ok_or_else(|| DomainError::validation("stock adjustment overflows"))?;
        if stock_after < 0 {
            return Err(DomainError::insufficient_stock(
                self.id.0,
                self.stock,
                -cmd.delta,
            ));
        }

        Ok(vec![ProductEvent::StockAdjusted(StockAdjusted {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            delta: cmd.delta,
            stock_after,
            reason: cmd.reason,
            reference: cmd.reference,
            occurred_at: cmd.occurred_at,
        })])
    }
}
