//! Caller-facing inputs of ledger operations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Discount, UserId};
use stockledger_inventory::{ProductId, WarehouseId};
use stockledger_movements::{MovementLineInput, SupplierId};
use stockledger_sales::{PaymentMethod, PaymentStatus, SaleOrigin};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub warehouse_id: Option<WarehouseId>,
    pub price: Decimal,
    /// Clamped into `[0, 1]`.
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub initial_stock: i64,
}

/// A line to put on a sale. Price and discount default to the product's
/// catalogue values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineDraft {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Discount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLinePatch {
    pub quantity: Option<i64>,
    pub unit_price: Option<Decimal>,
    pub discount: Option<Discount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSale {
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub origin: SaleOrigin,
    #[serde(default)]
    pub lines: Vec<SaleLineDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    #[serde(default)]
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub supplier_id: Option<SupplierId>,
    pub destination: Option<WarehouseId>,
    pub arrival_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[serde(default)]
    pub transport_cost: Decimal,
    #[serde(default)]
    pub lines: Vec<MovementLineInput>,
}

/// Partial update of a movement. `supplier_id: Some(None)` clears the supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementRevision {
    pub destination: Option<WarehouseId>,
    pub arrival_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub transport_cost: Option<Decimal>,
    pub supplier_id: Option<Option<SupplierId>>,
    pub lines: Option<Vec<MovementLineInput>>,
}
