use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use stockledger_core::{AggregateId, AggregateRoot, Discount, UserId};
use stockledger_infra::event_store::{EventFilter, StoredEvent};
use stockledger_infra::ledger::{
    MovementRevision, NewMovement, NewPayment, NewProduct, NewSale, SaleLineDraft, SaleLinePatch,
};
use stockledger_inventory::{Product, ProductId, WarehouseId};
use stockledger_movements::{Movement, MovementLineInput, SupplierId};
use stockledger_sales::{PaymentMethod, PaymentStatus, Sale, SaleOrigin};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub warehouse_id: Option<String>,
    pub price: Decimal,
    pub discount: Option<Decimal>,
    pub initial_stock: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Option<Decimal>,
    pub discount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    pub user_id: Option<String>,
    pub origin: Option<SaleOrigin>,
    #[serde(default)]
    pub lines: Vec<SaleLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceSaleLinesRequest {
    pub lines: Vec<SaleLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSaleLineRequest {
    pub quantity: Option<i64>,
    pub unit_price: Option<Decimal>,
    pub discount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Deserialize)]
pub struct MovementLineRequest {
    pub line_no: Option<u32>,
    pub product_id: String,
    pub quantity: i64,
    pub unit_value: Decimal,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMovementRequest {
    pub supplier_id: Option<String>,
    pub destination: Option<String>,
    pub arrival_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub transport_cost: Option<Decimal>,
    #[serde(default)]
    pub lines: Vec<MovementLineRequest>,
}

/// Partial update; `"supplier_id": null` clears the supplier, omitting it
/// keeps the current one.
#[derive(Debug, Deserialize)]
pub struct ReviseMovementRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub supplier_id: Option<Option<String>>,
    pub destination: Option<String>,
    pub arrival_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub transport_cost: Option<Decimal>,
    pub lines: Option<Vec<MovementLineRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub aggregate_id: Option<String>,
    pub aggregate_type: Option<String>,
    pub event_type: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// -------------------------
// Request → ledger input
// -------------------------

pub fn parse_id(raw: &str, what: &str) -> Result<AggregateId, axum::response::Response> {
    raw.parse().map_err(|_| errors::invalid_id(what))
}

fn parse_opt_id(raw: Option<&str>, what: &str) -> Result<Option<AggregateId>, axum::response::Response> {
    raw.map(|r| parse_id(r, what)).transpose()
}

fn parse_discount(raw: Option<Decimal>) -> Result<Option<Discount>, axum::response::Response> {
    raw.map(Discount::new)
        .transpose()
        .map_err(errors::domain_error_to_response)
}

impl CreateProductRequest {
    pub fn into_input(self) -> Result<NewProduct, axum::response::Response> {
        Ok(NewProduct {
            name: self.name,
            warehouse_id: parse_opt_id(self.warehouse_id.as_deref(), "warehouse")?.map(WarehouseId::new),
            price: self.price,
            discount: self.discount.unwrap_or_default(),
            initial_stock: self.initial_stock.unwrap_or_default(),
        })
    }
}

impl SaleLineRequest {
    pub fn into_draft(self) -> Result<SaleLineDraft, axum::response::Response> {
        Ok(SaleLineDraft {
            product_id: ProductId::new(parse_id(&self.product_id, "product")?),
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount: parse_discount(self.discount)?,
        })
    }
}

pub fn into_drafts(lines: Vec<SaleLineRequest>) -> Result<Vec<SaleLineDraft>, axum::response::Response> {
    lines.into_iter().map(SaleLineRequest::into_draft).collect()
}

impl CreateSaleRequest {
    pub fn into_input(self) -> Result<NewSale, axum::response::Response> {
        let user_id = match self.user_id.as_deref() {
            Some(raw) => Some(raw.parse::<UserId>().map_err(|_| errors::invalid_id("user"))?),
            None => None,
        };
        Ok(NewSale {
            user_id,
            origin: self.origin.unwrap_or_default(),
            lines: into_drafts(self.lines)?,
        })
    }
}

impl UpdateSaleLineRequest {
    pub fn into_patch(self) -> Result<SaleLinePatch, axum::response::Response> {
        Ok(SaleLinePatch {
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount: parse_discount(self.discount)?,
        })
    }
}

impl RecordPaymentRequest {
    pub fn into_input(self) -> NewPayment {
        NewPayment {
            amount: self.amount,
            method: self.method,
            reference: self.reference,
            status: self.status.unwrap_or_default(),
        }
    }
}

impl MovementLineRequest {
    pub fn into_input(self) -> Result<MovementLineInput, axum::response::Response> {
        Ok(MovementLineInput {
            line_no: self.line_no,
            product_id: ProductId::new(parse_id(&self.product_id, "product")?),
            quantity: self.quantity,
            unit_value: self.unit_value,
            color: self.color,
        })
    }
}

fn into_movement_lines(
    lines: Vec<MovementLineRequest>,
) -> Result<Vec<MovementLineInput>, axum::response::Response> {
    lines.into_iter().map(MovementLineRequest::into_input).collect()
}

impl CreateMovementRequest {
    pub fn into_input(self) -> Result<NewMovement, axum::response::Response> {
        Ok(NewMovement {
            supplier_id: parse_opt_id(self.supplier_id.as_deref(), "supplier")?.map(SupplierId::new),
            destination: parse_opt_id(self.destination.as_deref(), "warehouse")?.map(WarehouseId::new),
            arrival_at: self.arrival_at,
            notes: self.notes,
            transport_cost: self.transport_cost.unwrap_or_default(),
            lines: into_movement_lines(self.lines)?,
        })
    }
}

impl ReviseMovementRequest {
    pub fn into_revision(self) -> Result<MovementRevision, axum::response::Response> {
        let supplier_id = match self.supplier_id {
            Some(inner) => Some(parse_opt_id(inner.as_deref(), "supplier")?.map(SupplierId::new)),
            None => None,
        };
        Ok(MovementRevision {
            destination: parse_opt_id(self.destination.as_deref(), "warehouse")?.map(WarehouseId::new),
            arrival_at: self.arrival_at,
            notes: self.notes,
            transport_cost: self.transport_cost,
            supplier_id,
            lines: self.lines.map(into_movement_lines).transpose()?,
        })
    }
}

impl ActivityQuery {
    pub fn filter(&self) -> Result<EventFilter, axum::response::Response> {
        Ok(EventFilter {
            aggregate_id: parse_opt_id(self.aggregate_id.as_deref(), "aggregate")?,
            aggregate_type: self.aggregate_type.clone(),
            event_type: self.event_type.clone(),
        })
    }
}

// -------------------------
// Response mapping
// -------------------------

pub fn product_to_json(p: &Product) -> serde_json::Value {
    serde_json::json!({
        "id": p.id_typed().to_string(),
        "name": p.name(),
        "warehouse_id": p.warehouse_id().map(|w| w.to_string()),
        "price": p.price(),
        "discount": p.discount().fraction(),
        "stock": p.stock(),
        "version": p.version(),
    })
}

pub fn sale_to_json(s: &Sale) -> serde_json::Value {
    let lines = s
        .lines()
        .iter()
        .map(|l| {
            serde_json::json!({
                "line_no": l.line_no,
                "product_id": l.product_id.to_string(),
                "quantity": l.quantity,
                "unit_price": l.unit_price,
                "discount": l.discount.fraction(),
                "subtotal": l.subtotal(),
            })
        })
        .collect::<Vec<_>>();

    serde_json::json!({
        "id": s.id_typed().to_string(),
        "user_id": s.user_id().map(|u| u.to_string()),
        "origin": s.origin(),
        "status": s.status().to_string(),
        "lines": lines,
        "total": s.total(),
        "payment": s.payment(),
        "created_at": s.created_at(),
        "version": s.version(),
    })
}

pub fn movement_to_json(m: &Movement) -> serde_json::Value {
    let lines = m
        .lines()
        .iter()
        .map(|l| {
            serde_json::json!({
                "line_no": l.line_no,
                "product_id": l.product_id.to_string(),
                "quantity": l.quantity,
                "unit_value": l.unit_value,
                "color": l.color,
            })
        })
        .collect::<Vec<_>>();

    serde_json::json!({
        "id": m.id_typed().to_string(),
        "supplier_id": m.supplier_id().map(|s| s.0.to_string()),
        "destination": m.destination().map(|w| w.to_string()),
        "arrival_at": m.arrival_at(),
        "notes": m.notes(),
        "kind": m.kind(),
        "status": m.status().to_string(),
        "transport_cost": m.transport_cost(),
        "lines": lines,
        "total": m.total(),
        "version": m.version(),
    })
}

pub fn event_to_json(e: &StoredEvent) -> serde_json::Value {
    serde_json::json!({
        "position": e.position(),
        "event_id": e.event_id().to_string(),
        "aggregate_id": e.aggregate_id().to_string(),
        "aggregate_type": e.aggregate_type(),
        "sequence_number": e.sequence_number(),
        "event_type": e.event_type(),
        "actor": e.actor().to_string(),
        "occurred_at": e.occurred_at(),
        "payload": e.payload(),
    })
}
