//! Inventory domain module: products and their stock counters.
//!
//! This crate contains the stock guard (stock never goes negative) as pure,
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::{
    AdjustStock, Product, ProductCommand, ProductEvent, ProductId, ProductRegistered,
    RegisterProduct, StockAdjusted, StockEffect, StockReason, WarehouseId,
};
