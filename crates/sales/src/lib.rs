//! Sales domain module (event-sourced).
//!
//! A sale owns its line items and its derived total. Line mutations describe
//! the stock they take or return as [`StockEffect`](stockledger_inventory::StockEffect)s;
//! the ledger applies those to products in the same unit of work.

pub mod payment;
pub mod sale;

pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use sale::{
    AddSaleLine, CancelSale, CompleteSale, CreateSale, DeleteSale, PaymentRecorded,
    RecordPayment, RemoveSaleLine, Sale, SaleCancelled, SaleCommand, SaleCompleted, SaleCreated,
    SaleDeleted, SaleEvent, SaleId, SaleLine, SaleLineAdded, SaleLineRemoved, SaleLineUpdated,
    SaleOrigin, SaleStatus, UpdateSaleLine,
};
