//! Ledger events: the facts emitted by aggregates and recorded in the journal.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
