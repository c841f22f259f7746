use thiserror::Error;

use stockledger_core::DomainError;

use crate::event_store::EventStoreError;

/// Error returned by every ledger operation.
///
/// Domain failures pass through untouched; store failures are narrowed to
/// the cases callers can act on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Lost an optimistic concurrency race more often than the retry budget allows.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored stream could not be replayed (bad payload, gaps, foreign entries).
    #[error("corrupt event stream: {0}")]
    Corrupt(String),
}

impl From<EventStoreError> for LedgerError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => LedgerError::Concurrency(msg),
            EventStoreError::UniqueViolation(msg) => LedgerError::UniqueViolation(msg),
            EventStoreError::Unavailable(msg) => LedgerError::Unavailable(msg),
            EventStoreError::TenantIsolation(msg) => {
                LedgerError::Domain(DomainError::PermissionDenied(msg))
            }
            EventStoreError::AggregateTypeMismatch(msg) | EventStoreError::InvalidAppend(msg) => {
                LedgerError::Corrupt(msg)
            }
        }
    }
}

impl LedgerError {
    pub fn is_concurrency(&self) -> bool {
        matches!(self, LedgerError::Concurrency(_))
    }
}
