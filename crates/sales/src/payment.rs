//! Payment attached to a sale.
//!
//! Only the ledger-facing part of a payment lives here: amount, method and
//! status. Gateway integration is handled elsewhere.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::ValueObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Stripe,
    Qr,
    Cash,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// Gateway or bank transaction reference, when one exists.
    pub reference: Option<String>,
    pub status: PaymentStatus,
    pub recorded_at: DateTime<Utc>,
}

impl ValueObject for Payment {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_and_status_use_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Transfer).unwrap(),
            "\"transfer\""
        );
        let status: PaymentStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, PaymentStatus::Completed);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
    }
}
