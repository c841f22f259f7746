//! Money helpers and the discount fraction value.
//!
//! Never use floating point for amounts: everything here is `rust_decimal`.
//! Amounts are kept at full precision while line subtotals are summed and are
//! rounded once, on the final total.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Number of decimal places persisted for totals.
pub const MONEY_SCALE: u32 = 2;

/// Round an amount to [`MONEY_SCALE`] places (banker's rounding).
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp(MONEY_SCALE)
}

/// Largest accepted price, unit value, cost or payment: ten digits, two of
/// them decimals (`99999999.99`).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0x540B_E3FF, 2, 0, false, MONEY_SCALE);

fn ensure_within_bound(field: &str, amount: Decimal) -> DomainResult<()> {
    if amount > MAX_AMOUNT {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {MAX_AMOUNT}"
        )));
    }
    Ok(())
}

/// `0 <= amount <= MAX_AMOUNT`.
pub fn ensure_non_negative(field: &str, amount: Decimal) -> DomainResult<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    ensure_within_bound(field, amount)
}

/// `0 < amount <= MAX_AMOUNT`.
pub fn ensure_positive(field: &str, amount: Decimal) -> DomainResult<()> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} must be positive")));
    }
    ensure_within_bound(field, amount)
}

/// `quantity × unit_price × (1 − discount)`, unrounded. Saturates instead of
/// overflowing; commands go through [`checked_subtotal`] first.
pub fn discounted_subtotal(quantity: i64, unit_price: Decimal, discount: Discount) -> Decimal {
    Decimal::from(quantity)
        .saturating_mul(unit_price)
        .saturating_mul(discount.complement())
}

/// [`discounted_subtotal`] that reports overflow as a validation error.
pub fn checked_subtotal(
    quantity: i64,
    unit_price: Decimal,
    discount: Discount,
) -> DomainResult<Decimal> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .and_then(|amount| amount.checked_mul(discount.complement()))
        .ok_or_else(|| DomainError::validation("line amount is too large"))
}

/// Sum of amounts, failing on the first error or on overflow.
pub fn checked_sum<I>(amounts: I) -> DomainResult<Decimal>
where
    I: IntoIterator<Item = DomainResult<Decimal>>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, |total, amount| {
        total
            .checked_add(amount?)
            .ok_or_else(|| DomainError::validation("total is too large"))
    })
}

/// A discount expressed as a fraction in `[0, 1]` (`0.10` is 10%).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Discount(Decimal);

impl Discount {
    pub const NONE: Discount = Discount(Decimal::ZERO);

    /// Strict constructor: out-of-range fractions are a validation error.
    pub fn new(fraction: Decimal) -> DomainResult<Self> {
        if fraction < Decimal::ZERO || fraction > Decimal::ONE {
            return Err(DomainError::validation(format!(
                "discount must be between 0 and 1, got {fraction}"
            )));
        }
        Ok(Self(fraction.normalize()))
    }

    /// Lenient constructor used for catalogue prices: clamps into `[0, 1]`.
    pub fn clamped(fraction: Decimal) -> Self {
        Self(fraction.clamp(Decimal::ZERO, Decimal::ONE).normalize())
    }

    pub fn fraction(&self) -> Decimal {
        self.0
    }

    /// `1 − fraction`.
    pub fn complement(&self) -> Decimal {
        Decimal::ONE - self.0
    }
}

impl Default for Discount {
    fn default() -> Self {
        Self::NONE
    }
}

impl TryFrom<Decimal> for Discount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Discount> for Decimal {
    fn from(value: Discount) -> Self {
        value.0
    }
}

impl core::fmt::Display for Discount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl ValueObject for Discount {}
