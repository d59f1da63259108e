//! Money as the storefront API represents it.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount from the storefront API.
///
/// The amount travels as a decimal string (e.g. `"24.99"`) alongside an
/// ISO 4217 currency code. Arithmetic goes through [`Money::decimal`],
/// which maps malformed amounts to zero so that collection totals degrade
/// gracefully instead of failing the whole computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    /// Decimal amount in the currency's standard unit (e.g. dollars).
    pub amount: String,
    /// ISO 4217 currency code (e.g. "USD", "EUR").
    pub currency_code: String,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub fn new(amount: impl Into<String>, currency_code: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            currency_code: currency_code.into(),
        }
    }

    /// Zero in the given currency.
    #[must_use]
    pub fn zero(currency_code: impl Into<String>) -> Self {
        Self::new("0", currency_code)
    }

    /// The amount as a decimal, or zero when the string does not parse.
    #[must_use]
    pub fn decimal(&self) -> Decimal {
        self.amount.trim().parse().unwrap_or(Decimal::ZERO)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency_code)
    }
}
