use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A non-negative monetary amount, kept at two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Parse an amount as it appears next to a label, e.g. `1,234.56`.
    /// Thousands separators are stripped; negative or malformed input is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let clean = s.trim().replace(',', "");
        let dec = Decimal::from_str(&clean).ok()?;
        if dec.is_sign_negative() && !dec.is_zero() {
            return None;
        }
        Some(Money(dec.round_dp(2)))
    }

    pub fn from_decimal(decimal: Decimal) -> Option<Self> {
        if decimal.is_sign_negative() && !decimal.is_zero() {
            return None;
        }
        Some(Money(decimal.round_dp(2)))
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    /// `None` when the sum does not fit in a `Decimal`.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Money)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = String;
    fn try_from(decimal: Decimal) -> Result<Self, Self::Error> {
        Money::from_decimal(decimal).ok_or_else(|| format!("Negative amount: {decimal}"))
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
