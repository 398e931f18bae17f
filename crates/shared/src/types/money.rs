//! Money type with decimal precision and currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! This type wraps `rust_decimal::Decimal` for arbitrary precision.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Represents a monetary amount with currency.
///
/// Uses `Decimal` internally to avoid floating-point precision errors.
/// Amounts are denominated in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount in the smallest currency unit.
    pub amount: Decimal,
    /// ISO 4217 currency code (e.g., "UGX", "KES").
    pub currency: Currency,
}

/// ISO 4217 currency codes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Ugandan Shilling
    Ugx,
    /// Kenyan Shilling
    Kes,
    /// Tanzanian Shilling
    Tzs,
    /// Rwandan Franc
    Rwf,
    /// US Dollar
    Usd,
}

impl Money {
    /// Creates a new Money instance.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative()
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.currency, self.amount)
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ugx => write!(f, "UGX"),
            Self::Kes => write!(f, "KES"),
            Self::Tzs => write!(f, "TZS"),
            Self::Rwf => write!(f, "RWF"),
            Self::Usd => write!(f, "USD"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UGX" => Ok(Self::Ugx),
            "KES" => Ok(Self::Kes),
            "TZS" => Ok(Self::Tzs),
            "RWF" => Ok(Self::Rwf),
            "USD" => Ok(Self::Usd),
            _ => Err(format!("Unknown currency: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn test_money_new() {
        let amount = dec!(5000);
        let money = Money::new(amount, Currency::Ugx);
        assert_eq!(money.amount, amount);
        assert_eq!(money.currency, Currency::Ugx);
    }

    #[test]
    fn test_money_zero() {
        let money = Money::zero(Currency::Kes);
        assert!(money.is_zero());
        assert!(!money.is_positive());
        assert_eq!(money.currency, Currency::Kes);
    }

    #[test]
    fn test_money_signs() {
        assert!(Money::new(dec!(10), Currency::Ugx).is_positive());
        assert!(!Money::new(dec!(10), Currency::Ugx).is_negative());
        assert!(Money::new(dec!(-10), Currency::Ugx).is_negative());
        assert!(!Money::new(dec!(0), Currency::Ugx).is_positive());
    }

    #[test]
    fn test_money_display() {
        let money = Money::new(dec!(5000), Currency::Ugx);
        assert_eq!(money.to_string(), "UGX 5000");
    }

    #[test]
    fn test_currency_display() {
        assert_eq!(Currency::Ugx.to_string(), "UGX");
        assert_eq!(Currency::Kes.to_string(), "KES");
        assert_eq!(Currency::Tzs.to_string(), "TZS");
        assert_eq!(Currency::Rwf.to_string(), "RWF");
        assert_eq!(Currency::Usd.to_string(), "USD");
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!(Currency::from_str("UGX").unwrap(), Currency::Ugx);
        assert_eq!(Currency::from_str("ugx").unwrap(), Currency::Ugx);
        assert_eq!(Currency::from_str("KES").unwrap(), Currency::Kes);

        assert!(Currency::from_str("XXX").is_err());
        assert!(Currency::from_str("").is_err());
    }
}
