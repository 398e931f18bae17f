//! Request validation rules.
//!
//! All checks here run before a ledger entry exists or a provider call is
//! made: a request that fails validation leaves no trace.

use rust_decimal::Decimal;

use super::error::SettlementError;

/// Limits applied to payment requests.
#[derive(Debug, Clone)]
pub struct PaymentLimits {
    /// Smallest amount (minor units) the provider accepts.
    pub min_amount: Decimal,
    /// Largest amount (minor units) the provider accepts.
    pub max_amount: Decimal,
    /// Maximum open (pending/processing) entries per user.
    pub max_pending_entries: u64,
    /// Largest single withdrawal a user may request.
    pub max_withdrawal_amount: Decimal,
}

/// Validates an amount against form and provider bounds.
///
/// # Errors
///
/// Returns `InvalidAmount` for non-positive or fractional amounts, and
/// `AmountOutOfBounds` for amounts outside the provider's range.
pub fn validate_amount(amount: Decimal, limits: &PaymentLimits) -> Result<(), SettlementError> {
    if amount <= Decimal::ZERO || !amount.is_integer() {
        return Err(SettlementError::InvalidAmount);
    }
    if amount < limits.min_amount || amount > limits.max_amount {
        return Err(SettlementError::AmountOutOfBounds {
            amount,
            min: limits.min_amount,
            max: limits.max_amount,
        });
    }
    Ok(())
}

/// Validates an MSISDN in international format without the plus sign
/// (e.g. `256700000001`).
///
/// # Errors
///
/// Returns `InvalidDestination` when the number is malformed.
pub fn validate_destination(msisdn: &str) -> Result<(), SettlementError> {
    let valid = msisdn.len() >= 10
        && msisdn.len() <= 15
        && msisdn.bytes().all(|b| b.is_ascii_digit())
        && !msisdn.starts_with('0');

    if valid {
        Ok(())
    } else {
        Err(SettlementError::InvalidDestination(msisdn.to_string()))
    }
}

/// Validates a withdrawal against the wallet balance and the per-request
/// user limit.
///
/// # Errors
///
/// Returns `OverUserLimit` or `InsufficientBalance`.
pub fn validate_withdrawal(
    amount: Decimal,
    balance: Decimal,
    limits: &PaymentLimits,
) -> Result<(), SettlementError> {
    if amount > limits.max_withdrawal_amount {
        return Err(SettlementError::OverUserLimit {
            requested: amount,
            limit: limits.max_withdrawal_amount,
        });
    }
    if amount > balance {
        return Err(SettlementError::InsufficientBalance {
            requested: amount,
            available: balance,
        });
    }
    Ok(())
}

/// Validates the number of open entries against the concurrency limit.
///
/// # Errors
///
/// Returns `TooManyPending` when the user is at the limit.
pub fn check_open_entries(open: u64, limits: &PaymentLimits) -> Result<(), SettlementError> {
    if open >= limits.max_pending_entries {
        return Err(SettlementError::TooManyPending {
            open,
            limit: limits.max_pending_entries,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn limits() -> PaymentLimits {
        PaymentLimits {
            min_amount: dec!(500),
            max_amount: dec!(5000000),
            max_pending_entries: 3,
            max_withdrawal_amount: dec!(2000000),
        }
    }

    #[rstest]
    #[case(dec!(500))]
    #[case(dec!(1000))]
    #[case(dec!(5000000))]
    fn test_valid_amounts(#[case] amount: Decimal) {
        assert!(validate_amount(amount, &limits()).is_ok());
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-100))]
    #[case(dec!(10.5))]
    fn test_malformed_amounts(#[case] amount: Decimal) {
        assert!(matches!(
            validate_amount(amount, &limits()),
            Err(SettlementError::InvalidAmount)
        ));
    }

    #[rstest]
    #[case(dec!(499))]
    #[case(dec!(5000001))]
    fn test_out_of_bounds_amounts(#[case] amount: Decimal) {
        assert!(matches!(
            validate_amount(amount, &limits()),
            Err(SettlementError::AmountOutOfBounds { .. })
        ));
    }

    #[rstest]
    #[case("256700000001")]
    #[case("254712345678")]
    #[case("1234567890")]
    fn test_valid_destinations(#[case] msisdn: &str) {
        assert!(validate_destination(msisdn).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("0700000001")] // local format, leading zero
    #[case("25670000a001")]
    #[case("+256700000001")]
    #[case("12345")]
    #[case("1234567890123456")]
    fn test_invalid_destinations(#[case] msisdn: &str) {
        assert!(matches!(
            validate_destination(msisdn),
            Err(SettlementError::InvalidDestination(_))
        ));
    }

    #[test]
    fn test_withdrawal_over_user_limit() {
        let result = validate_withdrawal(dec!(2000001), dec!(9000000), &limits());
        assert!(matches!(result, Err(SettlementError::OverUserLimit { .. })));
    }

    #[test]
    fn test_withdrawal_insufficient_balance() {
        let result = validate_withdrawal(dec!(1500), dec!(1000), &limits());
        assert!(matches!(
            result,
            Err(SettlementError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_withdrawal_exact_balance_allowed() {
        assert!(validate_withdrawal(dec!(1000), dec!(1000), &limits()).is_ok());
    }

    #[test]
    fn test_open_entry_limit() {
        assert!(check_open_entries(2, &limits()).is_ok());
        assert!(matches!(
            check_open_entries(3, &limits()),
            Err(SettlementError::TooManyPending { open: 3, limit: 3 })
        ));
    }
}
