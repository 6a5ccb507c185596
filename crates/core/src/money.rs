//! Fixed-point money helpers.
//!
//! All amounts are `rust_decimal::Decimal`; floating point never touches a
//! balance. Amounts are normalised to two decimal places at the boundary so
//! thousands of ledger entries cannot accumulate rounding drift.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Monetary amount (currency is implicit per deployment).
pub type Money = Decimal;

/// Number of fractional digits kept for stored amounts.
pub const MONEY_SCALE: u32 = 2;

/// Round to the stored money scale (banker's rounding, as the database does).
pub fn normalize(amount: Money) -> Money {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// `quantity × unit_cost`, normalised.
pub fn line_total(quantity: i64, unit_cost: Money) -> Money {
    normalize(Decimal::from(quantity) * unit_cost)
}

pub fn ensure_positive(field: &str, amount: Money) -> DomainResult<()> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "{field} must be greater than zero (got {amount})"
        )));
    }
    Ok(())
}

pub fn ensure_non_negative(field: &str, amount: Money) -> DomainResult<()> {
    if amount < Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "{field} cannot be negative (got {amount})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn line_total_is_rounded_to_cents() {
        assert_eq!(line_total(3, dec!(0.335)), dec!(1.00));
        assert_eq!(line_total(10, dec!(50)), dec!(500));
    }

    #[test]
    fn zero_is_not_positive() {
        assert!(ensure_positive("amount", Decimal::ZERO).is_err());
        assert!(ensure_non_negative("cost_price", Decimal::ZERO).is_ok());
        assert!(ensure_non_negative("cost_price", dec!(-0.01)).is_err());
    }
}
