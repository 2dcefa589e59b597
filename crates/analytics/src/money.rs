//! Monetary arithmetic

use rust_decimal::{Decimal, RoundingStrategy};
use spendboard_common::errors::{AppError, Result};

/// Round to cents, halves away from zero
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Add `amount` to `total`, failing instead of overflowing
pub fn accumulate(total: &mut Decimal, amount: Decimal) -> Result<()> {
    *total = total.checked_add(amount).ok_or_else(|| AppError::Internal {
        message: format!("amount overflow adding {} to {}", amount, total),
    })?;
    Ok(())
}

/// Sum of the present amounts; missing ones count as zero
pub fn sum<I>(amounts: I) -> Result<Decimal>
where
    I: IntoIterator<Item = Option<Decimal>>,
{
    let mut total = Decimal::ZERO;
    for amount in amounts.into_iter().flatten() {
        accumulate(&mut total, amount)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(round_cents(Decimal::new(-12345, 3)), Decimal::new(-1235, 2));
        assert_eq!(round_cents(Decimal::new(100, 0)), Decimal::from(100));
    }

    #[test]
    fn test_sum_is_exact() {
        let tenth = Some(Decimal::new(1, 1));
        let total = sum(std::iter::repeat(tenth).take(10).chain([None])).unwrap();
        assert_eq!(total, Decimal::ONE);
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(matches!(
            sum([Some(Decimal::MAX), Some(Decimal::MAX)]),
            Err(AppError::Internal { .. })
        ));

        let mut total = Decimal::MAX;
        assert!(accumulate(&mut total, Decimal::ONE).is_err());
        assert_eq!(total, Decimal::MAX);
    }
}
