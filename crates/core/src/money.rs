//! Monetary amounts.
//!
//! All amounts are kept at two decimal places. Rounding happens at the point
//! of computation (line subtotal, order total) using half-up rounding, so a
//! value of this type is always already rounded.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Decimal places kept for every monetary amount.
pub const MONEY_SCALE: u32 = 2;

/// A monetary amount rounded to [`MONEY_SCALE`] places.
///
/// Decoding goes through [`Money::new`], so a wire value with extra places is
/// rounded like any other input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Decimal", from = "Decimal")]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Round `amount` half-up to two decimals.
    pub fn new(amount: Decimal) -> Self {
        Self(round_half_up(amount))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// `round(quantity × self, 2)`.
    ///
    /// Fails with [`DomainError::Validation`] when the product does not fit a
    /// decimal.
    pub fn times(self, quantity: i64) -> DomainResult<Money> {
        Decimal::from(quantity)
            .checked_mul(self.0)
            .map(Money::new)
            .ok_or_else(|| out_of_range(format!("{self} x {quantity}")))
    }

    /// Sums the exact amounts, then rounds once.
    pub fn total<I>(amounts: I) -> DomainResult<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Decimal::ZERO, |acc, m| acc.checked_add(m.0).ok_or_else(|| out_of_range("total")))
            .map(Money::new)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

fn out_of_range(what: impl core::fmt::Display) -> DomainError {
    DomainError::validation(format!("amount out of range: {what}"))
}

fn round_half_up(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_up_at_construction() {
        assert_eq!(Money::new(dec!(1.005)).amount(), dec!(1.01));
        assert_eq!(Money::new(dec!(1.004)).amount(), dec!(1.00));
        assert_eq!(Money::new(dec!(-1.005)).amount(), dec!(-1.01));
    }

    #[test]
    fn times_rounds_the_product() {
        assert_eq!(Money::new(dec!(10.00)).times(3).unwrap().amount(), dec!(30.00));
        assert_eq!(Money::new(dec!(0.335)).times(1).unwrap().amount(), dec!(0.34));
        assert_eq!(Money::new(dec!(3.33)).times(3).unwrap().amount(), dec!(9.99));
    }

    #[test]
    fn times_rejects_overflow() {
        let price = Money::new(dec!(10000000000));
        assert!(matches!(price.times(i64::MAX), Err(DomainError::Validation(_))));
    }

    #[test]
    fn total_of_empty_is_zero() {
        assert_eq!(Money::total(Vec::<Money>::new()).unwrap(), Money::ZERO);
    }

    #[test]
    fn total_rejects_overflow() {
        let huge = Money::new(Decimal::MAX);
        assert!(matches!(Money::total([huge, huge]), Err(DomainError::Validation(_))));
    }

    #[test]
    fn display_keeps_two_places() {
        assert_eq!(Money::new(dec!(5)).to_string(), "5.00");
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&Money::new(dec!(12.5))).unwrap();
        assert_eq!(json, "\"12.50\"");
    }

    #[test]
    fn decoding_rounds_extra_places() {
        let sub_cent: Money = serde_json::from_str("\"0.001\"").unwrap();
        assert_eq!(sub_cent, Money::ZERO);
        assert!(!sub_cent.is_positive());

        let half: Money = serde_json::from_str("\"2.345\"").unwrap();
        assert_eq!(half.amount(), dec!(2.35));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: summing already-rounded subtotals never drifts from the
            /// exact decimal sum.
            #[test]
            fn total_matches_exact_sum(cents in proptest::collection::vec(0i64..10_000_000, 0..50)) {
                let amounts: Vec<Money> = cents
                    .iter()
                    .map(|c| Money::new(Decimal::new(*c, 2)))
                    .collect();
                let exact: i64 = cents.iter().sum();
                prop_assert_eq!(Money::total(amounts).unwrap().amount(), Decimal::new(exact, 2));
            }

            /// Property: a line subtotal always carries exactly two decimals.
            #[test]
            fn times_keeps_scale(qty in 1i64..10_000, price_milli in 1i64..10_000_000) {
                let price = Money::new(Decimal::new(price_milli, 3));
                prop_assert_eq!(price.times(qty).unwrap().amount().scale(), MONEY_SCALE);
            }
        }
    }
}
