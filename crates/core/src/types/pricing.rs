//! Order pricing.
//!
//! An order's charged amount is the sum of `offer_price * quantity` over its
//! lines plus a surcharge of [`SURCHARGE_PERCENT`] percent of that sum,
//! rounded down to a whole unit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Money;

/// Surcharge applied on top of the line subtotal, in percent.
pub const SURCHARGE_PERCENT: i64 = 2;

/// Breakdown of an order's charged amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotal {
    /// Sum of all line amounts.
    pub subtotal: Money,
    /// `floor(subtotal * 2%)`.
    pub surcharge: Money,
    /// `subtotal + surcharge`; the amount recorded on the order.
    pub total: Money,
}

impl OrderTotal {
    /// Price a sequence of `(unit_price, quantity)` lines.
    ///
    /// # Example
    ///
    /// ```rust
    /// use quickcart_core::{Money, OrderTotal};
    ///
    /// let total = OrderTotal::from_lines([(Money::from_minor(5_000), 2)]);
    /// assert_eq!(total.surcharge, Money::from_minor(200));
    /// assert_eq!(total.total, Money::from_minor(10_200));
    /// ```
    #[must_use]
    pub fn from_lines<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = (Money, u32)>,
    {
        let subtotal: Money = lines
            .into_iter()
            .map(|(price, quantity)| price.times(quantity))
            .sum();

        Self::from_subtotal(subtotal)
    }

    /// Apply the surcharge to an already summed subtotal.
    #[must_use]
    pub fn from_subtotal(subtotal: Money) -> Self {
        let rate = Decimal::new(SURCHARGE_PERCENT, 2);
        let surcharge = Money::new(subtotal.amount() * rate).floor();

        Self {
            subtotal,
            surcharge,
            total: subtotal + surcharge,
        }
    }
}
