//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Integer Minor Units
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every monetary value in the order core is an i64 amount of minor      │
//! │  units (cents). Tender comparison, change, and shortfall math all      │
//! │  happen on cents, so 0.1 + 0.2 style float drift cannot occur.         │
//! │                                                                         │
//! │  Percentages (discount percents, tax rates) are basis points and are   │
//! │  applied once per line through i128 fixed-point rounding; totals are   │
//! │  sums of already-rounded cents, never re-rounded.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use atlas_core::money::Money;
//!
//! let price = Money::from_cents(1099); // ¤10.99
//! let line = price * 3i64;             // ¤32.97
//! let discounted = line - line.apply_bps(1000); // 10% off
//! assert_eq!(discounted.cents(), 2967);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Notes
/// - **i64 (signed)**: intermediate results of discount math may dip negative
///   before being clamped; shortfalls are reported as positive remainders
/// - **Single field tuple struct**: zero-cost wrapper over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use atlas_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // ¤10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -¤5.50, not -¤4.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Subtracts `other`, clamping the result at zero.
    ///
    /// This is the `max(0, a - b)` building block of the tender rules:
    /// cash-needed, change, and the remaining shortfall are all floored at
    /// zero rather than ever going negative.
    ///
    /// ## Example
    /// ```rust
    /// use atlas_core::money::Money;
    ///
    /// let total = Money::from_cents(15000);
    /// let paid = Money::from_cents(20000);
    /// assert_eq!(total.saturating_sub_zero(paid), Money::zero());
    /// assert_eq!(paid.saturating_sub_zero(total).cents(), 5000);
    /// ```
    #[inline]
    pub const fn saturating_sub_zero(&self, other: Money) -> Money {
        let diff = self.0 - other.0;
        if diff < 0 {
            Money(0)
        } else {
            Money(diff)
        }
    }

    /// Applies a basis-point rate to this amount and returns the resulting
    /// portion, rounded to whole cents.
    ///
    /// ## Implementation
    /// Integer math in i128: `(amount * bps + 5000) / 10000`. The +5000
    /// rounds the half-cent boundary; a single rounding per application
    /// prevents accumulation drift across lines.
    ///
    /// ## Example
    /// ```rust
    /// use atlas_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(30000); // ¤300.00
    /// assert_eq!(subtotal.apply_bps(1000).cents(), 3000); // 10% = ¤30.00
    /// ```
    pub fn apply_bps(&self, bps: u32) -> Money {
        let portion = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money::from_cents(portion as i64)
    }

    /// Calculates the tax portion of this amount.
    ///
    /// ## Example
    /// ```rust
    /// use atlas_core::money::Money;
    /// use atlas_core::types::TaxRate;
    ///
    /// let base = Money::from_cents(1000);   // ¤10.00
    /// let rate = TaxRate::from_bps(825);    // 8.25%
    /// assert_eq!(base.calculate_tax(rate).cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.apply_bps(rate.bps())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use atlas_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and error messages. The host UI formats amounts itself
/// to handle localization.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}¤{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by integer (for quantity calculations).
impl Mul<i32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i32) -> Self {
        Money(self.0 * qty as i64)
    }
}

/// Multiplication by i64.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Sums an iterator of Money values.
impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        let money = Money::from_major_minor(10, 99);
        assert_eq!(money.cents(), 1099);

        let negative = Money::from_major_minor(-5, 50);
        assert_eq!(negative.cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "¤10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "¤5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-¤5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "¤0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        let result: Money = a * 3;
        assert_eq!(result.cents(), 3000);
    }

    #[test]
    fn test_sum() {
        let rows = [Money::from_cents(100), Money::from_cents(250)];
        let total: Money = rows.iter().copied().sum();
        assert_eq!(total.cents(), 350);
    }

    #[test]
    fn test_saturating_sub_zero() {
        let total = Money::from_cents(15000);
        let covered = Money::from_cents(10000);

        assert_eq!(total.saturating_sub_zero(covered).cents(), 5000);
        assert_eq!(covered.saturating_sub_zero(total).cents(), 0);
        assert_eq!(total.saturating_sub_zero(total).cents(), 0);
    }

    #[test]
    fn test_apply_bps_rounds_half_up() {
        // ¤10.00 at 8.25% = ¤0.825 → ¤0.83
        let amount = Money::from_cents(1000);
        assert_eq!(amount.apply_bps(825).cents(), 83);
    }

    #[test]
    fn test_apply_bps_exact() {
        // ¤300.00 at 10% = ¤30.00 exactly
        let amount = Money::from_cents(30000);
        assert_eq!(amount.apply_bps(1000).cents(), 3000);
    }

    #[test]
    fn test_tax_calculation() {
        let amount = Money::from_cents(1000);
        let rate = TaxRate::from_bps(1000); // 10%
        assert_eq!(amount.calculate_tax(rate).cents(), 100);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let positive = Money::from_cents(100);
        assert!(positive.is_positive());

        let negative = Money::from_cents(-100);
        assert!(negative.is_negative());
    }

    #[test]
    fn test_multiply_quantity() {
        let unit_price = Money::from_cents(299);
        assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    }
}
