//! Money type for representing monetary values.
//!
//! Amounts are integers in the smallest currency unit (paise for INR, cents
//! for USD). Nothing in the order engine touches floating point.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported currencies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum Currency {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl Currency {
    /// Get the currency code (e.g., "INR").
    pub fn code(&self) -> &'static str {
        match self {
            Currency::INR => "INR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
        }
    }

    /// Get the currency symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::INR => "\u{20b9}",
            Currency::USD => "$",
            Currency::EUR => "\u{20ac}",
            Currency::GBP => "\u{00a3}",
        }
    }

    /// Number of decimal places in the major unit.
    pub fn decimal_places(&self) -> u32 {
        2
    }

    /// Parse a currency code string.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_uppercase().as_str() {
            "INR" => Some(Currency::INR),
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A monetary value with currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Money {
    /// Amount in minor units.
    pub minor: i64,
    /// The currency.
    pub currency: Currency,
}

impl Money {
    /// Create a value from minor units.
    pub fn new(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// Create a value from whole major units (e.g. rupees).
    pub fn major(units: i64, currency: Currency) -> Self {
        Self::new(units * 10_i64.pow(currency.decimal_places()), currency)
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    pub fn is_positive(&self) -> bool {
        self.minor > 0
    }

    pub fn is_negative(&self) -> bool {
        self.minor < 0
    }

    /// Negate the amount.
    pub fn negate(&self) -> Self {
        Self::new(-self.minor, self.currency)
    }

    /// Add another value, `None` on currency mismatch or overflow.
    pub fn try_add(&self, other: &Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        self.minor
            .checked_add(other.minor)
            .map(|minor| Money::new(minor, self.currency))
    }

    /// Subtract another value, `None` on currency mismatch or overflow.
    pub fn try_subtract(&self, other: &Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        self.minor
            .checked_sub(other.minor)
            .map(|minor| Money::new(minor, self.currency))
    }

    /// Multiply by a quantity, `None` on overflow.
    pub fn try_multiply(&self, factor: i64) -> Option<Money> {
        self.minor
            .checked_mul(factor)
            .map(|minor| Money::new(minor, self.currency))
    }

    /// Percentage of this amount rounded half-up to the minor unit.
    ///
    /// ```
    /// use turbo_orders::money::{Currency, Money};
    /// let subtotal = Money::new(12345, Currency::INR);
    /// // 1234.5 rounds up to 1235
    /// assert_eq!(subtotal.percent_half_up(10).unwrap().minor, 1235);
    /// ```
    pub fn percent_half_up(&self, percent: u32) -> Option<Money> {
        let scaled = i128::from(self.minor) * i128::from(percent);
        let rounded = if scaled >= 0 {
            (scaled + 50) / 100
        } else {
            (scaled - 50) / 100
        };
        i64::try_from(rounded)
            .ok()
            .map(|minor| Money::new(minor, self.currency))
    }

    /// Sum an iterator of values, `None` on mismatch or overflow.
    pub fn try_sum<'a>(mut iter: impl Iterator<Item = &'a Money>, currency: Currency) -> Option<Money> {
        iter.try_fold(Money::zero(currency), |acc, m| acc.try_add(m))
    }

    /// Format as a display string (e.g., "₹49.99").
    pub fn display(&self) -> String {
        format!("{}{}", self.currency.symbol(), self.display_amount())
    }

    /// Format without the symbol (e.g., "49.99").
    pub fn display_amount(&self) -> String {
        let sign = if self.minor < 0 { "-" } else { "" };
        let abs = self.minor.unsigned_abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_major_units() {
        let m = Money::major(100, Currency::INR);
        assert_eq!(m.minor, 10000);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::new(4999, Currency::USD).display(), "$49.99");
        assert_eq!(Money::new(-505, Currency::INR).display_amount(), "-5.05");
    }

    #[test]
    fn test_percent_half_up() {
        let m = Money::major(200, Currency::INR);
        assert_eq!(m.percent_half_up(10).unwrap().minor, 2000);

        // 0.5 paise rounds up
        let m = Money::new(5, Currency::INR);
        assert_eq!(m.percent_half_up(10).unwrap().minor, 1);

        // 0.4 paise rounds down
        let m = Money::new(4, Currency::INR);
        assert_eq!(m.percent_half_up(10).unwrap().minor, 0);
    }

    #[test]
    fn test_try_add_mismatch() {
        let a = Money::new(1000, Currency::INR);
        let b = Money::new(1000, Currency::USD);
        assert!(a.try_add(&b).is_none());
    }

    #[test]
    fn test_try_multiply_overflow() {
        let m = Money::new(i64::MAX, Currency::INR);
        assert!(m.try_multiply(2).is_none());
    }

    #[test]
    fn test_try_sum() {
        let values = [Money::new(100, Currency::INR), Money::new(250, Currency::INR)];
        let total = Money::try_sum(values.iter(), Currency::INR).unwrap();
        assert_eq!(total.minor, 350);
    }

    #[test]
    fn test_currency_from_code() {
        assert_eq!(Currency::from_code("inr"), Some(Currency::INR));
        assert_eq!(Currency::from_code("XYZ"), None);
    }
}
