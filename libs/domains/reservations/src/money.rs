//! Monetary amounts held as integer cents.
//!
//! All aggregation in the report happens on `Money`; the `$1,234.56` display
//! form is produced only when a table is emitted.

use serde::{Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};

/// Amount in the smallest currency unit (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money {
    pub amount: i64,
}

impl Money {
    pub const ZERO: Money = Money { amount: 0 };

    /// Create from a cent amount
    pub fn new(amount: i64) -> Self {
        Self { amount }
    }

    /// Create from a decimal value, rounding to the nearest cent (e.g. 1.999 -> 2.00).
    /// Exact half cents round to even.
    pub fn from_decimal(value: f64) -> Self {
        if !value.is_finite() {
            return Self::ZERO;
        }
        Self {
            amount: (value * 100.0).round_ties_even() as i64,
        }
    }

    /// Parse a formatted amount such as `$1,234.56`, `1234.5` or `$-12.00`.
    ///
    /// Currency symbol, thousands separators and surrounding whitespace are
    /// ignored. Returns `None` when nothing numeric remains.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
            .collect();
        if cleaned.is_empty() {
            return None;
        }
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Self::from_decimal)
    }

    /// Parse a formatted amount, defaulting to zero when it is not numeric.
    pub fn parse_lossy(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::ZERO)
    }
}

impl fmt::Display for Money {
    /// `$1,234.56`; negative amounts render as `$-1,234.56`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        let dollars = (abs / 100).to_string();
        let cents = abs % 100;

        let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
        for (i, ch) in dollars.chars().enumerate() {
            if i > 0 && (dollars.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        write!(f, "${}{}.{:02}", sign, grouped, cents)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money::new(self.amount + rhs.amount)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.amount += rhs.amount;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money::new(self.amount - rhs.amount)
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, rhs: i64) -> Money {
        Money::new(self.amount * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}
