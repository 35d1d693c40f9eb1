//! Non-negative price representation using decimal arithmetic.
//!
//! Prices in this system are advisory display data captured at add time,
//! not a transactional source of truth. The policy is therefore lossy and
//! forgiving: anything unparseable, missing, or negative collapses to zero
//! instead of raising.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

/// A non-negative price in major currency units (e.g. dollars, not cents).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// The zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount; negative amounts clamp to zero.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        if amount.is_sign_negative() {
            Self::ZERO
        } else {
            Self(amount)
        }
    }

    /// Create a price from an amount in the smallest currency unit
    /// (e.g. cents). Page payloads store variant prices this way.
    #[must_use]
    pub fn from_minor_units(units: i64) -> Self {
        Self::new(Decimal::new(units, 2))
    }

    /// Lossy conversion from a float; `NaN`, infinities, and negatives
    /// collapse to zero.
    #[must_use]
    pub fn from_f64_lossy(amount: f64) -> Self {
        Decimal::from_f64(amount).map_or(Self::ZERO, Self::new)
    }

    /// Lossy parse from a string amount; unparseable input collapses to
    /// zero.
    #[must_use]
    pub fn parse_lossy(amount: &str) -> Self {
        amount.trim().parse::<Decimal>().map_or(Self::ZERO, Self::new)
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the price is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The price multiplied by a quantity (line total).
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl std::ops::Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, std::ops::Add::add)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
