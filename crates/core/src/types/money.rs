//! Integer money in the smallest currency unit.
//!
//! Prices are stored and summed as cents. Floating point never touches an
//! amount; display formatting is the only place a decimal point appears.

use core::fmt;
use std::iter::Sum;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors from money arithmetic and validation.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoneyError {
    /// A price was negative.
    #[error("amount cannot be negative")]
    Negative,
    /// Arithmetic overflowed `i64`.
    #[error("amount overflow")]
    Overflow,
}

/// An amount of money in cents.
///
/// Serializes as a bare integer (`1999` for $19.99). Deserializing goes
/// through [`Cents::price`], so incoming amounts cannot be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Cents(i64);

impl Cents {
    /// Zero cents.
    pub const ZERO: Self = Self(0);

    /// Create an amount from a raw cent value.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Create a non-negative amount, as required for catalog prices.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Negative` for amounts below zero.
    pub const fn price(cents: i64) -> Result<Self, MoneyError> {
        if cents < 0 {
            Err(MoneyError::Negative)
        } else {
            Ok(Self(cents))
        }
    }

    /// The raw cent value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Line total for `quantity` units at this unit price.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the product does not fit in `i64`.
    pub fn times(self, quantity: i32) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Add two amounts.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the sum does not fit in `i64`.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Sum an iterator of amounts, failing on overflow.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the running total overflows.
    pub fn try_sum<I>(amounts: I) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl<'de> Deserialize<'de> for Cents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let cents = i64::deserialize(deserializer)?;
        Self::price(cents).map_err(serde::de::Error::custom)
    }
}

impl Sum for Cents {
    /// Saturating sum; use [`Cents::try_sum`] where overflow must be reported.
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.fold(0_i64, |acc, c| acc.saturating_add(c.0)))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Cents {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Cents {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Cents {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Cents::new(1999).to_string(), "$19.99");
        assert_eq!(Cents::new(5).to_string(), "$0.05");
        assert_eq!(Cents::ZERO.to_string(), "$0.00");
        assert_eq!(Cents::new(-250).to_string(), "-$2.50");
    }

    #[test]
    fn test_price_rejects_negative() {
        assert_eq!(Cents::price(-1), Err(MoneyError::Negative));
        assert_eq!(Cents::price(0), Ok(Cents::ZERO));
    }

    #[test]
    fn test_times() {
        assert_eq!(Cents::new(450).times(3).unwrap(), Cents::new(1350));
        assert_eq!(Cents::new(i64::MAX).times(2), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_try_sum() {
        let lines = [Cents::new(100), Cents::new(250), Cents::new(1)];
        assert_eq!(Cents::try_sum(lines).unwrap(), Cents::new(351));
        assert_eq!(
            Cents::try_sum([Cents::new(i64::MAX), Cents::new(1)]),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_serde_is_bare_integer() {
        assert_eq!(serde_json::to_string(&Cents::new(1250)).unwrap(), "1250");
        let parsed: Cents = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, Cents::new(42));
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        let err = serde_json::from_str::<Cents>("-5").unwrap_err();
        assert!(err.to_string().contains("amount cannot be negative"));
    }
}
