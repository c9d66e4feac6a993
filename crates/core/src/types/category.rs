//! Category name type.
//!
//! Categories are keyed by name, so the name doubles as the primary key and
//! the foreign key on products.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when parsing a [`CategoryName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CategoryNameError {
    /// The name is empty after trimming.
    #[error("category name cannot be empty")]
    Empty,
    /// The name is too long.
    #[error("category name must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The name contains a slash, which would break `/categories/{name}` routes.
    #[error("category name cannot contain '/'")]
    ContainsSlash,
}

/// A validated, trimmed category name.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct CategoryName(String);

impl CategoryName {
    /// Maximum length in characters.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a category name.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed name is empty, longer than
    /// [`Self::MAX_LENGTH`] characters, or contains `/`.
    pub fn parse(s: &str) -> Result<Self, CategoryNameError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CategoryNameError::Empty);
        }
        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(CategoryNameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if trimmed.contains('/') {
            return Err(CategoryNameError::ContainsSlash);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for CategoryName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for CategoryName {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for CategoryName {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<String as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for CategoryName {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims() {
        let name = CategoryName::parse("  Hot Sauce ").expect("valid name");
        assert_eq!(name.as_str(), "Hot Sauce");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(CategoryName::parse(" \t"), Err(CategoryNameError::Empty));
    }

    #[test]
    fn test_parse_rejects_long() {
        let long = "x".repeat(CategoryName::MAX_LENGTH + 1);
        assert!(matches!(
            CategoryName::parse(&long),
            Err(CategoryNameError::TooLong { .. })
        ));
        assert!(CategoryName::parse(&"x".repeat(CategoryName::MAX_LENGTH)).is_ok());
    }

    #[test]
    fn test_parse_rejects_slash() {
        assert_eq!(
            CategoryName::parse("Spices/Rubs"),
            Err(CategoryNameError::ContainsSlash)
        );
    }
}
