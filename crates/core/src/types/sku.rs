//! Stock keeping unit type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Sku`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SkuError {
    /// The input is empty after trimming.
    #[error("sku cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("sku must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A stock keeping unit.
///
/// SKUs are the fallback key used to link ERP records to local records that
/// were created before the integration existed. Matching is exact after
/// trimming surrounding whitespace; case is preserved because ERPs treat
/// `ab-1` and `AB-1` as different codes.
///
/// ## Examples
///
/// ```
/// use vitrine_core::Sku;
///
/// assert_eq!(Sku::parse("  SAND-501-PT ").unwrap().as_str(), "SAND-501-PT");
/// assert!(Sku::parse("   ").is_err());
/// assert!(Sku::from_optional(Some("")).is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Maximum length of a SKU.
    pub const MAX_LENGTH: usize = 120;

    /// Parse a `Sku` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or longer than
    /// [`Sku::MAX_LENGTH`].
    pub fn parse(s: &str) -> Result<Self, SkuError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SkuError::Empty);
        }
        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(SkuError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Parse an optional raw value, treating empty or invalid input as absent.
    #[must_use]
    pub fn from_optional(s: Option<&str>) -> Option<Self> {
        s.and_then(|s| Self::parse(s).ok())
    }

    /// Returns the SKU as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Sku` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Sku {
    type Err = SkuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Sku {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Sku {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Sku {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Sku {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(Sku::parse(" 7891-PT ").unwrap().as_str(), "7891-PT");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Sku::parse(""), Err(SkuError::Empty));
        assert_eq!(Sku::parse(" \t "), Err(SkuError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "x".repeat(Sku::MAX_LENGTH + 1);
        assert!(matches!(Sku::parse(&long), Err(SkuError::TooLong { .. })));
    }

    #[test]
    fn test_case_is_preserved() {
        assert_ne!(Sku::parse("ab-1").unwrap(), Sku::parse("AB-1").unwrap());
    }

    #[test]
    fn test_from_optional() {
        assert_eq!(Sku::from_optional(None), None);
        assert_eq!(Sku::from_optional(Some("  ")), None);
        assert_eq!(
            Sku::from_optional(Some("A1")).map(Sku::into_inner),
            Some("A1".to_string())
        );
    }
}
