//! Phone number type.
//!
//! Phone numbers are the primary login identity for shoppers, sellers and
//! admins, so they are validated once at the edge and stored normalized.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone number is required")]
    Empty,
    /// The input is not an international number of 2-15 digits.
    #[error("please provide a valid phone number")]
    Invalid,
}

/// A phone number in international digit form.
///
/// Accepts an optional leading `+` followed by 2-15 digits, the first of which
/// must not be zero. Surrounding whitespace is trimmed.
///
/// ## Examples
///
/// ```
/// use haat_core::PhoneNumber;
///
/// assert!(PhoneNumber::parse("+919876543210").is_ok());
/// assert!(PhoneNumber::parse("9876543210").is_ok());
///
/// assert!(PhoneNumber::parse("").is_err());
/// assert!(PhoneNumber::parse("0123").is_err());
/// assert!(PhoneNumber::parse("98-7654").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Maximum number of digits (E.164).
    pub const MAX_DIGITS: usize = 15;

    /// Parse a `PhoneNumber` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`PhoneError::Empty`] for blank input and [`PhoneError::Invalid`]
    /// when the digits do not form a valid international number.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        let digits = s.strip_prefix('+').unwrap_or(s);
        let valid_len = (2..=Self::MAX_DIGITS).contains(&digits.len());
        let all_digits = digits.bytes().all(|b| b.is_ascii_digit());
        let leading_nonzero = digits.bytes().next().is_some_and(|b| b != b'0');

        if !(valid_len && all_digits && leading_nonzero) {
            return Err(PhoneError::Invalid);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the phone number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `PhoneNumber` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PhoneNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PhoneNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PhoneNumber {
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
    fn test_parse_valid_numbers() {
        assert!(PhoneNumber::parse("+919876543210").is_ok());
        assert!(PhoneNumber::parse("919876543210").is_ok());
        assert!(PhoneNumber::parse("12").is_ok());
        assert!(PhoneNumber::parse("+123456789012345").is_ok());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let phone = PhoneNumber::parse("  +919876543210\n").unwrap();
        assert_eq!(phone.as_str(), "+919876543210");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(PhoneNumber::parse("   "), Err(PhoneError::Empty));
    }

    #[test]
    fn test_parse_rejects_leading_zero() {
        assert_eq!(PhoneNumber::parse("0987654321"), Err(PhoneError::Invalid));
        assert_eq!(PhoneNumber::parse("+0987654321"), Err(PhoneError::Invalid));
    }

    #[test]
    fn test_parse_rejects_non_digits_and_bad_length() {
        assert_eq!(PhoneNumber::parse("98765-43210"), Err(PhoneError::Invalid));
        assert_eq!(PhoneNumber::parse("1"), Err(PhoneError::Invalid));
        assert_eq!(
            PhoneNumber::parse("+1234567890123456"),
            Err(PhoneError::Invalid)
        );
        assert_eq!(PhoneNumber::parse("+"), Err(PhoneError::Invalid));
    }
}
