//! Promo code name value object.
//!
//! # Validation Rules
//!
//! - Surrounding whitespace is trimmed, letters are uppercased
//! - 3-32 characters
//! - Only `A-Z`, `0-9`, `-` and `_`

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

const MIN_LEN: usize = 3;
const MAX_LEN: usize = 32;

/// A normalized promo code string such as `FRIENDSFAMILY`.
///
/// Two inputs that differ only in case or surrounding whitespace produce
/// equal values, so lookups never depend on how a user typed the code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PromoCodeName(String);

impl PromoCodeName {
    /// # Errors
    ///
    /// Returns `ValidationError` if the code is empty after trimming, has the
    /// wrong length, or contains characters outside `[A-Z0-9_-]`.
    pub fn try_new(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_ascii_uppercase();

        if normalized.is_empty() {
            return Err(ValidationError::empty_field("promo_code"));
        }

        let len = normalized.chars().count();
        if !(MIN_LEN..=MAX_LEN).contains(&len) {
            return Err(ValidationError::out_of_range(
                "promo_code_length",
                MIN_LEN as i64,
                MAX_LEN as i64,
                len as i64,
            ));
        }

        if !normalized
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(ValidationError::invalid_format(
                "promo_code",
                "letters, digits, '-' and '_' only",
            ));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromoCodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PromoCodeName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(&value)
    }
}

impl From<PromoCodeName> for String {
    fn from(code: PromoCodeName) -> Self {
        code.0
    }
}
