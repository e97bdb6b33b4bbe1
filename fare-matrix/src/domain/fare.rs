//! Transit fare type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of fractional digits in a provider price string.
const SCALE: usize = 2;

/// Error returned when a price string is not a two-decimal amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid fare {input:?}: {reason}")]
pub struct InvalidFare {
    input: String,
    reason: &'static str,
}

/// A transit fare in integer cents.
///
/// Provider prices arrive as decimal strings (`"2.50"`). They are parsed as
/// fixed-point decimals with exactly two fractional digits; anything else is
/// rejected rather than guessed at.
///
/// # Examples
///
/// ```
/// use fare_matrix::domain::Fare;
///
/// assert_eq!(Fare::parse("2.50").unwrap().cents(), 250);
/// assert_eq!(Fare::parse("$10.05").unwrap().cents(), 1005);
///
/// // One fractional digit is ambiguous and rejected
/// assert!(Fare::parse("2.5").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fare(u32);

impl Fare {
    /// Create a fare from a number of cents.
    pub fn from_cents(cents: u32) -> Self {
        Fare(cents)
    }

    /// Parse a provider price string such as `"2.50"` or `"$2.50"`.
    pub fn parse(s: &str) -> Result<Self, InvalidFare> {
        let invalid = |reason| InvalidFare {
            input: s.to_string(),
            reason,
        };

        let trimmed = s.trim();
        let amount = trimmed.strip_prefix('$').unwrap_or(trimmed);

        let (whole, frac) = amount
            .split_once('.')
            .ok_or_else(|| invalid("missing decimal point"))?;

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("whole part must be ASCII digits"));
        }

        if frac.len() != SCALE || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("expected exactly two fractional digits"));
        }

        let whole: u32 = whole.parse().map_err(|_| invalid("amount too large"))?;
        let frac: u32 = frac.parse().map_err(|_| invalid("invalid fractional part"))?;

        whole
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(frac))
            .map(Fare)
            .ok_or_else(|| invalid("amount too large"))
    }

    /// The fare in cents.
    pub fn cents(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Fare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fare({})", self.0)
    }
}

impl fmt::Display for Fare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Every dollars/cents pair formats and parses back to the same cents
        #[test]
        fn formatted_amount_parses(dollars in 0u32..100_000, cents in 0u32..100) {
            let s = format!("{dollars}.{cents:02}");
            prop_assert_eq!(Fare::parse(&s).unwrap().cents(), dollars * 100 + cents);
        }

        /// A single fractional digit is never accepted
        #[test]
        fn single_fraction_digit_rejected(dollars in 0u32..1000, tenth in 0u32..10) {
            let s = format!("{dollars}.{tenth}");
            prop_assert!(Fare::parse(&s).is_err());
        }
    }
}
