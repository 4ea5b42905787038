//! # Currency Formatting and Parsing
//!
//! Monetary amounts are whole US dollars held as `u64`. Form inputs are free
//! text: every keystroke is normalized to a canonical digit string for
//! storage and re-formatted with thousands separators for display.
//!
//! `parse_currency(&format_currency(n)) == Some(n)` for every `n`.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use crate::error::ValidationError;

/// Format a whole-dollar amount with thousands separators: `250000` → `"250,000"`.
pub fn format_currency(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Format an amount for read-only display: `250000` → `"$250,000"`.
pub fn display_currency(amount: u64) -> String {
    format!("${}", format_currency(amount))
}

/// Parse a formatted or raw amount (`"$1,000,000"`, `"250000"`, `" 42 "`).
///
/// Returns `None` for empty input, any character other than digits, `$`,
/// `,` and surrounding whitespace, or a value that overflows `u64`.
pub fn parse_currency(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed).trim_start();
    let mut digits = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            ',' => {}
            _ => return None,
        }
    }
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Reduce free-text input to the canonical digit string stored in a form.
///
/// Non-digit characters are dropped and leading zeros stripped, so the
/// result is either empty or a valid `u64` literal (clamped by the caller
/// through [`parse_currency`]).
pub fn normalize_input(input: &str) -> String {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() && !digits.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Format a canonical digit string for display inside an input field.
///
/// Empty input stays empty so a cleared field does not render as `"0"`.
pub fn format_input(canonical: &str) -> String {
    match parse_currency(canonical) {
        Some(amount) => format_currency(amount),
        None => String::new(),
    }
}

/// A whole-dollar amount on the wire.
///
/// Serializes as a JSON number. Deserializes from either a number or a
/// string in any format accepted by [`parse_currency`], because browser
/// forms submit the canonical digit string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema)]
pub struct Amount(pub u64);

impl Amount {
    /// The amount in whole dollars.
    pub fn dollars(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&display_currency(self.0))
    }
}

impl std::str::FromStr for Amount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_currency(s)
            .map(Amount)
            .ok_or_else(|| ValidationError::InvalidAmount(s.to_string()))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative whole-dollar amount as a number or string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                u64::try_from(v)
                    .map(Amount)
                    .map_err(|_| E::custom("amount must not be negative"))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
                if v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
                    Ok(Amount(v as u64))
                } else {
                    Err(E::custom("amount must be a whole number of dollars"))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                parse_currency(v)
                    .map(Amount)
                    .ok_or_else(|| E::custom(format!("invalid amount: \"{v}\"")))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn formats_thousands() {
        assert_eq!(format_currency(0), "0");
        assert_eq!(format_currency(999), "999");
        assert_eq!(format_currency(1000), "1,000");
        assert_eq!(format_currency(250_000), "250,000");
        assert_eq!(format_currency(1_000_000), "1,000,000");
        assert_eq!(display_currency(1_000_000), "$1,000,000");
    }

    #[test]
    fn parses_formatted_and_raw() {
        assert_eq!(parse_currency("$1,000,000"), Some(1_000_000));
        assert_eq!(parse_currency("250000"), Some(250_000));
        assert_eq!(parse_currency("  $ 42 "), Some(42));
        assert_eq!(parse_currency(""), None);
        assert_eq!(parse_currency("$"), None);
        assert_eq!(parse_currency("12a"), None);
        assert_eq!(parse_currency("-5"), None);
        assert_eq!(parse_currency("99999999999999999999999"), None);
    }

    #[test]
    fn normalizes_keystrokes() {
        assert_eq!(normalize_input("$1,0a00"), "1000");
        assert_eq!(normalize_input("000"), "0");
        assert_eq!(normalize_input("007"), "7");
        assert_eq!(normalize_input("abc"), "");
        assert_eq!(format_input(&normalize_input("250000")), "250,000");
        assert_eq!(format_input(""), "");
    }

    #[test]
    fn amount_deserializes_number_or_string() {
        let a: Amount = serde_json::from_str("250000").unwrap();
        let b: Amount = serde_json::from_str("\"250,000\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<Amount>("-1").is_err());
        assert!(serde_json::from_str::<Amount>("\"ten\"").is_err());
        assert!(serde_json::from_str::<Amount>("1.5").is_err());
        assert_eq!(serde_json::to_string(&a).unwrap(), "250000");
    }

    proptest! {
        #[test]
        fn format_then_parse_is_identity(n in any::<u64>()) {
            prop_assert_eq!(parse_currency(&format_currency(n)), Some(n));
        }

        #[test]
        fn normalized_input_round_trips(n in any::<u64>()) {
            let shown = format_input(&n.to_string());
            prop_assert_eq!(normalize_input(&shown), n.to_string());
        }
    }
}
