use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Problems with user-supplied values that must be surfaced instead of
/// silently coerced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Amount is missing")]
    MissingAmount,
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),
    #[error("Amount must not be zero")]
    ZeroAmount,
    #[error("Date is missing")]
    MissingDate,
    #[error("No {0} account selected")]
    MissingAccount(&'static str),
    #[error("Transfer source and destination are the same account ({0})")]
    SameAccount(String),
}

/// A currency amount held as a decimal rounded to cents.
///
/// Serializes as a JSON number because the ledger API expects numeric
/// amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Coerces a raw cell to an amount, treating anything unparseable as
    /// zero. Only suitable for advisory payloads such as rule previews.
    pub fn lenient(raw: &str) -> Self {
        parse_amount(raw).unwrap_or_default()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-${:.2}", self.0.abs())
        } else {
            write!(f, "${:.2}", self.0)
        }
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_amount(s)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Parses a bank-statement amount cell.
///
/// Accepts an optional sign, `$`, thousands separators, surrounding
/// whitespace, accounting parentheses for negatives and scientific
/// notation. Anything else is an error.
pub fn parse_amount(raw: &str) -> Result<Money, ValidationError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(ValidationError::MissingAmount);
    }
    let (negative, s) = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };
    let cleaned = s.replace([',', '$', ' '], "");
    // rust_decimal skips underscores; statements never use them as separators.
    if cleaned.is_empty() || cleaned.contains('_') {
        return Err(ValidationError::InvalidAmount(raw.to_string()));
    }
    let dec = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| ValidationError::InvalidAmount(raw.to_string()))?;
    let dec = if negative { -dec } else { dec };
    Ok(Money::from_decimal(dec))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parse_plain_and_negative() {
        assert_eq!(parse_amount("100").unwrap().as_decimal(), dec("100"));
        assert_eq!(parse_amount("-42.50").unwrap().as_decimal(), dec("-42.5"));
    }

    #[test]
    fn parse_currency_symbols_and_separators() {
        assert_eq!(parse_amount("$1,234.56").unwrap(), Money::from_cents(123_456));
        assert_eq!(parse_amount("  12.00 ").unwrap(), Money::from_cents(1_200));
    }

    #[test]
    fn parse_accounting_parens() {
        assert_eq!(parse_amount("(75.25)").unwrap(), Money::from_cents(-7_525));
    }

    #[test]
    fn parse_scientific() {
        assert_eq!(parse_amount("1e3").unwrap(), Money::from_cents(100_000));
    }

    #[test]
    fn parse_rounds_to_cents() {
        assert_eq!(parse_amount("0.006").unwrap(), Money::from_cents(1));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(
            parse_amount("N/A"),
            Err(ValidationError::InvalidAmount("N/A".to_string()))
        );
        assert_eq!(parse_amount("   "), Err(ValidationError::MissingAmount));
        assert!(parse_amount("$").is_err());
    }

    #[test]
    fn parse_rejects_underscore_separators() {
        assert_eq!(
            parse_amount("1_000"),
            Err(ValidationError::InvalidAmount("1_000".to_string()))
        );
        assert!(parse_amount("-4_50.00").is_err());
        assert!(Money::lenient("1_000").is_zero());
    }

    #[test]
    fn lenient_zeroes_garbage() {
        assert!(Money::lenient("N/A").is_zero());
        assert!(Money::lenient("").is_zero());
        assert_eq!(Money::lenient("-42.50").as_decimal(), dec("-42.5"));
    }

    #[test]
    fn negative_zero_is_not_negative() {
        assert!(!parse_amount("-0").unwrap().is_negative());
        assert!(parse_amount("-0.01").unwrap().is_negative());
    }

    #[test]
    fn display_formats_dollars() {
        assert_eq!(Money::from_cents(5_000).to_string(), "$50.00");
        assert_eq!(Money::from_cents(-5_000).to_string(), "-$50.00");
    }

    #[test]
    fn serializes_as_number() {
        let json = serde_json::to_string(&Money::from_cents(-4_250)).unwrap();
        assert_eq!(json, "-42.5");
        let back: Money = serde_json::from_str("200").unwrap();
        assert_eq!(back, Money::from_cents(20_000));
    }
}
