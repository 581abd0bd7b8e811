use std::str::FromStr;

use mca_common::error::McaError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("amount out of range: {0}")]
    OutOfRange(String),

    #[error("invalid decimal: {0:?}")]
    InvalidDecimal(String),
}

impl From<TransformError> for McaError {
    fn from(err: TransformError) -> Self {
        McaError::Transform(err.to_string())
    }
}

/// A dollar amount parsed once from OrgMeter text, with its cent value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Money {
    dollars: Decimal,
    cents: i64,
}

impl Money {
    /// Parse a dollar string such as `"1234.56"`, `"$1,234.56"` or `"1e3"`.
    pub fn parse(raw: &str) -> Result<Self, TransformError> {
        let cleaned: String = raw
            .trim()
            .trim_start_matches('$')
            .chars()
            .filter(|c| *c != ',')
            .collect();
        if cleaned.is_empty() {
            return Err(TransformError::InvalidAmount(raw.to_string()));
        }

        let dollars = Decimal::from_str(&cleaned)
            .or_else(|_| Decimal::from_scientific(&cleaned))
            .map_err(|_| TransformError::InvalidAmount(raw.to_string()))?;

        let cents = dollars
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(|c| c.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|c| c.to_i64())
            .ok_or_else(|| TransformError::OutOfRange(raw.to_string()))?;

        Ok(Self { dollars, cents })
    }

    pub fn dollars(&self) -> Decimal {
        self.dollars
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| !s.trim().is_empty())
}

/// Cents for an optional source amount. Absent or blank is zero; malformed
/// text is an error.
pub fn cents_or_zero(raw: Option<&str>) -> Result<i64, TransformError> {
    Ok(optional_cents(raw)?.unwrap_or(0))
}

/// Cents for an amount whose absence means "not applicable".
pub fn optional_cents(raw: Option<&str>) -> Result<Option<i64>, TransformError> {
    present(raw).map(|s| Money::parse(s).map(|m| m.cents())).transpose()
}

/// Plain decimal (factor rates, percentages).
pub fn optional_decimal(raw: Option<&str>) -> Result<Option<Decimal>, TransformError> {
    present(raw)
        .map(|s| {
            let trimmed = s.trim().trim_end_matches('%');
            Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .map_err(|_| TransformError::InvalidDecimal(s.to_string()))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_to_cents() {
        assert_eq!(Money::parse("1234.56").unwrap().cents(), 123456);
        assert_eq!(Money::parse("0.005").unwrap().cents(), 1);
        assert_eq!(Money::parse("0.004").unwrap().cents(), 0);
        assert_eq!(Money::parse("25").unwrap().cents(), 2500);
        assert_eq!(Money::parse(" $1,000.10 ").unwrap().cents(), 100010);
        assert_eq!(Money::parse("1e3").unwrap().cents(), 100000);
    }

    #[test]
    fn keeps_dollar_value() {
        assert_eq!(Money::parse("99.995").unwrap().dollars(), dec!(99.995));
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert_eq!(
            Money::parse("abc"),
            Err(TransformError::InvalidAmount("abc".to_string()))
        );
        assert!(Money::parse("").is_err());
        assert!(Money::parse("$").is_err());
    }

    #[test]
    fn absent_amounts_default_to_zero() {
        assert_eq!(cents_or_zero(None), Ok(0));
        assert_eq!(cents_or_zero(Some("  ")), Ok(0));
        assert_eq!(cents_or_zero(Some("12.5")), Ok(1250));
        assert!(cents_or_zero(Some("12,5x")).is_err());
        assert_eq!(optional_cents(None), Ok(None));
    }

    #[test]
    fn decimals_accept_percent_suffix() {
        assert_eq!(optional_decimal(Some("1.35")), Ok(Some(dec!(1.35))));
        assert_eq!(optional_decimal(Some("25%")), Ok(Some(dec!(25))));
        assert_eq!(optional_decimal(None), Ok(None));
        assert!(optional_decimal(Some("n/a")).is_err());
    }
}
