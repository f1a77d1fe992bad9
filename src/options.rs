//! Parser configuration.

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Settings shared by every parser in a factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Currency assigned when the source does not state one.
    pub default_currency: String,

    /// Year used for `MM/DD` dates when a PDF statement names no year.
    pub default_year: i32,

    /// Relative tolerance for quantity × price against market value.
    pub holding_tolerance_ratio: Decimal,

    /// Absolute floor of the holding tolerance.
    pub holding_tolerance_min: Decimal,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_currency: "USD".to_string(),
            default_year: Utc::now().year(),
            holding_tolerance_ratio: Decimal::new(1, 2),
            holding_tolerance_min: Decimal::new(1, 2),
        }
    }
}

impl ParseOptions {
    /// Allowed absolute difference for a holding with this market value.
    pub fn holding_tolerance(&self, market_value: Decimal) -> Decimal {
        (market_value.abs() * self.holding_tolerance_ratio).max(self.holding_tolerance_min)
    }

    /// True when quantity × price is too far from the reported market value.
    pub fn value_mismatch(&self, quantity: Decimal, price: Decimal, market_value: Option<Decimal>) -> bool {
        match market_value {
            Some(value) => (quantity * price - value).abs() > self.holding_tolerance(value),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_tolerance_has_floor() {
        let options = ParseOptions::default();
        assert_eq!(options.holding_tolerance(dec("0.50")), dec("0.01"));
        assert_eq!(options.holding_tolerance(dec("10000")), dec("100.00"));
    }

    #[test]
    fn test_value_mismatch() {
        let options = ParseOptions::default();
        assert!(!options.value_mismatch(dec("10"), dec("150.25"), Some(dec("1502.50"))));
        assert!(!options.value_mismatch(dec("10"), dec("150.25"), Some(dec("1510.00"))));
        assert!(options.value_mismatch(dec("10"), dec("150.25"), Some(dec("2000.00"))));
        assert!(!options.value_mismatch(dec("10"), dec("150.25"), None));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ParseOptions = serde_json::from_str(r#"{"default_currency":"EUR"}"#).unwrap();
        assert_eq!(options.default_currency, "EUR");
        assert_eq!(options.holding_tolerance_ratio, dec("0.01"));
    }
}
