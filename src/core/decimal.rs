//! Normalization of raw provider values into exact decimals.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value;
use std::str::FromStr;

/// Converts a raw JSON value into an exact `Decimal`.
///
/// Accepts numeric strings (plain or scientific notation), integers and
/// finite floats. Anything else yields `None` and must not reach the matrix.
pub fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(Decimal::from(u))
            } else {
                n.as_f64().and_then(Decimal::from_f64)
            }
        }
        _ => None,
    }
}

/// Parses a decimal from a string, tolerating scientific notation
/// (currency APIs quote thin crypto pairs as e.g. "1.2e-7").
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .ok()
        .or_else(|| Decimal::from_scientific(trimmed).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_strings() {
        assert_eq!(
            to_decimal(&json!("1.0825")),
            Some(Decimal::from_str("1.0825").unwrap())
        );
        assert_eq!(
            to_decimal(&json!(" 42 ")),
            Some(Decimal::from(42))
        );
        assert_eq!(
            to_decimal(&json!("1.2e-7")),
            Some(Decimal::from_scientific("1.2e-7").unwrap())
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(to_decimal(&json!(2000)), Some(Decimal::from(2000)));
        assert_eq!(to_decimal(&json!(-3)), Some(Decimal::from(-3)));
        assert_eq!(
            to_decimal(&json!(1.08)),
            Some(Decimal::from_f64(1.08).unwrap())
        );
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(to_decimal(&json!("not-a-number")), None);
        assert_eq!(to_decimal(&json!("")), None);
        assert_eq!(to_decimal(&json!(null)), None);
        assert_eq!(to_decimal(&json!(true)), None);
        assert_eq!(to_decimal(&json!({"val": 1})), None);
    }
}
