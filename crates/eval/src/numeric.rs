//! Numeric helpers shared by the arithmetic and comparison operators.
//!
//! Integer arithmetic stays in `i64` with overflow checks; anything that
//! touches a float is computed in `f64`. Rounding to decimal places or
//! significant figures goes through `rust_decimal` so the digits are exact
//! rather than binary-float approximations.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use itemrule_core::{BaseType, Scalar, Value};

/// A numeric operand that remembers whether it was an integer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn from_scalar(s: &Scalar) -> Option<Number> {
        match s {
            Scalar::Integer(i) => Some(Number::Int(*i)),
            Scalar::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

}

/// Outcome of collecting numeric operands.
pub enum Operands {
    Numbers(Vec<Number>),
    /// At least one operand was absent or invalid.
    Null,
}

/// Flatten every operand's scalars into numbers.
///
/// Absent or invalid operands short-circuit to [`Operands::Null`]; a
/// non-numeric scalar is an error message.
pub fn collect_numbers(operands: &[Value]) -> Result<Operands, String> {
    let mut out = Vec::new();
    for operand in operands {
        if operand.is_missing() {
            return Ok(Operands::Null);
        }
        for s in operand.scalars() {
            match Number::from_scalar(s) {
                Some(n) => out.push(n),
                None => {
                    return Err(format!("expected a numeric operand, got {}", s.base_type()));
                }
            }
        }
    }
    Ok(Operands::Numbers(out))
}

/// True when every number is an integer.
pub fn all_ints(numbers: &[Number]) -> bool {
    numbers.iter().all(|n| matches!(n, Number::Int(_)))
}

/// Wrap an `f64` result, mapping non-finite results to a typed null.
pub fn float_result(v: f64) -> Value {
    if v.is_finite() {
        Value::float(v)
    } else {
        Value::typed_null(BaseType::Float, itemrule_core::Cardinality::Single)
    }
}

// ──────────────────────────────────────────────
// Rounding
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    SignificantFigures,
    DecimalPlaces,
}

impl RoundingMode {
    pub fn parse(s: &str) -> Option<RoundingMode> {
        match s {
            "significantFigures" => Some(RoundingMode::SignificantFigures),
            "decimalPlaces" => Some(RoundingMode::DecimalPlaces),
            _ => None,
        }
    }
}

/// Round half up to the nearest integer (`floor(x + 0.5)`).
pub fn round_half_up(v: f64) -> Option<i64> {
    if !v.is_finite() {
        return None;
    }
    let r = (v + 0.5).floor();
    if r < i64::MIN as f64 || r > i64::MAX as f64 {
        return None;
    }
    Some(r as i64)
}

/// Round to a number of significant figures or decimal places.
///
/// Midpoints round away from zero. Returns `None` for values `Decimal`
/// cannot represent or for zero significant figures.
pub fn round_to(v: f64, mode: RoundingMode, figures: u32) -> Option<f64> {
    // Parse the shortest decimal rendering so 2.675 stays 2.675.
    let d: Decimal = v.to_string().parse().ok()?;
    let rounded = match mode {
        RoundingMode::DecimalPlaces => {
            d.round_dp_with_strategy(figures, RoundingStrategy::MidpointAwayFromZero)
        }
        RoundingMode::SignificantFigures => {
            if figures == 0 {
                return None;
            }
            d.round_sf_with_strategy(figures, RoundingStrategy::MidpointAwayFromZero)?
        }
    };
    rounded.to_f64()
}

// ──────────────────────────────────────────────
// Integer helpers
// ──────────────────────────────────────────────

/// Division rounded toward negative infinity.
pub fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// `None` when the result (2^63) does not fit in `i64`.
pub fn gcd(a: i64, b: i64) -> Option<i64> {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    i64::try_from(a).ok()
}

pub fn lcm(a: i64, b: i64) -> Option<i64> {
    if a == 0 || b == 0 {
        return Some(0);
    }
    (a / gcd(a, b)?).checked_mul(b)?.checked_abs()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_numbers_propagates_null() {
        let ops = [Value::integer(1), Value::null()];
        assert!(matches!(collect_numbers(&ops), Ok(Operands::Null)));
    }

    #[test]
    fn collect_numbers_rejects_text() {
        let ops = [Value::integer(1), Value::identifier("A")];
        assert!(collect_numbers(&ops).is_err());
    }

    #[test]
    fn gcd_lcm_report_overflow() {
        assert_eq!(gcd(-12, 18), Some(6));
        assert_eq!(gcd(i64::MIN, 0), None);
        assert_eq!(gcd(i64::MIN, 6), Some(2));
        assert_eq!(lcm(-4, 6), Some(12));
        assert_eq!(lcm(i64::MIN, i64::MIN), None);
        assert_eq!(lcm(i64::MIN, 3), None);
        assert_eq!(lcm(i64::MAX, 2), None);
    }

    #[test]
    fn round_half_up_goes_toward_positive_infinity() {
        assert_eq!(round_half_up(2.5), Some(3));
        assert_eq!(round_half_up(-2.5), Some(-2));
        assert_eq!(round_half_up(-2.6), Some(-3));
        assert_eq!(round_half_up(f64::NAN), None);
    }

    #[test]
    fn round_to_decimal_places() {
        assert_eq!(round_to(3.14159, RoundingMode::DecimalPlaces, 2), Some(3.14));
        assert_eq!(round_to(2.675, RoundingMode::DecimalPlaces, 2), Some(2.68));
    }

    #[test]
    fn round_to_significant_figures() {
        assert_eq!(
            round_to(1234.5, RoundingMode::SignificantFigures, 2),
            Some(1200.0)
        );
        assert_eq!(
            round_to(0.012345, RoundingMode::SignificantFigures, 3),
            Some(0.0123)
        );
        assert_eq!(round_to(5.0, RoundingMode::SignificantFigures, 0), None);
    }

    #[test]
    fn floor_division() {
        assert_eq!(floor_div(7, 2), Some(3));
        assert_eq!(floor_div(-7, 2), Some(-4));
        assert_eq!(floor_div(7, -2), Some(-4));
        assert_eq!(floor_div(7, 0), None);
    }

    #[test]
    fn gcd_and_lcm() {
        assert_eq!(gcd(12, 18), Some(6));
        assert_eq!(gcd(0, 5), Some(5));
        assert_eq!(lcm(4, 6), Some(12));
        assert_eq!(lcm(0, 6), Some(0));
    }
}
