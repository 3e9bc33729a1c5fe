//! Arithmetic and statistics operators.
//!
//! All of these are NULL on NULL. Integer results stay integers only when
//! every operand is an integer; overflow is reported as an invalid value
//! instead of wrapping.

use itemrule_core::{BaseType, Cardinality, Scalar, Value};

use super::{arity, settle, single};
use crate::numeric::{
    all_ints, collect_numbers, float_result, floor_div, gcd, lcm, round_half_up, round_to, Number,
    Operands, RoundingMode,
};
use crate::registry::{OperatorContext, OperatorRegistry};

pub(super) fn register(registry: &mut OperatorRegistry) {
    registry.register("sum", |c, o| settle(sum(c, o)));
    registry.register("product", |c, o| settle(product(c, o)));
    registry.register("subtract", |c, o| settle(subtract(c, o)));
    registry.register("divide", |c, o| settle(divide(c, o)));
    registry.register("power", |c, o| settle(power(c, o)));
    registry.register("integerDivide", |c, o| settle(integer_divide(c, o)));
    registry.register("integerModulus", |c, o| settle(integer_modulus(c, o)));
    registry.register("truncate", |c, o| settle(truncate(c, o)));
    registry.register("round", |c, o| settle(round(c, o)));
    registry.register("roundTo", |c, o| settle(round_to_op(c, o)));
    registry.register("integerToFloat", |c, o| settle(integer_to_float(c, o)));
    registry.register("min", |c, o| settle(extreme(c, o, f64::min, i64::min)));
    registry.register("max", |c, o| settle(extreme(c, o, f64::max, i64::max)));
    registry.register("gcd", |c, o| settle(gcd_op(c, o)));
    registry.register("lcm", |c, o| settle(lcm_op(c, o)));
    registry.register("statsOperator", |c, o| settle(stats(c, o)));
}

fn null_of(base_type: BaseType) -> Value {
    Value::typed_null(base_type, Cardinality::Single)
}

/// Numbers from every operand, or the value to return early.
fn numbers(
    ctx: &OperatorContext<'_>,
    operands: &[Value],
    min: usize,
    max: Option<usize>,
    null_type: BaseType,
) -> Result<Vec<Number>, Value> {
    arity(ctx, operands, min, max)?;
    match collect_numbers(operands) {
        Ok(Operands::Numbers(n)) => Ok(n),
        Ok(Operands::Null) => Err(null_of(null_type)),
        Err(message) => Err(ctx.invalid(message)),
    }
}

/// Integer operands only, or the value to return early.
fn integers(
    ctx: &OperatorContext<'_>,
    operands: &[Value],
    min: usize,
    max: Option<usize>,
) -> Result<Vec<i64>, Value> {
    numbers(ctx, operands, min, max, BaseType::Integer)?
        .into_iter()
        .map(|n| match n {
            Number::Int(i) => Ok(i),
            Number::Float(_) => Err(ctx.invalid("expected integer operands")),
        })
        .collect()
}

fn result_type(ns: &[Number]) -> BaseType {
    if all_ints(ns) {
        BaseType::Integer
    } else {
        BaseType::Float
    }
}

fn fold(
    ctx: &OperatorContext<'_>,
    operands: &[Value],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
    identity: i64,
) -> Result<Value, Value> {
    let ns = numbers(ctx, operands, 1, None, BaseType::Float)?;
    if all_ints(&ns) {
        let mut acc = identity;
        for n in &ns {
            if let Number::Int(i) = n {
                acc = int_op(acc, *i).ok_or_else(|| ctx.invalid("integer overflow"))?;
            }
        }
        Ok(Value::integer(acc))
    } else {
        let acc = ns
            .iter()
            .fold(identity as f64, |acc, n| float_op(acc, n.as_f64()));
        Ok(float_result(acc))
    }
}

fn sum(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    fold(ctx, operands, i64::checked_add, |a, b| a + b, 0)
}

fn product(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    fold(ctx, operands, i64::checked_mul, |a, b| a * b, 1)
}

fn subtract(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let ns = numbers(ctx, operands, 2, Some(2), BaseType::Float)?;
    match (ns[0], ns[1]) {
        (Number::Int(a), Number::Int(b)) => a
            .checked_sub(b)
            .map(Value::integer)
            .ok_or_else(|| ctx.invalid("integer overflow")),
        (a, b) => Ok(float_result(a.as_f64() - b.as_f64())),
    }
}

/// Always a float; division by zero is NULL.
fn divide(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let ns = numbers(ctx, operands, 2, Some(2), BaseType::Float)?;
    let divisor = ns[1].as_f64();
    if divisor == 0.0 {
        return Ok(null_of(BaseType::Float));
    }
    Ok(float_result(ns[0].as_f64() / divisor))
}

fn power(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let ns = numbers(ctx, operands, 2, Some(2), BaseType::Float)?;
    Ok(float_result(ns[0].as_f64().powf(ns[1].as_f64())))
}

/// Floor division, so `-7 / 2` is `-4`.
fn integer_divide(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let is = integers(ctx, operands, 2, Some(2))?;
    if is[1] == 0 {
        return Ok(null_of(BaseType::Integer));
    }
    floor_div(is[0], is[1])
        .map(Value::integer)
        .ok_or_else(|| ctx.invalid("integer overflow"))
}

/// Remainder takes the sign of the dividend.
fn integer_modulus(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let is = integers(ctx, operands, 2, Some(2))?;
    if is[1] == 0 {
        return Ok(null_of(BaseType::Integer));
    }
    is[0]
        .checked_rem(is[1])
        .map(Value::integer)
        .ok_or_else(|| ctx.invalid("integer overflow"))
}

fn single_number(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Number, Value> {
    arity(ctx, operands, 1, Some(1))?;
    if operands[0].is_missing() {
        return Err(null_of(BaseType::Integer));
    }
    Number::from_scalar(single(ctx, &operands[0])?)
        .ok_or_else(|| ctx.invalid("expected a numeric operand"))
}

fn float_to_int(f: f64) -> Value {
    if !f.is_finite() || f < i64::MIN as f64 || f > i64::MAX as f64 {
        return null_of(BaseType::Integer);
    }
    Value::integer(f as i64)
}

fn truncate(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    match single_number(ctx, operands)? {
        Number::Int(i) => Ok(Value::integer(i)),
        Number::Float(f) => Ok(float_to_int(f.trunc())),
    }
}

/// Half rounds toward positive infinity: `round(-2.5)` is `-2`.
fn round(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    match single_number(ctx, operands)? {
        Number::Int(i) => Ok(Value::integer(i)),
        Number::Float(f) => Ok(round_half_up(f)
            .map(Value::integer)
            .unwrap_or_else(|| null_of(BaseType::Integer))),
    }
}

fn round_to_op(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let n = single_number(ctx, operands).map_err(|v| {
        if v.is_null() {
            null_of(BaseType::Float)
        } else {
            v
        }
    })?;
    let mode = match ctx.attr("roundingMode") {
        None => RoundingMode::SignificantFigures,
        Some(m) => RoundingMode::parse(&m)
            .ok_or_else(|| ctx.invalid(format!("unknown roundingMode '{}'", m)))?,
    };
    let figures = ctx
        .attr_i64("figures")
        .filter(|f| *f >= 0)
        .ok_or_else(|| ctx.invalid("missing or negative 'figures' attribute"))?;
    round_to(n.as_f64(), mode, figures as u32)
        .map(Value::float)
        .ok_or_else(|| ctx.invalid("operand cannot be rounded"))
}

fn integer_to_float(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 1, Some(1))?;
    if operands[0].is_missing() {
        return Ok(null_of(BaseType::Float));
    }
    match single(ctx, &operands[0])? {
        Scalar::Integer(i) => Ok(Value::float(*i as f64)),
        _ => Err(ctx.invalid("expected an integer operand")),
    }
}

fn extreme(
    ctx: &OperatorContext<'_>,
    operands: &[Value],
    float_pick: fn(f64, f64) -> f64,
    int_pick: fn(i64, i64) -> i64,
) -> Result<Value, Value> {
    let ns = numbers(ctx, operands, 1, None, BaseType::Float)?;
    if ns.is_empty() {
        return Ok(null_of(BaseType::Float));
    }
    Ok(match result_type(&ns) {
        BaseType::Integer => {
            let ints = ns.iter().filter_map(|n| match n {
                Number::Int(i) => Some(*i),
                Number::Float(_) => None,
            });
            ints.reduce(int_pick).map(Value::integer).unwrap_or_default()
        }
        _ => ns
            .iter()
            .map(|n| n.as_f64())
            .reduce(float_pick)
            .map(float_result)
            .unwrap_or_default(),
    })
}

fn gcd_op(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let is = integers(ctx, operands, 1, None)?;
    is.into_iter()
        .try_fold(0, gcd)
        .map(Value::integer)
        .ok_or_else(|| ctx.invalid("integer overflow"))
}

fn lcm_op(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let is = integers(ctx, operands, 1, None)?;
    let mut acc: i64 = 1;
    for i in is {
        acc = lcm(acc, i).ok_or_else(|| ctx.invalid("integer overflow"))?;
    }
    Ok(Value::integer(acc))
}

// ──────────────────────────────────────────────
// Statistics
// ──────────────────────────────────────────────

/// Summary statistics over one container of numbers, selected by the
/// `name` attribute.
fn stats(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let ns = numbers(ctx, operands, 1, Some(1), BaseType::Float)?;
    let name = ctx
        .attr("name")
        .ok_or_else(|| ctx.invalid("missing 'name' attribute"))?;
    let xs: Vec<f64> = ns.iter().map(|n| n.as_f64()).collect();
    let n = xs.len() as f64;
    if xs.is_empty() {
        return Ok(null_of(BaseType::Float));
    }
    let mean = xs.iter().sum::<f64>() / n;
    let squares = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    let sample = |v: f64| {
        if xs.len() < 2 {
            null_of(BaseType::Float)
        } else {
            float_result(v)
        }
    };
    match name.as_str() {
        "mean" => Ok(float_result(mean)),
        "popVariance" => Ok(float_result(squares / n)),
        "popSD" => Ok(float_result((squares / n).sqrt())),
        "sampleVariance" => Ok(sample(squares / (n - 1.0))),
        "sampleSD" => Ok(sample((squares / (n - 1.0)).sqrt())),
        other => Err(ctx.invalid(format!("unknown statistic '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itemrule_core::{Attributes, DeclarationStore};

    fn run(name: &str, attrs: Attributes, operands: &[Value]) -> Value {
        let mut r = OperatorRegistry::new();
        register(&mut r);
        let store = DeclarationStore::new();
        let ctx = OperatorContext {
            name,
            store: &store,
            attributes: &attrs,
        };
        (r.get(name).unwrap())(&ctx, operands)
    }

    fn plain(name: &str, operands: &[Value]) -> Value {
        run(name, Attributes::new(), operands)
    }

    #[test]
    fn sum_with_null_is_null_not_partial() {
        let v = plain("sum", &[Value::integer(1), Value::null()]);
        assert!(v.is_null());
        assert!(!v.is_invalid());
    }

    #[test]
    fn sum_keeps_integers_and_promotes_floats() {
        assert_eq!(
            plain("sum", &[Value::integer(1), Value::integer(2)]),
            Value::integer(3)
        );
        assert_eq!(
            plain("sum", &[Value::integer(1), Value::float(0.5)]),
            Value::float(1.5)
        );
    }

    #[test]
    fn sum_overflow_is_invalid() {
        assert!(plain("sum", &[Value::integer(i64::MAX), Value::integer(1)]).is_invalid());
    }

    #[test]
    fn product_and_subtract() {
        assert_eq!(
            plain("product", &[Value::integer(3), Value::integer(4)]),
            Value::integer(12)
        );
        assert_eq!(
            plain("subtract", &[Value::integer(3), Value::integer(10)]),
            Value::integer(-7)
        );
    }

    #[test]
    fn divide_by_zero_is_null() {
        assert!(plain("divide", &[Value::integer(1), Value::integer(0)]).is_null());
        assert_eq!(
            plain("divide", &[Value::integer(1), Value::integer(4)]),
            Value::float(0.25)
        );
    }

    #[test]
    fn integer_division_floors() {
        assert_eq!(
            plain("integerDivide", &[Value::integer(-7), Value::integer(2)]),
            Value::integer(-4)
        );
        assert_eq!(
            plain("integerModulus", &[Value::integer(-7), Value::integer(2)]),
            Value::integer(-1)
        );
        assert!(plain("integerDivide", &[Value::integer(1), Value::float(2.0)]).is_invalid());
    }

    #[test]
    fn truncate_and_round() {
        assert_eq!(plain("truncate", &[Value::float(-2.7)]), Value::integer(-2));
        assert_eq!(plain("round", &[Value::float(2.5)]), Value::integer(3));
        assert_eq!(plain("round", &[Value::float(-2.5)]), Value::integer(-2));
    }

    #[test]
    fn round_to_decimal_places() {
        let attrs = Attributes::new()
            .with("roundingMode", "decimalPlaces")
            .with("figures", "1");
        assert_eq!(run("roundTo", attrs, &[Value::float(1.25)]), Value::float(1.3));
    }

    #[test]
    fn min_max_preserve_integer_type() {
        let ops = [Value::integer(4), Value::integer(-1), Value::integer(9)];
        assert_eq!(plain("min", &ops), Value::integer(-1));
        assert_eq!(plain("max", &ops), Value::integer(9));
        assert_eq!(
            plain("max", &[Value::integer(4), Value::float(4.5)]),
            Value::float(4.5)
        );
    }

    #[test]
    fn gcd_and_lcm() {
        assert_eq!(
            plain("gcd", &[Value::integer(12), Value::integer(18)]),
            Value::integer(6)
        );
        assert_eq!(
            plain("lcm", &[Value::integer(4), Value::integer(6)]),
            Value::integer(12)
        );
    }

    #[test]
    fn gcd_and_lcm_overflow_is_invalid() {
        let min = Value::integer(i64::MIN);
        assert!(plain("lcm", &[min.clone(), min.clone()]).is_invalid());
        assert!(plain("gcd", &[min.clone(), Value::integer(0)]).is_invalid());
        assert_eq!(
            plain("gcd", &[min, Value::integer(6)]),
            Value::integer(2)
        );
    }

    #[test]
    fn stats_over_container() {
        let xs = Value::ordered(
            BaseType::Integer,
            vec![Scalar::Integer(2), Scalar::Integer(4), Scalar::Integer(6)],
        );
        let mean = run("statsOperator", Attributes::new().with("name", "mean"), &[xs.clone()]);
        assert_eq!(mean, Value::float(4.0));
        let var = run(
            "statsOperator",
            Attributes::new().with("name", "sampleVariance"),
            &[xs],
        );
        assert_eq!(var, Value::float(4.0));
    }

    #[test]
    fn sample_variance_needs_two_values() {
        let xs = Value::ordered(BaseType::Integer, vec![Scalar::Integer(2)]);
        let v = run(
            "statsOperator",
            Attributes::new().with("name", "sampleVariance"),
            &[xs],
        );
        assert!(v.is_null());
    }
}
