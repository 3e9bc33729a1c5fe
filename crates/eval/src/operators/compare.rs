//! Equality, ordering and hit-test operators.

use itemrule_core::{Scalar, Shape, Value};

use super::{arity, null_bool, settle, single};
use crate::numeric::{round_to, RoundingMode};
use crate::registry::{OperatorContext, OperatorRegistry};

pub(super) fn register(registry: &mut OperatorRegistry) {
    registry.register("match", |c, o| settle(match_values(c, o)));
    registry.register("equal", |c, o| settle(equal(c, o)));
    registry.register("equalRounded", |c, o| settle(equal_rounded(c, o)));
    registry.register("lt", |c, o| settle(order(c, o, |a, b| a < b)));
    registry.register("gt", |c, o| settle(order(c, o, |a, b| a > b)));
    registry.register("lte", |c, o| settle(order(c, o, |a, b| a <= b)));
    registry.register("gte", |c, o| settle(order(c, o, |a, b| a >= b)));
    registry.register("durationLT", |c, o| settle(duration(c, o, |a, b| a < b)));
    registry.register("durationGTE", |c, o| settle(duration(c, o, |a, b| a >= b)));
    registry.register("inside", |c, o| settle(inside(c, o)));
}

/// Two operands, NULL if either is missing.
fn binary<'v>(
    ctx: &OperatorContext<'_>,
    operands: &'v [Value],
) -> Result<Option<(&'v Value, &'v Value)>, Value> {
    arity(ctx, operands, 2, Some(2))?;
    if operands[0].is_missing() || operands[1].is_missing() {
        return Ok(None);
    }
    Ok(Some((&operands[0], &operands[1])))
}

fn numeric_pair(ctx: &OperatorContext<'_>, l: &Value, r: &Value) -> Result<(f64, f64), Value> {
    let a = single(ctx, l)?
        .as_f64()
        .ok_or_else(|| ctx.invalid("expected numeric operands"))?;
    let b = single(ctx, r)?
        .as_f64()
        .ok_or_else(|| ctx.invalid("expected numeric operands"))?;
    Ok((a, b))
}

fn match_values(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let Some((l, r)) = binary(ctx, operands)? else {
        return Ok(null_bool());
    };
    if l.cardinality() != r.cardinality() {
        return Err(ctx.invalid(format!(
            "cardinality mismatch: {:?} vs {:?}",
            l.cardinality(),
            r.cardinality()
        )));
    }
    if l.base_type() != r.base_type() {
        return Err(ctx.invalid(format!(
            "base type mismatch: {:?} vs {:?}",
            l.base_type(),
            r.base_type()
        )));
    }
    Ok(Value::boolean(l.matches(r)))
}

/// Numeric equality with an optional tolerance window around the second
/// operand.
fn equal(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let Some((l, r)) = binary(ctx, operands)? else {
        return Ok(null_bool());
    };
    let (x, y) = numeric_pair(ctx, l, r)?;
    let mode = ctx.attr("toleranceMode").unwrap_or_else(|| "exact".to_string());
    if mode == "exact" {
        return Ok(Value::boolean(x == y));
    }

    let tolerance = ctx.attr("tolerance").unwrap_or_default();
    let mut parts = tolerance.split_whitespace().map(str::parse::<f64>);
    let t0 = match parts.next() {
        Some(Ok(t)) => t,
        _ => return Err(ctx.invalid("missing or non-numeric 'tolerance' attribute")),
    };
    let t1 = match parts.next() {
        Some(Ok(t)) => t,
        Some(Err(_)) => return Err(ctx.invalid("non-numeric 'tolerance' attribute")),
        None => t0,
    };

    let (lower, upper) = match mode.as_str() {
        "absolute" => (y - t0, y + t1),
        "relative" => (y * (1.0 - t0 / 100.0), y * (1.0 + t1 / 100.0)),
        other => return Err(ctx.invalid(format!("unknown toleranceMode '{}'", other))),
    };
    let include_lower = ctx.attr_bool("includeLowerBound", true);
    let include_upper = ctx.attr_bool("includeUpperBound", true);
    let above = if include_lower { x >= lower } else { x > lower };
    let below = if include_upper { x <= upper } else { x < upper };
    Ok(Value::boolean(above && below))
}

fn equal_rounded(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let Some((l, r)) = binary(ctx, operands)? else {
        return Ok(null_bool());
    };
    let (x, y) = numeric_pair(ctx, l, r)?;
    let mode = match ctx.attr("roundingMode") {
        None => RoundingMode::SignificantFigures,
        Some(m) => RoundingMode::parse(&m)
            .ok_or_else(|| ctx.invalid(format!("unknown roundingMode '{}'", m)))?,
    };
    let figures = ctx
        .attr_i64("figures")
        .filter(|f| *f >= 0)
        .ok_or_else(|| ctx.invalid("missing or negative 'figures' attribute"))?;
    let rx = round_to(x, mode, figures as u32);
    let ry = round_to(y, mode, figures as u32);
    match (rx, ry) {
        (Some(a), Some(b)) => Ok(Value::boolean(a == b)),
        _ => Err(ctx.invalid("operands cannot be rounded")),
    }
}

fn order(
    ctx: &OperatorContext<'_>,
    operands: &[Value],
    cmp: fn(f64, f64) -> bool,
) -> Result<Value, Value> {
    let Some((l, r)) = binary(ctx, operands)? else {
        return Ok(null_bool());
    };
    let (a, b) = numeric_pair(ctx, l, r)?;
    Ok(Value::boolean(cmp(a, b)))
}

fn duration(
    ctx: &OperatorContext<'_>,
    operands: &[Value],
    cmp: fn(f64, f64) -> bool,
) -> Result<Value, Value> {
    let Some((l, r)) = binary(ctx, operands)? else {
        return Ok(null_bool());
    };
    match (single(ctx, l)?, single(ctx, r)?) {
        (Scalar::Duration(a), Scalar::Duration(b)) => Ok(Value::boolean(cmp(*a, *b))),
        _ => Err(ctx.invalid("expected duration operands")),
    }
}

fn inside(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 1, Some(1))?;
    if operands[0].is_missing() {
        return Ok(null_bool());
    }
    let shape_name = ctx
        .attr("shape")
        .ok_or_else(|| ctx.invalid("missing 'shape' attribute"))?;
    let shape: Shape = serde_json::from_value(serde_json::Value::String(shape_name.clone()))
        .map_err(|_| ctx.invalid(format!("unknown shape '{}'", shape_name)))?;
    let coords = ctx.attr("coords").unwrap_or_default();
    let mut hit = false;
    for scalar in operands[0].scalars() {
        match scalar {
            Scalar::Point(x, y) => hit |= shape.contains(&coords, *x as f64, *y as f64),
            _ => return Err(ctx.invalid("expected point operands")),
        }
    }
    Ok(Value::boolean(hit))
}
