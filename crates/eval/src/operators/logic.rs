//! Boolean operators.

use itemrule_core::Value;

use super::{arity, null_bool, settle, single};
use crate::registry::{OperatorContext, OperatorRegistry};

pub(super) fn register(registry: &mut OperatorRegistry) {
    registry.register("and", |c, o| settle(and(c, o)));
    registry.register("or", |c, o| settle(or(c, o)));
    registry.register("not", |c, o| settle(not(c, o)));
    registry.register("anyN", |c, o| settle(any_n(c, o)));
    registry.register("isNull", |c, o| settle(is_null(c, o)));
}

/// Tally of boolean operands; absent and invalid operands count as unknown.
struct Tally {
    trues: usize,
    falses: usize,
    unknown: usize,
}

fn tally(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Tally, Value> {
    let mut t = Tally {
        trues: 0,
        falses: 0,
        unknown: 0,
    };
    for op in operands {
        if op.is_missing() {
            t.unknown += 1;
            continue;
        }
        match single(ctx, op)?.as_bool() {
            Some(true) => t.trues += 1,
            Some(false) => t.falses += 1,
            None => return Err(ctx.invalid("expected boolean operands")),
        }
    }
    Ok(t)
}

/// False if any operand is false, NULL if the rest are undetermined.
fn and(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 1, None)?;
    let t = tally(ctx, operands)?;
    Ok(if t.falses > 0 {
        Value::boolean(false)
    } else if t.unknown > 0 {
        null_bool()
    } else {
        Value::boolean(true)
    })
}

fn or(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 1, None)?;
    let t = tally(ctx, operands)?;
    Ok(if t.trues > 0 {
        Value::boolean(true)
    } else if t.unknown > 0 {
        null_bool()
    } else {
        Value::boolean(false)
    })
}

fn not(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 1, Some(1))?;
    if operands[0].is_missing() {
        return Ok(null_bool());
    }
    match single(ctx, &operands[0])?.as_bool() {
        Some(b) => Ok(Value::boolean(!b)),
        None => Err(ctx.invalid("expected a boolean operand")),
    }
}

/// True when between `min` and `max` operands are true; NULL when the
/// unknown operands could tip it either way.
fn any_n(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 1, None)?;
    let min = ctx
        .attr_i64("min")
        .ok_or_else(|| ctx.invalid("missing or non-integer 'min' attribute"))?;
    let max = ctx
        .attr_i64("max")
        .ok_or_else(|| ctx.invalid("missing or non-integer 'max' attribute"))?;
    let t = tally(ctx, operands)?;
    let (trues, possible) = (t.trues as i64, (t.trues + t.unknown) as i64);
    Ok(if trues > max || possible < min {
        Value::boolean(false)
    } else if trues >= min && possible <= max {
        Value::boolean(true)
    } else {
        null_bool()
    })
}

fn is_null(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 1, Some(1))?;
    Ok(Value::boolean(operands[0].is_missing()))
}
