//! String operators.

use regex::Regex;

use itemrule_core::{Scalar, Value};

use super::{arity, null_bool, settle, single};
use crate::registry::{OperatorContext, OperatorRegistry};

pub(super) fn register(registry: &mut OperatorRegistry) {
    registry.register("stringMatch", |c, o| settle(string_match(c, o)));
    registry.register("substring", |c, o| settle(substring(c, o)));
    registry.register("patternMatch", |c, o| settle(pattern_match(c, o)));
}

fn text<'v>(ctx: &OperatorContext<'_>, v: &'v Value) -> Result<&'v str, Value> {
    match single(ctx, v)? {
        Scalar::String(s) | Scalar::Identifier(s) | Scalar::Uri(s) => Ok(s),
        other => Err(ctx.invalid(format!("expected a string operand, got {}", other.base_type()))),
    }
}

fn two_texts<'v>(
    ctx: &OperatorContext<'_>,
    operands: &'v [Value],
) -> Result<Option<(&'v str, &'v str)>, Value> {
    arity(ctx, operands, 2, Some(2))?;
    if operands[0].is_missing() || operands[1].is_missing() {
        return Ok(None);
    }
    Ok(Some((text(ctx, &operands[0])?, text(ctx, &operands[1])?)))
}

fn fold_case(s: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        s.to_string()
    } else {
        s.to_lowercase()
    }
}

fn string_match(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let Some((a, b)) = two_texts(ctx, operands)? else {
        return Ok(null_bool());
    };
    let case_sensitive = ctx.attr_bool("caseSensitive", true);
    let (a, b) = (fold_case(a, case_sensitive), fold_case(b, case_sensitive));
    // Legacy attribute: match when the first string occurs in the second.
    let hit = if ctx.attr_bool("substring", false) {
        b.contains(a.as_str())
    } else {
        a == b
    };
    Ok(Value::boolean(hit))
}

/// True when the first operand occurs in the second.
fn substring(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    let Some((needle, hay)) = two_texts(ctx, operands)? else {
        return Ok(null_bool());
    };
    let case_sensitive = ctx.attr_bool("caseSensitive", true);
    Ok(Value::boolean(
        fold_case(hay, case_sensitive).contains(fold_case(needle, case_sensitive).as_str()),
    ))
}

/// Whole-string regular expression match.
fn pattern_match(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 1, Some(1))?;
    let pattern = ctx
        .attr("pattern")
        .ok_or_else(|| ctx.invalid("missing 'pattern' attribute"))?;
    if operands[0].is_missing() {
        return Ok(null_bool());
    }
    let subject = text(ctx, &operands[0])?;
    let re = Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| ctx.invalid(format!("bad pattern '{}': {}", pattern, e)))?;
    Ok(Value::boolean(re.is_match(subject)))
}
