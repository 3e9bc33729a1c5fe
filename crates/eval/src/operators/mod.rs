//! Bundled operator library.
//!
//! Each submodule registers a family of operators. NULL handling is decided
//! per operator: most return NULL as soon as an operand is NULL, but some
//! (`isNull`, `and`, `or`, `anyN`, `multiple`, `ordered`, `containerSize`)
//! look at NULL operands themselves.

mod arithmetic;
mod compare;
mod container;
mod logic;
mod text;

use itemrule_core::{BaseType, Cardinality, Scalar, Value};

use crate::registry::{OperatorContext, OperatorRegistry};

/// Register every bundled operator.
pub fn register_standard(registry: &mut OperatorRegistry) {
    logic::register(registry);
    compare::register(registry);
    arithmetic::register(registry);
    container::register(registry);
    text::register(registry);
}

// ──────────────────────────────────────────────
// Shared helpers
// ──────────────────────────────────────────────

/// Check the operand count, producing an invalid value when it is off.
pub(crate) fn arity(
    ctx: &OperatorContext<'_>,
    operands: &[Value],
    min: usize,
    max: Option<usize>,
) -> Result<(), Value> {
    let n = operands.len();
    let ok = n >= min && max.map_or(true, |m| n <= m);
    if ok {
        Ok(())
    } else {
        let expected = match max {
            Some(m) if m == min => format!("{}", min),
            Some(m) => format!("{} to {}", min, m),
            None => format!("at least {}", min),
        };
        Err(ctx.invalid(format!("expected {} operands, got {}", expected, n)))
    }
}

/// The single scalar of an operand, or an invalid value when the operand is
/// a container.
pub(crate) fn single<'v>(ctx: &OperatorContext<'_>, v: &'v Value) -> Result<&'v Scalar, Value> {
    v.as_single()
        .ok_or_else(|| ctx.invalid("expected an operand with single cardinality"))
}

/// A boolean NULL of single cardinality.
pub(crate) fn null_bool() -> Value {
    Value::typed_null(BaseType::Boolean, Cardinality::Single)
}

/// Collapse a `Result<Value, Value>` where the error arm is already the
/// value to return.
pub(crate) fn settle(r: Result<Value, Value>) -> Value {
    r.unwrap_or_else(|v| v)
}
