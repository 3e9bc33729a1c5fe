//! Container construction and membership operators.

use itemrule_core::{BaseType, Cardinality, Scalar, Value};

use super::{arity, null_bool, settle, single};
use crate::registry::{OperatorContext, OperatorRegistry};

/// Largest container `repeat` will build.
const MAX_REPEAT_LEN: usize = 1 << 20;

pub(super) fn register(registry: &mut OperatorRegistry) {
    registry.register("multiple", |c, o| settle(build(c, o, Cardinality::Multiple)));
    registry.register("ordered", |c, o| settle(build(c, o, Cardinality::Ordered)));
    registry.register("containerSize", |c, o| settle(container_size(c, o)));
    registry.register("member", |c, o| settle(member(c, o)));
    registry.register("contains", |c, o| settle(contains(c, o)));
    registry.register("delete", |c, o| settle(delete(c, o)));
    registry.register("index", |c, o| settle(index(c, o)));
    registry.register("repeat", |c, o| settle(repeat(c, o)));
    registry.register("fieldValue", |c, o| settle(field_value(c, o)));
}

/// Flatten non-null operands into one container, checking that they share a
/// base type and that no operand has the other container cardinality.
fn gather(
    ctx: &OperatorContext<'_>,
    operands: &[Value],
    cardinality: Cardinality,
) -> Result<(Option<BaseType>, Vec<Scalar>), Value> {
    let mut base_type = None;
    let mut out = Vec::new();
    for op in operands.iter().filter(|o| !o.is_missing()) {
        match op.cardinality() {
            Some(Cardinality::Single) => {}
            Some(c) if c == cardinality => {}
            _ => {
                return Err(ctx.invalid(format!(
                    "operands must be single or {}",
                    cardinality.as_str()
                )))
            }
        }
        let bt = op.base_type();
        if base_type.is_some() && bt != base_type {
            return Err(ctx.invalid("operands must share a base type"));
        }
        base_type = bt;
        out.extend_from_slice(op.scalars());
    }
    Ok((base_type, out))
}

/// `multiple` / `ordered`: NULL operands are skipped; all NULL gives NULL.
fn build(
    ctx: &OperatorContext<'_>,
    operands: &[Value],
    cardinality: Cardinality,
) -> Result<Value, Value> {
    let (base_type, values) = gather(ctx, operands, cardinality)?;
    Ok(match base_type {
        Some(bt) if !values.is_empty() => Value::container(bt, cardinality, values),
        _ => Value::Null {
            base_type,
            cardinality: Some(cardinality),
        },
    })
}

/// Size of a container; NULL counts as empty.
fn container_size(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 1, Some(1))?;
    let op = &operands[0];
    if op.is_missing() {
        return Ok(Value::integer(0));
    }
    if !op.cardinality().is_some_and(|c| c.is_container()) {
        return Err(ctx.invalid("expected a container operand"));
    }
    Ok(Value::integer(op.scalars().len() as i64))
}

fn member(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 2, Some(2))?;
    let (needle, haystack) = (&operands[0], &operands[1]);
    if needle.is_missing() || haystack.is_missing() {
        return Ok(null_bool());
    }
    let needle = single(ctx, needle)?;
    if haystack.base_type() != Some(needle.base_type()) {
        return Err(ctx.invalid("operands must share a base type"));
    }
    Ok(Value::boolean(
        haystack.scalars().iter().any(|s| s.matches(needle)),
    ))
}

/// Multiset inclusion for `multiple`; contiguous run for `ordered`.
fn contains(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 2, Some(2))?;
    let (outer, inner) = (&operands[0], &operands[1]);
    if outer.is_missing() || inner.is_missing() {
        return Ok(null_bool());
    }
    if outer.cardinality() != inner.cardinality() || outer.base_type() != inner.base_type() {
        return Err(ctx.invalid("operands must have the same type and cardinality"));
    }
    let (hay, needle) = (outer.scalars(), inner.scalars());
    let found = match outer.cardinality() {
        Some(Cardinality::Ordered) => hay
            .windows(needle.len())
            .any(|w| w.iter().zip(needle).all(|(a, b)| a.matches(b))),
        Some(Cardinality::Multiple) => {
            let mut used = vec![false; hay.len()];
            needle.iter().all(|n| {
                match (0..hay.len()).find(|&i| !used[i] && hay[i].matches(n)) {
                    Some(i) => {
                        used[i] = true;
                        true
                    }
                    None => false,
                }
            })
        }
        _ => return Err(ctx.invalid("expected container operands")),
    };
    Ok(Value::boolean(found))
}

/// Every occurrence of the first operand removed from the container.
fn delete(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 2, Some(2))?;
    let (target, container) = (&operands[0], &operands[1]);
    if target.is_missing() || container.is_missing() {
        return Ok(Value::Null {
            base_type: container.base_type(),
            cardinality: container.cardinality(),
        });
    }
    let target = single(ctx, target)?;
    let (bt, card) = match (container.base_type(), container.cardinality()) {
        (Some(bt), Some(c)) if c.is_container() => (bt, c),
        _ => return Err(ctx.invalid("expected a container as second operand")),
    };
    let kept = container
        .scalars()
        .iter()
        .filter(|s| !s.matches(target))
        .cloned()
        .collect();
    Ok(Value::container(bt, card, kept))
}

/// The `n`th element (1-based) of an ordered container.
fn index(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 1, Some(1))?;
    let op = &operands[0];
    let n = ctx
        .attr_i64("n")
        .ok_or_else(|| ctx.invalid("missing or non-integer 'n' attribute"))?;
    if op.is_missing() {
        return Ok(Value::Null {
            base_type: op.base_type(),
            cardinality: Some(Cardinality::Single),
        });
    }
    if op.cardinality() != Some(Cardinality::Ordered) {
        return Err(ctx.invalid("expected an ordered container"));
    }
    if n < 1 {
        return Err(ctx.invalid(format!("index {} is out of range", n)));
    }
    Ok(match op.scalars().get((n - 1) as usize) {
        Some(s) => Value::Single(s.clone()),
        None => Value::Null {
            base_type: op.base_type(),
            cardinality: Some(Cardinality::Single),
        },
    })
}

fn repeat(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 1, None)?;
    let times = ctx
        .attr_i64("numberRepeats")
        .ok_or_else(|| ctx.invalid("missing or non-integer 'numberRepeats' attribute"))?;
    let (base_type, once) = gather(ctx, operands, Cardinality::Ordered)?;
    let bt = match base_type {
        Some(bt) if times >= 1 && !once.is_empty() => bt,
        _ => {
            return Ok(Value::Null {
                base_type,
                cardinality: Some(Cardinality::Ordered),
            })
        }
    };
    let len = usize::try_from(times)
        .ok()
        .and_then(|t| t.checked_mul(once.len()))
        .filter(|&n| n <= MAX_REPEAT_LEN)
        .ok_or_else(|| {
            ctx.invalid(format!(
                "result would exceed {} values",
                MAX_REPEAT_LEN
            ))
        })?;
    let mut values = Vec::with_capacity(len);
    for _ in 0..times {
        values.extend_from_slice(&once);
    }
    Ok(Value::ordered(bt, values))
}

fn field_value(ctx: &OperatorContext<'_>, operands: &[Value]) -> Result<Value, Value> {
    arity(ctx, operands, 1, Some(1))?;
    let field = ctx
        .attr("fieldIdentifier")
        .ok_or_else(|| ctx.invalid("missing 'fieldIdentifier' attribute"))?;
    if operands[0].is_missing() {
        return Ok(Value::null());
    }
    match single(ctx, &operands[0])? {
        Scalar::Record(fields) => Ok(fields.get(&field).cloned().unwrap_or_default()),
        _ => Err(ctx.invalid("expected a record operand")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

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

    fn ids(xs: &[&str]) -> Vec<Scalar> {
        xs.iter().map(|s| Scalar::Identifier(s.to_string())).collect()
    }

    #[test]
    fn multiple_skips_null_and_flattens() {
        let v = run(
            "multiple",
            Attributes::new(),
            &[
                Value::identifier("A"),
                Value::null(),
                Value::multiple(BaseType::Identifier, ids(&["B", "C"])),
            ],
        );
        assert_eq!(v, Value::multiple(BaseType::Identifier, ids(&["A", "B", "C"])));
    }

    #[test]
    fn multiple_of_only_nulls_is_null() {
        let v = run("multiple", Attributes::new(), &[Value::null(), Value::null()]);
        assert!(v.is_null());
    }

    #[test]
    fn ordered_rejects_mixed_types() {
        let v = run(
            "ordered",
            Attributes::new(),
            &[Value::identifier("A"), Value::integer(1)],
        );
        assert!(v.is_invalid());
    }

    #[test]
    fn container_size_counts_null_as_zero() {
        assert_eq!(
            run("containerSize", Attributes::new(), &[Value::null()]),
            Value::integer(0)
        );
        assert_eq!(
            run(
                "containerSize",
                Attributes::new(),
                &[Value::multiple(BaseType::Identifier, ids(&["A", "B"]))]
            ),
            Value::integer(2)
        );
    }

    #[test]
    fn member_and_delete() {
        let c = Value::multiple(BaseType::Identifier, ids(&["A", "B", "A"]));
        assert_eq!(
            run("member", Attributes::new(), &[Value::identifier("B"), c.clone()]),
            Value::boolean(true)
        );
        assert_eq!(
            run("delete", Attributes::new(), &[Value::identifier("A"), c]),
            Value::multiple(BaseType::Identifier, ids(&["B"]))
        );
    }

    #[test]
    fn contains_multiset_and_ordered() {
        let m = Value::multiple(BaseType::Identifier, ids(&["A", "B", "C"]));
        let sub = Value::multiple(BaseType::Identifier, ids(&["C", "A"]));
        assert_eq!(
            run("contains", Attributes::new(), &[m, sub]),
            Value::boolean(true)
        );

        let o = Value::ordered(BaseType::Identifier, ids(&["A", "B", "C"]));
        let run_ok = Value::ordered(BaseType::Identifier, ids(&["B", "C"]));
        let gap = Value::ordered(BaseType::Identifier, ids(&["A", "C"]));
        assert_eq!(
            run("contains", Attributes::new(), &[o.clone(), run_ok]),
            Value::boolean(true)
        );
        assert_eq!(
            run("contains", Attributes::new(), &[o, gap]),
            Value::boolean(false)
        );
    }

    #[test]
    fn index_is_one_based() {
        let o = Value::ordered(BaseType::Identifier, ids(&["A", "B", "C"]));
        let attrs = Attributes::new().with("n", "2");
        assert_eq!(run("index", attrs, &[o.clone()]), Value::identifier("B"));
        let attrs = Attributes::new().with("n", "9");
        assert!(run("index", attrs, &[o]).is_null());
    }

    #[test]
    fn repeat_rejects_oversized_results() {
        let one = Value::ordered(BaseType::Integer, vec![Scalar::Integer(1)]);
        let attrs = Attributes::new().with("numberRepeats", i64::MAX.to_string());
        assert!(run("repeat", attrs, &[one.clone()]).is_invalid());
        let attrs = Attributes::new().with("numberRepeats", "2000000");
        assert!(run("repeat", attrs, &[one]).is_invalid());
    }

    #[test]
    fn repeat_concatenates() {
        let attrs = Attributes::new().with("numberRepeats", "2");
        let v = run(
            "repeat",
            attrs,
            &[Value::identifier("A"), Value::identifier("B")],
        );
        assert_eq!(
            v,
            Value::ordered(BaseType::Identifier, ids(&["A", "B", "A", "B"]))
        );
    }

    #[test]
    fn field_value_reads_record() {
        let mut fields = BTreeMap::new();
        fields.insert("score".to_string(), Value::integer(4));
        let record = Value::Single(Scalar::Record(fields));
        let attrs = Attributes::new().with("fieldIdentifier", "score");
        assert_eq!(run("fieldValue", attrs, &[record.clone()]), Value::integer(4));
        let attrs = Attributes::new().with("fieldIdentifier", "missing");
        assert!(run("fieldValue", attrs, &[record]).is_null());
    }
}
