//! Expression evaluator.
//!
//! Reduces an expression tree to a [`Value`]. Leaves read the declaration
//! store; operator nodes evaluate their operands left to right and hand the
//! results to the registered operator; test-level nodes read the test
//! evaluation context. Evaluation never mutates the store.

use rand::rngs::StdRng;
use rand::Rng;

use itemrule_core::{Cardinality, DeclarationStore, Expression, OperatorNode, Value};

use crate::error::EvalError;
use crate::registry::{OperatorContext, OperatorRegistry};
use crate::test_context::{ItemCount, TestContext};

/// Everything an expression may read, plus the random source.
pub struct Env<'a> {
    pub store: &'a DeclarationStore,
    pub registry: &'a OperatorRegistry,
    pub rng: &'a mut StdRng,
    pub tests: Option<&'a TestContext>,
}

/// Evaluate an expression.
///
/// Operator-level problems (wrong operand types, bad attributes) come back
/// as `Value::Invalid`. Errors are reserved for an operator missing from
/// the registry and for test-level expressions evaluated without a test
/// context.
pub fn evaluate(env: &mut Env<'_>, expr: &Expression) -> Result<Value, EvalError> {
    match expr {
        Expression::BaseValue(v) => Ok(v.clone()),

        Expression::Variable(id) => Ok(variable(env, id)),

        Expression::Correct(id) => Ok(env.store.get_correct_response(id)),

        Expression::Default(id) => Ok(env.store.get_default_value(id)),

        Expression::Null => Ok(Value::null()),

        Expression::MapResponse(id) => Ok(match env.store.get_mapping(id) {
            Some(mapping) => Value::float(mapping.apply(&env.store.get_value(id))),
            None => Value::invalid(format!("mapResponse: '{}' has no mapping", id)),
        }),

        Expression::MapResponsePoint(id) => Ok(match env.store.get_area_mapping(id) {
            Some(mapping) => Value::float(mapping.apply(&env.store.get_value(id))),
            None => Value::invalid(format!(
                "mapResponsePoint: '{}' has no area mapping",
                id
            )),
        }),

        Expression::RandomInteger { min, max, step } => {
            Ok(random_integer(env, *min, *max, *step))
        }

        Expression::RandomFloat { min, max } => Ok(random_float(env, *min, *max)),

        Expression::Random(inner) => {
            let container = evaluate(env, inner)?;
            Ok(random_element(env, &container))
        }

        Expression::Operator(node) => apply_operator(env, node),

        // ── Test-level aggregates ──
        Expression::TestVariables(var) => {
            Ok(test_context(env, "testVariables")?.test_variables(var))
        }
        Expression::OutcomeMinimum(var) => {
            Ok(test_context(env, "outcomeMinimum")?.outcome_minimum(var))
        }
        Expression::OutcomeMaximum(var) => {
            Ok(test_context(env, "outcomeMaximum")?.outcome_maximum(var))
        }
        Expression::NumberCorrect(f) => {
            Ok(test_context(env, "numberCorrect")?.count(ItemCount::Correct, f))
        }
        Expression::NumberIncorrect(f) => {
            Ok(test_context(env, "numberIncorrect")?.count(ItemCount::Incorrect, f))
        }
        Expression::NumberPresented(f) => {
            Ok(test_context(env, "numberPresented")?.count(ItemCount::Presented, f))
        }
        Expression::NumberResponded(f) => {
            Ok(test_context(env, "numberResponded")?.count(ItemCount::Responded, f))
        }
        Expression::NumberSelected(f) => {
            Ok(test_context(env, "numberSelected")?.count(ItemCount::Selected, f))
        }
    }
}

fn apply_operator(env: &mut Env<'_>, node: &OperatorNode) -> Result<Value, EvalError> {
    let op = env
        .registry
        .get(&node.name)
        .cloned()
        .ok_or_else(|| EvalError::UnknownOperator {
            name: node.name.clone(),
        })?;

    let mut operands = Vec::with_capacity(node.operands.len());
    for operand in &node.operands {
        operands.push(evaluate(env, operand)?);
    }

    let ctx = OperatorContext {
        name: &node.name,
        store: env.store,
        attributes: &node.attributes,
    };
    let result = op(&ctx, &operands);
    if let Some(message) = result.invalid_message() {
        tracing::debug!(operator = %node.name, %message, "operator produced an invalid value");
    }
    Ok(result)
}

/// A store variable, or `item.VAR` from the test context when the
/// identifier is not declared locally.
fn variable(env: &Env<'_>, id: &str) -> Value {
    if env.store.contains(id) {
        return env.store.get_value(id);
    }
    match (env.tests, id.split_once('.')) {
        (Some(tests), Some((item, var))) => tests
            .item(item)
            .map(|state| state.variables.get_value(var))
            .unwrap_or_default(),
        _ => Value::null(),
    }
}

fn test_context<'a>(
    env: &Env<'a>,
    expression: &'static str,
) -> Result<&'a TestContext, EvalError> {
    env.tests.ok_or(EvalError::MissingTestContext { expression })
}

// ──────────────────────────────────────────────
// Random leaves
// ──────────────────────────────────────────────

fn random_integer(env: &mut Env<'_>, min: i64, max: i64, step: i64) -> Value {
    let span = match max.checked_sub(min) {
        Some(span) if step >= 1 && span >= 0 => span,
        _ => {
            return Value::invalid(format!(
                "randomInteger: empty range {}..={} step {}",
                min, max, step
            ))
        }
    };
    let slots = span / step;
    let k = env.rng.gen_range(0..=slots);
    Value::integer(min + k * step)
}

fn random_float(env: &mut Env<'_>, min: f64, max: f64) -> Value {
    if !min.is_finite() || !max.is_finite() || min > max {
        return Value::invalid(format!("randomFloat: empty range {}..={}", min, max));
    }
    if !(max - min).is_finite() {
        return Value::invalid(format!("randomFloat: range {}..={} is too wide", min, max));
    }
    if min == max {
        return Value::float(min);
    }
    Value::float(env.rng.gen_range(min..=max))
}

/// A uniformly chosen element of a container.
fn random_element(env: &mut Env<'_>, container: &Value) -> Value {
    if container.is_missing() {
        return Value::Null {
            base_type: container.base_type(),
            cardinality: Some(Cardinality::Single),
        };
    }
    if !container.cardinality().is_some_and(|c| c.is_container()) {
        return Value::invalid("random: expected a container operand");
    }
    let values = container.scalars();
    let i = env.rng.gen_range(0..values.len());
    Value::Single(values[i].clone())
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
