//! Operator registry.
//!
//! Operators are looked up by name at evaluation time instead of being
//! matched in the evaluator, so new operators can be registered without
//! touching dispatch. Names are case-insensitive: `Sum`, `sum` and `SUM`
//! are the same operator.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use itemrule_core::{Attributes, DeclarationStore, Scalar, Value};

/// What an operator sees besides its operands.
pub struct OperatorContext<'a> {
    pub name: &'a str,
    pub store: &'a DeclarationStore,
    pub attributes: &'a Attributes,
}

impl<'a> OperatorContext<'a> {
    /// Attribute text, with variable references resolved.
    ///
    /// An attribute whose text (optionally wrapped in `{}`) names a declared
    /// variable takes that variable's current single value.
    pub fn attr(&self, name: &str) -> Option<String> {
        let raw = self.attributes.get(name)?;
        let reference = raw
            .strip_prefix('{')
            .and_then(|r| r.strip_suffix('}'))
            .unwrap_or(raw);
        if self.store.contains(reference) {
            return self
                .store
                .get_value(reference)
                .as_single()
                .and_then(Scalar::key_string);
        }
        Some(raw.to_string())
    }

    pub fn attr_i64(&self, name: &str) -> Option<i64> {
        let text = self.attr(name)?;
        text.trim()
            .parse::<i64>()
            .ok()
            .or_else(|| text.trim().parse::<f64>().ok().map(|f| f as i64))
    }

    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attr(name)?.trim().parse().ok()
    }

    pub fn attr_bool(&self, name: &str, default: bool) -> bool {
        match self.attr(name).as_deref().map(str::trim) {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }

    /// An invalid value tagged with this operator's name.
    pub fn invalid(&self, message: impl fmt::Display) -> Value {
        Value::invalid(format!("{}: {}", self.name, message))
    }
}

/// Operator implementation: evaluated operands in, value out. Operators
/// never mutate the store.
pub type OperatorFn = Arc<dyn Fn(&OperatorContext<'_>, &[Value]) -> Value + Send + Sync>;

#[derive(Clone, Default)]
pub struct OperatorRegistry {
    ops: HashMap<String, OperatorFn>,
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.ops.keys().collect();
        names.sort();
        f.debug_struct("OperatorRegistry")
            .field("operators", &names)
            .finish()
    }
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl OperatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        OperatorRegistry {
            ops: HashMap::new(),
        }
    }

    /// A registry holding the bundled operator library.
    #[cfg(feature = "standard-operators")]
    pub fn standard() -> Self {
        let mut registry = OperatorRegistry::new();
        crate::operators::register_standard(&mut registry);
        registry
    }

    /// Register an operator, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: &str, op: F)
    where
        F: Fn(&OperatorContext<'_>, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.ops.insert(normalize(name), Arc::new(op));
    }

    pub fn get(&self, name: &str) -> Option<&OperatorFn> {
        self.ops.get(&normalize(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use itemrule_core::{BaseType, Cardinality, Declaration};

    fn call(registry: &OperatorRegistry, name: &str, operands: &[Value]) -> Value {
        let store = DeclarationStore::new();
        let attributes = Attributes::new();
        let ctx = OperatorContext {
            name,
            store: &store,
            attributes: &attributes,
        };
        let op = registry.get(name).expect("registered");
        op(&ctx, operands)
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut r = OperatorRegistry::new();
        r.register("Answer", |_, _| Value::integer(42));
        assert!(r.contains("answer"));
        assert!(r.contains("ANSWER"));
        assert_eq!(call(&r, "aNsWeR", &[]), Value::integer(42));
    }

    #[test]
    fn register_overwrites() {
        let mut r = OperatorRegistry::new();
        r.register("op", |_, _| Value::integer(1));
        r.register("OP", |_, _| Value::integer(2));
        assert_eq!(r.len(), 1);
        assert_eq!(call(&r, "op", &[]), Value::integer(2));
    }

    #[test]
    fn missing_operator_not_found() {
        let r = OperatorRegistry::new();
        assert!(r.get("sum").is_none());
        assert!(r.is_empty());
    }

    #[test]
    fn attributes_resolve_variable_references() {
        let mut store = DeclarationStore::new();
        store.insert(
            Declaration::template("N", BaseType::Integer, Cardinality::Single)
                .with_default(Value::integer(3)),
        );
        let attributes = Attributes::new()
            .with("n", "N")
            .with("m", "{N}")
            .with("k", "7")
            .with("flag", "false");
        let ctx = OperatorContext {
            name: "index",
            store: &store,
            attributes: &attributes,
        };
        assert_eq!(ctx.attr_i64("n"), Some(3));
        assert_eq!(ctx.attr_i64("m"), Some(3));
        assert_eq!(ctx.attr_i64("k"), Some(7));
        assert_eq!(ctx.attr_i64("missing"), None);
        assert!(!ctx.attr_bool("flag", true));
        assert!(ctx.attr_bool("missing", true));
    }
}
