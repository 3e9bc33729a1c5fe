//! Test evaluation context: a read-only view over many items' variables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use itemrule_core::declaration::{DURATION, NUM_ATTEMPTS};
use itemrule_core::{
    BaseType, Cardinality, DeclarationStore, ItemFilter, ItemVariable, Scalar, Value,
    VariableKind,
};

use crate::numeric::{all_ints, float_result, Number};

/// One item's state as seen by test-level expressions.
///
/// The flags are the caller's session truth. When a flag is `None` the
/// context infers it from the item's variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestItemState {
    pub identifier: String,
    /// Enclosing section identifiers, outermost first.
    pub sections: Vec<String>,
    pub categories: Vec<String>,
    pub weights: BTreeMap<String, f64>,
    pub variables: DeclarationStore,
    pub presented: Option<bool>,
    pub responded: Option<bool>,
    pub correct: Option<bool>,
    pub incorrect: Option<bool>,
    pub selected: Option<bool>,
}

impl TestItemState {
    pub fn new(identifier: impl Into<String>, variables: DeclarationStore) -> Self {
        TestItemState {
            identifier: identifier.into(),
            variables,
            ..TestItemState::default()
        }
    }

    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.sections.push(section.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn with_weight(mut self, identifier: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(identifier.into(), weight);
        self
    }

    /// Named weight; 1 when the item does not declare it.
    pub fn weight(&self, identifier: &str) -> f64 {
        self.weights.get(identifier).copied().unwrap_or(1.0)
    }

    fn matches(&self, filter: &ItemFilter) -> bool {
        if let Some(section) = &filter.section_identifier {
            if !self.sections.iter().any(|s| s == section) {
                return false;
            }
        }
        if !filter.include_categories.is_empty()
            && !filter
                .include_categories
                .iter()
                .any(|c| self.categories.contains(c))
        {
            return false;
        }
        !filter
            .exclude_categories
            .iter()
            .any(|c| self.categories.contains(c))
    }

    /// Response declarations other than the built-in session variables.
    fn responses(&self) -> impl Iterator<Item = &itemrule_core::Declaration> {
        self.variables.iter().filter(|d| {
            d.kind == VariableKind::Response
                && d.identifier != NUM_ATTEMPTS
                && d.identifier != DURATION
        })
    }

    fn is_presented(&self) -> bool {
        self.presented.unwrap_or_else(|| {
            self.variables
                .get_value(NUM_ATTEMPTS)
                .as_i64()
                .is_some_and(|n| n > 0)
                || self.is_responded()
        })
    }

    fn is_responded(&self) -> bool {
        self.responded
            .unwrap_or_else(|| self.responses().any(|d| !d.value.is_missing()))
    }

    /// Every response with a correct response matches it, and there is at
    /// least one such response.
    fn is_correct(&self) -> bool {
        self.correct.unwrap_or_else(|| {
            let mut keyed = self
                .responses()
                .filter_map(|d| d.correct_response.as_ref().map(|c| (d, c)))
                .peekable();
            keyed.peek().is_some() && keyed.all(|(d, c)| d.value.matches(c))
        })
    }

    fn is_incorrect(&self) -> bool {
        self.incorrect
            .unwrap_or_else(|| self.is_responded() && !self.is_correct())
    }

    fn is_selected(&self) -> bool {
        self.selected.unwrap_or(true)
    }
}

/// The per-item flag a count expression tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCount {
    Correct,
    Incorrect,
    Presented,
    Responded,
    Selected,
}

/// Ordered collection of item states for one scoring pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestContext {
    items: Vec<TestItemState>,
}

impl TestContext {
    pub fn new(items: Vec<TestItemState>) -> Self {
        TestContext { items }
    }

    pub fn items(&self) -> &[TestItemState] {
        &self.items
    }

    pub fn item(&self, identifier: &str) -> Option<&TestItemState> {
        self.items.iter().find(|i| i.identifier == identifier)
    }

    pub fn filtered<'a>(
        &'a self,
        filter: &'a ItemFilter,
    ) -> impl Iterator<Item = &'a TestItemState> + 'a {
        self.items.iter().filter(move |i| i.matches(filter))
    }

    /// Numeric single values of the variable across the filtered items,
    /// weighted when a weight identifier is given. Absent, container and
    /// non-numeric values are skipped.
    fn collect(&self, var: &ItemVariable) -> Vec<Number> {
        self.filtered(&var.filter)
            .filter_map(|item| {
                let n = item
                    .variables
                    .get_value(&var.variable_identifier)
                    .as_single()
                    .and_then(Number::from_scalar)?;
                Some(match &var.weight_identifier {
                    Some(w) => Number::Float(n.as_f64() * item.weight(w)),
                    None => n,
                })
            })
            .collect()
    }

    pub fn outcome_minimum(&self, var: &ItemVariable) -> Value {
        self.reduce(var, |a, b| a.min(b), i64::min)
    }

    pub fn outcome_maximum(&self, var: &ItemVariable) -> Value {
        self.reduce(var, |a, b| a.max(b), i64::max)
    }

    /// The variable's single values across the filtered items, in item
    /// order, as an ordered container. Weights scale numeric values and
    /// make them floats; a mix of integers and floats is promoted to
    /// floats. Values of differing non-numeric base types are invalid.
    pub fn test_variables(&self, var: &ItemVariable) -> Value {
        let mut values: Vec<Scalar> = self
            .filtered(&var.filter)
            .filter_map(|item| {
                let value = item.variables.get_value(&var.variable_identifier);
                let scalar = value.as_single()?.clone();
                Some(match (&var.weight_identifier, Number::from_scalar(&scalar)) {
                    (Some(w), Some(n)) => Scalar::Float(n.as_f64() * item.weight(w)),
                    _ => scalar,
                })
            })
            .collect();

        let Some(first) = values.first().map(Scalar::base_type) else {
            return Value::Null {
                base_type: None,
                cardinality: Some(Cardinality::Ordered),
            };
        };
        if values.iter().all(|s| s.base_type() == first) {
            return Value::ordered(first, values);
        }
        if values.iter().all(|s| s.base_type().is_numeric()) {
            for s in values.iter_mut() {
                if let Scalar::Integer(i) = *s {
                    *s = Scalar::Float(i as f64);
                }
            }
            return Value::ordered(BaseType::Float, values);
        }
        Value::invalid(format!(
            "testVariables: '{}' has mixed base types across items",
            var.variable_identifier
        ))
    }

    fn reduce(
        &self,
        var: &ItemVariable,
        float: fn(f64, f64) -> f64,
        int: fn(i64, i64) -> i64,
    ) -> Value {
        let ns = self.collect(var);
        if ns.is_empty() {
            return Value::typed_null(BaseType::Float, Cardinality::Single);
        }
        if all_ints(&ns) {
            let ints = ns.iter().filter_map(|n| match n {
                Number::Int(i) => Some(*i),
                Number::Float(_) => None,
            });
            return ints.reduce(int).map(Value::integer).unwrap_or_default();
        }
        ns.iter()
            .map(|n| n.as_f64())
            .reduce(float)
            .map(float_result)
            .unwrap_or_default()
    }

    pub fn count(&self, kind: ItemCount, filter: &ItemFilter) -> Value {
        let n = self
            .filtered(filter)
            .filter(|item| match kind {
                ItemCount::Correct => item.is_correct(),
                ItemCount::Incorrect => item.is_incorrect(),
                ItemCount::Presented => item.is_presented(),
                ItemCount::Responded => item.is_responded(),
                ItemCount::Selected => item.is_selected(),
            })
            .count();
        Value::integer(n as i64)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
