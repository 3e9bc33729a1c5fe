//! Variable declarations and the per-item declaration store.
//!
//! The store is the only mutable state a program run touches. Every setter
//! is keyed by identifier and ignores identifiers that were never declared,
//! so a statement naming a variable the builder chose not to materialize is
//! a no-op rather than an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::lookup::LookupTable;
use crate::mapping::{AreaMapping, Mapping};
use crate::value::{BaseType, Cardinality, Value};

/// Built-in response variable counting attempts.
pub const NUM_ATTEMPTS: &str = "numAttempts";
/// Built-in response variable holding time spent, in seconds.
pub const DURATION: &str = "duration";
/// Built-in outcome variable holding the item's completion status.
pub const COMPLETION_STATUS: &str = "completionStatus";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Response,
    Outcome,
    Template,
}

/// A declared variable: its type, default, current value and the scoring
/// tables attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub identifier: String,
    pub kind: VariableKind,
    pub base_type: BaseType,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub correct_response: Option<Value>,
    #[serde(default)]
    pub mapping: Option<Mapping>,
    #[serde(default)]
    pub area_mapping: Option<AreaMapping>,
    #[serde(default)]
    pub lookup_table: Option<LookupTable>,
}

impl Declaration {
    pub fn new(
        identifier: impl Into<String>,
        kind: VariableKind,
        base_type: BaseType,
        cardinality: Cardinality,
    ) -> Self {
        Declaration {
            identifier: identifier.into(),
            kind,
            base_type,
            cardinality,
            default_value: None,
            value: Value::typed_null(base_type, cardinality),
            correct_response: None,
            mapping: None,
            area_mapping: None,
            lookup_table: None,
        }
    }

    pub fn response(id: impl Into<String>, base_type: BaseType, cardinality: Cardinality) -> Self {
        Declaration::new(id, VariableKind::Response, base_type, cardinality)
    }

    pub fn outcome(id: impl Into<String>, base_type: BaseType, cardinality: Cardinality) -> Self {
        Declaration::new(id, VariableKind::Outcome, base_type, cardinality)
    }

    pub fn template(id: impl Into<String>, base_type: BaseType, cardinality: Cardinality) -> Self {
        Declaration::new(id, VariableKind::Template, base_type, cardinality)
    }

    /// Set the declared default and make it the current value.
    pub fn with_default(mut self, default: Value) -> Self {
        self.value = default.clone();
        self.default_value = Some(default);
        self
    }

    pub fn with_correct_response(mut self, correct: Value) -> Self {
        self.correct_response = Some(correct);
        self
    }

    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn with_area_mapping(mut self, area_mapping: AreaMapping) -> Self {
        self.area_mapping = Some(area_mapping);
        self
    }

    pub fn with_lookup_table(mut self, table: LookupTable) -> Self {
        self.lookup_table = Some(table);
        self
    }

    pub fn is_template(&self) -> bool {
        self.kind == VariableKind::Template
    }

    /// The declared default, or a typed null when none was declared.
    pub fn default_or_null(&self) -> Value {
        self.default_value
            .clone()
            .unwrap_or_else(|| Value::typed_null(self.base_type, self.cardinality))
    }
}

/// Per-item map from identifier to declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclarationStore(pub BTreeMap<String, Declaration>);

impl DeclarationStore {
    pub fn new() -> Self {
        DeclarationStore(BTreeMap::new())
    }

    /// Store with the built-in session variables declared.
    pub fn with_builtins() -> Self {
        let mut store = DeclarationStore::new();
        store.insert(
            Declaration::response(NUM_ATTEMPTS, BaseType::Integer, Cardinality::Single)
                .with_default(Value::integer(0)),
        );
        store.insert(
            Declaration::response(DURATION, BaseType::Float, Cardinality::Single)
                .with_default(Value::float(0.0)),
        );
        store.insert(
            Declaration::outcome(COMPLETION_STATUS, BaseType::Identifier, Cardinality::Single)
                .with_default(Value::identifier("not_attempted")),
        );
        store
    }

    /// Load a store from a JSON array of declarations.
    ///
    /// Duplicate identifiers are rejected.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, CoreError> {
        let decls: Vec<Declaration> = serde_json::from_value(json.clone())?;
        let mut store = DeclarationStore::new();
        for mut decl in decls {
            if matches!(decl.value, Value::Null { base_type: None, .. }) {
                decl.value = decl.default_or_null();
            }
            if store.contains(&decl.identifier) {
                return Err(CoreError::DuplicateIdentifier {
                    identifier: decl.identifier,
                });
            }
            store.insert(decl);
        }
        Ok(store)
    }

    /// Insert or replace a declaration.
    pub fn insert(&mut self, decl: Declaration) {
        self.0.insert(decl.identifier.clone(), decl);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Declaration> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.0.values()
    }

    /// Current value, or an untyped null for unknown identifiers.
    pub fn get_value(&self, id: &str) -> Value {
        self.get(id).map(|d| d.value.clone()).unwrap_or_default()
    }

    /// Declared default, a typed null when none was declared, or an untyped
    /// null for unknown identifiers.
    pub fn get_default_value(&self, id: &str) -> Value {
        self.get(id).map(Declaration::default_or_null).unwrap_or_default()
    }

    pub fn get_correct_response(&self, id: &str) -> Value {
        self.get(id)
            .and_then(|d| d.correct_response.clone())
            .unwrap_or_default()
    }

    pub fn get_mapping(&self, id: &str) -> Option<&Mapping> {
        self.get(id).and_then(|d| d.mapping.as_ref())
    }

    pub fn get_area_mapping(&self, id: &str) -> Option<&AreaMapping> {
        self.get(id).and_then(|d| d.area_mapping.as_ref())
    }

    pub fn get_lookup_table(&self, id: &str) -> Option<&LookupTable> {
        self.get(id).and_then(|d| d.lookup_table.as_ref())
    }

    pub fn set_value(&mut self, id: &str, value: Value) {
        if let Some(decl) = self.0.get_mut(id) {
            decl.value = value;
        }
    }

    pub fn set_correct_response(&mut self, id: &str, value: Value) {
        if let Some(decl) = self.0.get_mut(id) {
            decl.correct_response = Some(value);
        }
    }

    /// Restore the current value from a clone of the declared default.
    pub fn reset_to_default(&mut self, id: &str) {
        if let Some(decl) = self.0.get_mut(id) {
            decl.value = decl.default_or_null();
        }
    }

    /// Reset every declaration of the given kind.
    pub fn reset_kind(&mut self, kind: VariableKind) {
        for decl in self.0.values_mut().filter(|d| d.kind == kind) {
            decl.value = decl.default_or_null();
        }
    }

    pub fn template_identifiers(&self) -> Vec<String> {
        self.iter()
            .filter(|d| d.is_template())
            .map(|d| d.identifier.clone())
            .collect()
    }

    /// Identifier → current value for every declaration.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.0
            .iter()
            .map(|(id, d)| (id.clone(), d.value.clone()))
            .collect()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
