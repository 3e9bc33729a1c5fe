//! Rule-program tree: statements and expressions.
//!
//! Programs are produced by an external builder (or loaded from interchange
//! JSON) and never change once built. Both node kinds are closed enums so
//! the executor and evaluator match them exhaustively.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::value::Value;

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

/// Raw attribute strings on an operator node, as authored.
///
/// Values naming a declared variable are resolved at evaluation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(pub BTreeMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Attributes(BTreeMap::new())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// An operator application: operands are evaluated left to right, then the
/// operator registered under `name` is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorNode {
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub operands: Vec<Expression>,
}

/// Which items of a test an aggregate expression looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    #[serde(default)]
    pub section_identifier: Option<String>,
    #[serde(default)]
    pub include_categories: Vec<String>,
    #[serde(default)]
    pub exclude_categories: Vec<String>,
}

impl ItemFilter {
    pub fn all() -> Self {
        ItemFilter::default()
    }

    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.section_identifier = Some(section.into());
        self
    }

    pub fn including(mut self, category: impl Into<String>) -> Self {
        self.include_categories.push(category.into());
        self
    }

    pub fn excluding(mut self, category: impl Into<String>) -> Self {
        self.exclude_categories.push(category.into());
        self
    }
}

/// A variable collected across the items of a test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemVariable {
    #[serde(default)]
    pub filter: ItemFilter,
    pub variable_identifier: String,
    #[serde(default)]
    pub weight_identifier: Option<String>,
}

fn default_step() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    BaseValue(Value),
    Variable(String),
    Correct(String),
    Default(String),
    Null,
    MapResponse(String),
    MapResponsePoint(String),
    RandomInteger {
        min: i64,
        max: i64,
        #[serde(default = "default_step")]
        step: i64,
    },
    RandomFloat {
        min: f64,
        max: f64,
    },
    Random(Box<Expression>),
    Operator(OperatorNode),

    // Test-level aggregates over a test evaluation context.
    TestVariables(ItemVariable),
    OutcomeMinimum(ItemVariable),
    OutcomeMaximum(ItemVariable),
    NumberCorrect(ItemFilter),
    NumberIncorrect(ItemFilter),
    NumberPresented(ItemFilter),
    NumberResponded(ItemFilter),
    NumberSelected(ItemFilter),
}

impl Expression {
    pub fn value(v: Value) -> Self {
        Expression::BaseValue(v)
    }

    pub fn int(i: i64) -> Self {
        Expression::BaseValue(Value::integer(i))
    }

    pub fn float(f: f64) -> Self {
        Expression::BaseValue(Value::float(f))
    }

    pub fn boolean(b: bool) -> Self {
        Expression::BaseValue(Value::boolean(b))
    }

    pub fn identifier(s: &str) -> Self {
        Expression::BaseValue(Value::identifier(s))
    }

    pub fn string(s: &str) -> Self {
        Expression::BaseValue(Value::string(s))
    }

    pub fn var(id: &str) -> Self {
        Expression::Variable(id.to_string())
    }

    pub fn op(name: &str, operands: Vec<Expression>) -> Self {
        Expression::op_with(name, Attributes::new(), operands)
    }

    pub fn op_with(name: &str, attributes: Attributes, operands: Vec<Expression>) -> Self {
        Expression::Operator(OperatorNode {
            name: name.to_string(),
            attributes,
            operands,
        })
    }
}

// ──────────────────────────────────────────────
// Statements
// ──────────────────────────────────────────────

/// A condition paired with the statements it guards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Expression,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

/// Shared shape of the three conditional statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditional {
    pub if_branch: Branch,
    #[serde(default)]
    pub else_ifs: Vec<Branch>,
    #[serde(default)]
    pub else_branch: Option<Vec<Statement>>,
}

impl Conditional {
    pub fn when(condition: Expression, statements: Vec<Statement>) -> Self {
        Conditional {
            if_branch: Branch {
                condition,
                statements,
            },
            else_ifs: Vec::new(),
            else_branch: None,
        }
    }

    pub fn else_if(mut self, condition: Expression, statements: Vec<Statement>) -> Self {
        self.else_ifs.push(Branch {
            condition,
            statements,
        });
        self
    }

    pub fn otherwise(mut self, statements: Vec<Statement>) -> Self {
        self.else_branch = Some(statements);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    SetOutcomeValue {
        identifier: String,
        expression: Expression,
    },
    SetResponseValue {
        identifier: String,
        expression: Expression,
    },
    SetTemplateValue {
        identifier: String,
        expression: Expression,
    },
    SetCorrectResponse {
        identifier: String,
        expression: Expression,
    },
    SetDefaultValue {
        identifier: String,
    },
    LookupOutcomeValue {
        identifier: String,
        expression: Expression,
    },
    ExitResponse,
    ExitTemplate,
    ExitTest,
    TemplateConstraint {
        #[serde(default)]
        identifier: Option<String>,
        condition: Expression,
    },
    ResponseCondition(Conditional),
    OutcomeCondition(Conditional),
    TemplateCondition(Conditional),
}

impl Statement {
    /// Tag name, for diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            Statement::SetOutcomeValue { .. } => "setOutcomeValue",
            Statement::SetResponseValue { .. } => "setResponseValue",
            Statement::SetTemplateValue { .. } => "setTemplateValue",
            Statement::SetCorrectResponse { .. } => "setCorrectResponse",
            Statement::SetDefaultValue { .. } => "setDefaultValue",
            Statement::LookupOutcomeValue { .. } => "lookupOutcomeValue",
            Statement::ExitResponse => "exitResponse",
            Statement::ExitTemplate => "exitTemplate",
            Statement::ExitTest => "exitTest",
            Statement::TemplateConstraint { .. } => "templateConstraint",
            Statement::ResponseCondition(_) => "responseCondition",
            Statement::OutcomeCondition(_) => "outcomeCondition",
            Statement::TemplateCondition(_) => "templateCondition",
        }
    }
}

// ──────────────────────────────────────────────
// Program
// ──────────────────────────────────────────────

/// An ordered, immutable statement list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Program {
    statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Program { statements }
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Load a program from interchange JSON (an array of statements).
    ///
    /// An unrecognized statement or expression tag fails the load.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, CoreError> {
        Ok(serde_json::from_value(json.clone())?)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn program_from_json() {
        let json = serde_json::json!([
            {
                "response_condition": {
                    "if_branch": {
                        "condition": { "operator": {
                            "name": "match",
                            "operands": [
                                { "variable": "RESPONSE" },
                                { "correct": "RESPONSE" }
                            ]
                        }},
                        "statements": [
                            { "set_outcome_value": {
                                "identifier": "SCORE",
                                "expression": { "base_value": { "single": { "integer": 1 } } }
                            }}
                        ]
                    },
                    "else_branch": ["exit_response"]
                }
            }
        ]);
        let program = Program::from_json(&json).unwrap();
        let expected = Program::new(vec![Statement::ResponseCondition(
            Conditional::when(
                Expression::op(
                    "match",
                    vec![
                        Expression::var("RESPONSE"),
                        Expression::Correct("RESPONSE".into()),
                    ],
                ),
                vec![Statement::SetOutcomeValue {
                    identifier: "SCORE".into(),
                    expression: Expression::int(1),
                }],
            )
            .otherwise(vec![Statement::ExitResponse]),
        )]);
        assert_eq!(program, expected);
    }

    #[test]
    fn unknown_statement_tag_fails_to_load() {
        let json = serde_json::json!([{ "set_mystery_value": { "identifier": "X" } }]);
        let err = Program::from_json(&json).unwrap_err();
        assert!(matches!(err, CoreError::Json(_)));
        assert!(err.to_string().contains("set_mystery_value"));
    }

    #[test]
    fn random_integer_step_defaults_to_one() {
        let e: Expression =
            serde_json::from_value(serde_json::json!({ "random_integer": { "min": 1, "max": 3 } }))
                .unwrap();
        assert_eq!(
            e,
            Expression::RandomInteger {
                min: 1,
                max: 3,
                step: 1
            }
        );
    }

    #[test]
    fn statement_tags() {
        assert_eq!(Statement::ExitTemplate.tag(), "exitTemplate");
        let c = Statement::TemplateCondition(Conditional::when(Expression::boolean(true), vec![]));
        assert_eq!(c.tag(), "templateCondition");
    }
}
