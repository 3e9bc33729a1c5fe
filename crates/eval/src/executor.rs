//! Statement executor.
//!
//! Walks a program's statement list, committing expression results to the
//! declaration store. Early exits and template-constraint restarts travel
//! back up the walk as a [`Flow`] value checked after every statement; the
//! top-level loop turns them into a finished run or a fresh pass over the
//! program.
//!
//! Template constraints retry a bounded number of times. Each failure
//! resets the template variables and counts one attempt against that
//! constraint. Below the cap the whole program starts over; at the cap the
//! executor gives up on the constraint and carries on after it with the
//! reset template values.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use serde::Serialize;

use itemrule_core::{
    Cardinality, Conditional, DeclarationStore, Expression, Program, Statement, Value,
};

use crate::error::EvalError;
use crate::expression::{evaluate, Env};
use crate::lookup::apply_lookup_table;
use crate::registry::OperatorRegistry;
use crate::test_context::TestContext;

// ──────────────────────────────────────────────
// Run results
// ──────────────────────────────────────────────

/// Scope named by an exit statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitScope {
    Response,
    Template,
    Test,
}

/// What happened during a run, beyond the store mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Exit statement that ended the run, if any.
    pub exit: Option<ExitScope>,
    /// Number of times the program was restarted from the top.
    pub restarts: u32,
    /// Failed attempts per template constraint, keyed by the constraint's
    /// identifier or, when it has none, its position in the program.
    pub constraint_attempts: BTreeMap<String, u32>,
    /// Constraints that hit the attempt cap, in the order they hit it.
    pub abandoned_constraints: Vec<String>,
}

/// Control signal returned by every statement.
enum Flow {
    Continue,
    Exit(ExitScope),
    Restart,
}

// ──────────────────────────────────────────────
// Executor
// ──────────────────────────────────────────────

struct Executor<'a> {
    store: &'a mut DeclarationStore,
    registry: &'a OperatorRegistry,
    rng: &'a mut StdRng,
    tests: Option<&'a TestContext>,
    max_attempts: u32,
    report: RunReport,
}

/// Run a program against a store.
///
/// Returns an error only for fatal conditions; statements that committed
/// before the error keep their values.
#[tracing::instrument(skip_all, fields(statements = program.statements().len()), level = "debug")]
pub fn run_program(
    program: &Program,
    store: &mut DeclarationStore,
    registry: &OperatorRegistry,
    rng: &mut StdRng,
    tests: Option<&TestContext>,
    max_attempts: u32,
) -> Result<RunReport, EvalError> {
    let mut exec = Executor {
        store,
        registry,
        rng,
        tests,
        max_attempts,
        report: RunReport::default(),
    };

    loop {
        match exec.run_list(program.statements(), "")? {
            Flow::Continue => break,
            Flow::Exit(scope) => {
                tracing::debug!(?scope, "run ended by exit statement");
                exec.report.exit = Some(scope);
                break;
            }
            Flow::Restart => {
                exec.report.restarts += 1;
                tracing::debug!(restarts = exec.report.restarts, "restarting program");
            }
        }
    }

    tracing::debug!(restarts = exec.report.restarts, "run finished");
    Ok(exec.report)
}

impl<'a> Executor<'a> {
    fn eval(&mut self, expr: &Expression) -> Result<Value, EvalError> {
        let mut env = Env {
            store: &*self.store,
            registry: self.registry,
            rng: &mut *self.rng,
            tests: self.tests,
        };
        evaluate(&mut env, expr)
    }

    /// Run statements in order until one signals something other than
    /// `Continue`. `path` locates the list inside the program.
    fn run_list(&mut self, statements: &[Statement], path: &str) -> Result<Flow, EvalError> {
        for (i, statement) in statements.iter().enumerate() {
            match self.run_statement(statement, path, i)? {
                Flow::Continue => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Continue)
    }

    fn run_statement(
        &mut self,
        statement: &Statement,
        path: &str,
        index: usize,
    ) -> Result<Flow, EvalError> {
        tracing::trace!(statement = statement.tag(), path, index, "executing");
        match statement {
            Statement::SetOutcomeValue {
                identifier,
                expression,
            }
            | Statement::SetResponseValue {
                identifier,
                expression,
            }
            | Statement::SetTemplateValue {
                identifier,
                expression,
            } => {
                let value = self.eval(expression)?;
                self.store.set_value(identifier, value);
            }

            Statement::SetCorrectResponse {
                identifier,
                expression,
            } => {
                let value = self.eval(expression)?;
                self.store.set_correct_response(identifier, value);
            }

            Statement::SetDefaultValue { identifier } => self.store.reset_to_default(identifier),

            Statement::LookupOutcomeValue {
                identifier,
                expression,
            } => self.lookup_outcome_value(identifier, expression)?,

            Statement::ExitResponse => return Ok(Flow::Exit(ExitScope::Response)),
            Statement::ExitTemplate => return Ok(Flow::Exit(ExitScope::Template)),
            Statement::ExitTest => return Ok(Flow::Exit(ExitScope::Test)),

            Statement::TemplateConstraint {
                identifier,
                condition,
            } => {
                if !self.eval(condition)?.is_true() {
                    let key = identifier
                        .clone()
                        .unwrap_or_else(|| format!("templateConstraint@{}{}", path, index));
                    return Ok(self.constraint_failed(key));
                }
            }

            Statement::ResponseCondition(c)
            | Statement::OutcomeCondition(c)
            | Statement::TemplateCondition(c) => {
                return self.run_conditional(c, &format!("{}{}.", path, index));
            }
        }
        Ok(Flow::Continue)
    }

    /// First branch whose condition is true runs; absent and invalid
    /// conditions count as false.
    fn run_conditional(&mut self, c: &Conditional, path: &str) -> Result<Flow, EvalError> {
        if self.eval(&c.if_branch.condition)?.is_true() {
            return self.run_list(&c.if_branch.statements, &format!("{}0.", path));
        }
        for (i, branch) in c.else_ifs.iter().enumerate() {
            if self.eval(&branch.condition)?.is_true() {
                return self.run_list(&branch.statements, &format!("{}{}.", path, i + 1));
            }
        }
        match &c.else_branch {
            Some(statements) => {
                self.run_list(statements, &format!("{}{}.", path, c.else_ifs.len() + 1))
            }
            None => Ok(Flow::Continue),
        }
    }

    fn lookup_outcome_value(
        &mut self,
        identifier: &str,
        expression: &Expression,
    ) -> Result<(), EvalError> {
        let Some(base_type) = self.store.get(identifier).map(|d| d.base_type) else {
            tracing::warn!(identifier, "lookupOutcomeValue names an undeclared variable");
            return Ok(());
        };
        let Some(table) = self.store.get_lookup_table(identifier).cloned() else {
            tracing::warn!(identifier, "lookupOutcomeValue on a variable without a lookup table");
            self.store.set_value(
                identifier,
                Value::Invalid {
                    message: format!("'{}' has no lookup table", identifier),
                    base_type: Some(base_type),
                    cardinality: Some(Cardinality::Single),
                },
            );
            return Ok(());
        };
        let source = self.eval(expression)?;
        self.store
            .set_value(identifier, apply_lookup_table(&source, &table, base_type));
        Ok(())
    }

    fn constraint_failed(&mut self, key: String) -> Flow {
        for id in self.store.template_identifiers() {
            self.store.reset_to_default(&id);
        }
        let attempts = self
            .report
            .constraint_attempts
            .entry(key.clone())
            .or_insert(0);
        *attempts += 1;
        let attempts = *attempts;

        if attempts < self.max_attempts {
            tracing::debug!(constraint = %key, attempts, "template constraint failed");
            return Flow::Restart;
        }
        if !self.report.abandoned_constraints.contains(&key) {
            tracing::warn!(
                constraint = %key,
                attempts,
                "template constraint not satisfied, continuing with default template values"
            );
            self.report.abandoned_constraints.push(key);
        }
        Flow::Continue
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use itemrule_core::{BaseType, Declaration, LookupTable};
    use rand::SeedableRng;

    fn run(program: &Program, store: &mut DeclarationStore) -> Result<RunReport, EvalError> {
        let registry = OperatorRegistry::standard();
        let mut rng = StdRng::seed_from_u64(1);
        run_program(program, store, &registry, &mut rng, None, 100)
    }

    fn set(id: &str, expr: Expression) -> Statement {
        Statement::SetOutcomeValue {
            identifier: id.into(),
            expression: expr,
        }
    }

    fn outcomes(ids: &[&str]) -> DeclarationStore {
        let mut store = DeclarationStore::new();
        for id in ids {
            store.insert(
                Declaration::outcome(*id, BaseType::Integer, Cardinality::Single)
                    .with_default(Value::integer(0)),
            );
        }
        store
    }

    #[test]
    fn only_first_true_branch_runs() {
        let mut store = outcomes(&["IF", "EI1", "EI2", "ELSE"]);
        let cond = Conditional::when(
            Expression::boolean(false),
            vec![set("IF", Expression::int(1))],
        )
        .else_if(Expression::boolean(false), vec![set("EI1", Expression::int(1))])
        .else_if(Expression::boolean(true), vec![set("EI2", Expression::int(1))])
        .otherwise(vec![set("ELSE", Expression::int(1))]);
        let program = Program::new(vec![Statement::OutcomeCondition(cond)]);

        run(&program, &mut store).unwrap();
        assert_eq!(store.get_value("IF"), Value::integer(0));
        assert_eq!(store.get_value("EI1"), Value::integer(0));
        assert_eq!(store.get_value("EI2"), Value::integer(1));
        assert_eq!(store.get_value("ELSE"), Value::integer(0));
    }

    #[test]
    fn null_condition_is_false() {
        let mut store = outcomes(&["A", "B"]);
        let cond = Conditional::when(Expression::Null, vec![set("A", Expression::int(1))])
            .otherwise(vec![set("B", Expression::int(1))]);
        run(&Program::new(vec![Statement::ResponseCondition(cond)]), &mut store).unwrap();
        assert_eq!(store.get_value("A"), Value::integer(0));
        assert_eq!(store.get_value("B"), Value::integer(1));
    }

    #[test]
    fn exit_stops_nested_run() {
        let mut store = outcomes(&["A", "B"]);
        let cond = Conditional::when(
            Expression::boolean(true),
            vec![set("A", Expression::int(1)), Statement::ExitResponse],
        );
        let program = Program::new(vec![
            Statement::ResponseCondition(cond),
            set("B", Expression::int(1)),
        ]);
        let report = run(&program, &mut store).unwrap();
        assert_eq!(report.exit, Some(ExitScope::Response));
        assert_eq!(store.get_value("A"), Value::integer(1));
        assert_eq!(store.get_value("B"), Value::integer(0));
    }

    #[test]
    fn template_and_test_exits_end_the_run() {
        for (exit, scope) in [
            (Statement::ExitTemplate, ExitScope::Template),
            (Statement::ExitTest, ExitScope::Test),
        ] {
            let mut store = outcomes(&["A", "B", "C"]);
            let inner = Conditional::when(
                Expression::boolean(true),
                vec![set("A", Expression::int(1)), exit, set("B", Expression::int(1))],
            );
            let outer = Conditional::when(
                Expression::boolean(true),
                vec![Statement::TemplateCondition(inner)],
            );
            let program = Program::new(vec![
                Statement::OutcomeCondition(outer),
                set("C", Expression::int(1)),
            ]);
            let report = run(&program, &mut store).unwrap();
            assert_eq!(report.exit, Some(scope));
            assert_eq!(store.get_value("A"), Value::integer(1));
            assert_eq!(store.get_value("B"), Value::integer(0));
            assert_eq!(store.get_value("C"), Value::integer(0));
        }
    }

    #[test]
    fn always_false_constraint_is_bounded() {
        let mut store = outcomes(&["AFTER"]);
        store.insert(
            Declaration::template("T", BaseType::Integer, Cardinality::Single)
                .with_default(Value::integer(-1)),
        );
        let program = Program::new(vec![
            Statement::SetTemplateValue {
                identifier: "T".into(),
                expression: Expression::RandomInteger {
                    min: 1,
                    max: 5,
                    step: 1,
                },
            },
            Statement::TemplateConstraint {
                identifier: Some("never".into()),
                condition: Expression::boolean(false),
            },
            set("AFTER", Expression::int(1)),
        ]);

        let report = run(&program, &mut store).unwrap();
        assert_eq!(report.constraint_attempts.get("never"), Some(&100));
        assert_eq!(report.restarts, 99);
        assert_eq!(report.abandoned_constraints, vec!["never".to_string()]);
        assert_eq!(store.get_value("T"), Value::integer(-1));
        assert_eq!(store.get_value("AFTER"), Value::integer(1));
    }

    #[test]
    fn satisfiable_constraint_retries_until_true() {
        let mut store = DeclarationStore::new();
        store.insert(Declaration::template("T", BaseType::Integer, Cardinality::Single));
        let program = Program::new(vec![
            Statement::SetTemplateValue {
                identifier: "T".into(),
                expression: Expression::RandomInteger {
                    min: 1,
                    max: 4,
                    step: 1,
                },
            },
            Statement::TemplateConstraint {
                identifier: None,
                condition: Expression::op(
                    "match",
                    vec![Expression::var("T"), Expression::int(4)],
                ),
            },
        ]);
        let report = run(&program, &mut store).unwrap();
        assert_eq!(store.get_value("T"), Value::integer(4));
        assert!(report.abandoned_constraints.is_empty());
        let attempts = report
            .constraint_attempts
            .get("templateConstraint@1")
            .copied()
            .unwrap_or(0);
        assert_eq!(attempts, report.restarts);
    }

    #[test]
    fn lookup_without_table_stores_invalid_and_continues() {
        let mut store = outcomes(&["SCORE", "NEXT"]);
        let program = Program::new(vec![
            Statement::LookupOutcomeValue {
                identifier: "SCORE".into(),
                expression: Expression::identifier("A"),
            },
            set("NEXT", Expression::int(1)),
        ]);
        run(&program, &mut store).unwrap();
        assert!(store.get_value("SCORE").is_invalid());
        assert_eq!(store.get_value("NEXT"), Value::integer(1));
    }

    #[test]
    fn lookup_outcome_value_uses_table() {
        let mut store = DeclarationStore::new();
        store.insert(
            Declaration::outcome("SCORE", BaseType::Integer, Cardinality::Single)
                .with_lookup_table(LookupTable::matching([("A", "1"), ("B", "2")], Some("0"))),
        );
        let program = Program::new(vec![Statement::LookupOutcomeValue {
            identifier: "SCORE".into(),
            expression: Expression::identifier("B"),
        }]);
        run(&program, &mut store).unwrap();
        assert_eq!(store.get_value("SCORE"), Value::integer(2));
    }

    #[test]
    fn set_default_value_and_correct_response() {
        let mut store = outcomes(&["SCORE"]);
        store.insert(Declaration::response(
            "RESPONSE",
            BaseType::Identifier,
            Cardinality::Single,
        ));
        let program = Program::new(vec![
            set("SCORE", Expression::int(5)),
            Statement::SetDefaultValue {
                identifier: "SCORE".into(),
            },
            Statement::SetCorrectResponse {
                identifier: "RESPONSE".into(),
                expression: Expression::identifier("C"),
            },
        ]);
        run(&program, &mut store).unwrap();
        assert_eq!(store.get_value("SCORE"), Value::integer(0));
        assert_eq!(store.get_correct_response("RESPONSE"), Value::identifier("C"));
    }

    #[test]
    fn fatal_error_keeps_earlier_commits() {
        let mut store = outcomes(&["A", "B"]);
        let program = Program::new(vec![
            set("A", Expression::int(1)),
            set("B", Expression::op("noSuchOperator", vec![])),
        ]);
        let err = run(&program, &mut store).unwrap_err();
        assert!(matches!(err, EvalError::UnknownOperator { .. }));
        assert_eq!(store.get_value("A"), Value::integer(1));
    }

    #[test]
    fn unknown_identifiers_are_ignored() {
        let mut store = outcomes(&["A"]);
        let program = Program::new(vec![set("GHOST", Expression::int(1))]);
        run(&program, &mut store).unwrap();
        assert!(!store.contains("GHOST"));
    }
}
