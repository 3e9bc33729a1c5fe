//! Item rule evaluator -- runs response, outcome and template processing
//! programs against a declaration store.
//!
//! Programs arrive already built (in code or as interchange JSON). The
//! executor walks the statements, the expression evaluator reduces
//! expressions through a pluggable operator registry, and test-level
//! expressions aggregate over a caller-supplied [`TestContext`].

pub mod config;
pub mod error;
pub mod executor;
pub mod expression;
pub mod lookup;
pub mod numeric;
#[cfg(feature = "standard-operators")]
pub mod operators;
pub mod registry;
pub mod test_context;

use rand::rngs::StdRng;
use rand::SeedableRng;

use itemrule_core::{DeclarationStore, Program, VariableKind};

pub use config::EvalConfig;
pub use error::EvalError;
pub use executor::{run_program, ExitScope, RunReport};
pub use expression::{evaluate, Env};
pub use lookup::apply_lookup_table;
pub use registry::{OperatorContext, OperatorFn, OperatorRegistry};
pub use test_context::{ItemCount, TestContext, TestItemState};

/// Runs programs with one operator registry and configuration.
///
/// Each run draws from a fresh random source seeded from the
/// configuration, so the same program, store and seed always give the same
/// result.
#[derive(Debug, Clone)]
pub struct Processor {
    registry: OperatorRegistry,
    config: EvalConfig,
}

impl Processor {
    /// A processor with the bundled operator library.
    #[cfg(feature = "standard-operators")]
    pub fn new(config: EvalConfig) -> Result<Self, EvalError> {
        Processor::with_registry(OperatorRegistry::standard(), config)
    }

    pub fn with_registry(
        registry: OperatorRegistry,
        config: EvalConfig,
    ) -> Result<Self, EvalError> {
        config.validate()?;
        Ok(Processor { registry, config })
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Register extra operators or replace bundled ones.
    pub fn registry_mut(&mut self) -> &mut OperatorRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Run an item-level program.
    pub fn run(
        &self,
        program: &Program,
        store: &mut DeclarationStore,
    ) -> Result<RunReport, EvalError> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.run_with_rng(program, store, None, &mut rng)
    }

    /// Run a test-level program with access to the items' states.
    pub fn run_with_tests(
        &self,
        program: &Program,
        store: &mut DeclarationStore,
        tests: &TestContext,
    ) -> Result<RunReport, EvalError> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.run_with_rng(program, store, Some(tests), &mut rng)
    }

    /// Run with a caller-owned random source, for callers that thread one
    /// source through several runs.
    pub fn run_with_rng(
        &self,
        program: &Program,
        store: &mut DeclarationStore,
        tests: Option<&TestContext>,
        rng: &mut StdRng,
    ) -> Result<RunReport, EvalError> {
        run_program(
            program,
            store,
            &self.registry,
            rng,
            tests,
            self.config.max_constraint_attempts,
        )
    }

    /// One response processing pass: outcomes go back to their defaults,
    /// then the program runs.
    pub fn process_responses(
        &self,
        program: &Program,
        store: &mut DeclarationStore,
    ) -> Result<RunReport, EvalError> {
        reset_for_pass(store, VariableKind::Outcome);
        self.run(program, store)
    }

    /// One template processing pass: template variables go back to their
    /// defaults, then the program runs.
    pub fn process_template(
        &self,
        program: &Program,
        store: &mut DeclarationStore,
    ) -> Result<RunReport, EvalError> {
        reset_for_pass(store, VariableKind::Template);
        self.run(program, store)
    }
}

/// Reset every variable of one kind before an independent processing pass,
/// so values from an earlier pass cannot leak into this one.
pub fn reset_for_pass(store: &mut DeclarationStore, kind: VariableKind) {
    store.reset_kind(kind);
}
