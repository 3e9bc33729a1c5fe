//! Evaluator conformance test suite.
//!
//! Each test case is a set of interchange JSON fixtures under
//! `tests/fixtures/`:
//! - `<name>.declarations.json` -- the item's variable declarations
//! - `<name>.program.json` -- the statement list to run
//! - `<name>.responses.json` -- values set before the run (optional)
//! - `<name>.expected.json` -- expected values after the run
//!
//! The runner loads declarations and program, applies the responses, runs
//! one response processing pass and compares the listed variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use itemrule_core::{DeclarationStore, Program, Value};
use itemrule_eval::{EvalConfig, Processor};

fn fixture_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn read_json(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    serde_json::from_str(&text)
        .unwrap_or_else(|e| panic!("Invalid JSON in {}: {}", path.display(), e))
}

/// Load, run and compare one fixture.
fn run_fixture(name: &str) {
    let dir = fixture_dir();

    // Step 1: Declarations and program
    let mut store =
        DeclarationStore::from_json(&read_json(&dir.join(format!("{}.declarations.json", name))))
            .unwrap_or_else(|e| panic!("Failed to load declarations for {}: {}", name, e));
    let program = Program::from_json(&read_json(&dir.join(format!("{}.program.json", name))))
        .unwrap_or_else(|e| panic!("Failed to load program for {}: {}", name, e));

    // Step 2: Responses
    let responses_path = dir.join(format!("{}.responses.json", name));
    if responses_path.exists() {
        let responses: BTreeMap<String, Value> =
            serde_json::from_value(read_json(&responses_path))
                .unwrap_or_else(|e| panic!("Invalid responses for {}: {}", name, e));
        for (id, value) in responses {
            assert!(store.contains(&id), "response {} is not declared in {}", id, name);
            store.set_value(&id, value);
        }
    }

    // Step 3: Run
    let processor = Processor::new(EvalConfig::default()).unwrap();
    processor
        .process_responses(&program, &mut store)
        .unwrap_or_else(|e| panic!("Run failed for {}: {}", name, e));

    // Step 4: Compare
    let expected: BTreeMap<String, Value> =
        serde_json::from_value(read_json(&dir.join(format!("{}.expected.json", name))))
            .unwrap_or_else(|e| panic!("Invalid expected values for {}: {}", name, e));
    for (id, want) in expected {
        let got = store.get_value(&id);
        assert_eq!(
            got,
            want,
            "Value mismatch for {}.{}\n\nActual:\n{}\n\nExpected:\n{}",
            name,
            id,
            serde_json::to_string_pretty(&got).unwrap(),
            serde_json::to_string_pretty(&want).unwrap(),
        );
    }
}

/// Fixture whose program must fail to load.
fn run_fixture_load_error(name: &str) {
    let program = read_json(&fixture_dir().join(format!("{}.program.json", name)));
    assert!(
        Program::from_json(&program).is_err(),
        "Expected program load error for {}, but it loaded",
        name
    );
}

// ──────────────────────────────────────────────
// Positive fixtures
// ──────────────────────────────────────────────

#[test]
fn match_correct() {
    run_fixture("match_correct");
}

#[test]
fn map_response_clamp() {
    run_fixture("map_response_clamp");
}

#[test]
fn lookup_interpolation() {
    run_fixture("lookup_interpolation");
}

#[test]
fn nested_conditions() {
    run_fixture("nested_conditions");
}

// ──────────────────────────────────────────────
// Negative fixtures
// ──────────────────────────────────────────────

#[test]
fn unknown_statement_tag() {
    run_fixture_load_error("unknown_statement");
}
