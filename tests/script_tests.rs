// tests/script_tests.rs

use quill_lang::{Compiler, Error, ScriptRunner, Value, from_json, to_json};
use serde_json::json;

fn run(source: &str) -> Value {
    ScriptRunner::default().invoke(source, None).unwrap()
}

// ============================================================================
// Bindings
// ============================================================================

#[test]
fn test_last_statement_is_result() {
    assert_eq!(run("1 + 1; 2 + 2"), Value::from(4));
}

#[test]
fn test_scalar_bindings() {
    assert_eq!(run("a <- 2; b <- a * 3; b + a"), Value::from(8));
}

#[test]
fn test_list_binding_keeps_its_fields() {
    let params = from_json(&json!({
        "json": r#"[{"name": "a", "age": 20}, {"name": "b", "age": 3}]"#
    }));
    let result = ScriptRunner::default()
        .invoke(
            "rows <- j2a(@json); adults <- rows[age >= 18]; adults => { name, age }",
            Some(&params),
        )
        .unwrap();
    assert_eq!(to_json(&result), r#"[{"name":"a","age":20}]"#);
}

#[test]
fn test_comments_between_statements() {
    let source = "
        # base price
        price <- 40;
        # with tax
        price * 1.5
    ";
    assert_eq!(run(source), Value::from(60));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_first_failure_is_returned() {
    let result = ScriptRunner::default().invoke("a <- 1; a + missing; a", None);
    assert!(matches!(result, Err(Error::Compile(_))));
}

#[test]
fn test_debug_reports_each_step() {
    let steps = ScriptRunner::default().debug("a <- 1; b <- a + 1; b * 10", None);
    assert_eq!(steps.len(), 3);
    assert!(steps.iter().all(|s| s.is_ok()));
    assert_eq!(steps[2].result, Some(Value::from(20)));
}

#[test]
fn test_debug_reports_scan_failure() {
    let steps = ScriptRunner::default().debug("a <- 'open", None);
    assert_eq!(steps.len(), 1);
    assert!(!steps[0].is_ok());
}

#[test]
fn test_runner_with_precompile() {
    let compiler = Compiler::with_options(quill_lang::CompileOptions {
        precompile: true,
        ..Default::default()
    });
    let result = ScriptRunner::new(compiler)
        .invoke("start <- $today(); start + '1d' > start", None)
        .unwrap();
    assert_eq!(result, Value::Boolean(true));
}
