// tests/functions_tests.rs

use quill_lang::{
    CompileError, Compiler, DataType, EvalError, Function, FunctionRegistry, Param, Record,
    SchemaProvider, Value, ValueType, from_json,
};
use quill_lang::functions::ArgumentType;
use serde_json::json;

fn eval(source: &str) -> Value {
    Compiler::new()
        .compile(source, &SchemaProvider::new())
        .unwrap()
        .execute(&Value::Object(Record::new()), None)
        .unwrap()
}

fn eval_on(source: &str, input: serde_json::Value) -> Value {
    let input = from_json(&input);
    Compiler::new()
        .compile_dynamic(source, &input)
        .unwrap()
        .execute(&input, None)
        .unwrap()
}

fn texts(values: &[&str]) -> Value {
    Value::List(values.iter().map(|&s| Value::from(s)).collect())
}

// ============================================================================
// Library
// ============================================================================

#[test]
fn test_text_functions() {
    assert_eq!(eval("trim('  quill ')"), Value::from("quill"));
    assert_eq!(eval("len('quill')"), Value::from(5));
    assert_eq!(eval("replace('a-b-c', '-', '+')"), Value::from("a+b+c"));
    assert_eq!(eval("split('a,b', ',')"), texts(&["a", "b"]));
    assert_eq!(eval("match('abc123', '[0-9]+')"), Value::Boolean(true));
}

#[test]
fn test_extract_group() {
    assert_eq!(eval("extr('id=42;', 'id=([0-9]+)', 1)"), Value::from("42"));
}

#[test]
fn test_number_conversion() {
    assert_eq!(eval("num('12') + 1"), Value::from(13));
    assert_eq!(eval("text(12) + 'px'"), Value::from("12px"));
}

#[test]
fn test_list_functions() {
    let input = json!({"Tags": ["a", "b", "c"]});
    assert_eq!(eval_on("len(Tags)", input.clone()), Value::from(3));
    assert_eq!(eval_on("join(Tags, '/')", input), Value::from("a/b/c"));
}

#[test]
fn test_isnull() {
    let input = json!({"Note": null});
    assert_eq!(eval_on("isnull(Note)", input), Value::Boolean(true));
}

#[test]
fn test_invalid_pattern_fails_at_run_time() {
    let executable = Compiler::new()
        .compile("match('abc', '(')", &SchemaProvider::new())
        .unwrap();
    let result = executable.execute(&Value::Object(Record::new()), None);
    assert!(matches!(result, Err(EvalError::InvalidPattern { .. })));
}

#[test]
fn test_internal_functions_are_hidden() {
    let registry = FunctionRegistry::intrinsics();
    assert!(registry.public().all(|f| !f.internal));
    assert!(registry.candidates("like", 2, false).is_empty());
    assert!(!registry.candidates("like", 2, true).is_empty());
}

#[test]
fn test_internal_function_not_callable_from_source() {
    let mut compiler = Compiler::new();
    compiler.register_external(
        Function::new(
            "hidden",
            vec![Param::of(DataType::Number)],
            ValueType::Number,
            |args| Ok(args.first().cloned().unwrap_or_default()),
        )
        .internal(),
    );
    let result = compiler.compile("hidden(1)", &SchemaProvider::new());
    assert!(matches!(result, Err(CompileError::InvalidMethodCall { .. })));
}

#[test]
fn test_internal_overloads_resolve_only_when_included() {
    let registry = FunctionRegistry::intrinsics();
    let args: Vec<ArgumentType> = [
        DataType::Number,
        DataType::Number,
        DataType::Number,
        DataType::Boolean,
        DataType::Boolean,
    ]
    .into_iter()
    .map(|static_type| ArgumentType {
        static_type,
        member_type: None,
    })
    .collect();
    assert!(registry.resolve("between", &args, false).is_none());
    assert!(registry.resolve("between", &args, true).is_some());
}

#[test]
fn test_names_are_case_insensitive() {
    assert_eq!(eval("TRIM(' x ')"), Value::from("x"));
}

#[test]
fn test_described_dates_against_a_reference() {
    assert_eq!(
        eval("date2('3天前', '2024-05-10 12:00:00')"),
        eval("date('2024-05-07 12:00:00')")
    );
    assert_eq!(
        eval("date2('昨天 10:30', date('2024-05-10 12:00:00'))"),
        eval("date('2024-05-09 10:30:00')")
    );
    assert_eq!(
        eval("date2('更新于2023年4月5日', '2024-05-10 12:00:00')"),
        eval("date('2023-04-05')")
    );
    assert_eq!(eval("date2('not a date')"), Value::Null);
}

// ============================================================================
// External functions
// ============================================================================

#[test]
fn test_external_function() {
    let mut compiler = Compiler::new();
    compiler.register_external(Function::new(
        "double",
        vec![Param::of(DataType::Number)],
        ValueType::Number,
        |args| {
            Ok(args
                .first()
                .and_then(Value::as_number)
                .map(|n| Value::Number(n * rust_decimal::Decimal::from(2)))
                .unwrap_or_default())
        },
    ));
    let executable = compiler.compile("double(20) + 2", &SchemaProvider::new()).unwrap();
    let result = executable.execute(&Value::Object(Record::new()), None).unwrap();
    assert_eq!(result, Value::from(42));
}

#[test]
fn test_library_wins_over_external() {
    let mut compiler = Compiler::new();
    compiler.register_external(Function::new(
        "trim",
        vec![Param::of(DataType::Text)],
        ValueType::Text,
        |_| Ok(Value::from("external")),
    ));
    let executable = compiler.compile("trim(' x ')", &SchemaProvider::new()).unwrap();
    let result = executable.execute(&Value::Object(Record::new()), None).unwrap();
    assert_eq!(result, Value::from("x"));
}
