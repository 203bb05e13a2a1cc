// tests/compile_tests.rs

use quill_lang::{
    CompileError, Compiler, DataType, EvalError, Executable, Record, SchemaProvider, Value,
    from_json, to_json,
};
use serde_json::json;

fn compile(source: &str) -> Executable {
    Compiler::new().compile(source, &SchemaProvider::new()).unwrap()
}

fn eval(source: &str) -> Value {
    compile(source)
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

fn compile_error(source: &str, input: serde_json::Value) -> CompileError {
    let input = from_json(&input);
    Compiler::new().compile_dynamic(source, &input).unwrap_err()
}

fn numbers(values: &[i64]) -> Value {
    Value::List(values.iter().map(|&n| Value::from(n)).collect())
}

fn items() -> serde_json::Value {
    json!({"Items": [10, 20, 30, 40]})
}

fn people() -> serde_json::Value {
    json!({
        "Team": "core",
        "People": [
            {"Name": "Ada", "Age": 36},
            {"Name": "Bob", "Age": 17},
            {"Name": "Cy", "Age": 52},
            {"Name": "Di", "Age": 29}
        ]
    })
}

// ============================================================================
// Arithmetic and precedence
// ============================================================================

#[test]
fn test_precedence() {
    assert_eq!(eval("3+4*5+6*7+10"), Value::from(75));
    assert_eq!(eval("3*4*5-6*2"), Value::from(48));
}

#[test]
fn test_parentheses_are_a_barrier() {
    assert_eq!(eval("(4+1)*2"), Value::from(10));
    assert_eq!(eval("2*(3+1)+1"), Value::from(9));
    assert_eq!(eval("1+(2+3)*4"), Value::from(21));
}

#[test]
fn test_nested_groups() {
    assert_eq!(
        eval("4+1=5 and (1+4*2=9 and (6=0 or 9*(8+1)=81))"),
        Value::Boolean(true)
    );
}

#[test]
fn test_negative_numbers() {
    assert_eq!(eval("-1*2"), Value::from(-2));
    assert_eq!(eval("-3*-4+-1*2"), Value::from(10));
    assert_eq!(eval("5 - -2"), Value::from(7));
}

#[test]
fn test_call_as_operand() {
    assert_eq!(eval("2*num('3')+1"), Value::from(7));
}

// ============================================================================
// Text
// ============================================================================

#[test]
fn test_quote_escaping() {
    assert_eq!(eval(r"'abc\''"), Value::from("abc'"));
    assert_eq!(eval(r#""abc\'""#), Value::from(r"abc\'"));
}

#[test]
fn test_text_concatenation() {
    assert_eq!(eval("'a' + \"b\""), Value::from("ab"));
    assert_eq!(eval("'n' + 1"), Value::from("n1"));
}

#[test]
fn test_like() {
    let input = json!({"Name": "Quill Lang"});
    assert_eq!(eval_on("Name like 'quill%'", input.clone()), Value::Boolean(true));
    assert_eq!(eval_on("Name like '%lang'", input.clone()), Value::Boolean(true));
    assert_eq!(eval_on("Name like '%ink%'", input), Value::Boolean(false));
}

// ============================================================================
// Lists
// ============================================================================

#[test]
fn test_index_is_one_based() {
    assert_eq!(eval_on("Items[1]", items()), Value::from(10));
    assert_eq!(eval_on("Items[-1]", items()), Value::from(40));
}

#[test]
fn test_index_out_of_range_is_null() {
    assert_eq!(eval_on("Items[5]", items()), Value::Null);
    assert_eq!(eval_on("Items[-5]", items()), Value::Null);
}

#[test]
fn test_slices() {
    assert_eq!(eval_on("Items[2..3]", items()), numbers(&[20, 30]));
    assert_eq!(eval_on("Items[-2..]", items()), numbers(&[30, 40]));
    assert_eq!(eval_on("Items[..2]", items()), numbers(&[10, 20]));
    assert_eq!(eval_on("Items[3..1]", items()), numbers(&[]));
}

#[test]
fn test_filter_then_slice() {
    let result = eval_on("People[Age > 18][1..2] => Name", people());
    assert_eq!(result, Value::List(vec![Value::from("Ada"), Value::from("Cy")]));
}

#[test]
fn test_projection_through_list() {
    let result = eval_on("People.Name", people());
    assert_eq!(result.as_list().map(|l| l.len()), Some(4));
    assert_eq!(result.as_list().and_then(|l| l.first()), Some(&Value::from("Ada")));
}

#[test]
fn test_loop_index() {
    assert_eq!(eval_on("Items => $i", items()), numbers(&[1, 2, 3, 4]));
}

#[test]
fn test_array_literal() {
    assert_eq!(eval("[1, 2, 3][2]"), Value::from(2));
}

#[test]
fn test_reduce_sees_whole_list() {
    assert_eq!(eval_on("Items -> len(_)", items()), Value::from(4));
}

#[test]
fn test_compose_adds_fields_to_every_item() {
    let result = eval_on("People[Age < 20] | { Team }", people());
    assert_eq!(to_json(&result), r#"[{"Name":"Bob","Age":17,"Team":"core"}]"#);
}

// ============================================================================
// Records
// ============================================================================

#[test]
fn test_object_field_names() {
    let input = json!({"b": {"c": 2}, "d": [5, 6]});
    let result = eval_on("{ a: 1, b.c, d[1] }", input);
    assert_eq!(to_json(&result), r#"{"a":1,"c":2,"d":5}"#);
}

#[test]
fn test_positional_field_names() {
    let result = eval("{ a: 1, 2 + 3, 'x' }");
    assert_eq!(to_json(&result), r#"{"a":1,"_2":5,"_3":"x"}"#);
}

#[test]
fn test_yield_records() {
    let result = eval_on("People[Age > 30] => { Name, older: Age + 1 }", people());
    assert_eq!(
        to_json(&result),
        r#"[{"Name":"Ada","older":37},{"Name":"Cy","older":53}]"#
    );
}

// ============================================================================
// Comparisons and nulls
// ============================================================================

#[test]
fn test_null_checks() {
    let input = json!({"Name": null, "Age": 3});
    assert_eq!(eval_on("Name = null", input.clone()), Value::Boolean(true));
    assert_eq!(eval_on("Age != null", input), Value::Boolean(true));
}

#[test]
fn test_between_bounds() {
    let input = json!({"Age": 18});
    assert_eq!(eval_on("Age between [18, 65)", input.clone()), Value::Boolean(true));
    assert_eq!(eval_on("Age between (18, 65]", input), Value::Boolean(false));
}

#[test]
fn test_date_offsets() {
    assert_eq!(
        eval("date('2024-05-01 08:00:00') + '1d' = date('2024-05-02 08:00:00')"),
        Value::Boolean(true)
    );
    assert_eq!(
        eval("date('2024-05-01 08:00:00') - '2h' < date('2024-05-01 08:00:00')"),
        Value::Boolean(true)
    );
}

// ============================================================================
// Parameters
// ============================================================================

#[test]
fn test_parameter_uses_share_one_type() {
    let executable = compile("@x + 1 > @x");
    assert_eq!(executable.parameters().len(), 1);
    assert_eq!(executable.parameters()[0].data_type, DataType::Number);

    let bag = from_json(&json!({"X": 3}));
    let result = executable.execute(&Value::Object(Record::new()), Some(&bag));
    assert_eq!(result.unwrap(), Value::Boolean(true));
}

#[test]
fn test_linked_parameters_settle_together() {
    let executable = compile("@a + @b > 3");
    let types: Vec<DataType> = executable.parameters().iter().map(|p| p.data_type).collect();
    assert_eq!(types, vec![DataType::Number, DataType::Number]);

    let bag = from_json(&json!({"a": 1, "b": "5"}));
    let result = executable.execute(&Value::Object(Record::new()), Some(&bag));
    assert_eq!(result.unwrap(), Value::Boolean(true));
}

#[test]
fn test_conflicting_parameter_types() {
    let result = Compiler::new().compile("@x + 1 > 0 and @x like 'a%'", &SchemaProvider::new());
    assert!(matches!(
        result,
        Err(CompileError::ConflictParameterType { .. })
    ));
}

#[test]
fn test_parameter_without_context() {
    let result = Compiler::new().compile("@a = @b", &SchemaProvider::new());
    assert!(matches!(
        result,
        Err(CompileError::InvalidParameterOperation { .. })
    ));
}

#[test]
fn test_missing_parameter_bag() {
    let result = compile("@x * 2").execute(&Value::Object(Record::new()), None);
    assert_eq!(result, Err(EvalError::MissingParameters));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unknown_member() {
    assert!(matches!(
        compile_error("Missing + 1", items()),
        CompileError::InvalidMemberName { .. }
    ));
}

#[test]
fn test_unknown_member_of_a_described_value() {
    let input = json!({"o": {"c": 1}, "L": [{"a": 1}]});
    for source in ["o.x", "L.x", "L[1].x", "o.c.x"] {
        assert!(
            matches!(
                compile_error(source, input.clone()),
                CompileError::InvalidMemberName { .. }
            ),
            "{source}"
        );
    }
}

#[test]
fn test_member_of_an_undescribed_value() {
    assert_eq!(eval_on("n.x", json!({"n": null})), Value::Null);
}

#[test]
fn test_indexing_a_scalar() {
    assert!(matches!(
        compile_error("Team[1]", people()),
        CompileError::InvalidMemberUsage { .. }
    ));
}

#[test]
fn test_unknown_function() {
    assert!(matches!(
        compile_error("nothing(Items)", items()),
        CompileError::InvalidMethodCall { .. }
    ));
}

#[test]
fn test_incomplete_operator() {
    assert!(matches!(
        compile_error("Items[1] +", items()),
        CompileError::InvalidOperator { .. }
    ));
}

#[test]
fn test_executable_is_reusable() {
    let executable = compile("3 * 3");
    let root = Value::Object(Record::new());
    for _ in 0..3 {
        assert_eq!(executable.execute(&root, None).unwrap(), Value::from(9));
    }
}
