// tests/parser_tests.rs

use quill_lang::eval::evaluate;
use quill_lang::node::NodeKind;
use quill_lang::{
    CompileError, FunctionRegistry, Record, SchemaProvider, SyntaxTree, Value, lower, parse, scan,
};

fn parsed(source: &str) -> SyntaxTree {
    let tokens = scan(source).unwrap().remove(0);
    parse(tokens).unwrap()
}

fn parse_error(source: &str) -> CompileError {
    let tokens = scan(source).unwrap().remove(0);
    parse(tokens).unwrap_err()
}

fn try_parse(source: &str) -> Result<SyntaxTree, CompileError> {
    let tokens = scan(source)?.remove(0);
    parse(tokens)
}

fn child_kind(syntax: &SyntaxTree, slot: usize) -> NodeKind {
    let tree = syntax.tree();
    let child = tree.children(syntax.root())[slot].unwrap();
    tree.kind(child)
}

// ============================================================================
// Precedence
// ============================================================================

#[test]
fn test_multiplication_binds_tighter() {
    let syntax = parsed("1 + 2 * 3");
    assert_eq!(syntax.root_kind(), NodeKind::Add);
    assert_eq!(child_kind(&syntax, 1), NodeKind::Multiply);
}

#[test]
fn test_parentheses_group() {
    let syntax = parsed("(1 + 2) * 3");
    assert_eq!(syntax.root_kind(), NodeKind::Multiply);
    assert_eq!(child_kind(&syntax, 0), NodeKind::Add);
    assert_eq!(syntax.render(), "(1 + 2) * 3");
}

#[test]
fn test_group_on_the_right() {
    let syntax = parsed("2 * (3 + 1) + 1");
    assert_eq!(syntax.root_kind(), NodeKind::Add);
    assert_eq!(child_kind(&syntax, 0), NodeKind::Multiply);
}

#[test]
fn test_call_on_the_right() {
    let syntax = parsed("2 * num('3') + 1");
    assert_eq!(syntax.root_kind(), NodeKind::Add);
    assert_eq!(child_kind(&syntax, 0), NodeKind::Multiply);
}

#[test]
fn test_comparison_below_logic() {
    let syntax = parsed("a = 1 and b > 2");
    assert_eq!(syntax.root_kind(), NodeKind::And);
    assert!(matches!(child_kind(&syntax, 0), NodeKind::Compare(_)));
    assert!(matches!(child_kind(&syntax, 1), NodeKind::Compare(_)));
}

#[test]
fn test_negative_operand() {
    let syntax = parsed("-1 * 2");
    assert_eq!(syntax.root_kind(), NodeKind::Multiply);
    let tree = syntax.tree();
    assert!(tree.is_negation(tree.left(syntax.root()).unwrap()));
}

#[test]
fn test_negative_right_operand() {
    let syntax = parsed("3 * -4");
    let tree = syntax.tree();
    assert_eq!(syntax.root_kind(), NodeKind::Multiply);
    assert!(tree.is_negation(tree.right(syntax.root()).unwrap()));
}

// ============================================================================
// Structures
// ============================================================================

#[test]
fn test_filter_then_yield() {
    let syntax = parsed("Comments[Likes > 3] => Author");
    assert_eq!(syntax.root_kind(), NodeKind::Yield);
    assert_eq!(child_kind(&syntax, 0), NodeKind::Array);
}

#[test]
fn test_chained_index() {
    let syntax = parsed("Items[Price > 1][1..2]");
    let tree = syntax.tree();
    assert_eq!(syntax.root_kind(), NodeKind::Array);
    let inner = tree.left(syntax.root()).unwrap();
    assert_eq!(tree.kind(inner), NodeKind::Array);
    let range = tree.arguments(syntax.root(), 1)[0];
    assert_eq!(tree.kind(range), NodeKind::Range);
}

#[test]
fn test_object_fields() {
    let syntax = parsed("{ a: 1, b.c, d[1] }");
    let tree = syntax.tree();
    assert_eq!(syntax.root_kind(), NodeKind::Object);
    let fields: Vec<NodeKind> = tree
        .arguments(syntax.root(), 0)
        .into_iter()
        .map(|f| tree.kind(f))
        .collect();
    assert_eq!(fields, vec![NodeKind::Colon, NodeKind::Dot, NodeKind::Array]);
}

#[test]
fn test_method_arguments() {
    let syntax = parsed("replace(Name, 'a', 'b')");
    assert_eq!(syntax.root_kind(), NodeKind::Method);
    assert_eq!(syntax.tree().arguments(syntax.root(), 1).len(), 3);
    assert_eq!(syntax.render(), "replace(Name,'a','b')");
}

#[test]
fn test_between_bounds() {
    let syntax = parsed("Age between [18, 65)");
    let tree = syntax.tree();
    assert_eq!(syntax.root_kind(), NodeKind::Between);
    assert_eq!(tree.children(syntax.root()).len(), 5);
}

#[test]
fn test_export_is_root() {
    let syntax = parsed("adults <- People[Age >= 18]");
    assert_eq!(syntax.root_kind(), NodeKind::Export);
    assert_eq!(child_kind(&syntax, 1), NodeKind::Array);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_adjacent_operands() {
    assert!(matches!(
        parse_error("Name Age"),
        CompileError::UnsupportedSyntax { .. }
    ));
}

#[test]
fn test_leading_operator() {
    assert!(matches!(
        parse_error("* 2"),
        CompileError::InvalidOperator { .. }
    ));
}

#[test]
fn test_parameter_after_dot() {
    assert!(matches!(
        parse_error("Author.@name"),
        CompileError::InvalidOperator { .. }
    ));
}

#[test]
fn test_between_requires_an_interval() {
    assert!(matches!(
        parse_error("1 between * 2 = 3"),
        CompileError::UnsupportedSyntax { .. }
    ));
    assert!(try_parse("1 between * 2 and 3").is_err());
    assert!(try_parse("1 between 2").is_err());
    assert!(try_parse("1 between").is_err());
}

// ============================================================================
// Reuse
// ============================================================================

#[test]
fn test_lowering_leaves_the_tree_untouched() {
    let syntax = parsed("(4 + 1) * 2 = 10 and (1 + 4 * 2 = 9)");
    let before = syntax.render();
    let schema = SchemaProvider::new();
    let registry = FunctionRegistry::intrinsics();
    let externals = FunctionRegistry::new();

    let first = lower(&syntax, &schema, &registry, &externals, &[]).unwrap();
    let second = lower(&syntax, &schema, &registry, &externals, &[]).unwrap();
    assert_eq!(syntax.render(), before);
    assert_eq!(first.value_type, second.value_type);

    let root = Value::Object(Record::new());
    let first = evaluate(&first.expr, root.clone(), &Default::default()).unwrap();
    let second = evaluate(&second.expr, root, &Default::default()).unwrap();
    assert_eq!(first, Value::Boolean(true));
    assert_eq!(first, second);
}
