// tests/scanner_tests.rs

use quill_lang::{CompileError, TokenKind, scan};

fn kinds(source: &str) -> Vec<TokenKind> {
    scan(source)
        .unwrap()
        .remove(0)
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

fn single(source: &str) -> quill_lang::Token {
    let mut tokens = scan(source).unwrap().remove(0);
    assert_eq!(tokens.len(), 1, "expected one token in {:?}", source);
    tokens.remove(0)
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn test_words_are_classified_by_context() {
    assert_eq!(
        kinds("len(Items) + @limit"),
        vec![
            TokenKind::MethodCall,
            TokenKind::MethodStart,
            TokenKind::MemberAccess,
            TokenKind::MethodEnd,
            TokenKind::Add,
            TokenKind::Parameter,
        ]
    );
}

#[test]
fn test_literal_words() {
    assert_eq!(single("42").kind, TokenKind::ConstantNumber);
    assert_eq!(single("null").kind, TokenKind::ConstantNull);
    assert_eq!(single("NULL").kind, TokenKind::ConstantNull);
    assert_eq!(single("true").kind, TokenKind::ConstantBoolean);
    assert_eq!(single("_").kind, TokenKind::DefaultArgument);
    assert_eq!(single("Name").kind, TokenKind::MemberAccess);
}

#[test]
fn test_parameter_name_drops_marker() {
    assert_eq!(single("@Keyword").parameter_name(), "Keyword");
}

#[test]
fn test_two_character_operators() {
    assert_eq!(
        kinds("a <= b >= c != d"),
        vec![
            TokenKind::MemberAccess,
            TokenKind::LessOrEqual,
            TokenKind::MemberAccess,
            TokenKind::GreaterOrEqual,
            TokenKind::MemberAccess,
            TokenKind::NotEqual,
            TokenKind::MemberAccess,
        ]
    );
    assert_eq!(
        kinds("x <- Items => _"),
        vec![
            TokenKind::MemberAccess,
            TokenKind::Export,
            TokenKind::MemberAccess,
            TokenKind::Yield,
            TokenKind::DefaultArgument,
        ]
    );
}

#[test]
fn test_brackets_take_their_role() {
    assert_eq!(
        kinds("(a)[1]"),
        vec![
            TokenKind::BlockStart,
            TokenKind::MemberAccess,
            TokenKind::BlockEnd,
            TokenKind::ArrayIndexStart,
            TokenKind::ConstantNumber,
            TokenKind::ArrayIndexEnd,
        ]
    );
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_decimal_point_joins_number() {
    let token = single("3.14");
    assert_eq!(token.kind, TokenKind::ConstantNumber);
    assert_eq!(token.text, "3.14");
}

#[test]
fn test_dot_after_member_stays_dot() {
    assert_eq!(
        kinds("Author.Name"),
        vec![TokenKind::MemberAccess, TokenKind::Dot, TokenKind::MemberAccess]
    );
}

#[test]
fn test_escaped_quote_in_same_quote() {
    let token = single(r"'abc\''");
    assert_eq!(token.kind, TokenKind::ConstantString);
    assert_eq!(token.text, "abc'");
}

#[test]
fn test_other_quote_is_not_escaped() {
    let token = single(r#""it\'s""#);
    assert_eq!(token.text, r"it\'s");
    let token = single(r#"'say "hi"'"#);
    assert_eq!(token.text, r#"say "hi""#);
}

#[test]
fn test_backtick_names_member() {
    let token = single("`Publish Time`");
    assert_eq!(token.kind, TokenKind::MemberAccess);
    assert_eq!(token.text, "Publish Time");
}

// ============================================================================
// Statements and errors
// ============================================================================

#[test]
fn test_statements_split_on_delimiter() {
    let statements = scan("a <- 1;\n# the rest\nb <- a + 1; b").unwrap();
    assert_eq!(statements.len(), 3);
    assert_eq!(statements[2][0].text, "b");
}

#[test]
fn test_malformed_number() {
    assert!(matches!(scan("3.1.2"), Err(CompileError::InvalidToken { .. })));
}

#[test]
fn test_unclosed_quote() {
    assert!(matches!(scan("Name = 'abc"), Err(CompileError::UnclosedQuote { .. })));
}

#[test]
fn test_unbalanced_brackets() {
    assert!(matches!(scan("len(Items"), Err(CompileError::UnexpectedEnd { .. })));
    assert!(matches!(scan("Items)"), Err(CompileError::UnsupportedSyntax { .. })));
}
