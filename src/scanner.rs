//! Turns source text into statements of classified tokens.
//!
//! Scanning is context sensitive: a bare word is held as a `Variable` until
//! the next token reveals its role.
//!
//! ```text
//! count(Items)      count  -> MethodCall, Items -> MemberAccess
//! Items[1]          Items  -> MemberAccess, [ -> ArrayIndexStart
//! x between [1,2)   [ -> BetweenStart(inclusive), ) -> BetweenEnd(exclusive)
//! 3.14              3, ., 14 merged into one number
//! ```
//!
//! Statements are separated by `;`, `#` starts a comment running to the end
//! of the line.

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::trace;

use crate::error::CompileError;
use crate::token::{Literal, Position, Token, TokenKind};

const STOP_CHARS: &[char] = &[
    '\'', '"', '`', '(', ')', '[', ']', '<', '=', '>', '+', '-', '*', '/', ',', '.', '!', '{',
    '}', ':', '|', ';', '#',
];

enum Lexeme {
    Token(Token),
    Delimiter,
    Comment,
}

pub struct Scanner {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

/// Scan `source` into non-empty statements.
pub fn scan(source: &str) -> Result<Vec<Vec<Token>>, CompileError> {
    Scanner::new(source).scan()
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Scanner {
            input: source.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn scan(mut self) -> Result<Vec<Vec<Token>>, CompileError> {
        if self.input.iter().all(|c| c.is_whitespace()) {
            return Err(CompileError::EmptySource);
        }

        let mut statements = Vec::new();
        while self.current_char().is_some() {
            let statement = self.scan_statement()?;
            if !statement.is_empty() {
                statements.push(statement);
            }
        }
        trace!(statements = statements.len(), "scanned source");
        Ok(statements)
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn mark(&self) -> Position {
        Position {
            offset: self.position,
            line: self.line,
            column: self.column,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_statement(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut open: Vec<usize> = Vec::new();

        while let Some(lexeme) = self.next_lexeme()? {
            let mut token = match lexeme {
                Lexeme::Delimiter => break,
                Lexeme::Comment => continue,
                Lexeme::Token(token) => token,
            };
            let previous = tokens.last().map(|t| t.kind);

            match token.kind {
                TokenKind::OpenBracket => {
                    if previous == Some(TokenKind::Between) {
                        token.kind = TokenKind::BetweenStart;
                        token.literal = Some(Literal::Boolean(true));
                    } else {
                        if let Some(prev) = tokens.last_mut() {
                            classify_variable(prev, TokenKind::MemberAccess);
                        }
                        token.kind = TokenKind::ArrayIndexStart;
                    }
                    open.push(tokens.len());
                }
                TokenKind::OpenParen => {
                    if previous == Some(TokenKind::Between) {
                        token.kind = TokenKind::BetweenStart;
                        token.literal = Some(Literal::Boolean(false));
                    } else if previous == Some(TokenKind::Variable) {
                        if let Some(prev) = tokens.last_mut() {
                            classify_variable(prev, TokenKind::MethodCall);
                        }
                        token.kind = TokenKind::MethodStart;
                    } else {
                        token.kind = TokenKind::BlockStart;
                    }
                    open.push(tokens.len());
                }
                _ if follows_number_and_dot(&tokens) => {
                    merge_fraction(&mut tokens, token)?;
                    continue;
                }
                _ => {
                    if let Some(prev) = tokens.last_mut() {
                        classify_variable(prev, TokenKind::MemberAccess);
                    }
                    if matches!(token.kind, TokenKind::CloseBracket | TokenKind::CloseParen) {
                        let opener_index = open
                            .pop()
                            .ok_or_else(|| CompileError::unsupported(&token))?;
                        let opener = tokens[opener_index].kind;
                        token.kind = close_kind(opener, token.kind)
                            .ok_or_else(|| CompileError::unsupported(&token))?;
                        if token.kind == TokenKind::BetweenEnd {
                            token.literal =
                                Some(Literal::Boolean(token.text == "]"));
                        }
                        token.pair = Some(opener_index);
                        tokens[opener_index].pair = Some(tokens.len());
                    }
                }
            }
            tokens.push(token);
        }

        if let Some(&index) = open.last() {
            let token = &tokens[index];
            return Err(CompileError::UnexpectedEnd {
                text: token.text.clone(),
                position: token.position,
            });
        }
        if let Some(last) = tokens.last_mut() {
            classify_variable(last, TokenKind::MemberAccess);
        }
        Ok(tokens)
    }

    fn next_lexeme(&mut self) -> Result<Option<Lexeme>, CompileError> {
        self.skip_whitespace();
        let Some(ch) = self.current_char() else {
            return Ok(None);
        };
        let start = self.mark();

        if !STOP_CHARS.contains(&ch) {
            let word = self.read_word();
            let kind = TokenKind::from_word(&word);
            return Ok(Some(Lexeme::Token(Token::new(kind, word, start))));
        }

        match ch {
            '\'' | '"' | '`' => {
                let text = self.read_quoted(ch, start)?;
                let token = if ch == '`' {
                    Token::new(TokenKind::MemberAccess, text, start)
                } else {
                    Token::new(TokenKind::ConstantString, text.clone(), start)
                        .with_literal(Literal::Text(text))
                };
                Ok(Some(Lexeme::Token(token)))
            }
            '#' => {
                while let Some(c) = self.current_char() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
                Ok(Some(Lexeme::Comment))
            }
            ';' => {
                self.advance();
                Ok(Some(Lexeme::Delimiter))
            }
            _ => {
                if let Some(next) = self.peek_char(1) {
                    if let Some(kind) = TokenKind::from_pair(ch, next) {
                        self.advance();
                        self.advance();
                        let text: String = [ch, next].iter().collect();
                        return Ok(Some(Lexeme::Token(Token::new(kind, text, start))));
                    }
                }
                self.advance();
                let kind = TokenKind::from_symbol(ch).ok_or_else(|| CompileError::InvalidToken {
                    text: ch.to_string(),
                    position: start,
                })?;
                Ok(Some(Lexeme::Token(Token::new(kind, ch.to_string(), start))))
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() || STOP_CHARS.contains(&ch) {
                break;
            }
            word.push(ch);
            self.advance();
        }
        word
    }

    /// Reads a quoted run. Only the opening quote character can be escaped.
    fn read_quoted(&mut self, quote: char, start: Position) -> Result<String, CompileError> {
        self.advance();
        if self.current_char().is_none() {
            return Err(CompileError::UnexpectedEnd {
                text: quote.to_string(),
                position: start,
            });
        }

        let mut text = String::new();
        let mut previous = quote;
        while let Some(ch) = self.current_char() {
            self.advance();
            if ch == quote {
                if previous == '\\' {
                    text.pop();
                    text.push(ch);
                } else {
                    return Ok(text);
                }
            } else {
                text.push(ch);
            }
            previous = ch;
        }
        Err(CompileError::UnclosedQuote { position: start })
    }
}

fn close_kind(opener: TokenKind, closer: TokenKind) -> Option<TokenKind> {
    match (opener, closer) {
        (TokenKind::BetweenStart, TokenKind::CloseBracket | TokenKind::CloseParen) => {
            Some(TokenKind::BetweenEnd)
        }
        (TokenKind::ArrayIndexStart, TokenKind::CloseBracket) => Some(TokenKind::ArrayIndexEnd),
        (TokenKind::MethodStart, TokenKind::CloseParen) => Some(TokenKind::MethodEnd),
        (TokenKind::BlockStart, TokenKind::CloseBracket | TokenKind::CloseParen) => {
            Some(TokenKind::BlockEnd)
        }
        _ => None,
    }
}

fn follows_number_and_dot(tokens: &[Token]) -> bool {
    tokens.len() >= 2
        && tokens[tokens.len() - 1].kind == TokenKind::Dot
        && tokens[tokens.len() - 2].kind == TokenKind::ConstantNumber
}

/// Folds `N . word` into a single decimal constant.
fn merge_fraction(tokens: &mut Vec<Token>, token: Token) -> Result<(), CompileError> {
    if parse_decimal(&token.text).is_none() {
        return Err(CompileError::invalid_token(&token));
    }
    tokens.pop();
    let Some(whole) = tokens.last_mut() else {
        return Err(CompileError::invalid_token(&token));
    };
    let merged = format!("{}.{}", whole.text, token.text);
    let value = parse_decimal(&merged).ok_or_else(|| CompileError::InvalidToken {
        text: merged.clone(),
        position: whole.position,
    })?;
    whole.text = merged;
    whole.literal = Some(Literal::Number(value));
    Ok(())
}

pub(crate) fn parse_decimal(text: &str) -> Option<Decimal> {
    let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
    let dots = text.chars().filter(|&c| c == '.').count();
    if digits == 0 || dots > 1 || digits + dots != text.chars().count() {
        return None;
    }
    Decimal::from_str(text).ok()
}

/// Whether `name` must be back-quoted to scan back as a member name.
pub(crate) fn needs_quoting(name: &str) -> bool {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || STOP_CHARS.contains(&c)) {
        return true;
    }
    if TokenKind::from_word(name) != TokenKind::Variable {
        return true;
    }
    let mut token = Token::new(TokenKind::Variable, name, Position::default());
    classify_variable(&mut token, TokenKind::MemberAccess);
    token.kind != TokenKind::MemberAccess
}

/// Settles the role of a pending `Variable` token.
fn classify_variable(token: &mut Token, role: TokenKind) {
    if token.kind != TokenKind::Variable {
        return;
    }
    if let Some(number) = parse_decimal(&token.text) {
        token.kind = TokenKind::ConstantNumber;
        token.literal = Some(Literal::Number(number));
    } else if token.text == "null" || token.text == "NULL" {
        token.kind = TokenKind::ConstantNull;
    } else if token.text.eq_ignore_ascii_case("true") || token.text.eq_ignore_ascii_case("false")
    {
        token.kind = TokenKind::ConstantBoolean;
        token.literal = Some(Literal::Boolean(token.text.eq_ignore_ascii_case("true")));
    } else if token.text == "_" {
        token.kind = TokenKind::DefaultArgument;
    } else if role == TokenKind::MemberAccess && token.text.starts_with('@') {
        token.kind = TokenKind::Parameter;
        token.literal = Some(Literal::Text(token.text[1..].to_string()));
    } else {
        token.kind = role;
    }
}

#[cfg(test)]
fn kinds(source: &str) -> Vec<TokenKind> {
    scan(source).unwrap().remove(0).into_iter().map(|t| t.kind).collect()
}

#[test]
fn test_member_names_that_need_quoting() {
    assert!(!needs_quoting("Name"));
    assert!(!needs_quoting("$i"));
    assert!(needs_quoting("Publish Time"));
    assert!(needs_quoting("and"));
    assert!(needs_quoting("42"));
    assert!(needs_quoting("null"));
    assert!(needs_quoting("a.b"));
}

#[test]
fn test_classifies_words_by_follower() {
    use TokenKind::*;
    assert_eq!(
        kinds("len(Items[1])"),
        vec![MethodCall, MethodStart, MemberAccess, ArrayIndexStart, ConstantNumber, ArrayIndexEnd, MethodEnd]
    );
    assert_eq!(kinds("@name = _"), vec![Parameter, Equal, DefaultArgument]);
    assert_eq!(kinds("null != TRUE"), vec![ConstantNull, NotEqual, ConstantBoolean]);
}

#[test]
fn test_between_brackets() {
    let tokens = scan("x between [1, 8)").unwrap().remove(0);
    assert_eq!(tokens[2].kind, TokenKind::BetweenStart);
    assert_eq!(tokens[2].flag(), Some(true));
    assert_eq!(tokens[6].kind, TokenKind::BetweenEnd);
    assert_eq!(tokens[6].flag(), Some(false));
    assert_eq!(tokens[2].pair, Some(6));
}

#[test]
fn test_merges_decimal_fraction() {
    let tokens = scan("3.14 + 1").unwrap().remove(0);
    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[0].text, "3.14");
    assert_eq!(tokens[0].number(), Some(Decimal::new(314, 2)));
}

#[test]
fn test_invalid_fraction() {
    match scan("-3.1.2") {
        Err(CompileError::InvalidToken { text, .. }) => assert_eq!(text, "3.1.2"),
        other => panic!("unexpected {:?}", other),
    }
    match scan("-3.a") {
        Err(CompileError::InvalidToken { text, .. }) => assert_eq!(text, "a"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_quote_escapes() {
    let tokens = scan(r#"'ab\'c' + "x\'y""#).unwrap().remove(0);
    assert_eq!(tokens[0].text, "ab'c");
    assert_eq!(tokens[2].text, r"x\'y");
}

#[test]
fn test_statements_and_comments() {
    let statements = scan("a <- 1; # note\n;; b + 1").unwrap();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[1][0].position.line, 2);
}

#[test]
fn test_scan_failures() {
    assert_eq!(scan("   "), Err(CompileError::EmptySource));
    assert!(matches!(scan("'abc"), Err(CompileError::UnclosedQuote { .. })));
    assert!(matches!(scan("'"), Err(CompileError::UnexpectedEnd { .. })));
    assert!(matches!(scan("len(a"), Err(CompileError::UnexpectedEnd { .. })));
    assert!(matches!(scan("a[1)"), Err(CompileError::UnsupportedSyntax { .. })));
    assert!(matches!(scan("a)"), Err(CompileError::UnsupportedSyntax { .. })));
}
