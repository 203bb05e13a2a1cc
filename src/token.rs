//! Lexical tokens produced by the [`scanner`](crate::scanner).

use std::fmt;

use rust_decimal::Decimal;

/// Location of a token in the source text.
///
/// `offset` counts characters from the start of the source, `line` and
/// `column` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Position {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Words before classification
    /// A bare word whose role is decided by the token that follows it.
    Variable,

    // Constants
    /// ```text
    /// 42
    /// 3.14
    /// ```
    ConstantNumber,
    /// ```text
    /// 'single'
    /// "double"
    /// ```
    ConstantString,
    ConstantBoolean,
    ConstantNull,

    // Operands
    /// A field read, either a bare word or a backtick-quoted name.
    ///
    /// ```text
    /// CommentCount
    /// `Publish Time`
    /// ```
    MemberAccess,
    /// ```text
    /// @keyword
    /// ```
    Parameter,
    /// The current item, written `_`.
    DefaultArgument,
    /// A word directly followed by `(`.
    MethodCall,

    // Comparers
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Like,

    // Logic
    And,
    Or,
    Not,

    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    /// `|`, merges record fields into every item of a list.
    Compose,

    // Structure
    Dot,
    Comma,
    /// `..`
    Range,
    Between,
    Colon,
    /// `=>`
    Yield,
    /// `->`
    Reduce,
    /// `<-`
    Export,

    // Brackets before classification
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,

    // Brackets after classification
    BlockStart,
    BlockEnd,
    MethodStart,
    MethodEnd,
    ArrayIndexStart,
    ArrayIndexEnd,
    BetweenStart,
    BetweenEnd,
    OpenBrace,
    CloseBrace,

    /// `;`
    Delimiter,
}

impl TokenKind {
    /// Keyword table used for bare words.
    pub fn from_word(word: &str) -> TokenKind {
        match word.to_ascii_lowercase().as_str() {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "between" => TokenKind::Between,
            "like" => TokenKind::Like,
            _ => TokenKind::Variable,
        }
    }

    pub fn from_symbol(ch: char) -> Option<TokenKind> {
        let kind = match ch {
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '[' => TokenKind::OpenBracket,
            ']' => TokenKind::CloseBracket,
            '<' => TokenKind::Less,
            '=' => TokenKind::Equal,
            '>' => TokenKind::Greater,
            '!' => TokenKind::Not,
            ',' => TokenKind::Comma,
            '+' => TokenKind::Add,
            '-' => TokenKind::Subtract,
            '*' => TokenKind::Multiply,
            '/' => TokenKind::Divide,
            '.' => TokenKind::Dot,
            '{' => TokenKind::OpenBrace,
            '}' => TokenKind::CloseBrace,
            ':' => TokenKind::Colon,
            '|' => TokenKind::Compose,
            ';' => TokenKind::Delimiter,
            _ => return None,
        };
        Some(kind)
    }

    pub fn from_pair(first: char, second: char) -> Option<TokenKind> {
        let kind = match (first, second) {
            ('<', '=') => TokenKind::LessOrEqual,
            ('>', '=') => TokenKind::GreaterOrEqual,
            ('!', '=') => TokenKind::NotEqual,
            ('.', '.') => TokenKind::Range,
            ('=', '>') => TokenKind::Yield,
            ('-', '>') => TokenKind::Reduce,
            ('<', '-') => TokenKind::Export,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_constant(self) -> bool {
        matches!(
            self,
            TokenKind::ConstantNumber
                | TokenKind::ConstantString
                | TokenKind::ConstantBoolean
                | TokenKind::ConstantNull
        )
    }

    pub fn is_comparer(self) -> bool {
        matches!(
            self,
            TokenKind::Equal
                | TokenKind::NotEqual
                | TokenKind::Greater
                | TokenKind::GreaterOrEqual
                | TokenKind::Less
                | TokenKind::LessOrEqual
                | TokenKind::Like
        )
    }
}

/// Decoded literal payload of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(Decimal),
    Text(String),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token. Quoted strings hold their unescaped content.
    pub text: String,
    pub literal: Option<Literal>,
    pub position: Position,
    /// Index of the matching bracket within the same statement.
    pub pair: Option<usize>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: Position) -> Self {
        Token {
            kind,
            text: text.into(),
            literal: None,
            position,
            pair: None,
        }
    }

    pub fn with_literal(mut self, literal: Literal) -> Self {
        self.literal = Some(literal);
        self
    }

    /// Name of a parameter token without its `@` sigil.
    pub fn parameter_name(&self) -> &str {
        match &self.literal {
            Some(Literal::Text(name)) if self.kind == TokenKind::Parameter => name,
            _ => self.text.trim_start_matches('@'),
        }
    }

    pub fn number(&self) -> Option<Decimal> {
        match self.literal {
            Some(Literal::Number(n)) => Some(n),
            _ => None,
        }
    }

    pub fn flag(&self) -> Option<bool> {
        match self.literal {
            Some(Literal::Boolean(b)) => Some(b),
            _ => None,
        }
    }
}
