//! Error types for compilation and evaluation.
//!
//! Compile errors carry the offending token text and its source position so
//! callers can point at the exact spot. Evaluation errors are raised while an
//! [`Executable`](crate::Executable) runs.

use thiserror::Error;

use crate::token::{Position, Token};
use crate::value::DataType;

/// Everything that can go wrong between source text and a runnable expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("source is empty")]
    EmptySource,

    #[error("invalid token '{text}' at {position}")]
    InvalidToken { text: String, position: Position },

    #[error("unclosed quote starting at {position}")]
    UnclosedQuote { position: Position },

    #[error("unexpected end of statement, '{text}' at {position} is never closed")]
    UnexpectedEnd { text: String, position: Position },

    #[error("unsupported syntax '{text}' at {position}")]
    UnsupportedSyntax { text: String, position: Position },

    #[error("invalid operator '{text}' at {position}")]
    InvalidOperator { text: String, position: Position },

    #[error("invalid operand for '{text}' at {position}: {detail}")]
    InvalidOperand {
        text: String,
        position: Position,
        detail: String,
    },

    #[error("unknown member '{name}'")]
    InvalidMemberName { name: String },

    #[error("'{text}' at {position} is not a list")]
    InvalidMemberUsage { text: String, position: Position },

    #[error("no function '{name}' accepts ({arguments})")]
    InvalidMethodCall { name: String, arguments: String },

    #[error("parameter '@{name}' is used as both {existing} and {requested}")]
    ConflictParameterType {
        name: String,
        existing: DataType,
        requested: DataType,
    },

    #[error("cannot infer the type of parameter '@{name}'")]
    InvalidParameterOperation { name: String },

    #[error("invalid parameter name '{name}'")]
    InvalidParameterName { name: String },

    #[error("expression is incomplete, a bracket or call was left open")]
    IncompleteExpression,

    #[error("expression is empty")]
    EmptyExpression,

    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

impl CompileError {
    pub fn invalid_token(token: &Token) -> Self {
        CompileError::InvalidToken {
            text: token.text.clone(),
            position: token.position,
        }
    }

    pub fn unsupported(token: &Token) -> Self {
        CompileError::UnsupportedSyntax {
            text: token.text.clone(),
            position: token.position,
        }
    }

    pub fn invalid_operator(token: &Token) -> Self {
        CompileError::InvalidOperator {
            text: token.text.clone(),
            position: token.position,
        }
    }

    pub fn invalid_operand(token: &Token, detail: impl Into<String>) -> Self {
        CompileError::InvalidOperand {
            text: token.text.clone(),
            position: token.position,
            detail: detail.into(),
        }
    }

    pub fn not_a_list(token: &Token) -> Self {
        CompileError::InvalidMemberUsage {
            text: token.text.clone(),
            position: token.position,
        }
    }

    pub fn unknown_member(name: impl Into<String>) -> Self {
        CompileError::InvalidMemberName { name: name.into() }
    }
}

/// Failures raised while an executable runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid date offset '{0}'")]
    InvalidDateOffset(String),

    #[error("value of parameter '@{name}' cannot be converted to {expected}")]
    InvalidParameterValue { name: String, expected: DataType },

    #[error("parameters were declared but no values were supplied")]
    MissingParameters,

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("{name}: {message}")]
    Function { name: String, message: String },
}

impl EvalError {
    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        EvalError::Function {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Umbrella error for APIs that both compile and run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
