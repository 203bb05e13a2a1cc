//! CLI support for quill-lang
//!
//! Provides programmatic access to the `quill` commands so they can be
//! embedded in other tools.

mod check;
mod run;
mod script;

pub use check::execute_check;
pub use run::{RunOptions, execute_run};
pub use script::{ScriptOptions, ScriptOutcome, execute_script};

use std::io;

use crate::{CompileError, EvalError, FunctionRegistry, Value};

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Compilation error
    Compile(CompileError),
    /// Evaluation error
    Eval(EvalError),
    /// Script error, compile or evaluation
    Script(crate::Error),
    /// JSON parsing error
    Json(serde_json::Error),
    /// IO error
    Io(io::Error),
    /// No input provided
    NoInput,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Compile(e) => write!(f, "Compile error: {}", e),
            CliError::Eval(e) => write!(f, "Evaluation error: {}", e),
            CliError::Script(e) => write!(f, "Script error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => write!(f, "No input provided. Use --input or pipe JSON to stdin."),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Compile(e) => Some(e),
            CliError::Eval(e) => Some(e),
            CliError::Script(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::NoInput => None,
        }
    }
}

impl From<CompileError> for CliError {
    fn from(e: CompileError) -> Self {
        CliError::Compile(e)
    }
}

impl From<EvalError> for CliError {
    fn from(e: EvalError) -> Self {
        CliError::Eval(e)
    }
}

impl From<crate::Error> for CliError {
    fn from(e: crate::Error) -> Self {
        CliError::Script(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

/// Signatures of the functions callable from source, one per line.
pub fn list_functions() -> Vec<String> {
    FunctionRegistry::intrinsics()
        .public()
        .map(|f| f.describe())
        .collect()
}

/// Reads an optional JSON document given on the command line.
fn parse_document(text: Option<&str>) -> Result<Option<Value>, CliError> {
    text.map(|text| {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Ok(crate::from_json(&json))
    })
    .transpose()
}
