//! Execute a quill expression against JSON input

use super::{CliError, parse_document};
use crate::{CompileOptions, Compiler, Value};

/// Options for the run command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// The expression to execute
    pub expression: String,
    /// JSON input document
    pub input: Option<String>,
    /// JSON object with parameter values
    pub parameters: Option<String>,
    /// Rewrite clock calls before compiling
    pub precompile: bool,
}

/// Infers a schema from the input, compiles and executes.
pub fn execute_run(options: &RunOptions) -> Result<Value, CliError> {
    let input = parse_document(options.input.as_deref())?.ok_or(CliError::NoInput)?;
    let parameters = parse_document(options.parameters.as_deref())?;

    let compiler = Compiler::with_options(CompileOptions {
        precompile: options.precompile,
        ..CompileOptions::default()
    });
    let executable = compiler.compile_dynamic(&options.expression, &input)?;
    Ok(executable.execute(&input, parameters.as_ref())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(expression: &str, input: &str) -> Result<Value, CliError> {
        execute_run(&RunOptions {
            expression: expression.to_string(),
            input: Some(input.to_string()),
            ..RunOptions::default()
        })
    }

    #[test]
    fn test_runs_against_input() {
        let result = run("Items[Price > 2] => Name", r#"{"Items": [{"Name": "a", "Price": 1}, {"Name": "b", "Price": 3}]}"#);
        assert_eq!(result.unwrap(), Value::List(vec![Value::from("b")]));
    }

    #[test]
    fn test_requires_input() {
        let result = execute_run(&RunOptions {
            expression: "1".to_string(),
            ..RunOptions::default()
        });
        assert!(matches!(result, Err(CliError::NoInput)));
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(matches!(run("1", "{"), Err(CliError::Json(_))));
    }
}
