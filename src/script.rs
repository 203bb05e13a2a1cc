//! Multi-statement scripts.
//!
//! Statements run in order against a record of exported bindings. A
//! statement of the form `name <- expr` binds its result for the statements
//! after it; the result of the last statement is the script's result.
//!
//! ```text
//! rows <- j2a(@json);
//! adults <- rows[age >= 18];
//! adults => { name, age }
//! ```

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::executable::Compiler;
use crate::lower::ParameterDefinition;
use crate::parser::parse;
use crate::scanner::scan;
use crate::schema::{MemberDefinition, MemberDescriptor, SchemaProvider, SchemaReader};
use crate::token::Token;
use crate::value::{DataType, Record, Value};

/// Outcome of one statement, as reported by [`ScriptRunner::debug`].
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub statement: String,
    pub result: Option<Value>,
    pub error: Option<Error>,
}

impl StepReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Rendered statement, its result and the binding it exports.
type Step = (String, Value, Option<(String, DataType)>);

#[derive(Debug, Clone, Default)]
pub struct ScriptRunner {
    compiler: Compiler,
    declared: Vec<ParameterDefinition>,
}

/// Exported bindings with the type each was compiled as.
#[derive(Debug, Default)]
struct Exports {
    bindings: IndexMap<String, (Value, DataType)>,
}

impl Exports {
    fn bind(&mut self, name: &str, value: Value, data_type: DataType) {
        self.bindings.insert(name.to_string(), (value, data_type));
    }

    fn root(&self) -> Value {
        let mut record = Record::new();
        for (name, (value, _)) in &self.bindings {
            record.insert(name.clone(), value.clone());
        }
        Value::Object(record)
    }

    /// Containers are described by their content, scalars by their type.
    fn schema(&self) -> Result<SchemaProvider> {
        let mut schema = SchemaProvider::new();
        for (name, (value, data_type)) in &self.bindings {
            match value {
                Value::List(_) | Value::Object(_) => {
                    let inferred = SchemaReader::read(value)?;
                    schema.merge(&inferred, name)?;
                }
                _ => {
                    let data_type = value.data_type().unwrap_or(*data_type);
                    schema.add(MemberDefinition::new(name, data_type))?;
                }
            }
        }
        Ok(schema)
    }
}

impl ScriptRunner {
    pub fn new(compiler: Compiler) -> Self {
        ScriptRunner {
            compiler,
            declared: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, declared: Vec<ParameterDefinition>) -> Self {
        self.declared = declared;
        self
    }

    /// Runs every statement and returns the last result.
    pub fn invoke(&self, source: &str, parameters: Option<&Value>) -> Result<Value> {
        let mut last = Value::Null;
        for step in self.run(source, parameters)? {
            if let Some(error) = step.error {
                return Err(error);
            }
            last = step.result.unwrap_or_default();
        }
        Ok(last)
    }

    /// Runs statements until one fails, reporting each of them.
    pub fn debug(&self, source: &str, parameters: Option<&Value>) -> Vec<StepReport> {
        match self.run(source, parameters) {
            Ok(steps) => steps,
            Err(error) => vec![StepReport {
                statement: source.trim().to_string(),
                result: None,
                error: Some(error),
            }],
        }
    }

    fn run(&self, source: &str, parameters: Option<&Value>) -> Result<Vec<StepReport>> {
        let statements = scan(source)?;
        let count = statements.len();
        let mut exports = Exports::default();
        let mut steps = Vec::with_capacity(count);

        for (index, tokens) in statements.into_iter().enumerate() {
            let step = match self.step(tokens, &exports, parameters) {
                Ok((statement, value, export)) => {
                    debug!(step = index + 1, %statement, "script step succeeded");
                    if let Some((name, data_type)) = export {
                        if index + 1 < count {
                            exports.bind(&name, value.clone(), data_type);
                        }
                    }
                    StepReport {
                        statement,
                        result: Some(value),
                        error: None,
                    }
                }
                Err((statement, error)) => {
                    warn!(step = index + 1, %statement, %error, "script step failed");
                    StepReport {
                        statement,
                        result: None,
                        error: Some(error),
                    }
                }
            };
            let failed = !step.is_ok();
            steps.push(step);
            if failed {
                break;
            }
        }
        Ok(steps)
    }

    fn step(
        &self,
        tokens: Vec<Token>,
        exports: &Exports,
        parameters: Option<&Value>,
    ) -> std::result::Result<Step, (String, Error)> {
        let text = tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let syntax = parse(tokens).map_err(|e| (text, Error::from(e)))?;
        let statement = syntax.render();
        let fail = |error: Error| (statement.clone(), error);

        let schema = exports.schema().map_err(fail)?;
        let executable = self
            .compiler
            .compile_tree(syntax, &schema as &dyn MemberDescriptor, &self.declared)
            .map_err(|e| fail(e.into()))?;
        let value = executable
            .execute(&exports.root(), parameters)
            .map_err(|e| fail(e.into()))?;
        let export = executable.export().map(|name| {
            let data_type = executable.return_type().data_type().unwrap_or(DataType::Object);
            (name.to_string(), data_type)
        });
        Ok((statement, value, export))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exports_flow_into_later_statements() {
        let runner = ScriptRunner::default();
        let result = runner.invoke("a <- 2; b <- a * 3; b + a", None).unwrap();
        assert_eq!(result, Value::from(8));
    }

    #[test]
    fn test_debug_stops_at_failure() {
        let runner = ScriptRunner::default();
        let steps = runner.debug("a <- 1; missing + 1; a", None);
        assert_eq!(steps.len(), 2);
        assert!(steps[0].is_ok());
        assert!(matches!(steps[1].error, Some(Error::Compile(_))));
    }
}
