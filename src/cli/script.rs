//! Run multi-statement scripts

use super::{CliError, parse_document};
use crate::{ScriptRunner, StepReport, Value};

/// Options for the script command
#[derive(Debug, Clone, Default)]
pub struct ScriptOptions {
    pub source: String,
    /// JSON object with parameter values
    pub parameters: Option<String>,
    /// Report every statement instead of only the result
    pub debug: bool,
}

#[derive(Debug)]
pub enum ScriptOutcome {
    Result(Value),
    Steps(Vec<StepReport>),
}

pub fn execute_script(options: &ScriptOptions) -> Result<ScriptOutcome, CliError> {
    let parameters = parse_document(options.parameters.as_deref())?;
    let runner = ScriptRunner::default();
    if options.debug {
        return Ok(ScriptOutcome::Steps(
            runner.debug(&options.source, parameters.as_ref()),
        ));
    }
    let result = runner.invoke(&options.source, parameters.as_ref())?;
    Ok(ScriptOutcome::Result(result))
}
