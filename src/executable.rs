//! Compile facade and the executable it produces.
//!
//! ```
//! use quill_lang::{Compiler, SchemaProvider, DataType, Value, Record};
//!
//! let schema = SchemaProvider::new().member("Age", DataType::Number).unwrap();
//! let executable = Compiler::new().compile("Age + 1", &schema).unwrap();
//!
//! let mut person = Record::new();
//! person.insert("Age", Value::from(41));
//! let result = executable.execute(&Value::Object(person), None).unwrap();
//! assert_eq!(result, Value::from(42));
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{CompileError, EvalError};
use crate::eval::evaluate;
use crate::expr::Expr;
use crate::functions::{Function, FunctionRegistry};
use crate::lower::{ParameterDefinition, lower};
use crate::parser::{SyntaxTree, parse};
use crate::precompile::precompile;
use crate::scanner::scan;
use crate::schema::{MemberDescriptor, SchemaProvider, SchemaReader};
use crate::value::{DataType, Record, Value, ValueType};

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Rewrite `$now`/`$today` into constant dates before lowering.
    pub precompile: bool,
    /// Root member whose fields may be named without its prefix. Applies to
    /// schemas inferred by [`Compiler::compile_dynamic`].
    pub default_scope: Option<String>,
}

/// Turns source text into [`Executable`]s.
#[derive(Debug, Clone)]
pub struct Compiler {
    registry: Arc<FunctionRegistry>,
    externals: FunctionRegistry,
    options: CompileOptions,
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Compiler::with_options(CompileOptions::default())
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Compiler {
            registry: Arc::new(FunctionRegistry::intrinsics()),
            externals: FunctionRegistry::new(),
            options,
        }
    }

    /// Shares an already built library between compilers.
    pub fn with_registry(registry: Arc<FunctionRegistry>, options: CompileOptions) -> Self {
        Compiler {
            registry,
            externals: FunctionRegistry::new(),
            options,
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Registers a callable consulted after the built-in library.
    pub fn register_external(&mut self, function: Function) {
        debug!(function = %function.describe(), "registered external function");
        self.externals.register(function);
    }

    /// Compiles the first statement of `source`.
    pub fn compile(
        &self,
        source: &str,
        schema: &dyn MemberDescriptor,
    ) -> Result<Executable, CompileError> {
        self.compile_with_parameters(source, schema, &[])
    }

    /// Compiles with parameters whose types are known up front.
    pub fn compile_with_parameters(
        &self,
        source: &str,
        schema: &dyn MemberDescriptor,
        declared: &[ParameterDefinition],
    ) -> Result<Executable, CompileError> {
        let syntax = self.parse_first(source)?;
        self.compile_tree(syntax, schema, declared)
    }

    /// Compiles against a schema inferred from `sample`.
    pub fn compile_dynamic(&self, source: &str, sample: &Value) -> Result<Executable, CompileError> {
        let inferred = SchemaReader::read(sample)?;
        match &self.options.default_scope {
            Some(scope) => {
                let mut schema = SchemaProvider::with_default_scope(scope);
                schema.merge(&inferred, scope)?;
                let mut executable = self.compile(source, &schema)?;
                executable.scope = Some(scope.clone());
                executable.root_kind = inferred.root_kind();
                Ok(executable)
            }
            None => self.compile(source, &inferred),
        }
    }

    /// Applies the precompile rewrite and renders the statement back.
    pub fn precompile(&self, source: &str) -> Result<String, CompileError> {
        let mut syntax = self.parse_first(source)?;
        precompile(&mut syntax)?;
        Ok(syntax.render())
    }

    fn parse_first(&self, source: &str) -> Result<SyntaxTree, CompileError> {
        let tokens = scan(source)?
            .into_iter()
            .next()
            .ok_or(CompileError::EmptyExpression)?;
        parse(tokens)
    }

    pub(crate) fn compile_tree(
        &self,
        mut syntax: SyntaxTree,
        schema: &dyn MemberDescriptor,
        declared: &[ParameterDefinition],
    ) -> Result<Executable, CompileError> {
        if self.options.precompile {
            precompile(&mut syntax)?;
        }
        let source = syntax.render();
        let lowered = lower(&syntax, schema, &self.registry, &self.externals, declared)?;
        debug!(%source, value_type = %lowered.value_type, "compiled statement");
        Ok(Executable {
            expr: lowered.expr,
            parameters: lowered.parameters,
            return_type: lowered.value_type,
            item_type: lowered.item_type,
            root_kind: schema.root_kind(),
            export: lowered.export,
            scope: None,
            source,
        })
    }
}

/// A compiled statement. Immutable and safe to run from several threads.
#[derive(Debug, Clone)]
pub struct Executable {
    expr: Expr,
    parameters: Vec<ParameterDefinition>,
    return_type: ValueType,
    item_type: Option<DataType>,
    root_kind: DataType,
    export: Option<String>,
    /// Member the root value is wrapped in before evaluation.
    scope: Option<String>,
    source: String,
}

impl Executable {
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn parameters(&self) -> &[ParameterDefinition] {
        &self.parameters
    }

    pub fn return_type(&self) -> ValueType {
        self.return_type
    }

    pub fn item_type(&self) -> Option<DataType> {
        self.item_type
    }

    pub fn root_kind(&self) -> DataType {
        self.root_kind
    }

    /// Name bound by `name <- expr`, if any.
    pub fn export(&self) -> Option<&str> {
        self.export.as_deref()
    }

    /// The statement as rendered from its syntax tree.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates against `root`. `parameters` is an object whose fields are
    /// matched to declared parameters case-insensitively.
    pub fn execute(&self, root: &Value, parameters: Option<&Value>) -> Result<Value, EvalError> {
        let bound = self.bind(parameters)?;
        let root = match &self.scope {
            Some(scope) => {
                let mut wrapper = Record::new();
                wrapper.insert(scope.clone(), root.clone());
                Value::Object(wrapper)
            }
            None => root.clone(),
        };
        evaluate(&self.expr, root, &bound)
    }

    fn bind(&self, bag: Option<&Value>) -> Result<IndexMap<String, Value>, EvalError> {
        let mut bound = IndexMap::new();
        if self.parameters.is_empty() {
            return Ok(bound);
        }
        let bag = bag.ok_or(EvalError::MissingParameters)?;
        for definition in &self.parameters {
            let raw = bag.get(&definition.name).cloned().unwrap_or_default();
            bound.insert(
                definition.name.to_lowercase(),
                convert_parameter(definition, raw)?,
            );
        }
        Ok(bound)
    }
}

fn convert_parameter(definition: &ParameterDefinition, raw: Value) -> Result<Value, EvalError> {
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let converted = match definition.data_type {
        DataType::Object => raw,
        DataType::Text => Value::Text(raw.to_text()),
        target => raw.convert(target),
    };
    if converted.is_null() {
        return Err(EvalError::InvalidParameterValue {
            name: definition.name.clone(),
            expected: definition.data_type,
        });
    }
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(entries: &[(&str, Value)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_parameter_conversion() {
        let schema = SchemaProvider::new();
        let executable = Compiler::new().compile("@x + 1", &schema).unwrap();
        let root = Value::Object(Record::new());

        let result = executable.execute(&root, Some(&bag(&[("X", Value::from("2"))])));
        assert_eq!(result.unwrap(), Value::from(3));

        let result = executable.execute(&root, Some(&bag(&[("x", Value::from("two"))])));
        assert!(matches!(result, Err(EvalError::InvalidParameterValue { .. })));

        assert_eq!(executable.execute(&root, None), Err(EvalError::MissingParameters));
        assert_eq!(executable.execute(&root, Some(&bag(&[]))).unwrap(), Value::Null);
    }

    #[test]
    fn test_default_scope_wraps_root() {
        let options = CompileOptions {
            default_scope: Some("Data".to_string()),
            ..CompileOptions::default()
        };
        let sample = bag(&[("Name", Value::from("quill"))]);
        let executable = Compiler::with_options(options)
            .compile_dynamic("Name + '!'", &sample)
            .unwrap();
        assert_eq!(
            executable.execute(&sample, None).unwrap(),
            Value::from("quill!")
        );
    }
}
