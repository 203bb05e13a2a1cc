pub mod branch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod error;
pub mod eval;
pub mod executable;
pub mod expr;
pub mod functions;
pub mod lower;
pub mod node;
pub mod output;
pub mod parser;
pub mod precompile;
pub mod scanner;
pub mod schema;
pub mod script;
pub mod token;
pub mod value;

pub use error::{CompileError, Error, EvalError, Result};
pub use executable::{CompileOptions, Compiler, Executable};
pub use expr::Expr;
pub use functions::{Function, FunctionRegistry, Param};
pub use lower::{Lowered, ParameterDefinition, lower};
pub use output::{from_json, to_json, to_json_pretty};
pub use parser::{SyntaxTree, parse};
pub use scanner::scan;
pub use schema::{MemberDefinition, MemberDescriptor, SchemaProvider, SchemaReader};
pub use script::{ScriptRunner, StepReport};
pub use token::{Position, Token, TokenKind};
pub use value::{DataType, Record, Value, ValueType};
