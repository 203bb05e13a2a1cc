//! Function library and overload resolution.
//!
//! Functions are plain Rust closures registered under a name with a typed
//! [`Signature`]. Several overloads may share a name; [`FunctionRegistry::resolve`]
//! picks one from the argument types:
//!
//! ```text
//! num('123')        num(text)       exact match
//! num(Count)        num(any)        fallback, the argument is not text
//! len(Items)        len(list)       exact match wins over len(any)
//! ```
//!
//! A parameter marked `fallback` accepts any argument at a penalty, and a
//! text parameter accepts a schema member of another type at a penalty. The
//! first exact candidate in registration order wins, otherwise the first
//! penalized one.

pub mod dates;
mod lists;
mod numbers;
mod text;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::EvalError;
use crate::expr::{Callable, NativeFn};
use crate::value::{DataType, Value, ValueType};

/// UTC offset used by date functions when no timezone argument is given.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub data_type: DataType,
    /// Accepts an argument of any type.
    pub fallback: bool,
}

impl Param {
    pub fn of(data_type: DataType) -> Self {
        Param {
            data_type,
            fallback: false,
        }
    }

    pub fn any() -> Self {
        Param {
            data_type: DataType::Object,
            fallback: true,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fallback {
            f.write_str("any")
        } else {
            self.data_type.fmt(f)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub variadic: Option<DataType>,
    pub returns: ValueType,
    /// Element type when the function returns a list.
    pub item_type: Option<DataType>,
    /// Known fields of the returned objects.
    pub item_fields: Vec<(String, DataType)>,
}

impl Signature {
    pub fn param_at(&self, index: usize) -> Option<Param> {
        self.params
            .get(index)
            .copied()
            .or_else(|| self.variadic.map(Param::of))
    }

    pub fn accepts_arity(&self, arity: usize) -> bool {
        match self.variadic {
            Some(_) => arity >= self.params.len(),
            None => arity == self.params.len(),
        }
    }
}

#[derive(Clone)]
pub struct Function {
    pub name: String,
    pub aliases: Vec<String>,
    /// Reached only through the operators that lower to it.
    pub internal: bool,
    pub signature: Signature,
    body: NativeFn,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.describe())
    }
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        params: Vec<Param>,
        returns: ValueType,
        body: impl Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> Self {
        Function {
            name: name.into(),
            aliases: Vec::new(),
            internal: false,
            signature: Signature {
                params,
                variadic: None,
                returns,
                item_type: None,
                item_fields: Vec::new(),
            },
            body: Arc::new(body),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn variadic(mut self, data_type: DataType) -> Self {
        self.signature.variadic = Some(data_type);
        self
    }

    pub fn items(mut self, data_type: DataType) -> Self {
        self.signature.item_type = Some(data_type);
        self
    }

    pub fn fields(mut self, fields: &[(&str, DataType)]) -> Self {
        self.signature.item_fields = fields
            .iter()
            .map(|(name, data_type)| (name.to_string(), *data_type))
            .collect();
        self
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }

    pub fn callable(&self) -> Callable {
        Callable {
            name: self.name.clone(),
            body: self.body.clone(),
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        (self.body)(args)
    }

    /// Human readable signature, e.g. `len(text) -> number`.
    pub fn describe(&self) -> String {
        let mut params: Vec<String> = self.signature.params.iter().map(|p| p.to_string()).collect();
        if let Some(variadic) = self.signature.variadic {
            params.push(format!("{}...", variadic));
        }
        let mut names = vec![self.name.clone()];
        names.extend(self.aliases.iter().cloned());
        format!(
            "{}({}) -> {}",
            names.join("|"),
            params.join(", "),
            self.signature.returns
        )
    }
}

/// What overload resolution knows about one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgumentType {
    pub static_type: DataType,
    /// Declared type when the argument reads a schema member.
    pub member_type: Option<DataType>,
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.static_type.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fit {
    Match(DataType),
    Fallback(DataType),
    Miss,
}

/// The chosen overload and the type each argument must be aligned to.
#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    pub function: &'a Function,
    pub conversions: Vec<DataType>,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: Vec<Function>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry::default()
    }

    /// The built-in library.
    pub fn intrinsics() -> Self {
        let mut registry = FunctionRegistry::new();
        dates::register(&mut registry);
        numbers::register(&mut registry);
        text::register(&mut registry);
        lists::register(&mut registry);
        registry
    }

    pub fn register(&mut self, function: Function) {
        self.functions.push(function);
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    pub fn public(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| !f.internal)
    }

    /// Overloads callable by `name` with `arity` arguments, in registration order.
    pub fn candidates(&self, name: &str, arity: usize, include_internal: bool) -> Vec<&Function> {
        self.functions
            .iter()
            .filter(|f| include_internal || !f.internal)
            .filter(|f| f.matches_name(name) && f.signature.accepts_arity(arity))
            .collect()
    }

    /// Picks the overload for `name` given the argument types.
    pub fn resolve(
        &self,
        name: &str,
        args: &[ArgumentType],
        include_internal: bool,
    ) -> Option<Resolution<'_>> {
        let mut fallback: Option<Resolution<'_>> = None;

        for function in self.candidates(name, args.len(), include_internal) {
            let signature = &function.signature;
            let admissible = args.iter().enumerate().all(|(i, arg)| {
                signature.param_at(i).is_some_and(|param| {
                    param.fallback
                        || param.data_type == arg.static_type
                        || arg.static_type == DataType::Object
                })
            });
            if !admissible {
                continue;
            }

            let fits: Vec<Fit> = args
                .iter()
                .enumerate()
                .map(|(i, arg)| match signature.param_at(i) {
                    Some(param) => classify(param, arg),
                    None => Fit::Miss,
                })
                .collect();
            if fits.contains(&Fit::Miss) {
                continue;
            }

            let exact = fits.iter().all(|fit| matches!(fit, Fit::Match(_)));
            let conversions = fits
                .iter()
                .map(|fit| match fit {
                    Fit::Match(t) | Fit::Fallback(t) => *t,
                    Fit::Miss => DataType::Object,
                })
                .collect();
            let resolution = Resolution {
                function,
                conversions,
            };
            if exact {
                debug!(function = %function.describe(), "resolved exact overload");
                return Some(resolution);
            }
            if fallback.is_none() {
                fallback = Some(resolution);
            }
        }

        if let Some(resolution) = &fallback {
            debug!(function = %resolution.function.describe(), "resolved fallback overload");
        }
        fallback
    }
}

fn classify(param: Param, arg: &ArgumentType) -> Fit {
    match arg.member_type {
        Some(member_type) => {
            if param.data_type == member_type {
                Fit::Match(member_type)
            } else if param.data_type == DataType::Text {
                Fit::Fallback(DataType::Text)
            } else if param.fallback {
                Fit::Fallback(param.data_type)
            } else {
                Fit::Miss
            }
        }
        None => {
            if param.data_type == arg.static_type {
                Fit::Match(param.data_type)
            } else if param.fallback || arg.static_type == DataType::Object {
                Fit::Fallback(param.data_type)
            } else {
                Fit::Miss
            }
        }
    }
}

// Argument accessors shared by the function bodies. Missing or mistyped
// arguments read as `None`.

pub(crate) fn text_arg(args: &[Value], index: usize) -> Option<&str> {
    args.get(index).and_then(Value::as_text)
}

pub(crate) fn number_arg(args: &[Value], index: usize) -> Option<Decimal> {
    args.get(index).and_then(Value::as_number)
}

pub(crate) fn date_arg(args: &[Value], index: usize) -> Option<DateTime<FixedOffset>> {
    args.get(index).and_then(Value::as_datetime)
}

pub(crate) fn list_arg(args: &[Value], index: usize) -> Option<&[Value]> {
    args.get(index).and_then(Value::as_list)
}

pub(crate) fn bool_arg(args: &[Value], index: usize) -> bool {
    args.get(index).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn arg(args: &[Value], index: usize) -> &Value {
    static NULL: Value = Value::Null;
    args.get(index).unwrap_or(&NULL)
}
