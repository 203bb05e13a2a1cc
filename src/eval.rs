//! Tree-walking evaluator for [`Expr`].

use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::EvalError;
use crate::expr::{ArithOp, Expr, LogicOp};
use crate::functions::dates;
use crate::value::{Record, Value};

struct Frame {
    value: Value,
    index: usize,
}

pub struct Evaluator<'a> {
    parameters: &'a IndexMap<String, Value>,
    frames: Vec<Frame>,
}

/// Evaluates `expr` against `root`. Parameter names must be lowercase keys.
pub fn evaluate(
    expr: &Expr,
    root: Value,
    parameters: &IndexMap<String, Value>,
) -> Result<Value, EvalError> {
    let mut evaluator = Evaluator::new(root, parameters);
    evaluator.eval(expr)
}

impl<'a> Evaluator<'a> {
    pub fn new(root: Value, parameters: &'a IndexMap<String, Value>) -> Self {
        Evaluator {
            parameters,
            frames: vec![Frame {
                value: root,
                index: 0,
            }],
        }
    }

    fn frame(&self, depth: usize) -> Option<&Frame> {
        self.frames
            .len()
            .checked_sub(depth + 1)
            .and_then(|i| self.frames.get(i))
    }

    fn scoped<T>(
        &mut self,
        value: Value,
        index: usize,
        f: impl FnOnce(&mut Self) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        self.frames.push(Frame { value, index });
        let result = f(self);
        self.frames.pop();
        result
    }

    fn eval_list(&mut self, expr: &Expr) -> Result<Option<Vec<Value>>, EvalError> {
        match self.eval(expr)? {
            Value::List(items) => Ok(Some(items)),
            _ => Ok(None),
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Constant(value) => Ok(value.clone()),
            Expr::Current(depth) => Ok(self
                .frame(*depth)
                .map(|frame| frame.value.clone())
                .unwrap_or_default()),
            Expr::LoopIndex(depth) => Ok(self
                .frame(*depth)
                .map(|frame| Value::from(frame.index as i64))
                .unwrap_or_default()),
            Expr::Parameter(name) => Ok(self
                .parameters
                .get(&name.to_lowercase())
                .cloned()
                .unwrap_or_default()),
            Expr::Member { object, name } => {
                let object = self.eval(object)?;
                Ok(object.get(name).cloned().unwrap_or_default())
            }
            Expr::Convert { value, to } => Ok(self.eval(value)?.convert(*to)),
            Expr::Arith { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                arith(*op, left, right)
            }
            Expr::Concat(left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(Value::Text(left.to_text() + &right.to_text()))
            }
            Expr::DateAdd {
                date,
                offset,
                minus,
            } => {
                let date = self.eval(date)?;
                let offset = self.eval(offset)?;
                match (date, offset) {
                    (Value::DateTime(d), Value::Text(o)) => {
                        Ok(Value::DateTime(dates::add_offset(d, &o, *minus)?))
                    }
                    _ => Ok(Value::Null),
                }
            }
            Expr::ListConcat(left, right) => {
                match (self.eval_list(left)?, self.eval_list(right)?) {
                    (Some(mut left), Some(right)) => {
                        left.extend(right);
                        Ok(Value::List(left))
                    }
                    _ => Ok(Value::Null),
                }
            }
            Expr::Negate(value) => match self.eval(value)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Ok(Value::Null),
            },
            Expr::Compare { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(Value::Boolean(left.compare(*op, &right)))
            }
            Expr::Logic { op, left, right } => self.logic(*op, left, right),
            Expr::Not(value) => match self.eval(value)? {
                Value::Boolean(b) => Ok(Value::Boolean(!b)),
                _ => Ok(Value::Null),
            },
            Expr::IsNull(value) => Ok(Value::Boolean(self.eval(value)?.is_null())),
            Expr::If {
                condition,
                then,
                otherwise,
            } => match self.eval(condition)? {
                Value::Boolean(true) => self.eval(then),
                _ => self.eval(otherwise),
            },
            Expr::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                (function.body)(&args)
            }
            Expr::ListIndex { list, index } => {
                let list = self.eval_list(list)?;
                let index = self.eval(index)?;
                match (list, index.as_number()) {
                    (Some(items), Some(index)) => Ok(list_index(&items, index)),
                    _ => Ok(Value::Null),
                }
            }
            Expr::ListRange { list, from, to } => {
                let Some(items) = self.eval_list(list)? else {
                    return Ok(Value::Null);
                };
                let from = self.eval(from)?.as_number();
                let to = self.eval(to)?.as_number();
                Ok(Value::List(list_range(&items, from, to)))
            }
            Expr::Filter { list, predicate } => {
                let Some(items) = self.eval_list(list)? else {
                    return Ok(Value::Null);
                };
                let mut kept = Vec::new();
                for (i, item) in items.into_iter().enumerate() {
                    let keep = self.scoped(item.clone(), i + 1, |ev| ev.eval(predicate))?;
                    if keep == Value::Boolean(true) {
                        kept.push(item);
                    }
                }
                Ok(Value::List(kept))
            }
            Expr::Select { list, body } => {
                let Some(items) = self.eval_list(list)? else {
                    return Ok(Value::Null);
                };
                let mut result = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    result.push(self.scoped(item, i + 1, |ev| ev.eval(body))?);
                }
                Ok(Value::List(result))
            }
            Expr::SelectMany { list, body } => {
                let Some(items) = self.eval_list(list)? else {
                    return Ok(Value::Null);
                };
                let mut result = Vec::new();
                for (i, item) in items.into_iter().enumerate() {
                    match self.scoped(item, i + 1, |ev| ev.eval(body))? {
                        Value::List(inner) => result.extend(inner),
                        Value::Null => {}
                        other => result.push(other),
                    }
                }
                Ok(Value::List(result))
            }
            Expr::Reduce { list, body } => {
                let list = self.eval(list)?;
                self.scoped(list, 0, |ev| ev.eval(body))
            }
            Expr::Compose { list, fields } => {
                let Some(items) = self.eval_list(list)? else {
                    return Ok(Value::Null);
                };
                let fields = match self.eval(fields)? {
                    Value::Object(record) => record,
                    _ => Record::new(),
                };
                let composed = items
                    .into_iter()
                    .map(|item| {
                        let mut record = Record::with_fallback(item);
                        record.compose(&fields);
                        Value::Object(record)
                    })
                    .collect();
                Ok(Value::List(composed))
            }
            Expr::BuildList(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::BuildObject(fields) => {
                let mut record = Record::new();
                for (name, value) in fields {
                    let value = self.eval(value)?;
                    record.insert(name.clone(), value);
                }
                Ok(Value::Object(record))
            }
        }
    }

    /// Three-valued `and`/`or`.
    fn logic(&mut self, op: LogicOp, left: &Expr, right: &Expr) -> Result<Value, EvalError> {
        let left = self.eval(left)?.as_bool();
        match (op, left) {
            (LogicOp::And, Some(false)) => return Ok(Value::Boolean(false)),
            (LogicOp::Or, Some(true)) => return Ok(Value::Boolean(true)),
            _ => {}
        }
        let right = self.eval(right)?.as_bool();
        let result = match (op, left, right) {
            (LogicOp::And, _, Some(false)) => Some(false),
            (LogicOp::And, Some(true), Some(true)) => Some(true),
            (LogicOp::Or, _, Some(true)) => Some(true),
            (LogicOp::Or, Some(false), Some(false)) => Some(false),
            _ => None,
        };
        Ok(result.into())
    }
}

fn arith(op: ArithOp, left: Value, right: Value) -> Result<Value, EvalError> {
    match (op, left, right) {
        (_, Value::Null, _) | (_, _, Value::Null) => Ok(Value::Null),
        (_, Value::Number(a), Value::Number(b)) => number_arith(op, a, b).map(Value::Number),
        (ArithOp::Add, Value::DateTime(d), Value::Text(o))
        | (ArithOp::Add, Value::Text(o), Value::DateTime(d)) => {
            Ok(Value::DateTime(dates::add_offset(d, &o, false)?))
        }
        (ArithOp::Subtract, Value::DateTime(d), Value::Text(o)) => {
            Ok(Value::DateTime(dates::add_offset(d, &o, true)?))
        }
        (ArithOp::Add, l @ Value::Text(_), r) | (ArithOp::Add, l, r @ Value::Text(_)) => {
            Ok(Value::Text(l.to_text() + &r.to_text()))
        }
        (ArithOp::Add, Value::List(mut l), Value::List(r)) => {
            l.extend(r);
            Ok(Value::List(l))
        }
        _ => Ok(Value::Null),
    }
}

pub(crate) fn number_arith(op: ArithOp, a: Decimal, b: Decimal) -> Result<Decimal, EvalError> {
    let result = match op {
        ArithOp::Add => a.checked_add(b),
        ArithOp::Subtract => a.checked_sub(b),
        ArithOp::Multiply => a.checked_mul(b),
        ArithOp::Divide => {
            if b.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            a.checked_div(b)
        }
    };
    result.ok_or_else(|| EvalError::function("arithmetic", "numeric overflow"))
}

/// 1-based, negative counts from the end, out of range is null.
pub fn list_index(items: &[Value], index: Decimal) -> Value {
    let Some(index) = index.trunc().to_i64() else {
        return Value::Null;
    };
    let len = items.len() as i64;
    let i = if index < 0 { len + index } else { index - 1 };
    if i < 0 || i >= len {
        return Value::Null;
    }
    items[i as usize].clone()
}

/// Inclusive 1-based slice, negative bounds count from the end. A missing
/// lower bound starts at the first item, a missing upper bound runs to the
/// last.
pub fn list_range(items: &[Value], from: Option<Decimal>, to: Option<Decimal>) -> Vec<Value> {
    let len = items.len() as i64;
    let as_int = |d: Decimal| d.trunc().to_i64();
    let from = match from {
        None => 1,
        Some(from) => match as_int(from) {
            Some(from) => from,
            None => return Vec::new(),
        },
    };
    if from > len {
        return Vec::new();
    }
    let start = if from <= 0 { len + from } else { from - 1 };
    let end = match to.map(as_int) {
        None => len,
        Some(None) => return Vec::new(),
        Some(Some(to)) if len < to => len,
        Some(Some(to)) if to < 0 => len + to + 1,
        Some(Some(to)) => to,
    };
    if start < 0 || end < 0 || start > end {
        return Vec::new();
    }
    items[start as usize..end as usize].to_vec()
}
