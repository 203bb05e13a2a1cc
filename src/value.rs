use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::expr::CompareOp;
use crate::functions::dates;

/// Semantic type of a schema member or expression.
///
/// `Object` doubles as the "any" type: a value typed `Object` may hold
/// anything at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Number,
    DateTime,
    Text,
    List,
    Object,
    Boolean,
}

impl DataType {
    pub fn parse(name: &str) -> Option<DataType> {
        let data_type = match name.to_ascii_lowercase().as_str() {
            "number" => DataType::Number,
            "datetime" | "date" => DataType::DateTime,
            "text" | "string" => DataType::Text,
            "list" => DataType::List,
            "object" | "any" => DataType::Object,
            "boolean" | "bool" => DataType::Boolean,
            _ => return None,
        };
        Some(data_type)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Number => "number",
            DataType::DateTime => "datetime",
            DataType::Text => "text",
            DataType::List => "list",
            DataType::Object => "object",
            DataType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// Static type of a lowered expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// The empty left operand of unary nodes.
    Void,
    Number,
    DateTime,
    Text,
    List,
    Object,
    Boolean,
}

impl ValueType {
    pub fn data_type(self) -> Option<DataType> {
        let data_type = match self {
            ValueType::Void => return None,
            ValueType::Number => DataType::Number,
            ValueType::DateTime => DataType::DateTime,
            ValueType::Text => DataType::Text,
            ValueType::List => DataType::List,
            ValueType::Object => DataType::Object,
            ValueType::Boolean => DataType::Boolean,
        };
        Some(data_type)
    }
}

impl From<DataType> for ValueType {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::Number => ValueType::Number,
            DataType::DateTime => ValueType::DateTime,
            DataType::Text => ValueType::Text,
            DataType::List => ValueType::List,
            DataType::Object => ValueType::Object,
            DataType::Boolean => ValueType::Boolean,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data_type() {
            Some(data_type) => data_type.fmt(f),
            None => f.write_str("void"),
        }
    }
}

/// A runtime value.
///
/// # Examples
///
/// ```
/// use quill_lang::{Record, Value};
///
/// let mut record = Record::new();
/// record.insert("name", Value::from("Alice"));
/// record.insert("age", Value::from(30));
///
/// let value = Value::Object(record);
/// assert_eq!(value.get("NAME"), Some(&Value::from("Alice")));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(Decimal),
    Text(String),
    DateTime(DateTime<FixedOffset>),
    List(Vec<Value>),
    Object(Record),
}

/// Insertion-ordered record with an optional fallback referrer.
///
/// A composed record keeps the item it was derived from as its fallback, so
/// reads of fields it does not define fall through to the original item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: IndexMap<String, Value>,
    fallback: Option<Box<Value>>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn with_fallback(fallback: Value) -> Self {
        Record {
            fields: IndexMap::new(),
            fallback: Some(Box::new(fallback)),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Own fields first (exact, then case-insensitive), then the fallback.
    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(name) {
            return Some(value);
        }
        if let Some((_, value)) = self
            .fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            return Some(value);
        }
        match self.fallback.as_deref() {
            Some(Value::Object(record)) => record.get(name),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Copies every field of `other` (fallback fields included) into `self`.
    pub fn compose(&mut self, other: &Record) {
        for (name, value) in other.flattened() {
            self.fields.insert(name, value);
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn fallback(&self) -> Option<&Value> {
        self.fallback.as_deref()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.fallback.is_none()
    }

    /// Fallback fields followed by own fields, own fields winning.
    pub fn flattened(&self) -> IndexMap<String, Value> {
        let mut result = match self.fallback.as_deref() {
            Some(Value::Object(record)) => record.flattened(),
            _ => IndexMap::new(),
        };
        for (name, value) in &self.fields {
            result.insert(name.clone(), value.clone());
        }
        result
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Record {
            fields: iter.into_iter().collect(),
            fallback: None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Decimal::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(Decimal::from(n))
    }
}

impl From<Decimal> for Value {
    fn from(n: Decimal) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(d: DateTime<FixedOffset>) -> Self {
        Value::DateTime(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime type, `None` for null.
    pub fn data_type(&self) -> Option<DataType> {
        let data_type = match self {
            Value::Null => return None,
            Value::Boolean(_) => DataType::Boolean,
            Value::Number(_) => DataType::Number,
            Value::Text(_) => DataType::Text,
            Value::DateTime(_) => DataType::DateTime,
            Value::List(_) => DataType::List,
            Value::Object(_) => DataType::Object,
        };
        Some(data_type)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::DateTime(_) => "datetime",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Value::DateTime(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Object(record) => Some(record),
            _ => None,
        }
    }

    /// Field read on a record, null on anything else.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(record) => record.get(name),
            _ => None,
        }
    }

    /// Text rendering used by concatenation and `text()`.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => n.normalize().to_string(),
            Value::Text(s) => s.clone(),
            Value::DateTime(d) => d.format(dates::DISPLAY_FORMAT).to_string(),
            Value::List(_) | Value::Object(_) => crate::output::to_json(self),
        }
    }

    pub fn to_number(&self) -> Value {
        match self {
            Value::Number(n) => Value::Number(*n),
            Value::Text(s) => Decimal::from_str(s.trim())
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Value::Boolean(b) => Value::Number(if *b { Decimal::ONE } else { Decimal::ZERO }),
            _ => Value::Null,
        }
    }

    pub fn to_datetime(&self) -> Value {
        match self {
            Value::DateTime(d) => Value::DateTime(*d),
            Value::Text(s) => dates::parse_datetime(s, None).into(),
            Value::Number(n) => dates::from_timestamp(*n, None).into(),
            _ => Value::Null,
        }
    }

    pub fn to_boolean(&self) -> Value {
        match self {
            Value::Boolean(b) => Value::Boolean(*b),
            Value::Text(s) if s.eq_ignore_ascii_case("true") => Value::Boolean(true),
            Value::Text(s) if s.eq_ignore_ascii_case("false") => Value::Boolean(false),
            Value::Number(n) => Value::Boolean(!n.is_zero()),
            _ => Value::Null,
        }
    }

    pub fn to_list(&self) -> Value {
        match self {
            Value::List(items) => Value::List(items.clone()),
            _ => Value::Null,
        }
    }

    /// Converts to `target`, producing null when the value does not fit.
    pub fn convert(&self, target: DataType) -> Value {
        if self.is_null() {
            return Value::Null;
        }
        match target {
            DataType::Number => self.to_number(),
            DataType::Text => Value::Text(self.to_text()),
            DataType::DateTime => self.to_datetime(),
            DataType::Boolean => self.to_boolean(),
            DataType::List => self.to_list(),
            DataType::Object => self.clone(),
        }
    }

    /// Compares two values. Values of different kinds are never equal and
    /// never ordered; null equals only null.
    pub fn compare(&self, op: CompareOp, other: &Value) -> bool {
        let ordering = match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Number(a), Value::Number(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.as_str().cmp(b.as_str())),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::List(_), Value::List(_)) | (Value::Object(_), Value::Object(_)) => {
                return match op {
                    CompareOp::Equal => self == other,
                    CompareOp::NotEqual => self != other,
                    _ => false,
                };
            }
            _ => None,
        };
        match ordering {
            None => op == CompareOp::NotEqual,
            Some(ordering) => {
                let ordered = matches!(
                    op,
                    CompareOp::Greater
                        | CompareOp::GreaterOrEqual
                        | CompareOp::Less
                        | CompareOp::LessOrEqual
                );
                if ordered && self.is_null() {
                    return false;
                }
                match op {
                    CompareOp::Equal => ordering == Ordering::Equal,
                    CompareOp::NotEqual => ordering != Ordering::Equal,
                    CompareOp::Greater => ordering == Ordering::Greater,
                    CompareOp::GreaterOrEqual => ordering != Ordering::Less,
                    CompareOp::Less => ordering == Ordering::Less,
                    CompareOp::LessOrEqual => ordering != Ordering::Greater,
                }
            }
        }
    }

    /// Whole numbers as `i64`, everything else as `f64`.
    pub fn number_to_json(n: Decimal) -> serde_json::Value {
        let n = n.normalize();
        if n.scale() == 0 {
            if let Some(i) = n.to_i64() {
                return serde_json::Value::Number(i.into());
            }
        }
        n.to_f64()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}
