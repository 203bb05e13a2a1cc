//! JSON input and output for runtime values.
//!
//! Documents are read with `serde_json` and converted by [`from_json`]:
//! numbers become decimals and ISO-8601 strings with a time part become
//! dates. Results are written either as `serde_json` values ([`to_json_value`])
//! or directly as text by [`JsonPrinter`], compact or pretty.
//!
//! # Examples
//!
//! ```
//! use quill_lang::Value;
//! use quill_lang::output::{to_json, to_json_pretty};
//!
//! let value = Value::from(42);
//!
//! assert_eq!(to_json(&value), "42");
//! assert_eq!(to_json_pretty(&value), "42");
//! ```
//!
//! Record fields keep their insertion order. A composed record prints the
//! fields of the item it was derived from first, then its own.

use chrono::DateTime;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::value::{Record, Value};

pub struct JsonPrinter {
    pretty: bool,
}

impl JsonPrinter {
    pub fn new(pretty: bool) -> Self {
        JsonPrinter { pretty }
    }

    pub fn print(&self, value: &Value) -> String {
        self.print_value(value, 0)
    }

    fn print_value(&self, value: &Value, indent: usize) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => Value::number_to_json(*n).to_string(),
            Value::Text(s) => format!("\"{}\"", self.escape_string(s)),
            Value::DateTime(d) => format!("\"{}\"", d.to_rfc3339()),
            Value::List(items) => self.print_array(items, indent),
            Value::Object(record) => self.print_object(record, indent),
        }
    }

    fn print_array(&self, items: &[Value], indent: usize) -> String {
        if items.is_empty() {
            return "[]".to_string();
        }

        if self.pretty {
            let mut result = "[\n".to_string();
            let items: Vec<String> = items
                .iter()
                .map(|v| {
                    format!(
                        "{}{}",
                        self.indent(indent + 1),
                        self.print_value(v, indent + 1)
                    )
                })
                .collect();
            result.push_str(&items.join(",\n"));
            result.push('\n');
            result.push_str(&self.indent(indent));
            result.push(']');
            result
        } else {
            let items: Vec<String> = items.iter().map(|v| self.print_value(v, indent)).collect();
            format!("[{}]", items.join(","))
        }
    }

    fn print_object(&self, record: &Record, indent: usize) -> String {
        let fields = record.flattened();
        if fields.is_empty() {
            return "{}".to_string();
        }

        if self.pretty {
            let mut result = "{\n".to_string();
            let items: Vec<String> = fields
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{}\"{}\": {}",
                        self.indent(indent + 1),
                        self.escape_string(k),
                        self.print_value(v, indent + 1)
                    )
                })
                .collect();
            result.push_str(&items.join(",\n"));
            result.push('\n');
            result.push_str(&self.indent(indent));
            result.push('}');
            result
        } else {
            let items: Vec<String> = fields
                .iter()
                .map(|(k, v)| {
                    format!(
                        "\"{}\":{}",
                        self.escape_string(k),
                        self.print_value(v, indent)
                    )
                })
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }

    fn indent(&self, level: usize) -> String {
        "  ".repeat(level)
    }

    fn escape_string(&self, s: &str) -> String {
        s.chars()
            .flat_map(|c| match c {
                '"' => vec!['\\', '"'],
                '\\' => vec!['\\', '\\'],
                '\n' => vec!['\\', 'n'],
                '\r' => vec!['\\', 'r'],
                '\t' => vec!['\\', 't'],
                c if c.is_control() => format!("\\u{:04x}", c as u32).chars().collect(),
                c => vec![c],
            })
            .collect()
    }
}

/// Compact JSON text.
pub fn to_json(value: &Value) -> String {
    JsonPrinter::new(false).print(value)
}

/// JSON text indented by two spaces per level.
pub fn to_json_pretty(value: &Value) -> String {
    JsonPrinter::new(true).print(value)
}

/// Converts a document read by `serde_json`.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_u64().map(Decimal::from))
            .or_else(|| n.as_f64().and_then(Decimal::from_f64))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        serde_json::Value::String(s) => iso_datetime(s).unwrap_or_else(|| Value::Text(s.clone())),
        serde_json::Value::Array(items) => Value::List(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect(),
        ),
    }
}

/// `YYYY-MM-DDTHH:MM:SS[.f][offset]`. Text without a time part stays text.
fn iso_datetime(text: &str) -> Option<Value> {
    if text.len() < 19 || text.as_bytes().get(10) != Some(&b'T') {
        return None;
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .or_else(|| crate::functions::dates::parse_datetime(text, None))
        .map(Value::DateTime)
}

/// Converts to a `serde_json` value, dates as RFC 3339 text.
pub fn to_json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => Value::number_to_json(*n),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::DateTime(d) => serde_json::Value::String(d.to_rfc3339()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json_value).collect()),
        Value::Object(record) => serde_json::Value::Object(
            record
                .flattened()
                .iter()
                .map(|(k, v)| (k.clone(), to_json_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reads_numbers_and_dates() {
        let value = from_json(&json!({"n": 1.5, "at": "2024-05-01T08:00:00+08:00", "s": "T"}));
        assert_eq!(value.get("n"), Some(&Value::Number(Decimal::new(15, 1))));
        assert!(matches!(value.get("at"), Some(Value::DateTime(_))));
        assert_eq!(value.get("s"), Some(&Value::from("T")));
    }

    #[test]
    fn test_input_keeps_field_order() {
        let value = from_json(&json!({"zeta": 1, "alpha": 2, "mid": {"y": 3, "x": 4}}));
        assert_eq!(to_json(&value), r#"{"zeta":1,"alpha":2,"mid":{"y":3,"x":4}}"#);
    }

    #[test]
    fn test_composed_record_prints_fallback_first() {
        let mut base = Record::new();
        base.insert("a", Value::from(1));
        base.insert("b", Value::from(2));
        let mut composed = Record::with_fallback(Value::Object(base));
        composed.insert("c", Value::from(3));
        composed.insert("a", Value::from(9));
        assert_eq!(to_json(&Value::Object(composed)), r#"{"a":9,"b":2,"c":3}"#);
    }

    #[test]
    fn test_pretty_printing() {
        let value = from_json(&json!({"name": "Alice", "tags": ["x"]}));
        assert_eq!(
            to_json_pretty(&value),
            "{\n  \"name\": \"Alice\",\n  \"tags\": [\n    \"x\"\n  ]\n}"
        );
    }

    #[test]
    fn test_escapes_text() {
        assert_eq!(to_json(&Value::from("a\"b\n")), r#""a\"b\n""#);
    }
}
