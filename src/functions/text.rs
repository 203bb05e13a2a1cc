//! Text intrinsics: length, trimming, patterns, conversion.
//!
//! Pattern arguments are regular expressions compiled at call time; an
//! invalid pattern fails the evaluation with [`EvalError::InvalidPattern`].

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use super::{Function, FunctionRegistry, Param, arg, number_arg, text_arg};
use crate::error::EvalError;
use crate::value::{DataType, Value, ValueType};

fn compile(pattern: &str) -> Result<Regex, EvalError> {
    Regex::new(pattern).map_err(|e| EvalError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Text view of an argument that accepts any type, `None` for null.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.to_text()),
    }
}

/// SQL-like matching: `%x%` contains, `%x` ends with, `x%` starts with,
/// anything else is equality. Case-insensitive.
pub fn like(value: Option<&str>, pattern: Option<&str>) -> bool {
    let (Some(value), Some(pattern)) = (value, pattern) else {
        return false;
    };
    if pattern.is_empty() {
        return value.is_empty();
    }
    let value = value.to_lowercase();
    let pattern = pattern.to_lowercase();
    let leading = pattern.starts_with('%');
    let trailing = pattern.len() > 1 && pattern.ends_with('%');
    match (leading, trailing) {
        (true, true) => value.contains(&pattern[1..pattern.len() - 1]),
        (true, false) => value.ends_with(&pattern[1..]),
        (false, true) => value.starts_with(&pattern[..pattern.len() - 1]),
        (false, false) => value == pattern,
    }
}

fn is_match(value: Option<String>, pattern: Option<&str>) -> Result<Value, EvalError> {
    match (value, pattern) {
        (Some(value), Some(pattern)) => Ok(Value::Boolean(compile(pattern)?.is_match(&value))),
        _ => Ok(Value::Boolean(false)),
    }
}

fn replace(
    value: Option<String>,
    pattern: Option<&str>,
    replacement: Option<&str>,
) -> Result<Value, EvalError> {
    match (value, pattern) {
        (Some(value), Some(pattern)) => {
            let replacement = replacement.unwrap_or_default();
            Ok(Value::Text(
                compile(pattern)?.replace_all(&value, replacement).into_owned(),
            ))
        }
        _ => Ok(Value::Null),
    }
}

fn extract(args: &[Value]) -> Result<Value, EvalError> {
    let (Some(value), Some(pattern)) = (text_arg(args, 0), text_arg(args, 1)) else {
        return Ok(Value::Null);
    };
    let Some(captures) = compile(pattern)?.captures(value) else {
        return Ok(Value::Null);
    };
    match args.len() {
        2 => Ok(Value::List(
            captures
                .iter()
                .map(|group| Value::from(group.map(|m| m.as_str()).unwrap_or_default()))
                .collect(),
        )),
        _ => {
            let index = number_arg(args, 2)
                .and_then(|n| n.trunc().to_usize())
                .unwrap_or(0);
            Ok(captures
                .get(index)
                .map(|m| Value::from(m.as_str()))
                .unwrap_or_default())
        }
    }
}

fn uuid(format: Option<&str>) -> Value {
    let id = Uuid::new_v4();
    let text = match format.map(str::to_ascii_uppercase).as_deref() {
        Some("N") => id.simple().to_string(),
        Some("B") => id.braced().to_string(),
        Some("P") => format!("({})", id.hyphenated()),
        _ => id.hyphenated().to_string(),
    };
    Value::Text(text)
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    use DataType::{Number, Text};

    registry.register(Function::new(
        "len",
        vec![Param::of(Text)],
        ValueType::Number,
        |args| Ok(text_arg(args, 0).map(|s| Value::from(s.chars().count() as i64)).into()),
    ));
    registry.register(Function::new(
        "len",
        vec![Param::any()],
        ValueType::Number,
        |args| Ok(text_of(arg(args, 0)).map(|s| Value::from(s.chars().count() as i64)).into()),
    ));
    registry.register(Function::new(
        "trim",
        vec![Param::of(Text)],
        ValueType::Text,
        |args| Ok(text_arg(args, 0).map(|s| Value::from(s.trim())).into()),
    ));
    registry.register(Function::new(
        "trim",
        vec![Param::any()],
        ValueType::Text,
        |args| Ok(text_of(arg(args, 0)).map(|s| Value::from(s.trim())).into()),
    ));

    registry.register(
        Function::new(
            "like",
            vec![Param::any(), Param::of(Text)],
            ValueType::Boolean,
            |args| {
                let value = text_of(arg(args, 0));
                Ok(Value::Boolean(like(value.as_deref(), text_arg(args, 1))))
            },
        )
        .internal(),
    );
    registry.register(
        Function::new(
            "like",
            vec![Param::of(Text), Param::of(Text)],
            ValueType::Boolean,
            |args| Ok(Value::Boolean(like(text_arg(args, 0), text_arg(args, 1)))),
        )
        .internal(),
    );

    registry.register(Function::new(
        "match",
        vec![Param::of(Text), Param::of(Text)],
        ValueType::Boolean,
        |args| is_match(text_arg(args, 0).map(str::to_string), text_arg(args, 1)),
    ));
    registry.register(Function::new(
        "match",
        vec![Param::any(), Param::of(Text)],
        ValueType::Boolean,
        |args| is_match(text_of(arg(args, 0)), text_arg(args, 1)),
    ));
    registry.register(Function::new(
        "replace",
        vec![Param::of(Text), Param::of(Text), Param::of(Text)],
        ValueType::Text,
        |args| {
            replace(
                text_arg(args, 0).map(str::to_string),
                text_arg(args, 1),
                text_arg(args, 2),
            )
        },
    ));
    registry.register(Function::new(
        "replace",
        vec![Param::any(), Param::of(Text), Param::of(Text)],
        ValueType::Text,
        |args| replace(text_of(arg(args, 0)), text_arg(args, 1), text_arg(args, 2)),
    ));
    registry.register(Function::new(
        "extr",
        vec![Param::of(Text), Param::of(Text), Param::of(Number)],
        ValueType::Text,
        extract,
    ));
    registry.register(
        Function::new(
            "extr",
            vec![Param::of(Text), Param::of(Text)],
            ValueType::List,
            extract,
        )
        .items(Text),
    );
    registry.register(
        Function::new(
            "split",
            vec![Param::of(Text), Param::of(Text)],
            ValueType::List,
            |args| match (text_arg(args, 0), text_arg(args, 1)) {
                (Some(value), Some(separator)) if !separator.is_empty() => Ok(Value::List(
                    value.split(separator).map(Value::from).collect(),
                )),
                (Some(value), _) => Ok(Value::List(vec![Value::from(value)])),
                _ => Ok(Value::Null),
            },
        )
        .items(Text),
    );

    registry.register(Function::new(
        "text",
        vec![Param::any()],
        ValueType::Text,
        |args| Ok(text_of(arg(args, 0)).into()),
    ));
    registry.register(Function::new(
        "text",
        vec![Param::of(Number)],
        ValueType::Text,
        |args| Ok(text_of(arg(args, 0)).into()),
    ));
    registry.register(Function::new(
        "text",
        vec![Param::of(DataType::DateTime)],
        ValueType::Text,
        |args| Ok(text_of(arg(args, 0)).into()),
    ));

    registry.register(Function::new("guid", vec![], ValueType::Text, |_| Ok(uuid(None))).alias("uuid"));
    registry.register(
        Function::new("guid", vec![Param::of(Text)], ValueType::Text, |args| {
            Ok(uuid(text_arg(args, 0)))
        })
        .alias("uuid"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_patterns() {
        assert!(like(Some("Hello World"), Some("%LO W%")));
        assert!(like(Some("Hello World"), Some("%world")));
        assert!(like(Some("Hello World"), Some("hello%")));
        assert!(like(Some("Hello"), Some("HELLO")));
        assert!(!like(Some("Hello"), Some("%x%")));
        assert!(like(Some(""), Some("")));
        assert!(!like(Some("a"), Some("")));
        assert!(!like(None, Some("%")));
    }

    #[test]
    fn test_extract_groups() {
        let args = [Value::from("order-42-x"), Value::from(r"order-(\d+)-(\w)"), Value::from(1)];
        assert_eq!(extract(&args).unwrap(), Value::from("42"));

        let all = extract(&args[..2]).unwrap();
        assert_eq!(
            all,
            Value::List(vec![
                Value::from("order-42-x"),
                Value::from("42"),
                Value::from("x")
            ])
        );
    }

    #[test]
    fn test_invalid_pattern() {
        let result = is_match(Some("abc".into()), Some("("));
        assert!(matches!(result, Err(EvalError::InvalidPattern { .. })));
    }

    #[test]
    fn test_uuid_formats() {
        let Value::Text(plain) = uuid(Some("N")) else { panic!("expected text") };
        assert_eq!(plain.len(), 32);
        let Value::Text(braced) = uuid(Some("B")) else { panic!("expected text") };
        assert!(braced.starts_with('{') && braced.ends_with('}'));
    }
}
