//! List builders and general purpose intrinsics.

use rust_decimal::Decimal;

use super::{Function, FunctionRegistry, Param, arg, list_arg, number_arg, text_arg};
use crate::error::EvalError;
use crate::output;
use crate::value::{DataType, Value, ValueType};

/// Numbers from `start` up to, not including, `stop`.
fn number_range(args: &[Value]) -> Result<Value, EvalError> {
    let (Some(start), Some(stop)) = (number_arg(args, 0), number_arg(args, 1)) else {
        return Ok(Value::Null);
    };
    let step = match args.len() {
        2 => Decimal::ONE,
        _ => match number_arg(args, 2) {
            Some(step) => step,
            None => return Ok(Value::Null),
        },
    };
    let mut result = Vec::new();
    if step <= Decimal::ZERO {
        return Ok(Value::List(result));
    }
    let mut current = start;
    while current < stop {
        result.push(Value::Number(current));
        current = current
            .checked_add(step)
            .ok_or_else(|| EvalError::function("range", "numeric overflow"))?;
    }
    Ok(Value::List(result))
}

/// Tuples of the n-th items, short lists padded with null.
fn zip(args: &[Value]) -> Value {
    let lists: Vec<&[Value]> = args.iter().map(|a| a.as_list().unwrap_or(&[])).collect();
    let longest = lists.iter().map(|l| l.len()).max().unwrap_or(0);
    let tuples = (0..longest)
        .map(|i| {
            Value::List(
                lists
                    .iter()
                    .map(|list| list.get(i).cloned().unwrap_or_default())
                    .collect(),
            )
        })
        .collect();
    Value::List(tuples)
}

fn product(args: &[Value]) -> Value {
    let (Some(left), Some(right)) = (list_arg(args, 0), list_arg(args, 1)) else {
        return Value::Null;
    };
    let pairs = left
        .iter()
        .flat_map(|a| {
            right
                .iter()
                .map(move |b| Value::List(vec![a.clone(), b.clone()]))
        })
        .collect();
    Value::List(pairs)
}

/// Joins list items with `separator`. Null joins to empty text and a
/// non-list value renders as itself.
pub fn join(value: &Value, separator: Option<&str>) -> String {
    let separator = separator.unwrap_or(",");
    match value {
        Value::Null => String::new(),
        Value::List(items) => items
            .iter()
            .map(Value::to_text)
            .collect::<Vec<_>>()
            .join(separator),
        other => other.to_text(),
    }
}

/// Null, empty text, or an empty list or object.
pub fn is_null_or_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(s) => s.is_empty(),
        Value::List(items) => items.is_empty(),
        Value::Object(record) => record.is_empty(),
        _ => false,
    }
}

fn parse_json(text: Option<&str>, want: DataType) -> Value {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Value::Null;
    };
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => {
            let value = output::from_json(&json);
            if value.data_type() == Some(want) {
                value
            } else {
                Value::Null
            }
        }
        Err(_) => Value::Null,
    }
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    use DataType::{List, Number, Text};

    registry.register(
        Function::new(
            "range",
            vec![Param::of(Number), Param::of(Number), Param::of(Number)],
            ValueType::List,
            number_range,
        )
        .items(Number),
    );
    registry.register(
        Function::new(
            "range",
            vec![Param::of(Number), Param::of(Number)],
            ValueType::List,
            number_range,
        )
        .items(Number),
    );
    registry.register(
        Function::new("zip", vec![], ValueType::List, |args| Ok(zip(args)))
            .variadic(List)
            .items(List),
    );
    registry.register(
        Function::new(
            "product",
            vec![Param::of(List), Param::of(List)],
            ValueType::List,
            |args| Ok(product(args)),
        )
        .items(List),
    );

    registry.register(Function::new(
        "len",
        vec![Param::of(List)],
        ValueType::Number,
        |args| Ok(list_arg(args, 0).map(|l| Value::from(l.len() as i64)).into()),
    ));
    registry.register(Function::new(
        "isnull",
        vec![Param::any()],
        ValueType::Boolean,
        |args| Ok(Value::Boolean(arg(args, 0).is_null())),
    ));
    registry.register(Function::new(
        "NOE",
        vec![Param::any()],
        ValueType::Boolean,
        |args| Ok(Value::Boolean(is_null_or_empty(arg(args, 0)))),
    ));

    registry.register(Function::new(
        "join",
        vec![Param::any()],
        ValueType::Text,
        |args| Ok(Value::Text(join(arg(args, 0), None))),
    ));
    registry.register(Function::new(
        "join",
        vec![Param::any(), Param::of(Text)],
        ValueType::Text,
        |args| Ok(Value::Text(join(arg(args, 0), text_arg(args, 1)))),
    ));
    registry.register(Function::new(
        "join",
        vec![Param::of(List)],
        ValueType::Text,
        |args| Ok(Value::Text(join(arg(args, 0), None))),
    ));
    registry.register(Function::new(
        "join",
        vec![Param::of(List), Param::of(Text)],
        ValueType::Text,
        |args| Ok(Value::Text(join(arg(args, 0), text_arg(args, 1)))),
    ));

    registry.register(
        Function::new("j2a", vec![Param::of(Text)], ValueType::List, |args| {
            Ok(parse_json(text_arg(args, 0), List))
        })
        .alias("json2array"),
    );
    registry.register(
        Function::new("j2o", vec![Param::of(Text)], ValueType::Object, |args| {
            Ok(parse_json(text_arg(args, 0), DataType::Object))
        })
        .alias("json2obj"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[i64]) -> Value {
        Value::List(values.iter().map(|&n| Value::from(n)).collect())
    }

    #[test]
    fn test_number_range() {
        let args = [Value::from(1), Value::from(10), Value::from(3)];
        assert_eq!(number_range(&args).unwrap(), numbers(&[1, 4, 7]));
        assert_eq!(number_range(&args[..2]).unwrap().as_list().map(|l| l.len()), Some(9));
        let stuck = [Value::from(1), Value::from(10), Value::from(0)];
        assert_eq!(number_range(&stuck).unwrap(), numbers(&[]));
    }

    #[test]
    fn test_zip_pads_with_null() {
        let zipped = zip(&[numbers(&[1, 2]), numbers(&[3])]);
        assert_eq!(
            zipped,
            Value::List(vec![numbers(&[1, 3]), Value::List(vec![Value::from(2), Value::Null])])
        );
    }

    #[test]
    fn test_product_pairs() {
        let pairs = product(&[numbers(&[1, 2]), numbers(&[3, 4])]);
        assert_eq!(pairs.as_list().map(|l| l.len()), Some(4));
        assert_eq!(pairs.as_list().and_then(|l| l.last()), Some(&numbers(&[2, 4])));
    }

    #[test]
    fn test_join_and_emptiness() {
        assert_eq!(join(&numbers(&[1, 2, 3]), None), "1,2,3");
        assert_eq!(join(&numbers(&[1, 2]), Some("-")), "1-2");
        assert_eq!(join(&Value::Null, None), "");
        assert!(is_null_or_empty(&Value::from("")));
        assert!(is_null_or_empty(&numbers(&[])));
        assert!(!is_null_or_empty(&Value::from(0)));
    }
}
