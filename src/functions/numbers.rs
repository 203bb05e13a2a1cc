//! Number parsing intrinsics.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use super::{Function, FunctionRegistry, Param, arg};
use crate::error::EvalError;
use crate::value::{DataType, Value, ValueType};

static SCALED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\d,\.]+)([万千亿kK])").unwrap_or_else(|_| unreachable!("scale pattern is valid"))
});

/// Plain decimal text, thousands separators allowed.
pub fn parse_number(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .ok()
        .or_else(|| Decimal::from_str(&text.replace(',', "")).ok())
        .or_else(|| Decimal::from_scientific(text).ok())
}

/// Like [`parse_number`] but also reads magnitude suffixes, summing every
/// scaled group: `1.5万` is 15000, `3k` is 3000.
pub fn parse_scaled(text: &str) -> Option<Decimal> {
    if let Some(n) = parse_number(text) {
        return Some(n);
    }
    let mut total = Decimal::ZERO;
    let mut found = false;
    for captures in SCALED_PATTERN.captures_iter(text) {
        let amount = parse_number(&captures[1])?;
        let scale = match &captures[2] {
            "亿" => Decimal::from(100_000_000),
            "万" => Decimal::from(10_000),
            _ => Decimal::from(1_000),
        };
        total += amount * scale;
        found = true;
    }
    found.then_some(total)
}

fn number_of(value: &Value, parse: fn(&str) -> Option<Decimal>) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Number(n) => Value::Number(*n),
        other => parse(&other.to_text()).into(),
    }
}

fn parser(parse: fn(&str) -> Option<Decimal>) -> impl Fn(&[Value]) -> Result<Value, EvalError> {
    move |args| Ok(number_of(arg(args, 0), parse))
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(Function::new(
        "num",
        vec![Param::of(DataType::Text)],
        ValueType::Number,
        parser(parse_number),
    ));
    registry.register(Function::new(
        "num",
        vec![Param::any()],
        ValueType::Number,
        parser(parse_number),
    ));
    registry.register(Function::new(
        "num2",
        vec![Param::of(DataType::Text)],
        ValueType::Number,
        parser(parse_scaled),
    ));
    registry.register(Function::new(
        "num2",
        vec![Param::any()],
        ValueType::Number,
        parser(parse_scaled),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("123"), Some(Decimal::from(123)));
        assert_eq!(parse_number(" -1.5 "), Decimal::from_str("-1.5").ok());
        assert_eq!(parse_number("1,234"), Some(Decimal::from(1234)));
        assert_eq!(parse_number("1-2-3"), None);
    }

    #[test]
    fn test_parse_scaled() {
        assert_eq!(parse_scaled("1.5万"), Some(Decimal::from(15000)));
        assert_eq!(parse_scaled("3k"), Some(Decimal::from(3000)));
        assert_eq!(parse_scaled("2亿"), Some(Decimal::from(200_000_000)));
        assert_eq!(parse_scaled("abc"), None);
    }
}
