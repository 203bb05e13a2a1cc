//! Date and time intrinsics.
//!
//! Dates are `DateTime<FixedOffset>`. Functions that take an optional
//! timezone interpret it as hours east of UTC and default to
//! [`DEFAULT_UTC_OFFSET_HOURS`].
//!
//! Offsets added to dates are written as unit-tagged counts:
//!
//! ```text
//! 1y2M   one year and two months
//! 3d12h  three days and twelve hours
//! 30m    thirty minutes
//! 15s    fifteen seconds
//! ```

use std::collections::HashSet;
use std::fmt::Write;
use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, FixedOffset, Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone,
    Timelike, Utc,
};
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::{DEFAULT_UTC_OFFSET_HOURS, Function, FunctionRegistry, Param};
use super::{arg, bool_arg, date_arg, number_arg, text_arg};
use crate::error::EvalError;
use crate::value::{DataType, Record, Value, ValueType};

/// How dates render as text.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static OFFSET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)([YyMDdHhmSs])").unwrap_or_else(|_| unreachable!("offset pattern is valid"))
});

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y/%m/%d %H:%M:%S%.f%:z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Unix `date` style, e.g. `Tue Sep 19 12:00:00 +0800 2017`.
const VERBOSE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Fixed offset for `hours` east of UTC, the default when absent.
pub fn utc_offset(hours: Option<Decimal>) -> Result<FixedOffset, EvalError> {
    let hours = hours.unwrap_or(Decimal::from(DEFAULT_UTC_OFFSET_HOURS));
    (hours * Decimal::from(3600))
        .round()
        .to_i32()
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| EvalError::InvalidDateOffset(hours.to_string()))
}

pub fn now(hours: Option<Decimal>) -> Result<DateTime<FixedOffset>, EvalError> {
    Ok(Utc::now().with_timezone(&utc_offset(hours)?))
}

/// Midnight of the current day at the given offset.
pub fn today(hours: Option<Decimal>) -> Result<DateTime<FixedOffset>, EvalError> {
    let now = now(hours)?;
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| now.offset().from_local_datetime(&midnight).single())
        .ok_or_else(|| EvalError::function("today", "cannot build midnight"))
}

/// Parses text as a date.
///
/// Text carrying its own offset keeps it, unless `hours` asks for a
/// conversion. Text without an offset is read as local time at `hours`.
pub fn parse_datetime(text: &str, hours: Option<Decimal>) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    let offset = utc_offset(hours).ok()?;

    let explicit = DateTime::parse_from_rfc3339(text).ok().or_else(|| {
        OFFSET_FORMATS
            .iter()
            .find_map(|format| DateTime::parse_from_str(text, format).ok())
    });
    if let Some(date) = explicit {
        return Some(match hours {
            Some(_) => date.with_timezone(&offset),
            None => date,
        });
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        });
    if let Some(naive) = naive {
        return offset.from_local_datetime(&naive).single();
    }

    DateTime::parse_from_str(text, VERBOSE_FORMAT)
        .ok()
        .map(|date| date.with_timezone(&offset))
}

static AGO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(小时|分钟|秒钟|星期|[天月周时分秒年])前")
        .unwrap_or_else(|_| unreachable!("relative pattern is valid"))
});

static DAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(昨[天日]|前[天日]|今[天日])\s*([\d时点分秒：:]*)")
        .unwrap_or_else(|_| unreachable!("day pattern is valid"))
});

static YEARLESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,2}[-/]\d{1,2}(\s+\d{1,2}:\d{1,2}(:\d{1,2})*)?")
        .unwrap_or_else(|_| unreachable!("yearless pattern is valid"))
});

/// Parses loosely written dates relative to `reference`.
///
/// Anything [`parse_datetime`] accepts comes first. Then, in order:
///
/// ```text
/// 3天前 / 2小时前 / 1星期前   count of a unit before the reference
/// 昨天 10:30 / 前天 / 今日9点  a day around the reference, optional clock
/// 刚刚 / 刚才                 the reference itself
/// 发布于2023年4月5日          date text buried in other characters
/// 05-06 08:00               month and day, year taken from the reference
/// ```
pub fn parse_described(
    text: &str,
    reference: DateTime<FixedOffset>,
    hours: Option<Decimal>,
) -> Option<DateTime<FixedOffset>> {
    if let Some(date) = parse_datetime(text, hours) {
        return Some(date);
    }

    if let Some(captures) = AGO_PATTERN.captures(text) {
        let amount: i64 = captures[1].parse().ok()?;
        return match &captures[2] {
            "时" | "小时" => {
                TimeDelta::try_hours(amount).and_then(|d| reference.checked_sub_signed(d))
            }
            "分" | "分钟" => {
                TimeDelta::try_minutes(amount).and_then(|d| reference.checked_sub_signed(d))
            }
            "秒" | "秒钟" => {
                TimeDelta::try_seconds(amount).and_then(|d| reference.checked_sub_signed(d))
            }
            "天" => TimeDelta::try_days(amount).and_then(|d| reference.checked_sub_signed(d)),
            "周" | "星期" => {
                TimeDelta::try_weeks(amount).and_then(|d| reference.checked_sub_signed(d))
            }
            "月" => shift_months(reference, -amount),
            _ => shift_months(reference, -amount.checked_mul(12)?),
        };
    }

    if let Some(captures) = DAY_PATTERN.captures(text) {
        let back = match captures[1].chars().next() {
            Some('昨') => 1,
            Some('前') => 2,
            _ => 0,
        };
        let day = reference
            .date_naive()
            .checked_sub_signed(TimeDelta::try_days(back)?)?;
        let clock = captures
            .get(2)
            .and_then(|time| clock_of(time.as_str()))
            .and_then(|(h, m, s)| day.and_hms_opt(h, m, s));
        let local = match clock {
            Some(local) => local,
            None => day.and_hms_opt(0, 0, 0)?,
        };
        let offset = match hours {
            Some(_) => utc_offset(hours).ok()?,
            None => *reference.offset(),
        };
        return offset.from_local_datetime(&local).single();
    }

    if text.contains("刚刚") || text.contains("刚才") {
        return Some(reference);
    }

    let body: String = date_body(text)
        .chars()
        .filter_map(|c| match c {
            '年' | '月' => Some('-'),
            '：' => Some(':'),
            '日' => None,
            c => Some(c),
        })
        .collect();
    if !body.is_empty() {
        if let Some(date) = parse_datetime(&body, hours) {
            return Some(date);
        }
    }

    let yearless = YEARLESS_PATTERN.find(&body)?;
    parse_datetime(
        &format!("{}-{}", reference.year(), yearless.as_str().replace('/', "-")),
        hours,
    )
}

/// `10:30`, `10点30分`, `9时`. Unreadable text gives `None`.
fn clock_of(text: &str) -> Option<(u32, u32, u32)> {
    let normalized: String = text
        .chars()
        .map(|c| match c {
            '：' | '时' | '点' | '分' => ':',
            '秒' => ' ',
            c => c,
        })
        .collect();
    let parts = normalized
        .split(':')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [h] => Some((*h, 0, 0)),
        [h, m] => Some((*h, *m, 0)),
        [h, m, s] => Some((*h, *m, *s)),
        _ => None,
    }
}

/// From the first digit through the last digit or trailing `日`/`分`/`秒`.
fn date_body(text: &str) -> &str {
    let Some(start) = text.find(|c: char| c.is_ascii_digit()) else {
        return "";
    };
    let end = text
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_ascii_digit() || matches!(c, '日' | '分' | '秒'))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(start);
    text.get(start..end).unwrap_or_default()
}

/// Hours east of UTC of a date's own offset.
fn offset_hours(date: &DateTime<FixedOffset>) -> Decimal {
    Decimal::from(date.offset().local_minus_utc()) / Decimal::from(3600)
}

/// Unix timestamp to date. Magnitudes of 10^12 and above are milliseconds.
pub fn from_timestamp(value: Decimal, hours: Option<Decimal>) -> Option<DateTime<FixedOffset>> {
    let offset = utc_offset(hours).ok()?;
    let utc = if value.abs() >= Decimal::from(1_000_000_000_000i64) {
        DateTime::from_timestamp_millis(value.trunc().to_i64()?)?
    } else {
        let seconds = value.trunc();
        let nanos = ((value - seconds) * Decimal::from(1_000_000_000)).trunc();
        DateTime::from_timestamp(seconds.to_i64()?, nanos.abs().to_u32()?)?
    };
    Some(utc.with_timezone(&offset))
}

/// Applies an offset such as `1d2h` to `date`, subtracting when `minus`.
///
/// Each unit may appear once; text without any unit is rejected.
pub fn add_offset(
    date: DateTime<FixedOffset>,
    offset: &str,
    minus: bool,
) -> Result<DateTime<FixedOffset>, EvalError> {
    let invalid = || EvalError::InvalidDateOffset(offset.to_string());

    let mut seen = HashSet::new();
    let mut parts = Vec::new();
    for captures in OFFSET_PATTERN.captures_iter(offset) {
        let amount: i64 = captures[1].parse().map_err(|_| invalid())?;
        let unit = captures[2].chars().next().ok_or_else(invalid)?;
        if !seen.insert(unit) {
            return Err(invalid());
        }
        parts.push((amount, unit));
    }
    if parts.is_empty() {
        return Err(invalid());
    }

    let mut result = date;
    for (amount, unit) in parts {
        let amount = if minus { -amount } else { amount };
        result = match unit {
            'Y' | 'y' => shift_months(result, amount.checked_mul(12).ok_or_else(invalid)?),
            'M' => shift_months(result, amount),
            'D' | 'd' => TimeDelta::try_days(amount).and_then(|d| result.checked_add_signed(d)),
            'H' | 'h' => TimeDelta::try_hours(amount).and_then(|d| result.checked_add_signed(d)),
            'm' => TimeDelta::try_minutes(amount).and_then(|d| result.checked_add_signed(d)),
            _ => TimeDelta::try_seconds(amount).and_then(|d| result.checked_add_signed(d)),
        }
        .ok_or_else(invalid)?;
    }
    Ok(result)
}

fn shift_months(date: DateTime<FixedOffset>, months: i64) -> Option<DateTime<FixedOffset>> {
    let count = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months < 0 {
        date.checked_sub_months(count)
    } else {
        date.checked_add_months(count)
    }
}

/// Formats with .NET style tokens (`yyyy-MM-dd HH:mm:ss.fff`).
///
/// Text in single or double quotes is copied literally, as is any
/// character that is not a token.
pub fn format(date: &DateTime<FixedOffset>, pattern: &str) -> String {
    let mut out = String::new();
    match write!(out, "{}", date.format(&translate_format(pattern))) {
        Ok(()) => out,
        Err(_) => pattern.to_string(),
    }
}

fn translate_format(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' || c == '"' {
            i += 1;
            while i < chars.len() && chars[i] != c {
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }
        if c == '\\' && i + 1 < chars.len() {
            push_literal(&mut out, chars[i + 1]);
            i += 2;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&next| next == c).count();
        let token = match (c, run) {
            ('y', 1) => "%-y",
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', 2) => "%d",
            ('d', 3) => "%a",
            ('d', _) => "%A",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('h', 1) => "%-I",
            ('h', _) => "%I",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            ('f' | 'F', 1..=3) => "%3f",
            ('f' | 'F', 4..=6) => "%6f",
            ('f' | 'F', _) => "%9f",
            ('t', _) => "%p",
            ('z', 1 | 2) => "%z",
            ('z', _) => "%:z",
            _ => {
                for _ in 0..run {
                    push_literal(&mut out, c);
                }
                i += run;
                continue;
            }
        };
        out.push_str(token);
        i += run;
    }
    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Component of a date by single-letter code, `None` for unknown codes.
pub fn part(date: &DateTime<FixedOffset>, code: &str) -> Option<Decimal> {
    let value = match code {
        "y" | "Y" => i64::from(date.year()),
        "M" => i64::from(date.month()),
        "d" | "D" => i64::from(date.day()),
        "h" | "H" => i64::from(date.hour()),
        "m" => i64::from(date.minute()),
        "s" | "S" => i64::from(date.second()),
        _ => return None,
    };
    Some(Decimal::from(value))
}

/// Splits `[start, end)` at each boundary produced by `next`.
fn spans(
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
    next: impl Fn(DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>>,
) -> Value {
    let mut result = Vec::new();
    let (Some(start), Some(end)) = (start, end) else {
        return Value::List(result);
    };
    let span = |from, to| {
        let mut record = Record::new();
        record.insert("Start", Value::DateTime(from));
        record.insert("End", Value::DateTime(to));
        Value::Object(record)
    };
    let mut current = start;
    loop {
        match next(current) {
            Some(boundary) if boundary < end && boundary > current => {
                result.push(span(current, boundary));
                current = boundary;
            }
            _ => {
                result.push(span(current, end));
                return Value::List(result);
            }
        }
    }
}

fn next_midnight(date: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    let midnight = date.date_naive().succ_opt()?.and_hms_opt(0, 0, 0)?;
    date.offset().from_local_datetime(&midnight).single()
}

fn date_of(value: &Value, hours: Option<Decimal>) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::DateTime(date) => Value::DateTime(*date),
        Value::Number(n) => from_timestamp(*n, hours).into(),
        other => parse_datetime(&other.to_text(), hours).into(),
    }
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    use DataType::{Boolean, Number, Text};
    let span_fields = [("Start", DataType::DateTime), ("End", DataType::DateTime)];

    registry.register(Function::new("now", vec![], ValueType::DateTime, |_| {
        Ok(Value::DateTime(now(None)?))
    }));
    registry.register(Function::new(
        "now",
        vec![Param::of(Number)],
        ValueType::DateTime,
        |args| Ok(Value::DateTime(now(number_arg(args, 0))?)),
    ));

    registry.register(Function::new(
        "date",
        vec![Param::any()],
        ValueType::DateTime,
        |args| Ok(date_of(arg(args, 0), None)),
    ));
    registry.register(Function::new(
        "date",
        vec![Param::of(Text)],
        ValueType::DateTime,
        |args| Ok(date_of(arg(args, 0), None)),
    ));
    registry.register(Function::new(
        "date",
        vec![Param::any(), Param::of(Number)],
        ValueType::DateTime,
        |args| {
            let hours = number_arg(args, 1);
            utc_offset(hours)?;
            Ok(date_of(arg(args, 0), hours))
        },
    ));
    registry.register(Function::new(
        "date",
        vec![Param::of(Text), Param::of(Number)],
        ValueType::DateTime,
        |args| {
            let hours = number_arg(args, 1);
            utc_offset(hours)?;
            Ok(date_of(arg(args, 0), hours))
        },
    ));
    registry.register(Function::new(
        "date",
        vec![Param::of(Number)],
        ValueType::DateTime,
        |args| Ok(date_of(arg(args, 0), None)),
    ));
    registry.register(Function::new(
        "date",
        vec![Param::of(Number), Param::of(Number)],
        ValueType::DateTime,
        |args| {
            let hours = number_arg(args, 1);
            utc_offset(hours)?;
            Ok(date_of(arg(args, 0), hours))
        },
    ));

    register_described(registry);

    registry.register(Function::new(
        "ts",
        vec![Param::of(DataType::DateTime)],
        ValueType::Number,
        |args| Ok(date_arg(args, 0).map(|d| Value::from(d.timestamp())).into()),
    ));
    registry.register(Function::new(
        "ts_ms",
        vec![Param::of(DataType::DateTime)],
        ValueType::Number,
        |args| {
            Ok(date_arg(args, 0)
                .map(|d| Value::from(d.timestamp_millis()))
                .into())
        },
    ));

    registry.register(Function::new("today", vec![], ValueType::DateTime, |_| {
        Ok(Value::DateTime(today(None)?))
    }));
    registry.register(Function::new(
        "today",
        vec![Param::of(Number)],
        ValueType::DateTime,
        |args| Ok(Value::DateTime(today(number_arg(args, 0))?)),
    ));

    registry.register(Function::new(
        "date_fmt",
        vec![Param::of(DataType::DateTime), Param::of(Text)],
        ValueType::Text,
        |args| {
            let pattern = text_arg(args, 1).unwrap_or_default();
            Ok(date_arg(args, 0).map(|d| format(&d, pattern)).into())
        },
    ));
    registry.register(Function::new(
        "date_part",
        vec![Param::of(DataType::DateTime), Param::of(Text)],
        ValueType::Number,
        |args| match date_arg(args, 0) {
            None => Ok(Value::from(0)),
            Some(date) => Ok(part(&date, text_arg(args, 1).unwrap_or_default()).into()),
        },
    ));
    registry.register(
        Function::new(
            "day_span",
            vec![Param::of(DataType::DateTime), Param::of(DataType::DateTime)],
            ValueType::List,
            |args| Ok(spans(date_arg(args, 0), date_arg(args, 1), next_midnight)),
        )
        .items(DataType::Object)
        .fields(&span_fields),
    );
    registry.register(
        Function::new(
            "hour_span",
            vec![Param::of(DataType::DateTime), Param::of(DataType::DateTime)],
            ValueType::List,
            |args| {
                Ok(spans(date_arg(args, 0), date_arg(args, 1), |d| {
                    TimeDelta::try_hours(1).and_then(|hour| d.checked_add_signed(hour))
                }))
            },
        )
        .items(DataType::Object)
        .fields(&span_fields),
    );
    registry.register(Function::new(
        "date_add",
        vec![Param::of(DataType::DateTime), Param::of(Text), Param::of(Boolean)],
        ValueType::DateTime,
        |args| match (date_arg(args, 0), text_arg(args, 1)) {
            (Some(date), Some(offset)) => {
                Ok(Value::DateTime(add_offset(date, offset, bool_arg(args, 2))?))
            }
            _ => Ok(Value::Null),
        },
    ));

    registry.register(
        Function::new(
            "between",
            vec![
                Param::of(Number),
                Param::of(Number),
                Param::of(Number),
                Param::of(Boolean),
                Param::of(Boolean),
            ],
            ValueType::Boolean,
            |args| Ok(Value::Boolean(between(args))),
        )
        .internal(),
    );
    registry.register(
        Function::new(
            "between",
            vec![
                Param::of(DataType::DateTime),
                Param::of(DataType::DateTime),
                Param::of(DataType::DateTime),
                Param::of(Boolean),
                Param::of(Boolean),
            ],
            ValueType::Boolean,
            |args| Ok(Value::Boolean(between(args))),
        )
        .internal(),
    );

    registry.register(
        Function::new(
            "range",
            vec![Param::of(DataType::DateTime), Param::of(DataType::DateTime), Param::of(Text)],
            ValueType::List,
            |args| date_range(args),
        )
        .items(DataType::DateTime),
    );
}

/// `value` within `[low, high]`, each bound inclusive or exclusive by flag.
fn described_of(
    value: &Value,
    reference: Option<DateTime<FixedOffset>>,
    hours: Option<Decimal>,
) -> Result<Value, EvalError> {
    let text = match value {
        Value::Null => return Ok(Value::Null),
        Value::DateTime(date) => return Ok(Value::DateTime(*date)),
        other => other.to_text(),
    };
    let reference = match reference {
        Some(reference) => reference,
        None => now(hours)?,
    };
    Ok(parse_described(&text, reference, hours).into())
}

/// `date2`: the overloads of `date`, plus a reference time given as a date
/// or as text.
fn register_described(registry: &mut FunctionRegistry) {
    use DataType::{Number, Text};

    registry.register(Function::new(
        "date2",
        vec![Param::any()],
        ValueType::DateTime,
        |args| described_of(arg(args, 0), None, None),
    ));
    registry.register(Function::new(
        "date2",
        vec![Param::of(Text)],
        ValueType::DateTime,
        |args| described_of(arg(args, 0), None, None),
    ));
    registry.register(Function::new(
        "date2",
        vec![Param::any(), Param::of(Number)],
        ValueType::DateTime,
        |args| {
            let hours = number_arg(args, 1);
            utc_offset(hours)?;
            described_of(arg(args, 0), None, hours)
        },
    ));
    registry.register(Function::new(
        "date2",
        vec![Param::of(Text), Param::of(Number)],
        ValueType::DateTime,
        |args| {
            let hours = number_arg(args, 1);
            utc_offset(hours)?;
            described_of(arg(args, 0), None, hours)
        },
    ));
    registry.register(Function::new(
        "date2",
        vec![Param::of(Text), Param::of(DataType::DateTime)],
        ValueType::DateTime,
        |args| {
            let reference = date_arg(args, 1);
            let hours = reference.as_ref().map(offset_hours);
            described_of(arg(args, 0), reference, hours)
        },
    ));
    registry.register(Function::new(
        "date2",
        vec![
            Param::of(Text),
            Param::of(DataType::DateTime),
            Param::of(Number),
        ],
        ValueType::DateTime,
        |args| {
            let hours = number_arg(args, 2);
            utc_offset(hours)?;
            described_of(arg(args, 0), date_arg(args, 1), hours)
        },
    ));
    registry.register(Function::new(
        "date2",
        vec![Param::of(Text), Param::of(Text)],
        ValueType::DateTime,
        |args| {
            let reference = text_arg(args, 1).and_then(|text| parse_datetime(text, None));
            described_of(arg(args, 0), reference, None)
        },
    ));
    registry.register(Function::new(
        "date2",
        vec![Param::of(Text), Param::of(Text), Param::of(Number)],
        ValueType::DateTime,
        |args| {
            let hours = number_arg(args, 2);
            utc_offset(hours)?;
            let reference = text_arg(args, 1).and_then(|text| parse_datetime(text, hours));
            described_of(arg(args, 0), reference, hours)
        },
    ));
}

fn between(args: &[Value]) -> bool {
    use std::cmp::Ordering;
    let (value, low, high) = (arg(args, 0), arg(args, 1), arg(args, 2));
    let ordering = |a: &Value, b: &Value| match (a, b) {
        (Value::Number(a), Value::Number(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    };
    let (Some(from_low), Some(to_high)) = (ordering(value, low), ordering(value, high)) else {
        return false;
    };
    let above = match from_low {
        Ordering::Greater => true,
        Ordering::Equal => bool_arg(args, 3),
        Ordering::Less => false,
    };
    let below = match to_high {
        Ordering::Less => true,
        Ordering::Equal => bool_arg(args, 4),
        Ordering::Greater => false,
    };
    above && below
}

/// Dates from `start` up to, not including, `stop`. A step starting with
/// `-` walks backwards.
fn date_range(args: &[Value]) -> Result<Value, EvalError> {
    let (Some(start), Some(stop), Some(step)) =
        (date_arg(args, 0), date_arg(args, 1), text_arg(args, 2))
    else {
        return Ok(Value::Null);
    };
    let minus = step.trim_start().starts_with('-');
    let mut result = Vec::new();
    let mut current = start;
    while current < stop {
        result.push(Value::DateTime(current));
        let next = add_offset(current, step, minus)?;
        if next <= current {
            break;
        }
        current = next;
    }
    Ok(Value::List(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(text: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(text).unwrap()
    }

    #[test]
    fn test_parse_naive_uses_default_offset() {
        let date = parse_datetime("2017-09-19 12:00:00", None).unwrap();
        assert_eq!(date, at("2017-09-19T12:00:00+08:00"));
        assert_eq!(date.offset().local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn test_parse_explicit_offset_converts_when_asked() {
        let date = parse_datetime("2017-09-19T12:00:00Z", Some(Decimal::from(8))).unwrap();
        assert_eq!(date.format(DISPLAY_FORMAT).to_string(), "2017-09-19 20:00:00");
        let kept = parse_datetime("2017-09-19T12:00:00Z", None).unwrap();
        assert_eq!(kept.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_parse_date_only_and_garbage() {
        let date = parse_datetime("2019-12-12", None).unwrap();
        assert_eq!(date, at("2019-12-12T00:00:00+08:00"));
        assert_eq!(parse_datetime("not a date", None), None);
    }

    #[test]
    fn test_described_dates() {
        let reference = at("2024-05-10T12:00:00+08:00");
        let described = |text: &str| parse_described(text, reference, None);

        assert_eq!(described("3天前"), Some(at("2024-05-07T12:00:00+08:00")));
        assert_eq!(described("2 小时前"), Some(at("2024-05-10T10:00:00+08:00")));
        assert_eq!(described("1星期前"), Some(at("2024-05-03T12:00:00+08:00")));
        assert_eq!(described("1月前"), Some(at("2024-04-10T12:00:00+08:00")));
        assert_eq!(described("昨天 10:30"), Some(at("2024-05-09T10:30:00+08:00")));
        assert_eq!(described("前天"), Some(at("2024-05-08T00:00:00+08:00")));
        assert_eq!(described("今日9点"), Some(at("2024-05-10T09:00:00+08:00")));
        assert_eq!(described("刚刚"), Some(reference));
        assert_eq!(described("2019-12-12"), Some(at("2019-12-12T00:00:00+08:00")));
        assert_eq!(described("发布于2023年4月5日"), Some(at("2023-04-05T00:00:00+08:00")));
        assert_eq!(described("05-06 08:00"), Some(at("2024-05-06T08:00:00+08:00")));
        assert_eq!(described("sometime"), None);
    }

    #[test]
    fn test_timestamp_seconds_and_millis() {
        let seconds = from_timestamp(Decimal::from(1505793600), None).unwrap();
        let millis = from_timestamp(Decimal::from(1505793600000i64), None).unwrap();
        assert_eq!(seconds, millis);
        assert_eq!(seconds, at("2017-09-19T12:00:00+08:00"));
    }

    #[test]
    fn test_add_offset() {
        let date = at("2017-09-19T12:00:00+08:00");
        assert_eq!(add_offset(date, "1d2h", false).unwrap(), at("2017-09-20T14:00:00+08:00"));
        assert_eq!(add_offset(date, "1M", true).unwrap(), at("2017-08-19T12:00:00+08:00"));
        assert_eq!(add_offset(date, "1y30m", false).unwrap(), at("2018-09-19T12:30:00+08:00"));
    }

    #[test]
    fn test_add_offset_rejects_bad_text() {
        let date = at("2017-09-19T12:00:00+08:00");
        assert!(matches!(add_offset(date, "abc", false), Err(EvalError::InvalidDateOffset(_))));
        assert!(matches!(add_offset(date, "1d2d", false), Err(EvalError::InvalidDateOffset(_))));
    }

    #[test]
    fn test_format_tokens() {
        let date = at("2017-09-19T14:05:09.123+08:00");
        assert_eq!(format(&date, "yyyyMMddHHmmss"), "20170919140509");
        assert_eq!(format(&date, "yyyy-MM-dd HH:mm:ss.fff"), "2017-09-19 14:05:09.123");
        assert_eq!(format(&date, "yyyy'y'M"), "2017y9");
        assert_eq!(format(&date, "yyyy年MM月dd日"), "2017年09月19日");
    }

    #[test]
    fn test_part_codes() {
        let date = at("2017-09-19T14:05:09+08:00");
        assert_eq!(part(&date, "Y"), Some(Decimal::from(2017)));
        assert_eq!(part(&date, "M"), Some(Decimal::from(9)));
        assert_eq!(part(&date, "m"), Some(Decimal::from(5)));
        assert_eq!(part(&date, "q"), None);
    }

    #[test]
    fn test_day_spans() {
        let start = at("2019-12-12T08:00:00+08:00");
        let end = at("2019-12-13T12:00:00+08:00");
        let Value::List(items) = spans(Some(start), Some(end), next_midnight) else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].get("End"),
            Some(&Value::DateTime(at("2019-12-13T00:00:00+08:00")))
        );
        assert_eq!(items[1].get("End"), Some(&Value::DateTime(end)));
    }
}
