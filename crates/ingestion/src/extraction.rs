//! Extraction record parsing
//!
//! Exported extraction records mix plain JSON with wrapped values: fields come
//! as `{ "value": .., "confidence": .. }` envelopes, dates as `{"$date": ..}`,
//! 64-bit integers as `{"$numberLong": ".."}` and ids as `{"$oid": ".."}`.
//! Nothing here fails; unusable input degrades to `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// A field as it appears in an extraction record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    /// `{ "value": .., "confidence": .. }`
    Envelope {
        value: &'a Value,
        confidence: Option<f64>,
    },
    /// A plain value without an envelope
    Bare(&'a Value),
    /// Missing or null
    Absent,
}

impl<'a> Field<'a> {
    /// The carried value, if present and non-null
    pub fn value(&self) -> Option<&'a Value> {
        match *self {
            Field::Envelope { value, .. } | Field::Bare(value) if !value.is_null() => Some(value),
            _ => None,
        }
    }

    /// The carried value, or `default` when absent or null
    pub fn value_or(&self, default: &'a Value) -> &'a Value {
        self.value().unwrap_or(default)
    }

    /// Confidence score; bare values carry none
    pub fn confidence(&self) -> Option<f64> {
        match *self {
            Field::Envelope { confidence, .. } => confidence,
            _ => None,
        }
    }
}

/// Classify a raw JSON value
pub fn unwrap_value(raw: &Value) -> Field<'_> {
    match raw {
        Value::Null => Field::Absent,
        Value::Object(map) => match map.get("value") {
            Some(value) => Field::Envelope {
                value,
                confidence: unwrap_confidence(raw),
            },
            None => Field::Bare(raw),
        },
        other => Field::Bare(other),
    }
}

/// Classify `object[key]`
pub fn field<'a>(object: &'a Value, key: &str) -> Field<'a> {
    object.get(key).map(unwrap_value).unwrap_or(Field::Absent)
}

/// Confidence of an envelope as `f64`
pub fn unwrap_confidence(envelope: &Value) -> Option<f64> {
    let confidence = match envelope.get("confidence")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    confidence.is_finite().then_some(confidence)
}

/// Follow `path` through nested objects; null counts as missing
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |node, key| node.get(*key))
        .filter(|v| !v.is_null())
}

/// Parse a wrapped or plain date into a UTC timestamp
pub fn parse_date(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => from_millis(n.as_i64()?),
        Value::Object(map) => match map.get("$date")? {
            Value::String(s) => parse_date_str(s),
            Value::Number(n) => from_millis(n.as_i64()?),
            inner @ Value::Object(_) => from_millis(parse_large_integer(inner)?),
            _ => None,
        },
        _ => None,
    }
}

/// The calendar day of a parsed date (UTC)
pub fn parse_calendar_date(raw: &Value) -> Option<NaiveDate> {
    parse_date(raw).map(|ts| ts.date_naive())
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d", "%d.%m.%Y"];

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// `{"$numberLong": "<digits>"}`, an integral number or a digit string
pub fn parse_large_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(map) => match map.get("$numberLong")? {
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        },
        _ => None,
    }
}

/// Integer fields that fit a 32-bit column
pub fn integer(raw: &Value) -> Option<i32> {
    parse_large_integer(raw).and_then(|n| i32::try_from(n).ok())
}

/// Text content; numbers and booleans are rendered, blank strings dropped
pub fn text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Boolean flags, also accepting "true"/"false" strings
pub fn flag(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Monetary and quantity values
pub fn decimal(raw: &Value) -> Option<Decimal> {
    match raw {
        Value::Number(n) => parse_plain_decimal(&n.to_string()),
        Value::String(s) => parse_decimal_str(s),
        Value::Object(map) => match map.get("$numberDecimal")? {
            Value::String(s) => parse_decimal_str(s),
            Value::Number(n) => parse_plain_decimal(&n.to_string()),
            _ => None,
        },
        _ => None,
    }
}

fn parse_plain_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Accepts `1234.56`, `1,234.56`, `1.234,56` and `12,50`. A single comma
/// without a dot is a decimal comma.
fn parse_decimal_str(s: &str) -> Option<Decimal> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let normalized = match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (Some(_), None) if compact.matches(',').count() == 1 => compact.replace(',', "."),
        (Some(_), None) => compact.replace(',', ""),
        (None, _) => compact,
    };

    parse_plain_decimal(&normalized)
}

/// Document id as a plain string or `{"$oid": ".."}`
pub fn object_id(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => map.get("$oid").and_then(object_id),
        _ => None,
    }
}
