//! Attribute transforms.
//!
//! A transform converts an attribute between its wire form and its in-store
//! form. The store applies [`Transform::deserialize`] while normalizing
//! adapter payloads; [`Transform::serialize`] is the reverse direction for
//! callers that write records back out.

use serde_json::{Number, Value};

use crate::schema::AttributeKind;

/// Converts an attribute value between wire and store representations.
pub trait Transform: Send + Sync {
    /// Wire value -> store value.
    fn deserialize(&self, serialized: &Value) -> Value;

    /// Store value -> wire value.
    fn serialize(&self, deserialized: &Value) -> Value;
}

/// Numeric attributes.
///
/// Empty strings and null become null. Anything else is converted to a
/// number the way a loose numeric cast would:
///
/// - strings are parsed after trimming; whitespace-only text is zero and
///   `0x`/`0o`/`0b` prefixes select hex, octal and binary
/// - booleans become 1/0
/// - an array is read through its text form, so `[]` is zero, `[7]` and
///   `["7"]` are 7 and longer arrays are not numbers
///
/// Results that are NaN or infinite become null.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberTransform;

impl NumberTransform {
    fn convert(value: &Value) -> Value {
        let number = match value {
            Value::Null => return Value::Null,
            Value::String(s) if s.is_empty() => return Value::Null,
            Value::String(s) => parse_number(s),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    return value.clone();
                }
                n.as_f64()
            }
            Value::Array(_) => loose_text(value).and_then(|text| parse_number(&text)),
            Value::Object(_) => None,
        };

        match number {
            Some(n) if n.is_finite() => number_value(n),
            _ => Value::Null,
        }
    }
}

impl Transform for NumberTransform {
    fn deserialize(&self, serialized: &Value) -> Value {
        Self::convert(serialized)
    }

    fn serialize(&self, deserialized: &Value) -> Value {
        Self::convert(deserialized)
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    if let Some(n) = parse_radix_literal(trimmed) {
        return n;
    }
    // Rust accepts "inf"/"nan" spellings a loose cast would reject; both end up
    // non-finite and become null anyway.
    trimmed.parse::<f64>().ok()
}

/// `Some(..)` when `text` carries a radix prefix; the inner value is `None`
/// if the digits do not fit the radix. Signs are not allowed before a prefix.
fn parse_radix_literal(text: &str) -> Option<Option<f64>> {
    let mut chars = text.chars();
    if chars.next() != Some('0') {
        return None;
    }
    let radix = match chars.next().map(|c| c.to_ascii_lowercase()) {
        Some('x') => 16,
        Some('o') => 8,
        Some('b') => 2,
        _ => return None,
    };
    let digits = chars.as_str();
    if digits.is_empty() {
        return Some(None);
    }
    Some(digits.chars().try_fold(0.0_f64, |acc, c| {
        c.to_digit(radix)
            .map(|d| acc * f64::from(radix) + f64::from(d))
    }))
}

/// Text form of a value as a loose cast sees it. Arrays of more than one
/// element join with commas, which never parses, so they have none.
fn loose_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => match items.as_slice() {
            [] => Some(String::new()),
            [only] => loose_text(only),
            _ => None,
        },
        Value::Object(_) => None,
    }
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Text attributes. Null stays null, scalars are rendered as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringTransform;

impl StringTransform {
    fn convert(value: &Value) -> Value {
        match value {
            Value::Null => Value::Null,
            Value::String(_) => value.clone(),
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            other => Value::String(other.to_string()),
        }
    }
}

impl Transform for StringTransform {
    fn deserialize(&self, serialized: &Value) -> Value {
        Self::convert(serialized)
    }

    fn serialize(&self, deserialized: &Value) -> Value {
        Self::convert(deserialized)
    }
}

/// Boolean attributes. `true`, `"true"`, `"t"` and `1` are true; null stays
/// null; everything else is false.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanTransform;

impl BooleanTransform {
    fn convert(value: &Value) -> Value {
        let truthy = match value {
            Value::Null => return Value::Null,
            Value::Bool(b) => *b,
            Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "t"),
            Value::Number(n) => n.as_f64() == Some(1.0),
            _ => false,
        };
        Value::Bool(truthy)
    }
}

impl Transform for BooleanTransform {
    fn deserialize(&self, serialized: &Value) -> Value {
        Self::convert(serialized)
    }

    fn serialize(&self, deserialized: &Value) -> Value {
        Self::convert(deserialized)
    }
}

/// Pass-through for untyped attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTransform;

impl Transform for RawTransform {
    fn deserialize(&self, serialized: &Value) -> Value {
        serialized.clone()
    }

    fn serialize(&self, deserialized: &Value) -> Value {
        deserialized.clone()
    }
}

/// The transform registered for an attribute kind.
pub fn transform_for(kind: AttributeKind) -> &'static dyn Transform {
    match kind {
        AttributeKind::String => &StringTransform,
        AttributeKind::Number => &NumberTransform,
        AttributeKind::Boolean => &BooleanTransform,
        AttributeKind::Raw => &RawTransform,
    }
}
