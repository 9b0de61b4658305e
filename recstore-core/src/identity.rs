//! Identity types and id coercion.
//!
//! Every id that crosses a map boundary goes through [`coerce_id`] (or
//! [`coerce_json_id`] for payload values) so `1` and `"1"` land on the same
//! [`RecordIdentity`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::error::{ArgumentError, MissingIdKind};

/// Local identifier for an identity-map entry.
///
/// UUIDv7, so lids sort by creation time. A lid survives the entry being
/// re-keyed when an adapter answers with a different id than requested.
pub type LocalId = Uuid;

/// Generate a new local identifier.
pub fn new_local_id() -> LocalId {
    Uuid::now_v7()
}

/// Canonical key for a record: model name plus coerced id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordIdentity {
    pub model_name: String,
    pub id: String,
}

impl RecordIdentity {
    pub fn new(model_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model_name, self.id)
    }
}

/// An id as handed to the store, before coercion.
///
/// `Undefined` stands for an id that was never supplied at all (for example a
/// missing JSON field), `Null` for one that was explicitly null.
#[derive(Debug, Clone, PartialEq)]
pub enum RawId {
    Text(String),
    Int(i64),
    Float(f64),
    Null,
    Undefined,
}

impl RawId {
    /// Coerce to a canonical id, rejecting null/undefined/empty inputs.
    pub fn require(&self) -> Result<String, ArgumentError> {
        match self {
            Self::Null => Err(ArgumentError::MissingId {
                kind: MissingIdKind::Null,
            }),
            Self::Undefined => Err(ArgumentError::MissingId {
                kind: MissingIdKind::Undefined,
            }),
            other => coerce_id(other).ok_or_else(|| ArgumentError::InvalidId {
                received: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(n) => f.write_str(&format_float(*n)),
            Self::Null => f.write_str("null"),
            Self::Undefined => f.write_str("undefined"),
        }
    }
}

impl From<&str> for RawId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for RawId {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

macro_rules! raw_id_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for RawId {
                fn from(value: $t) -> Self {
                    Self::Int(value as i64)
                }
            }
        )*
    };
}

raw_id_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for RawId {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(n) => Self::Int(n),
            Err(_) => Self::Text(value.to_string()),
        }
    }
}

impl From<f64> for RawId {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<RawId>> From<Option<T>> for RawId {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

impl From<&Value> for RawId {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::String(s) => Self::Text(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => match n.as_u64() {
                    Some(u) => Self::from(u),
                    None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
                },
            },
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<Value> for RawId {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}

/// Normalize an id to its canonical string form.
///
/// Null, undefined and the empty string have no canonical form.
pub fn coerce_id(raw: &RawId) -> Option<String> {
    match raw {
        RawId::Null | RawId::Undefined => None,
        RawId::Text(s) if s.is_empty() => None,
        RawId::Text(s) => Some(s.clone()),
        RawId::Int(n) => Some(n.to_string()),
        RawId::Float(n) => Some(format_float(*n)),
    }
}

/// Normalize an id found in a JSON payload.
pub fn coerce_json_id(value: &Value) -> Option<String> {
    coerce_id(&RawId::from(value))
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn format_float(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}
