use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed user-attribute or clause-literal value.
///
/// Mirrors the handful of JSON shapes the evaluator actually cares about;
/// everything else (objects, for instance) round-trips through `Json` so it
/// can still be stored and re-emitted even though no operator matches it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Bool(bool),
    Array(Vec<AttributeValue>),
    Null,
    Json(serde_json::Value),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[AttributeValue]> {
        match self {
            AttributeValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Converts this value to a string for bucketing purposes.
    ///
    /// Integers (floats with no fractional part) stringify without a
    /// decimal point so `42` and `42.0` bucket identically; other non-string
    /// types have no defined string form (callers should bucket to `0.0`).
    pub fn bucket_string(&self) -> Option<String> {
        match self {
            AttributeValue::String(s) => Some(s.clone()),
            AttributeValue::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{}", s),
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Array(_) | AttributeValue::Json(_) => {
                write!(f, "{}", serde_json::to_string(self).unwrap_or_default())
            }
            AttributeValue::Null => write!(f, "null"),
        }
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::String(s) => AttributeValue::String(s),
            serde_json::Value::Number(n) => {
                AttributeValue::Number(n.as_f64().unwrap_or_default())
            }
            serde_json::Value::Bool(b) => AttributeValue::Bool(b),
            serde_json::Value::Array(items) => {
                AttributeValue::Array(items.into_iter().map(AttributeValue::from).collect())
            }
            serde_json::Value::Null => AttributeValue::Null,
            other @ serde_json::Value::Object(_) => AttributeValue::Json(other),
        }
    }
}

impl From<AttributeValue> for serde_json::Value {
    fn from(v: AttributeValue) -> Self {
        match v {
            AttributeValue::String(s) => serde_json::Value::String(s),
            AttributeValue::Number(n) => serde_json::json!(n),
            AttributeValue::Bool(b) => serde_json::Value::Bool(b),
            AttributeValue::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            AttributeValue::Json(v) => v,
            AttributeValue::Null => serde_json::Value::Null,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        AttributeValue::Number(n)
    }
}
