//! Structured event payloads.
//!
//! `Payload` is the closed set of shapes a producer can hand to the log. It
//! renders to a `serde_json::Value` with a nesting limit, so arbitrarily deep
//! or exotic input always produces a bounded, hashable document.
//!
//! Rendering rules:
//!
//! | variant      | JSON                                         |
//! |--------------|----------------------------------------------|
//! | `Timestamp`  | RFC 3339 string                              |
//! | `Date`       | `YYYY-MM-DD` string                          |
//! | `Binary`     | lowercase hex string                         |
//! | `Float`      | number, or its `Display` text if not finite  |
//! | `Mapping`    | object (keys sorted, last duplicate wins)    |
//! | `Opaque`     | string                                       |
//!
//! Anything nested deeper than the limit becomes the string
//! [`MAX_DEPTH_MARKER`].

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// Nesting depth rendered before values are replaced by [`MAX_DEPTH_MARKER`].
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Placeholder for values nested beyond the depth limit.
pub const MAX_DEPTH_MARKER: &str = "[Max Depth Reached]";

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Binary(Vec<u8>),
    Sequence(Vec<Payload>),
    Mapping(Vec<(String, Payload)>),
    /// Anything else, already reduced to a display string by the caller.
    Opaque(String),
}

impl Payload {
    /// Build a mapping from `(key, value)` pairs.
    pub fn mapping<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Payload>,
        I: IntoIterator<Item = (K, V)>,
    {
        Payload::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Payload::Binary(bytes.into())
    }

    /// Wrap any `Debug` value whose structure the log does not need.
    pub fn opaque(value: &impl std::fmt::Debug) -> Self {
        Payload::Opaque(format!("{:?}", value))
    }

    /// Render with [`DEFAULT_MAX_DEPTH`].
    pub fn to_value(&self) -> Value {
        self.to_value_with_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn to_value_with_depth(&self, max_depth: usize) -> Value {
        self.render(max_depth, 0)
    }

    fn render(&self, max_depth: usize, depth: usize) -> Value {
        if depth > max_depth {
            return Value::String(MAX_DEPTH_MARKER.to_string());
        }
        match self {
            Payload::Null => Value::Null,
            Payload::Bool(b) => Value::Bool(*b),
            Payload::Int(i) => Value::from(*i),
            Payload::UInt(u) => Value::from(*u),
            Payload::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(f.to_string())),
            Payload::Text(s) | Payload::Opaque(s) => Value::String(s.clone()),
            Payload::Timestamp(at) => {
                Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, false))
            }
            Payload::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Payload::Binary(bytes) => Value::String(hex::encode(bytes)),
            Payload::Sequence(items) => Value::Array(
                items
                    .iter()
                    .map(|item| item.render(max_depth, depth + 1))
                    .collect(),
            ),
            Payload::Mapping(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), value.render(max_depth, depth + 1));
                }
                Value::Object(map)
            }
        }
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Payload::Null,
            Value::Bool(b) => Payload::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Payload::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Payload::UInt(u)
                } else {
                    Payload::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Payload::Text(s),
            Value::Array(items) => Payload::Sequence(items.into_iter().map(Payload::from).collect()),
            Value::Object(map) => {
                Payload::Mapping(map.into_iter().map(|(k, v)| (k, Payload::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<bool> for Payload {
    fn from(b: bool) -> Self {
        Payload::Bool(b)
    }
}

impl From<i32> for Payload {
    fn from(i: i32) -> Self {
        Payload::Int(i64::from(i))
    }
}

impl From<i64> for Payload {
    fn from(i: i64) -> Self {
        Payload::Int(i)
    }
}

impl From<u32> for Payload {
    fn from(u: u32) -> Self {
        Payload::UInt(u64::from(u))
    }
}

impl From<u64> for Payload {
    fn from(u: u64) -> Self {
        Payload::UInt(u)
    }
}

impl From<f64> for Payload {
    fn from(f: f64) -> Self {
        Payload::Float(f)
    }
}

impl From<DateTime<Utc>> for Payload {
    fn from(at: DateTime<Utc>) -> Self {
        Payload::Timestamp(at)
    }
}

impl From<NaiveDate> for Payload {
    fn from(d: NaiveDate) -> Self {
        Payload::Date(d)
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Payload::Null)
    }
}

impl<T: Into<Payload>> From<Vec<T>> for Payload {
    fn from(items: Vec<T>) -> Self {
        Payload::Sequence(items.into_iter().map(Into::into).collect())
    }
}
