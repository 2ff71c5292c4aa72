//! Untyped expression results and their conversion to and from JSON.

use cel_interpreter::Value;
use cel_interpreter::objects::{Key, Map};
use core::fmt::{Display, Formatter};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;

/// The result of evaluating an expression, tagged by the kind of value produced.
///
/// Nested values of mappings and sequences stay in evaluator form until a pipeline stage
/// coerces them, so a result that is never coerced is never converted.
#[derive(Debug, Clone)]
pub enum Dynamic {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(Arc<String>),
    Bytes(Arc<Vec<u8>>),
    Mapping(Map),
    Sequence(Arc<Vec<Value>>),

    /// Timestamps, durations and other evaluator values with no direct JSON counterpart.
    Opaque(Value),
}

impl Dynamic {
    /// Short name of the value kind, for log messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "double",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Mapping(_) => "map",
            Self::Sequence(_) => "list",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Whether this is exactly the boolean `true`.
    #[must_use]
    pub const fn is_true(&self) -> bool {
        matches!(self, Self::Bool(true))
    }
}

impl From<Value> for Dynamic {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Int(i) => Self::Int(i),
            Value::UInt(u) => Self::UInt(u),
            Value::Float(f) => Self::Float(f),
            Value::String(s) => Self::String(s),
            Value::Bytes(b) => Self::Bytes(b),
            Value::Map(m) => Self::Mapping(m),
            Value::List(l) => Self::Sequence(l),
            other => Self::Opaque(other),
        }
    }
}

/// A value that has no JSON representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    message: String,
}

impl ConversionError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl Display for ConversionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl core::error::Error for ConversionError {}

/// Converts a JSON value into the evaluator's value model.
#[must_use]
pub fn json_to_cel(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::UInt(u)
            } else {
                n.as_f64().map_or(Value::Null, Value::Float)
            }
        }
        JsonValue::String(s) => Value::String(Arc::new(s.clone())),
        JsonValue::Array(items) => Value::List(Arc::new(items.iter().map(json_to_cel).collect())),
        JsonValue::Object(fields) => {
            let map: HashMap<String, Value> = fields.iter().map(|(k, v)| (k.clone(), json_to_cel(v))).collect();
            Value::Map(Map::from(map))
        }
    }
}

/// Converts an evaluator value into JSON.
///
/// Fails for maps with non-string keys, non-finite doubles, and evaluator-only values such as
/// functions. Timestamps become RFC 3339 strings, durations become `"<seconds>s"` strings and
/// bytes become arrays of numbers.
pub fn cel_to_json(value: &Value) -> Result<JsonValue, ConversionError> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::from(*i),
        Value::UInt(u) => JsonValue::from(*u),
        Value::Float(f) => JsonValue::Number(
            Number::from_f64(*f).ok_or_else(|| ConversionError::new(format!("{f} has no JSON representation")))?,
        ),
        Value::String(s) => JsonValue::String(s.to_string()),
        Value::Bytes(b) => JsonValue::from(b.as_slice()),
        Value::List(items) => JsonValue::Array(items.iter().map(cel_to_json).collect::<Result<_, _>>()?),
        Value::Map(map) => JsonValue::Object(map_to_json(map)?),
        Value::Timestamp(ts) => JsonValue::String(ts.to_rfc3339()),
        Value::Duration(d) => JsonValue::String(format_duration(d)),
        other => return Err(ConversionError::new(format!("value {other:?} has no JSON representation"))),
    })
}

/// Converts an evaluator map into a JSON object, requiring string keys.
pub fn map_to_json(map: &Map) -> Result<JsonMap<String, JsonValue>, ConversionError> {
    let mut object = JsonMap::new();
    for (key, value) in map.map.iter() {
        let Key::String(name) = key else {
            return Err(ConversionError::new(format!("map key {key:?} is not a string")));
        };
        let _ = object.insert(name.to_string(), cel_to_json(value)?);
    }

    Ok(object)
}

pub(crate) fn format_duration(d: &chrono::Duration) -> String {
    let nanos = d.subsec_nanos().unsigned_abs();
    if nanos == 0 {
        format!("{}s", d.num_seconds())
    } else {
        let fraction = format!("{nanos:09}");
        format!("{}.{}s", d.num_seconds(), fraction.trim_end_matches('0'))
    }
}
