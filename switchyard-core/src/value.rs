//! Preference values and their classes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The value carried by a preference.
///
/// Serialized as plain JSON. Integers and floats keep their numeric type
/// through a round trip; `Null` is the absent value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum PreferenceValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<PreferenceValue>),
    Map(BTreeMap<String, PreferenceValue>),
}

impl PreferenceValue {
    /// The class this value belongs to, as checked by the value class policy.
    pub fn class(&self) -> ValueClass {
        match self {
            PreferenceValue::Null => ValueClass::Null,
            PreferenceValue::Bool(true) => ValueClass::True,
            PreferenceValue::Bool(false) => ValueClass::False,
            PreferenceValue::Integer(_) | PreferenceValue::Float(_) => ValueClass::Numeric,
            PreferenceValue::Text(_) => ValueClass::Text,
            PreferenceValue::List(_) => ValueClass::List,
            PreferenceValue::Map(_) => ValueClass::Map,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PreferenceValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PreferenceValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PreferenceValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PreferenceValue::Integer(i) => Some(*i as f64),
            PreferenceValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PreferenceValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The first NaN or infinite float in the value, searching nested lists
    /// and maps. Such floats have no JSON form and cannot be stored.
    pub fn non_finite(&self) -> Option<f64> {
        match self {
            PreferenceValue::Float(f) if !f.is_finite() => Some(*f),
            PreferenceValue::List(items) => items.iter().find_map(Self::non_finite),
            PreferenceValue::Map(map) => map.values().find_map(Self::non_finite),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for PreferenceValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PreferenceValue::Null,
            serde_json::Value::Bool(b) => PreferenceValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => PreferenceValue::Integer(i),
                None => PreferenceValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => PreferenceValue::Text(s),
            serde_json::Value::Array(items) => {
                PreferenceValue::List(items.into_iter().map(PreferenceValue::from).collect())
            }
            serde_json::Value::Object(map) => PreferenceValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, PreferenceValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<PreferenceValue> for serde_json::Value {
    fn from(value: PreferenceValue) -> Self {
        match value {
            PreferenceValue::Null => serde_json::Value::Null,
            PreferenceValue::Bool(b) => serde_json::Value::Bool(b),
            PreferenceValue::Integer(i) => serde_json::Value::Number(i.into()),
            // Writes reject non-finite floats, so null here is unreachable
            // for stored values.
            PreferenceValue::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            PreferenceValue::Text(s) => serde_json::Value::String(s),
            PreferenceValue::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            PreferenceValue::Map(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<bool> for PreferenceValue {
    fn from(value: bool) -> Self {
        PreferenceValue::Bool(value)
    }
}

impl From<i64> for PreferenceValue {
    fn from(value: i64) -> Self {
        PreferenceValue::Integer(value)
    }
}

impl From<i32> for PreferenceValue {
    fn from(value: i32) -> Self {
        PreferenceValue::Integer(value.into())
    }
}

impl From<f64> for PreferenceValue {
    fn from(value: f64) -> Self {
        PreferenceValue::Float(value)
    }
}

impl From<&str> for PreferenceValue {
    fn from(value: &str) -> Self {
        PreferenceValue::Text(value.to_string())
    }
}

impl From<String> for PreferenceValue {
    fn from(value: String) -> Self {
        PreferenceValue::Text(value)
    }
}

impl<T: Into<PreferenceValue>> From<Option<T>> for PreferenceValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(PreferenceValue::Null)
    }
}

/// Class of a preference value, the unit the whitelist is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueClass {
    Text,
    /// Integers and floats.
    Numeric,
    True,
    False,
    Null,
    List,
    Map,
}

impl ValueClass {
    pub const ALL: [ValueClass; 7] = [
        ValueClass::Text,
        ValueClass::Numeric,
        ValueClass::True,
        ValueClass::False,
        ValueClass::Null,
        ValueClass::List,
        ValueClass::Map,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ValueClass::Text => "text",
            ValueClass::Numeric => "numeric",
            ValueClass::True => "true",
            ValueClass::False => "false",
            ValueClass::Null => "null",
            ValueClass::List => "list",
            ValueClass::Map => "map",
        }
    }
}

impl fmt::Display for ValueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
