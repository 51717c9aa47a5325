//! JSON-safe values for tool results.
//!
//! Tool handlers build a `ToolValue` and the chat driver converts it to
//! `serde_json::Value` with total, explicit rules: sequences and maps recurse,
//! non-finite floats and opaque values become strings.

use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub enum ToolValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Seq(Vec<ToolValue>),
    Map(BTreeMap<String, ToolValue>),
    /// Something with no JSON shape; carried as its display string.
    Opaque(String),
}

impl ToolValue {
    pub fn opaque(value: impl Display) -> Self {
        ToolValue::Opaque(value.to_string())
    }

    /// Unordered collection: elements are sorted by their rendered JSON so
    /// the output is stable across runs.
    pub fn set<I: IntoIterator<Item = ToolValue>>(items: I) -> Self {
        let mut keyed: Vec<(String, ToolValue)> = items
            .into_iter()
            .map(|v| (Value::from(v.clone()).to_string(), v))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        ToolValue::Seq(keyed.into_iter().map(|(_, v)| v).collect())
    }

    pub fn map<K: Into<String>, I: IntoIterator<Item = (K, ToolValue)>>(pairs: I) -> Self {
        ToolValue::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn into_json(self) -> Value {
        self.into()
    }
}

impl From<ToolValue> for Value {
    fn from(v: ToolValue) -> Self {
        match v {
            ToolValue::Null => Value::Null,
            ToolValue::Bool(b) => Value::Bool(b),
            ToolValue::Int(i) => Value::Number(i.into()),
            ToolValue::Float(f) => match Number::from_f64(f) {
                Some(n) => Value::Number(n),
                None => Value::String(f.to_string()),
            },
            ToolValue::Text(s) | ToolValue::Opaque(s) => Value::String(s),
            ToolValue::Seq(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            ToolValue::Map(entries) => {
                let map: Map<String, Value> =
                    entries.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
                Value::Object(map)
            }
        }
    }
}

impl From<Value> for ToolValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => ToolValue::Null,
            Value::Bool(b) => ToolValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ToolValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    ToolValue::Float(f)
                } else {
                    ToolValue::Opaque(n.to_string())
                }
            }
            Value::String(s) => ToolValue::Text(s),
            Value::Array(items) => ToolValue::Seq(items.into_iter().map(ToolValue::from).collect()),
            Value::Object(map) => {
                ToolValue::Map(map.into_iter().map(|(k, v)| (k, ToolValue::from(v))).collect())
            }
        }
    }
}

impl From<bool> for ToolValue {
    fn from(b: bool) -> Self {
        ToolValue::Bool(b)
    }
}

impl From<i64> for ToolValue {
    fn from(i: i64) -> Self {
        ToolValue::Int(i)
    }
}

impl From<usize> for ToolValue {
    fn from(n: usize) -> Self {
        match i64::try_from(n) {
            Ok(i) => ToolValue::Int(i),
            Err(_) => ToolValue::Opaque(n.to_string()),
        }
    }
}

impl From<f64> for ToolValue {
    fn from(f: f64) -> Self {
        ToolValue::Float(f)
    }
}

impl From<&str> for ToolValue {
    fn from(s: &str) -> Self {
        ToolValue::Text(s.to_string())
    }
}

impl From<String> for ToolValue {
    fn from(s: String) -> Self {
        ToolValue::Text(s)
    }
}

impl<T: Into<ToolValue>> From<Option<T>> for ToolValue {
    fn from(o: Option<T>) -> Self {
        o.map_or(ToolValue::Null, Into::into)
    }
}

impl<T: Into<ToolValue>> From<Vec<T>> for ToolValue {
    fn from(items: Vec<T>) -> Self {
        ToolValue::Seq(items.into_iter().map(Into::into).collect())
    }
}
