//! Definition value trees
//!
//! Container definitions carry arbitrary YAML/JSON shaped values. Only string
//! leaves (and mapping keys) take part in placeholder substitution.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::container::StringValueResolver;
use crate::error::Result;

/// A definition value that may contain `${...}` placeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Null value, also produced when a string resolves to the null marker
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value (may contain placeholders like ${db.host})
    String(String),
    /// Sequence of values
    Sequence(Vec<Value>),
    /// Mapping of string keys to values
    Mapping(IndexMap<String, Value>),
}

impl Value {
    /// Get as str if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as mapping if this is a Mapping
    pub fn as_mapping(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a direct child of a mapping
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Resolve placeholders in every string leaf and mapping key, in place
    ///
    /// A leaf resolving to "no value" becomes `Value::Null`. A key resolving
    /// to "no value" keeps its original text.
    pub fn resolve_strings(&mut self, resolver: &dyn StringValueResolver) -> Result<()> {
        match self {
            Value::String(s) => {
                let resolved = resolver.resolve_string_value(s)?;
                *self = match resolved {
                    Some(text) => Value::String(text),
                    None => Value::Null,
                };
            }
            Value::Sequence(items) => {
                for item in items.iter_mut() {
                    item.resolve_strings(resolver)?;
                }
            }
            Value::Mapping(map) => {
                let entries = std::mem::take(map);
                for (key, mut item) in entries {
                    let key = resolver.resolve_string_value(&key)?.unwrap_or(key);
                    item.resolve_strings(resolver)?;
                    map.insert(key, item);
                }
            }
            Value::Null | Value::Bool(_) | Value::Integer(_) | Value::Float(_) => {}
        }
        Ok(())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::Mapping(m)
    }
}
