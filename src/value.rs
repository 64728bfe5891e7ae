//! Platform value model
//!
//! Document data is JSON-shaped but must keep raw byte arrays and
//! identifiers distinct from text, so it is held as a [`Value`] tree rather
//! than `serde_json::Value`. The JSON projection encodes identifiers as hex
//! and byte arrays as base64; decoding back requires the schema (see
//! [`crate::field_accessor::DocumentFieldAccessor`]).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DocumentError;
use crate::types::Identifier;

/// Map of named platform values
pub type ValueMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Identifier(Identifier),
    Array(Vec<Value>),
    Map(ValueMap),
    /// Integer above `i64::MAX`; smaller values are always `Integer`
    Unsigned(u64),
}

impl Value {
    /// Name of the JSON type this value projects to
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) | Value::Unsigned(_) => "integer",
            Value::Float(_) => "number",
            Value::Text(_) => "string",
            Value::Bytes(_) | Value::Identifier(_) => "byteArray",
            Value::Array(_) => "array",
            Value::Map(_) => "object",
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Canonical value for an unsigned integer
    pub fn from_unsigned(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Unsigned(n),
        }
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            Value::Integer(i) => u64::try_from(*i).ok(),
            Value::Unsigned(n) => Some(*n),
            _ => None,
        }
    }

    /// Raw bytes of a byte array or identifier value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            Value::Identifier(id) => Some(id.as_bytes()),
            _ => None,
        }
    }

    /// Convert JSON into a value without any schema-driven coercion
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Value::Integer(i),
                (None, Some(u)) => Value::Unsigned(u),
                (None, None) => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// JSON projection: identifiers as hex, byte arrays as base64
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Unsigned(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(bytes) => serde_json::Value::String(BASE64.encode(bytes)),
            Value::Identifier(id) => serde_json::Value::String(id.to_hex()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Decode base64 text into a byte array value
    pub fn bytes_from_base64(path: &str, text: &str) -> Result<Value, DocumentError> {
        BASE64
            .decode(text)
            .map(Value::Bytes)
            .map_err(|e| DocumentError::InvalidFieldValue {
                path: path.to_string(),
                reason: format!("invalid base64: {}", e),
            })
    }
}

/// Look up a dotted path inside a value map
pub fn get_path<'a>(map: &'a ValueMap, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = map.get(first)?;
    for segment in segments {
        current = current.as_map()?.get(segment)?;
    }
    Some(current)
}

/// Assign a value at a dotted path, creating intermediate maps as needed
pub fn set_path(map: &mut ValueMap, path: &str, value: Value) -> Result<(), DocumentError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(DocumentError::InvalidFieldValue {
            path: path.to_string(),
            reason: "empty path segment".to_string(),
        });
    }

    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => {
            return Err(DocumentError::InvalidFieldValue {
                path: path.to_string(),
                reason: "empty path".to_string(),
            })
        }
    };

    let mut current = map;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Map(ValueMap::new()));
        current = match entry {
            Value::Map(inner) => inner,
            other => {
                return Err(DocumentError::InvalidFieldValue {
                    path: path.to_string(),
                    reason: format!("'{}' is a {}, not an object", segment, other.type_name()),
                })
            }
        };
    }
    current.insert(last.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_nested_path() {
        let mut map = ValueMap::new();
        set_path(&mut map, "profile.name", Value::Text("alice".to_string())).unwrap();
        assert_eq!(
            get_path(&map, "profile.name"),
            Some(&Value::Text("alice".to_string()))
        );
        assert!(get_path(&map, "profile.missing").is_none());
    }

    #[test]
    fn test_set_path_through_scalar_fails() {
        let mut map = ValueMap::new();
        map.insert("name".to_string(), Value::Integer(1));
        assert!(set_path(&mut map, "name.first", Value::Null).is_err());
    }

    #[test]
    fn test_unsigned_values_stay_canonical() {
        assert_eq!(Value::from_unsigned(7), Value::Integer(7));
        assert_eq!(Value::from_unsigned(u64::MAX), Value::Unsigned(u64::MAX));
        assert_eq!(Value::from_unsigned(u64::MAX).as_unsigned(), Some(u64::MAX));
        assert_eq!(Value::Integer(-1).as_unsigned(), None);

        let json = serde_json::json!(u64::MAX);
        assert_eq!(Value::from_json(&json), Value::Unsigned(u64::MAX));
        assert_eq!(Value::Unsigned(u64::MAX).to_json(), json);
    }

    #[test]
    fn test_json_projection_encodes_bytes() {
        let value = Value::Bytes(vec![1, 2, 3]);
        assert_eq!(value.to_json(), serde_json::json!("AQID"));
        let id = Value::Identifier(Identifier::new([0xab; 32]));
        assert_eq!(id.to_json(), serde_json::json!("ab".repeat(32)));
    }
}
