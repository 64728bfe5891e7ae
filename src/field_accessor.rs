//! Schema-driven field coercion
//!
//! Identifier and byte-array fields cannot be told apart from text or
//! integer arrays once projected to JSON. The accessor is compiled once per
//! document type and knows, for every dotted path, which coercion applies.

use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

use crate::data_contract::IDENTIFIER_MEDIA_TYPE;
use crate::error::DocumentError;
use crate::types::Identifier;
use crate::value::{get_path, set_path, Value, ValueMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    Identifier,
    ByteArray,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFieldAccessor {
    rules: BTreeMap<String, FieldRule>,
}

impl DocumentFieldAccessor {
    /// Compile coercion rules from resolved property schemas
    pub fn compile(properties: &BTreeMap<String, JsonValue>) -> Self {
        let mut rules = BTreeMap::new();
        for (name, schema) in properties {
            collect_rules(name, schema, &mut rules);
        }
        Self { rules }
    }

    pub fn rule(&self, path: &str) -> Option<FieldRule> {
        self.rules.get(path).copied()
    }

    pub fn rules(&self) -> impl Iterator<Item = (&str, FieldRule)> {
        self.rules.iter().map(|(path, rule)| (path.as_str(), *rule))
    }

    /// True if some coerced field lives below `path`
    fn is_prefix_of_rule(&self, path: &str) -> bool {
        let prefix = format!("{}.", path);
        self.rules
            .range(prefix.clone()..)
            .next()
            .map_or(false, |(candidate, _)| candidate.starts_with(&prefix))
    }

    /// Normalize a value for the field at `path`
    pub fn coerce(&self, path: &str, value: Value) -> Result<Value, DocumentError> {
        match self.rule(path) {
            Some(FieldRule::Identifier) => coerce_identifier(path, value),
            Some(FieldRule::ByteArray) => coerce_byte_array(path, value),
            None => match value {
                Value::Map(map) if self.is_prefix_of_rule(path) => {
                    let mut coerced = ValueMap::new();
                    for (key, inner) in map {
                        let inner_path = format!("{}.{}", path, key);
                        coerced.insert(key, self.coerce(&inner_path, inner)?);
                    }
                    Ok(Value::Map(coerced))
                }
                other => Ok(other),
            },
        }
    }

    /// Coerce and assign a value at a dotted path
    pub fn set(&self, data: &mut ValueMap, path: &str, value: Value) -> Result<(), DocumentError> {
        let coerced = self.coerce(path, value)?;
        set_path(data, path, coerced)
    }

    pub fn get<'a>(&self, data: &'a ValueMap, path: &str) -> Option<&'a Value> {
        get_path(data, path)
    }

    /// Decode a JSON data object, restoring identifiers and byte arrays
    pub fn data_from_json(&self, json: &Map<String, JsonValue>) -> Result<ValueMap, DocumentError> {
        let mut data = ValueMap::new();
        for (name, raw) in json {
            let value = self.coerce(name, Value::from_json(raw))?;
            data.insert(name.clone(), value);
        }
        Ok(data)
    }
}

fn collect_rules(path: &str, schema: &JsonValue, rules: &mut BTreeMap<String, FieldRule>) {
    if schema.get("byteArray").and_then(JsonValue::as_bool) == Some(true) {
        let is_identifier =
            schema.get("contentMediaType").and_then(JsonValue::as_str) == Some(IDENTIFIER_MEDIA_TYPE);
        let rule = if is_identifier {
            FieldRule::Identifier
        } else {
            FieldRule::ByteArray
        };
        rules.insert(path.to_string(), rule);
        return;
    }

    if let Some(nested) = schema.get("properties").and_then(JsonValue::as_object) {
        for (name, inner) in nested {
            collect_rules(&format!("{}.{}", path, name), inner, rules);
        }
    }
}

fn coerce_identifier(path: &str, value: Value) -> Result<Value, DocumentError> {
    let invalid = |reason: String| DocumentError::InvalidFieldValue {
        path: path.to_string(),
        reason,
    };

    match value {
        Value::Identifier(_) | Value::Null => Ok(value),
        Value::Bytes(bytes) => Identifier::from_slice(&bytes)
            .map(Value::Identifier)
            .map_err(|e| invalid(e.to_string())),
        Value::Text(text) => Identifier::from_hex(&text)
            .map(Value::Identifier)
            .map_err(|e| invalid(e.to_string())),
        Value::Array(items) => {
            let bytes = bytes_from_integers(path, &items)?;
            Identifier::from_slice(&bytes)
                .map(Value::Identifier)
                .map_err(|e| invalid(e.to_string()))
        }
        other => Err(invalid(format!("expected identifier, got {}", other.type_name()))),
    }
}

fn coerce_byte_array(path: &str, value: Value) -> Result<Value, DocumentError> {
    match value {
        Value::Bytes(_) | Value::Null => Ok(value),
        Value::Identifier(id) => Ok(Value::Bytes(id.as_bytes().to_vec())),
        Value::Text(text) => Value::bytes_from_base64(path, &text),
        Value::Array(items) => bytes_from_integers(path, &items).map(Value::Bytes),
        other => Err(DocumentError::InvalidFieldValue {
            path: path.to_string(),
            reason: format!("expected byte array, got {}", other.type_name()),
        }),
    }
}

fn bytes_from_integers(path: &str, items: &[Value]) -> Result<Vec<u8>, DocumentError> {
    items
        .iter()
        .map(|item| {
            item.as_integer()
                .and_then(|i| u8::try_from(i).ok())
                .ok_or_else(|| DocumentError::InvalidFieldValue {
                    path: path.to_string(),
                    reason: "byte array items must be integers in 0..=255".to_string(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn accessor() -> DocumentFieldAccessor {
        let properties: BTreeMap<String, JsonValue> = [
            (
                "recipient".to_string(),
                json!({
                    "type": "array", "byteArray": true, "minItems": 32, "maxItems": 32,
                    "contentMediaType": "application/x.dash.dpp.identifier"
                }),
            ),
            (
                "meta".to_string(),
                json!({
                    "type": "object",
                    "properties": { "avatar": { "type": "array", "byteArray": true } },
                    "additionalProperties": false
                }),
            ),
            ("label".to_string(), json!({ "type": "string", "maxLength": 10 })),
        ]
        .into_iter()
        .collect();
        DocumentFieldAccessor::compile(&properties)
    }

    #[test]
    fn test_compile_finds_nested_rules() {
        let accessor = accessor();
        assert_eq!(accessor.rule("recipient"), Some(FieldRule::Identifier));
        assert_eq!(accessor.rule("meta.avatar"), Some(FieldRule::ByteArray));
        assert_eq!(accessor.rule("label"), None);
    }

    #[test]
    fn test_identifier_accepts_bytes_and_hex() {
        let accessor = accessor();
        let id = Identifier::new([4; 32]);
        assert_eq!(
            accessor.coerce("recipient", Value::Bytes(vec![4; 32])).unwrap(),
            Value::Identifier(id)
        );
        assert_eq!(
            accessor.coerce("recipient", Value::Text(id.to_hex())).unwrap(),
            Value::Identifier(id)
        );
        assert!(accessor.coerce("recipient", Value::Bytes(vec![4; 31])).is_err());
    }

    #[test]
    fn test_set_on_prefix_coerces_nested_fields() {
        let accessor = accessor();
        let mut data = ValueMap::new();
        let mut meta = ValueMap::new();
        meta.insert("avatar".to_string(), Value::Text("AQID".to_string()));

        accessor.set(&mut data, "meta", Value::Map(meta)).unwrap();
        assert_eq!(
            accessor.get(&data, "meta.avatar"),
            Some(&Value::Bytes(vec![1, 2, 3]))
        );
    }

    #[test]
    fn test_integer_array_becomes_bytes() {
        let accessor = accessor();
        let value = Value::Array(vec![Value::Integer(1), Value::Integer(255)]);
        assert_eq!(
            accessor.coerce("meta.avatar", value).unwrap(),
            Value::Bytes(vec![1, 255])
        );
        let bad = Value::Array(vec![Value::Integer(256)]);
        assert!(accessor.coerce("meta.avatar", bad).is_err());
    }
}
