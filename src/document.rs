//! Document entity
//!
//! A document is an instance of one document type of a data contract. Its
//! user data is held as a [`ValueMap`]; the system fields live beside it.
//! Two projections exist: the typed platform object used at the storage
//! boundary and JSON used at the wire boundary. Both are lossless.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::consensus::ConsensusError;
use crate::data_contract::{DocumentType, PROPERTY_CREATED_AT, PROPERTY_ID, PROPERTY_OWNER_ID, PROPERTY_UPDATED_AT};
use crate::error::DocumentError;
use crate::types::{Identifier, TimestampMillis};
use crate::validation::ValidationResult;
use crate::value::{get_path, Value, ValueMap};

pub const PROPERTY_DATA_CONTRACT_ID: &str = "$dataContractId";
pub const PROPERTY_TYPE: &str = "$type";
pub const PROPERTY_REVISION: &str = "$revision";

/// Revision of a freshly created document
pub const INITIAL_REVISION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Identifier,
    pub data_contract_id: Identifier,
    pub document_type: String,
    pub owner_id: Identifier,
    pub revision: u64,
    pub created_at: Option<TimestampMillis>,
    pub updated_at: Option<TimestampMillis>,
    pub data: ValueMap,
}

impl Document {
    /// A system field by its `$` name, or a data field by dotted path
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            PROPERTY_ID => Some(Value::Identifier(self.id)),
            PROPERTY_OWNER_ID => Some(Value::Identifier(self.owner_id)),
            PROPERTY_DATA_CONTRACT_ID => Some(Value::Identifier(self.data_contract_id)),
            PROPERTY_TYPE => Some(Value::Text(self.document_type.clone())),
            PROPERTY_REVISION => Some(Value::from_unsigned(self.revision)),
            PROPERTY_CREATED_AT => self.created_at.map(Value::from_unsigned),
            PROPERTY_UPDATED_AT => self.updated_at.map(Value::from_unsigned),
            _ => get_path(&self.data, name).cloned(),
        }
    }

    /// Typed platform object: system fields under `$` keys beside the data
    pub fn to_object(&self) -> Value {
        let mut map = self.data.clone();
        map.insert(PROPERTY_ID.to_string(), Value::Identifier(self.id));
        map.insert(PROPERTY_DATA_CONTRACT_ID.to_string(), Value::Identifier(self.data_contract_id));
        map.insert(PROPERTY_TYPE.to_string(), Value::Text(self.document_type.clone()));
        map.insert(PROPERTY_OWNER_ID.to_string(), Value::Identifier(self.owner_id));
        map.insert(PROPERTY_REVISION.to_string(), Value::from_unsigned(self.revision));
        if let Some(created_at) = self.created_at {
            map.insert(PROPERTY_CREATED_AT.to_string(), Value::from_unsigned(created_at));
        }
        if let Some(updated_at) = self.updated_at {
            map.insert(PROPERTY_UPDATED_AT.to_string(), Value::from_unsigned(updated_at));
        }
        Value::Map(map)
    }

    pub fn from_object(object: Value) -> Result<Self, DocumentError> {
        let mut map = match object {
            Value::Map(map) => map,
            other => {
                return Err(DocumentError::InvalidFieldValue {
                    path: String::new(),
                    reason: format!("expected object, got {}", other.type_name()),
                })
            }
        };

        let id = take_identifier(&mut map, PROPERTY_ID)?;
        let data_contract_id = take_identifier(&mut map, PROPERTY_DATA_CONTRACT_ID)?;
        let owner_id = take_identifier(&mut map, PROPERTY_OWNER_ID)?;
        let document_type = match map.remove(PROPERTY_TYPE) {
            Some(Value::Text(text)) => text,
            Some(other) => return Err(type_error(PROPERTY_TYPE, "string", &other)),
            None => return Err(missing(PROPERTY_TYPE)),
        };
        let revision = take_unsigned(&mut map, PROPERTY_REVISION)?.ok_or_else(|| missing(PROPERTY_REVISION))?;
        let created_at = take_unsigned(&mut map, PROPERTY_CREATED_AT)?;
        let updated_at = take_unsigned(&mut map, PROPERTY_UPDATED_AT)?;

        Ok(Self {
            id,
            data_contract_id,
            document_type,
            owner_id,
            revision,
            created_at,
            updated_at,
            data: map,
        })
    }

    /// JSON projection: identifiers as hex, byte arrays as base64
    pub fn to_json(&self) -> JsonValue {
        self.to_object().to_json()
    }

    /// Decode the JSON projection; the document type restores binary fields
    pub fn from_json(json: &JsonValue, document_type: &DocumentType) -> Result<Self, DocumentError> {
        let object = json.as_object().ok_or_else(|| DocumentError::InvalidFieldValue {
            path: String::new(),
            reason: "expected object".to_string(),
        })?;

        let mut system = Map::new();
        let mut data = Map::new();
        for (key, value) in object {
            if key.starts_with('$') {
                system.insert(key.clone(), value.clone());
            } else {
                data.insert(key.clone(), value.clone());
            }
        }

        let mut map = document_type.field_accessor().data_from_json(&data)?;
        for (key, value) in system {
            let decoded = match key.as_str() {
                PROPERTY_ID | PROPERTY_DATA_CONTRACT_ID | PROPERTY_OWNER_ID => {
                    let text = value.as_str().ok_or_else(|| DocumentError::InvalidFieldValue {
                        path: key.clone(),
                        reason: "expected hex identifier".to_string(),
                    })?;
                    Value::Identifier(Identifier::from_hex(text)?)
                }
                _ => Value::from_json(&value),
            };
            map.insert(key, decoded);
        }

        Self::from_object(Value::Map(map))
    }
}

fn missing(field: &str) -> DocumentError {
    DocumentError::MissingField {
        field: field.to_string(),
    }
}

fn type_error(field: &str, expected: &str, actual: &Value) -> DocumentError {
    DocumentError::InvalidFieldValue {
        path: field.to_string(),
        reason: format!("expected {}, got {}", expected, actual.type_name()),
    }
}

fn take_identifier(map: &mut ValueMap, field: &str) -> Result<Identifier, DocumentError> {
    match map.remove(field) {
        Some(Value::Identifier(id)) => Ok(id),
        Some(Value::Bytes(bytes)) => Identifier::from_slice(&bytes),
        Some(other) => Err(type_error(field, "identifier", &other)),
        None => Err(missing(field)),
    }
}

fn take_unsigned(map: &mut ValueMap, field: &str) -> Result<Option<u64>, DocumentError> {
    match map.remove(field) {
        Some(Value::Integer(i)) => u64::try_from(i)
            .map(Some)
            .map_err(|_| DocumentError::InvalidFieldValue {
                path: field.to_string(),
                reason: "must not be negative".to_string(),
            }),
        Some(Value::Unsigned(n)) => Ok(Some(n)),
        Some(other) => Err(type_error(field, "integer", &other)),
        None => Ok(None),
    }
}

/// Check document data against its type's schema
///
/// Required `$` properties are timestamps and are checked by the batch
/// validator instead.
pub fn validate_document_data(document_type: &DocumentType, data: &ValueMap) -> ValidationResult {
    let mut result = ValidationResult::new();

    for name in document_type.required() {
        if !name.starts_with('$') && !data.contains_key(name) {
            result.add_error(schema_error("", "required", format!("must have required property '{}'", name)));
        }
    }

    for (name, value) in data {
        let path = format!("/{}", name);
        match document_type.property(name) {
            Some(schema) => validate_value(&path, schema, value, &mut result),
            None => result.add_error(schema_error(
                "",
                "additionalProperties",
                format!("must NOT have additional property '{}'", name),
            )),
        }
    }

    result
}

fn schema_error(path: &str, keyword: &str, message: String) -> ConsensusError {
    ConsensusError::JsonSchema {
        instance_path: path.to_string(),
        keyword: keyword.to_string(),
        message,
    }
}

fn validate_value(path: &str, schema: &JsonValue, value: &Value, result: &mut ValidationResult) {
    if let Some(allowed) = schema.get("enum").and_then(JsonValue::as_array) {
        if !allowed.contains(&value.to_json()) {
            result.add_error(schema_error(path, "enum", "must be equal to one of the allowed values".to_string()));
            return;
        }
    }

    let expected = match schema.get("type").and_then(JsonValue::as_str) {
        Some(expected) => expected,
        None => return,
    };
    let byte_array = schema.get("byteArray").and_then(JsonValue::as_bool) == Some(true);

    match (expected, value) {
        ("string", Value::Text(text)) => {
            let length = text.chars().count() as u64;
            check_bounds(path, schema, "minLength", "maxLength", length, result);
        }
        ("integer", Value::Integer(i)) => check_range(path, schema, *i as f64, result),
        ("number", Value::Integer(i)) => check_range(path, schema, *i as f64, result),
        ("integer", Value::Unsigned(n)) | ("number", Value::Unsigned(n)) => {
            check_range(path, schema, *n as f64, result)
        }
        ("number", Value::Float(f)) => check_range(path, schema, *f, result),
        ("boolean", Value::Bool(_)) | ("null", Value::Null) => {}
        ("object", Value::Map(map)) => validate_object(path, schema, map, result),
        ("array", Value::Bytes(_)) | ("array", Value::Identifier(_)) if byte_array => {
            let length = value.as_bytes().map_or(0, |b| b.len()) as u64;
            check_bounds(path, schema, "minItems", "maxItems", length, result);
        }
        ("array", Value::Array(items)) if !byte_array => {
            check_bounds(path, schema, "minItems", "maxItems", items.len() as u64, result);
            let prefix = schema.get("prefixItems").and_then(JsonValue::as_array);
            for (i, item) in items.iter().enumerate() {
                let item_schema = prefix
                    .and_then(|p| p.get(i))
                    .or_else(|| schema.get("items").filter(|s| s.is_object()));
                if let Some(item_schema) = item_schema {
                    validate_value(&format!("{}/{}", path, i), item_schema, item, result);
                }
            }
        }
        _ => {
            let expected = if byte_array { "byteArray" } else { expected };
            result.add_error(schema_error(
                path,
                "type",
                format!("must be {}, got {}", expected, value.type_name()),
            ));
        }
    }
}

fn validate_object(path: &str, schema: &JsonValue, map: &ValueMap, result: &mut ValidationResult) {
    let properties = schema.get("properties").and_then(JsonValue::as_object);

    if let Some(required) = schema.get("required").and_then(JsonValue::as_array) {
        for name in required.iter().filter_map(JsonValue::as_str) {
            if !map.contains_key(name) {
                result.add_error(schema_error(path, "required", format!("must have required property '{}'", name)));
            }
        }
    }

    for (name, value) in map {
        let inner_path = format!("{}/{}", path, name);
        match properties.and_then(|p| p.get(name)) {
            Some(inner) => validate_value(&inner_path, inner, value, result),
            None => result.add_error(schema_error(
                path,
                "additionalProperties",
                format!("must NOT have additional property '{}'", name),
            )),
        }
    }
}

fn check_bounds(path: &str, schema: &JsonValue, min_key: &str, max_key: &str, actual: u64, result: &mut ValidationResult) {
    if let Some(min) = schema.get(min_key).and_then(JsonValue::as_u64) {
        if actual < min {
            result.add_error(schema_error(path, min_key, format!("must NOT have fewer than {}", min)));
        }
    }
    if let Some(max) = schema.get(max_key).and_then(JsonValue::as_u64) {
        if actual > max {
            result.add_error(schema_error(path, max_key, format!("must NOT have more than {}", max)));
        }
    }
}

fn check_range(path: &str, schema: &JsonValue, actual: f64, result: &mut ValidationResult) {
    if let Some(min) = schema.get("minimum").and_then(JsonValue::as_f64) {
        if actual < min {
            result.add_error(schema_error(path, "minimum", format!("must be >= {}", min)));
        }
    }
    if let Some(max) = schema.get("maximum").and_then(JsonValue::as_f64) {
        if actual > max {
            result.add_error(schema_error(path, "maximum", format!("must be <= {}", max)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn note_type() -> DocumentType {
        let schema = json!({
            "type": "object",
            "properties": {
                "message": { "type": "string", "maxLength": 5 },
                "attachment": { "type": "array", "byteArray": true, "maxItems": 4 }
            },
            "required": ["message", "$createdAt"],
            "additionalProperties": false
        });
        DocumentType::from_schema("note", &schema, &serde_json::Map::new()).unwrap()
    }

    fn note() -> Document {
        let mut data = BTreeMap::new();
        data.insert("message".to_string(), Value::Text("hi".to_string()));
        data.insert("attachment".to_string(), Value::Bytes(vec![1, 2]));
        Document {
            id: Identifier::new([1; 32]),
            data_contract_id: Identifier::new([2; 32]),
            document_type: "note".to_string(),
            owner_id: Identifier::new([3; 32]),
            revision: 1,
            created_at: Some(1_000),
            updated_at: None,
            data,
        }
    }

    #[test]
    fn test_json_round_trip_restores_bytes() {
        let document = note();
        let decoded = Document::from_json(&document.to_json(), &note_type()).unwrap();
        assert_eq!(decoded, document);
    }

    #[test]
    fn test_object_round_trip() {
        let document = note();
        assert_eq!(Document::from_object(document.to_object()).unwrap(), document);
    }

    #[test]
    fn test_property_reads_system_fields() {
        let document = note();
        assert_eq!(document.property("$ownerId"), Some(Value::Identifier(Identifier::new([3; 32]))));
        assert_eq!(document.property("$updatedAt"), None);
        assert_eq!(document.property("message"), Some(Value::Text("hi".to_string())));
    }

    #[test]
    fn test_data_validation() {
        let document_type = note_type();
        assert!(validate_document_data(&document_type, &note().data).is_valid());

        let mut data = note().data;
        data.insert("message".to_string(), Value::Text("too long".to_string()));
        data.insert("extra".to_string(), Value::Bool(true));
        data.remove("attachment");
        let result = validate_document_data(&document_type, &data);
        assert_eq!(result.codes(), vec![1004, 1004]);
    }
}
