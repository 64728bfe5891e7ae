//! Document transitions and the batch that carries them

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::data_contract::{DataContract, DocumentType, PROPERTY_CREATED_AT, PROPERTY_ID, PROPERTY_UPDATED_AT};
use crate::document::{PROPERTY_DATA_CONTRACT_ID, PROPERTY_REVISION, PROPERTY_TYPE};
use crate::error::{DocumentError, ProcessingError};
use crate::types::{Identifier, TimestampMillis};
use crate::value::{get_path, Value, ValueMap};

pub const PROPERTY_ACTION: &str = "$action";
pub const PROPERTY_ENTROPY: &str = "$entropy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentAction {
    Create = 0,
    Replace = 1,
    Delete = 3,
}

impl DocumentAction {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(DocumentAction::Create),
            1 => Some(DocumentAction::Replace),
            3 => Some(DocumentAction::Delete),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentAction::Create => "create",
            DocumentAction::Replace => "replace",
            DocumentAction::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionBase {
    pub id: Identifier,
    pub document_type: String,
    pub data_contract_id: Identifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTransition {
    pub base: TransitionBase,
    pub entropy: [u8; 32],
    pub data: ValueMap,
    pub created_at: Option<TimestampMillis>,
    pub updated_at: Option<TimestampMillis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceTransition {
    pub base: TransitionBase,
    pub revision: u64,
    pub data: ValueMap,
    pub updated_at: Option<TimestampMillis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteTransition {
    pub base: TransitionBase,
}

/// A single create, replace or delete operation on a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocumentTransition {
    Create(CreateTransition),
    Replace(ReplaceTransition),
    Delete(DeleteTransition),
}

impl DocumentTransition {
    pub fn base(&self) -> &TransitionBase {
        match self {
            DocumentTransition::Create(t) => &t.base,
            DocumentTransition::Replace(t) => &t.base,
            DocumentTransition::Delete(t) => &t.base,
        }
    }

    pub fn id(&self) -> Identifier {
        self.base().id
    }

    pub fn document_type(&self) -> &str {
        &self.base().document_type
    }

    pub fn data_contract_id(&self) -> Identifier {
        self.base().data_contract_id
    }

    pub fn action(&self) -> DocumentAction {
        match self {
            DocumentTransition::Create(_) => DocumentAction::Create,
            DocumentTransition::Replace(_) => DocumentAction::Replace,
            DocumentTransition::Delete(_) => DocumentAction::Delete,
        }
    }

    pub fn data(&self) -> Option<&ValueMap> {
        match self {
            DocumentTransition::Create(t) => Some(&t.data),
            DocumentTransition::Replace(t) => Some(&t.data),
            DocumentTransition::Delete(_) => None,
        }
    }

    pub fn created_at(&self) -> Option<TimestampMillis> {
        match self {
            DocumentTransition::Create(t) => t.created_at,
            _ => None,
        }
    }

    pub fn updated_at(&self) -> Option<TimestampMillis> {
        match self {
            DocumentTransition::Create(t) => t.updated_at,
            DocumentTransition::Replace(t) => t.updated_at,
            DocumentTransition::Delete(_) => None,
        }
    }

    /// Value this transition would store for a property, `$ownerId` aside
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            PROPERTY_ID => Some(Value::Identifier(self.id())),
            PROPERTY_CREATED_AT => self.created_at().map(Value::from_unsigned),
            PROPERTY_UPDATED_AT => self.updated_at().map(Value::from_unsigned),
            _ => self.data().and_then(|data| get_path(data, name)).cloned(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        let base = self.base();
        map.insert(PROPERTY_ACTION.to_string(), JsonValue::from(self.action().code()));
        map.insert(PROPERTY_ID.to_string(), JsonValue::String(base.id.to_hex()));
        map.insert(PROPERTY_TYPE.to_string(), JsonValue::String(base.document_type.clone()));
        map.insert(
            PROPERTY_DATA_CONTRACT_ID.to_string(),
            JsonValue::String(base.data_contract_id.to_hex()),
        );

        match self {
            DocumentTransition::Create(t) => {
                map.insert(PROPERTY_ENTROPY.to_string(), JsonValue::String(hex::encode(t.entropy)));
                if let Some(created_at) = t.created_at {
                    map.insert(PROPERTY_CREATED_AT.to_string(), JsonValue::from(created_at));
                }
            }
            DocumentTransition::Replace(t) => {
                map.insert(PROPERTY_REVISION.to_string(), JsonValue::from(t.revision));
            }
            DocumentTransition::Delete(_) => {}
        }

        if let Some(updated_at) = self.updated_at() {
            map.insert(PROPERTY_UPDATED_AT.to_string(), JsonValue::from(updated_at));
        }
        if let Some(data) = self.data() {
            for (key, value) in data {
                map.insert(key.clone(), value.to_json());
            }
        }
        JsonValue::Object(map)
    }

    /// Decode one wire transition; `document_type` restores binary data fields
    pub fn from_json(json: &JsonValue, document_type: Option<&DocumentType>) -> Result<Self, ProcessingError> {
        let object = json.as_object().ok_or_else(|| ProcessingError::MalformedBatch {
            reason: "transition is not an object".to_string(),
        })?;

        let id = hex_identifier(object, PROPERTY_ID)?;
        let base = TransitionBase {
            id,
            document_type: object
                .get(PROPERTY_TYPE)
                .and_then(JsonValue::as_str)
                .ok_or_else(|| missing(PROPERTY_TYPE))?
                .to_string(),
            data_contract_id: hex_identifier(object, PROPERTY_DATA_CONTRACT_ID)?,
        };

        let raw_action = object.get(PROPERTY_ACTION).ok_or_else(|| missing(PROPERTY_ACTION))?;
        let action = raw_action
            .as_u64()
            .and_then(DocumentAction::from_code)
            .ok_or_else(|| ProcessingError::InvalidDocumentAction {
                action: raw_action.to_string(),
                document_id: id.to_hex(),
            })?;

        let data_json: Map<String, JsonValue> = object
            .iter()
            .filter(|(key, _)| !key.starts_with('$'))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let data = match document_type {
            Some(document_type) => document_type.field_accessor().data_from_json(&data_json)?,
            None => data_json
                .iter()
                .map(|(key, value)| (key.clone(), Value::from_json(value)))
                .collect(),
        };

        let created_at = optional_timestamp(object, PROPERTY_CREATED_AT)?;
        let updated_at = optional_timestamp(object, PROPERTY_UPDATED_AT)?;

        // Only creates carry $createdAt; deletes carry no timestamps
        let stray = match action {
            DocumentAction::Create => None,
            DocumentAction::Replace => created_at.map(|_| PROPERTY_CREATED_AT),
            DocumentAction::Delete => created_at
                .map(|_| PROPERTY_CREATED_AT)
                .or_else(|| updated_at.map(|_| PROPERTY_UPDATED_AT)),
        };
        if let Some(field) = stray {
            return Err(ProcessingError::MalformedBatch {
                reason: format!("{} transition {} must not carry {}", action.as_str(), id, field),
            });
        }

        let transition = match action {
            DocumentAction::Create => {
                let entropy_text = object
                    .get(PROPERTY_ENTROPY)
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| missing(PROPERTY_ENTROPY))?;
                let entropy = Identifier::from_hex(entropy_text)?.0;
                DocumentTransition::Create(CreateTransition {
                    base,
                    entropy,
                    data,
                    created_at,
                    updated_at,
                })
            }
            DocumentAction::Replace => {
                let revision = object
                    .get(PROPERTY_REVISION)
                    .and_then(JsonValue::as_u64)
                    .ok_or_else(|| missing(PROPERTY_REVISION))?;
                DocumentTransition::Replace(ReplaceTransition {
                    base,
                    revision,
                    data,
                    updated_at,
                })
            }
            DocumentAction::Delete => DocumentTransition::Delete(DeleteTransition { base }),
        };
        Ok(transition)
    }
}

fn missing(field: &str) -> ProcessingError {
    ProcessingError::Document(DocumentError::MissingField {
        field: field.to_string(),
    })
}

fn hex_identifier(object: &Map<String, JsonValue>, field: &str) -> Result<Identifier, ProcessingError> {
    let text = object
        .get(field)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| missing(field))?;
    Ok(Identifier::from_hex(text)?)
}

fn optional_timestamp(object: &Map<String, JsonValue>, field: &str) -> Result<Option<TimestampMillis>, ProcessingError> {
    match object.get(field) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            ProcessingError::Document(DocumentError::InvalidFieldValue {
                path: field.to_string(),
                reason: "expected millisecond timestamp".to_string(),
            })
        }),
    }
}

/// A signed batch of document transitions from one owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentsBatchTransition {
    pub owner_id: Identifier,
    pub protocol_version: u32,
    pub transitions: Vec<DocumentTransition>,
}

impl DocumentsBatchTransition {
    pub fn new(owner_id: Identifier, transitions: Vec<DocumentTransition>) -> Self {
        Self {
            owner_id,
            protocol_version: 1,
            transitions,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::json!({
            "ownerId": self.owner_id.to_hex(),
            "protocolVersion": self.protocol_version,
            "transitions": self.transitions.iter().map(DocumentTransition::to_json).collect::<Vec<_>>(),
        })
    }

    /// Decode a wire batch; known contracts restore binary data fields
    pub fn from_json(json: &JsonValue, contracts: &[&DataContract]) -> Result<Self, ProcessingError> {
        let object = json.as_object().ok_or_else(|| ProcessingError::MalformedBatch {
            reason: "batch is not an object".to_string(),
        })?;

        let owner_id = hex_identifier(object, "ownerId")?;
        let protocol_version = object
            .get("protocolVersion")
            .and_then(JsonValue::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| missing("protocolVersion"))?;
        let raw_transitions = object
            .get("transitions")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| missing("transitions"))?;

        let mut transitions = Vec::with_capacity(raw_transitions.len());
        for raw in raw_transitions {
            let document_type = lookup_document_type(raw, contracts);
            transitions.push(DocumentTransition::from_json(raw, document_type)?);
        }

        Ok(Self {
            owner_id,
            protocol_version,
            transitions,
        })
    }
}

fn lookup_document_type<'a>(raw: &JsonValue, contracts: &[&'a DataContract]) -> Option<&'a DocumentType> {
    let contract_id = raw
        .get(PROPERTY_DATA_CONTRACT_ID)
        .and_then(JsonValue::as_str)
        .and_then(|text| Identifier::from_hex(text).ok())?;
    let type_name = raw.get(PROPERTY_TYPE).and_then(JsonValue::as_str)?;
    contracts
        .iter()
        .find(|contract| contract.id() == contract_id)
        .and_then(|contract| contract.document_type(type_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> TransitionBase {
        TransitionBase {
            id: Identifier::new([1; 32]),
            document_type: "note".to_string(),
            data_contract_id: Identifier::new([2; 32]),
        }
    }

    #[test]
    fn test_action_codes() {
        assert_eq!(DocumentAction::Create.code(), 0);
        assert_eq!(DocumentAction::Replace.code(), 1);
        assert_eq!(DocumentAction::Delete.code(), 3);
        assert_eq!(DocumentAction::from_code(2), None);
    }

    #[test]
    fn test_replace_json_round_trip() {
        let mut data = ValueMap::new();
        data.insert("message".to_string(), Value::Text("hello".to_string()));
        let transition = DocumentTransition::Replace(ReplaceTransition {
            base: base(),
            revision: 5,
            data,
            updated_at: Some(42),
        });

        let decoded = DocumentTransition::from_json(&transition.to_json(), None).unwrap();
        assert_eq!(decoded, transition);
    }

    #[test]
    fn test_timestamps_outside_the_action_are_rejected() {
        let replace = DocumentTransition::Replace(ReplaceTransition {
            base: base(),
            revision: 2,
            data: ValueMap::new(),
            updated_at: None,
        });
        let mut json = replace.to_json();
        json["$createdAt"] = json!(1_700_000_000_000u64);
        assert!(matches!(
            DocumentTransition::from_json(&json, None),
            Err(ProcessingError::MalformedBatch { .. })
        ));

        let mut json = DocumentTransition::Delete(DeleteTransition { base: base() }).to_json();
        json["$updatedAt"] = json!(1_700_000_000_000u64);
        assert!(matches!(
            DocumentTransition::from_json(&json, None),
            Err(ProcessingError::MalformedBatch { .. })
        ));
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let mut raw = DocumentTransition::Delete(DeleteTransition { base: base() }).to_json();
        raw["$action"] = json!(2);
        let err = DocumentTransition::from_json(&raw, None).unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidDocumentAction { .. }));
    }
}
