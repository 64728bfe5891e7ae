#![allow(dead_code)]

use dste::{
    BlockHeader, DataContract, Document, DocumentFactory, DocumentTransition, Identifier, InMemoryStateRepository,
    Value, ValueMap,
};
use serde_json::{json, Value as JsonValue};

pub const BLOCK_SECONDS: u64 = 1_700_000_000;
pub const BLOCK_MILLIS: u64 = BLOCK_SECONDS * 1000;
pub const MINUTE_MS: u64 = 60 * 1000;

pub fn owner() -> Identifier {
    Identifier::new([0x11; 32])
}

pub fn other_owner() -> Identifier {
    Identifier::new([0x22; 32])
}

pub fn contract_id() -> Identifier {
    Identifier::new([0xaa; 32])
}

/// `note` with a unique `($ownerId, message)` index and `profile` with
/// binary fields and required timestamps
pub fn contract_json() -> JsonValue {
    json!({
        "protocolVersion": 1,
        "$id": contract_id().to_hex(),
        "ownerId": owner().to_hex(),
        "version": 1,
        "documents": {
            "note": {
                "type": "object",
                "properties": {
                    "message": { "type": "string", "maxLength": 100 }
                },
                "required": ["message"],
                "indices": [
                    { "properties": [{ "$ownerId": "asc" }, { "message": "asc" }], "unique": true }
                ],
                "additionalProperties": false
            },
            "profile": {
                "type": "object",
                "properties": {
                    "displayName": { "type": "string", "maxLength": 64 },
                    "friend": {
                        "type": "array",
                        "byteArray": true,
                        "minItems": 32,
                        "maxItems": 32,
                        "contentMediaType": "application/x.dash.dpp.identifier"
                    },
                    "avatar": { "type": "array", "byteArray": true, "maxItems": 64 }
                },
                "required": ["displayName", "$createdAt", "$updatedAt"],
                "additionalProperties": false
            }
        }
    })
}

pub fn contract() -> DataContract {
    DataContract::from_json(&contract_json()).expect("fixture contract parses")
}

pub fn repository() -> InMemoryStateRepository {
    let mut repository = InMemoryStateRepository::new(BlockHeader::from_seconds(BLOCK_SECONDS));
    repository.insert_data_contract(contract());
    repository
}

pub fn message(text: &str) -> ValueMap {
    let mut data = ValueMap::new();
    data.insert("message".to_string(), Value::Text(text.to_string()));
    data
}

pub fn create_note(factory: &mut DocumentFactory, owner_id: Identifier, text: &str) -> DocumentTransition {
    factory
        .create_transition(&contract(), owner_id, "note", message(text), None)
        .expect("note transition")
}

pub fn stored_note(id: u8, owner_id: Identifier, revision: u64, text: &str) -> Document {
    Document {
        id: Identifier::new([id; 32]),
        data_contract_id: contract_id(),
        document_type: "note".to_string(),
        owner_id,
        revision,
        created_at: None,
        updated_at: None,
        data: message(text),
    }
}
