//! Building contracts, transitions and batches on the client side

use serde_json::{json, Value as JsonValue};

use crate::context::SeededRandom;
use crate::data_contract::DataContract;
use crate::document::Document;
use crate::error::DocumentError;
use crate::hasher::ContentHasher;
use crate::transition::{
    CreateTransition, DeleteTransition, DocumentTransition, DocumentsBatchTransition, ReplaceTransition,
    TransitionBase,
};
use crate::types::{Identifier, TimestampMillis};
use crate::value::ValueMap;

/// Derives ids from fresh entropy; seed the generator for reproducible output
#[derive(Debug, Clone)]
pub struct DocumentFactory {
    random: SeededRandom,
    hasher: ContentHasher,
}

impl DocumentFactory {
    pub fn new(random: SeededRandom) -> Self {
        Self {
            random,
            hasher: ContentHasher::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(SeededRandom::new(seed))
    }

    /// Raw contract JSON with a derived id, ready for validation
    pub fn create_data_contract_json(
        &mut self,
        owner_id: Identifier,
        documents: JsonValue,
        defs: Option<JsonValue>,
    ) -> JsonValue {
        let entropy = self.random.entropy();
        let id = self.hasher.derive_contract_id(&owner_id, &entropy);
        let mut raw = json!({
            "protocolVersion": 1,
            "$id": id.to_hex(),
            "ownerId": owner_id.to_hex(),
            "version": 1,
            "documents": documents,
        });
        if let Some(defs) = defs {
            raw["$defs"] = defs;
        }
        raw
    }

    /// Create transition with a derived id; data is coerced by the document type
    pub fn create_transition(
        &mut self,
        contract: &DataContract,
        owner_id: Identifier,
        document_type: &str,
        data: ValueMap,
        created_at: Option<TimestampMillis>,
    ) -> Result<DocumentTransition, DocumentError> {
        let accessor = contract.require_document_type(document_type)?.field_accessor();
        let mut coerced = ValueMap::new();
        for (path, value) in data {
            accessor.set(&mut coerced, &path, value)?;
        }

        let entropy = self.random.entropy();
        let id = self
            .hasher
            .derive_document_id(&contract.id(), &owner_id, document_type, &entropy);

        Ok(DocumentTransition::Create(CreateTransition {
            base: TransitionBase {
                id,
                document_type: document_type.to_string(),
                data_contract_id: contract.id(),
            },
            entropy,
            data: coerced,
            created_at,
            updated_at: created_at,
        }))
    }

    /// Replace transition bumping the stored revision by one
    pub fn replace_transition(
        &self,
        document: &Document,
        data: ValueMap,
        updated_at: Option<TimestampMillis>,
    ) -> DocumentTransition {
        DocumentTransition::Replace(ReplaceTransition {
            base: base_of(document),
            revision: document.revision + 1,
            data,
            updated_at,
        })
    }

    pub fn delete_transition(&self, document: &Document) -> DocumentTransition {
        DocumentTransition::Delete(DeleteTransition { base: base_of(document) })
    }

    pub fn create_batch(&self, owner_id: Identifier, transitions: Vec<DocumentTransition>) -> DocumentsBatchTransition {
        DocumentsBatchTransition::new(owner_id, transitions)
    }
}

fn base_of(document: &Document) -> TransitionBase {
    TransitionBase {
        id: document.id,
        document_type: document.document_type.clone(),
        data_contract_id: document.data_contract_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn contract(factory: &mut DocumentFactory) -> DataContract {
        let raw = factory.create_data_contract_json(
            Identifier::new([1; 32]),
            json!({
                "note": {
                    "type": "object",
                    "properties": { "message": { "type": "string", "maxLength": 100 } },
                    "additionalProperties": false
                }
            }),
            None,
        );
        DataContract::from_json(&raw).unwrap()
    }

    #[test]
    fn test_same_seed_same_ids() {
        let mut a = DocumentFactory::with_seed(9);
        let mut b = DocumentFactory::with_seed(9);
        assert_eq!(contract(&mut a).id(), contract(&mut b).id());
    }

    #[test]
    fn test_create_transition_id_is_derived() {
        let mut factory = DocumentFactory::with_seed(1);
        let contract = contract(&mut factory);
        let owner = Identifier::new([2; 32]);
        let mut data = ValueMap::new();
        data.insert("message".to_string(), Value::Text("hi".to_string()));

        let transition = factory
            .create_transition(&contract, owner, "note", data, Some(1_000))
            .unwrap();
        let DocumentTransition::Create(create) = &transition else {
            panic!("expected create transition");
        };
        let expected = ContentHasher::new().derive_document_id(&contract.id(), &owner, "note", &create.entropy);
        assert_eq!(transition.id(), expected);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let mut factory = DocumentFactory::with_seed(1);
        let contract = contract(&mut factory);
        let result = factory.create_transition(&contract, Identifier::new([2; 32]), "missing", ValueMap::new(), None);
        assert!(matches!(result, Err(DocumentError::UnknownDocumentType { .. })));
    }
}
