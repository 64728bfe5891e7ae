//! State repository contract
//!
//! The core never touches durable storage directly. Validation only reads
//! through a [`StateRepository`]; application is the only writer.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::data_contract::DataContract;
use crate::document::Document;
use crate::error::RepositoryError;
use crate::hasher::ContentHasher;
use crate::serialization::{BincodeSerializer, StorageSerializer};
use crate::types::{BlockHeader, Identifier, StateHash};
use crate::value::Value;

/// Equality condition on one indexed property
#[derive(Debug, Clone, PartialEq)]
pub struct IndexCondition {
    pub property: String,
    pub value: Value,
}

impl IndexCondition {
    pub fn new(property: impl Into<String>, value: Value) -> Self {
        Self {
            property: property.into(),
            value,
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        document
            .property(&self.property)
            .map_or(false, |value| index_values_equal(&value, &self.value))
    }
}

/// Identifiers and byte arrays with the same bytes compare equal
pub fn index_values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_bytes(), b.as_bytes()) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

pub trait StateRepository: Send + Sync {
    fn fetch_data_contract(&self, id: &Identifier) -> Result<Option<Arc<DataContract>>, RepositoryError>;

    /// Stored documents of one contract among `ids`, in no particular order
    fn fetch_documents(
        &self,
        data_contract_id: &Identifier,
        ids: &[Identifier],
    ) -> Result<Vec<Document>, RepositoryError>;

    /// Stored documents of one type matching every condition
    fn fetch_documents_by_index(
        &self,
        data_contract_id: &Identifier,
        document_type: &str,
        conditions: &[IndexCondition],
    ) -> Result<Vec<Document>, RepositoryError>;

    fn store_document(&mut self, document: &Document) -> Result<(), RepositoryError>;

    fn remove_document(
        &mut self,
        data_contract_id: &Identifier,
        document_type: &str,
        id: &Identifier,
    ) -> Result<(), RepositoryError>;

    fn fetch_latest_platform_block_header(&self) -> Result<BlockHeader, RepositoryError>;
}

/// Repository held in memory, documents encoded as in durable storage
#[derive(Debug, Clone)]
pub struct InMemoryStateRepository {
    contracts: BTreeMap<Identifier, Arc<DataContract>>,
    documents: BTreeMap<(Identifier, Identifier), Vec<u8>>,
    block_header: BlockHeader,
    serializer: BincodeSerializer,
    unavailable: bool,
}

impl InMemoryStateRepository {
    pub fn new(block_header: BlockHeader) -> Self {
        Self {
            contracts: BTreeMap::new(),
            documents: BTreeMap::new(),
            block_header,
            serializer: BincodeSerializer::new(),
            unavailable: false,
        }
    }

    pub fn insert_data_contract(&mut self, contract: DataContract) {
        self.contracts.insert(contract.id(), Arc::new(contract));
    }

    pub fn set_block_header(&mut self, block_header: BlockHeader) {
        self.block_header = block_header;
    }

    /// Make every call fail with a storage error
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn get_document(&self, data_contract_id: &Identifier, id: &Identifier) -> Result<Option<Document>, RepositoryError> {
        self.ensure_available()?;
        self.documents
            .get(&(*data_contract_id, *id))
            .map(|bytes| self.decode(bytes))
            .transpose()
    }

    /// Hash over every stored entry in key order
    pub fn state_root(&self) -> StateHash {
        let hasher = ContentHasher::new();
        let entry_hashes: Vec<StateHash> = self
            .documents
            .iter()
            .map(|((contract_id, id), bytes)| {
                let mut entry = blake3::Hasher::new();
                entry.update(contract_id.as_bytes());
                entry.update(id.as_bytes());
                entry.update(bytes);
                StateHash(*entry.finalize().as_bytes())
            })
            .collect();
        hasher.hash_chain(&entry_hashes)
    }

    fn ensure_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable {
            return Err(RepositoryError::Storage {
                reason: "repository is unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Document, RepositoryError> {
        Ok(self.serializer.deserialize(bytes)?)
    }
}

impl StateRepository for InMemoryStateRepository {
    fn fetch_data_contract(&self, id: &Identifier) -> Result<Option<Arc<DataContract>>, RepositoryError> {
        self.ensure_available()?;
        Ok(self.contracts.get(id).cloned())
    }

    fn fetch_documents(
        &self,
        data_contract_id: &Identifier,
        ids: &[Identifier],
    ) -> Result<Vec<Document>, RepositoryError> {
        self.ensure_available()?;
        let mut documents = Vec::new();
        for id in ids {
            if let Some(bytes) = self.documents.get(&(*data_contract_id, *id)) {
                documents.push(self.decode(bytes)?);
            }
        }
        Ok(documents)
    }

    fn fetch_documents_by_index(
        &self,
        data_contract_id: &Identifier,
        document_type: &str,
        conditions: &[IndexCondition],
    ) -> Result<Vec<Document>, RepositoryError> {
        self.ensure_available()?;
        let mut matches = Vec::new();
        let range = (*data_contract_id, Identifier::new([0; 32]))..=(*data_contract_id, Identifier::new([0xff; 32]));
        for bytes in self.documents.range(range).map(|(_, bytes)| bytes) {
            let document = self.decode(bytes)?;
            if document.document_type == document_type && conditions.iter().all(|c| c.matches(&document)) {
                matches.push(document);
            }
        }
        Ok(matches)
    }

    fn store_document(&mut self, document: &Document) -> Result<(), RepositoryError> {
        self.ensure_available()?;
        let bytes = self.serializer.serialize(document)?;
        self.documents.insert((document.data_contract_id, document.id), bytes);
        Ok(())
    }

    fn remove_document(
        &mut self,
        data_contract_id: &Identifier,
        document_type: &str,
        id: &Identifier,
    ) -> Result<(), RepositoryError> {
        self.ensure_available()?;
        let key = (*data_contract_id, *id);
        if let Some(bytes) = self.documents.get(&key) {
            let stored = self.decode(bytes)?;
            if stored.document_type != document_type {
                return Err(RepositoryError::Corrupt {
                    reason: format!(
                        "document {} has type '{}', not '{}'",
                        id, stored.document_type, document_type
                    ),
                });
            }
            self.documents.remove(&key);
        }
        Ok(())
    }

    fn fetch_latest_platform_block_header(&self) -> Result<BlockHeader, RepositoryError> {
        self.ensure_available()?;
        Ok(self.block_header)
    }
}
