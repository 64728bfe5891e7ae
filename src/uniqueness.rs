//! Unique index enforcement for one contract group of a batch

use std::collections::{BTreeMap, BTreeSet};

use crate::consensus::ConsensusError;
use crate::data_contract::{DataContract, DocumentType, IndexDefinition, PROPERTY_OWNER_ID};
use crate::error::RepositoryError;
use crate::hasher::ContentHasher;
use crate::state_repository::{IndexCondition, StateRepository};
use crate::transition::{DocumentAction, DocumentTransition};
use crate::types::{Identifier, StateHash};
use crate::validation::ValidationResult;
use crate::value::Value;

pub struct UniqueIndexValidator<'a, R: StateRepository + ?Sized> {
    repository: &'a R,
    data_contract: &'a DataContract,
    owner_id: Identifier,
    hasher: ContentHasher,
}

impl<'a, R: StateRepository + ?Sized> UniqueIndexValidator<'a, R> {
    pub fn new(repository: &'a R, data_contract: &'a DataContract, owner_id: Identifier) -> Self {
        Self {
            repository,
            data_contract,
            owner_id,
            hasher: ContentHasher::new(),
        }
    }

    /// Check create and replace transitions against stored documents and
    /// against earlier transitions of the same batch
    ///
    /// Stored documents replaced or deleted by this batch do not count:
    /// their superseding values are checked as in-batch entries instead.
    /// When two transitions collide, the earlier one keeps the key.
    pub fn validate(&self, transitions: &[&DocumentTransition]) -> Result<ValidationResult, RepositoryError> {
        let superseded: BTreeSet<Identifier> = transitions
            .iter()
            .filter(|t| matches!(t.action(), DocumentAction::Replace | DocumentAction::Delete))
            .map(|t| t.id())
            .collect();

        let mut claimed: BTreeMap<StateHash, Identifier> = BTreeMap::new();
        let mut result = ValidationResult::new();

        for transition in transitions {
            if transition.action() == DocumentAction::Delete {
                continue;
            }
            let document_type = match self.data_contract.document_type(transition.document_type()) {
                Some(document_type) => document_type,
                None => continue,
            };

            for (position, index) in document_type.unique_indices() {
                let values = match self.indexed_values(transition, index) {
                    Some(values) => values,
                    None => continue,
                };
                let key = self.hasher.index_key(document_type.name(), position, &values);

                let conflict = match claimed.get(&key) {
                    Some(holder) if *holder != transition.id() => Some(*holder),
                    Some(_) => None,
                    None => self.stored_conflict(document_type, index, &values, transition.id(), &superseded)?,
                };

                match conflict {
                    Some(conflicting_document_id) => result.add_error(ConsensusError::DuplicateUniqueIndex {
                        document_id: transition.id(),
                        document_type: document_type.name().to_string(),
                        index_properties: index.property_names(),
                        conflicting_document_id,
                    }),
                    None => {
                        claimed.insert(key, transition.id());
                    }
                }
            }
        }

        Ok(result)
    }

    /// Values for each indexed property; `None` if any is absent
    fn indexed_values(&self, transition: &DocumentTransition, index: &IndexDefinition) -> Option<Vec<Value>> {
        index
            .properties
            .iter()
            .map(|property| {
                if property.name == PROPERTY_OWNER_ID {
                    return Some(Value::Identifier(self.owner_id));
                }
                transition.property(&property.name).filter(|v| *v != Value::Null)
            })
            .collect()
    }

    fn stored_conflict(
        &self,
        document_type: &DocumentType,
        index: &IndexDefinition,
        values: &[Value],
        document_id: Identifier,
        superseded: &BTreeSet<Identifier>,
    ) -> Result<Option<Identifier>, RepositoryError> {
        let conditions: Vec<IndexCondition> = index
            .properties
            .iter()
            .zip(values)
            .map(|(property, value)| IndexCondition::new(property.name.clone(), value.clone()))
            .collect();

        let stored = self
            .repository
            .fetch_documents_by_index(&self.data_contract.id(), document_type.name(), &conditions)?;

        Ok(stored
            .into_iter()
            .map(|document| document.id)
            .filter(|id| *id != document_id && !superseded.contains(id))
            .min())
    }
}
