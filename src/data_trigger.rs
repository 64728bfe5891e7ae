//! Data triggers
//!
//! Triggers are contract-specific hooks bound to a
//! `(data contract, document type, action)` key. They run after all other
//! batch checks have passed and may veto a transition.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::consensus::ConsensusError;
use crate::context::DataTriggerExecutionContext;
use crate::transition::{DocumentAction, DocumentTransition};
use crate::types::Identifier;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataTriggerError {
    /// The transition violates a contract-specific rule
    #[error("Condition failed: {message}")]
    Condition { message: String },

    /// The trigger could not complete
    #[error("Execution failed: {message}")]
    Execution { message: String },
}

pub trait DataTrigger: Send + Sync {
    fn execute(
        &self,
        transition: &DocumentTransition,
        context: &DataTriggerExecutionContext<'_>,
    ) -> Result<(), DataTriggerError>;

    fn name(&self) -> &str;
}

/// Trigger backed by a closure
pub struct FnDataTrigger<F> {
    name: String,
    f: F,
}

impl<F> FnDataTrigger<F>
where
    F: Fn(&DocumentTransition, &DataTriggerExecutionContext<'_>) -> Result<(), DataTriggerError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> DataTrigger for FnDataTrigger<F>
where
    F: Fn(&DocumentTransition, &DataTriggerExecutionContext<'_>) -> Result<(), DataTriggerError> + Send + Sync,
{
    fn execute(
        &self,
        transition: &DocumentTransition,
        context: &DataTriggerExecutionContext<'_>,
    ) -> Result<(), DataTriggerError> {
        (self.f)(transition, context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Rejects every transition it is bound to
#[derive(Debug, Clone, Default)]
pub struct RejectTrigger;

impl DataTrigger for RejectTrigger {
    fn execute(
        &self,
        transition: &DocumentTransition,
        _context: &DataTriggerExecutionContext<'_>,
    ) -> Result<(), DataTriggerError> {
        Err(DataTriggerError::Condition {
            message: format!(
                "Action {} is not allowed on '{}' documents",
                transition.action().as_str(),
                transition.document_type()
            ),
        })
    }

    fn name(&self) -> &str {
        "reject"
    }
}

#[derive(Clone)]
pub struct DataTriggerBinding {
    data_contract_id: Identifier,
    document_type: String,
    action: DocumentAction,
    trigger: Arc<dyn DataTrigger>,
}

impl DataTriggerBinding {
    pub fn new(
        data_contract_id: Identifier,
        document_type: impl Into<String>,
        action: DocumentAction,
        trigger: Arc<dyn DataTrigger>,
    ) -> Self {
        Self {
            data_contract_id,
            document_type: document_type.into(),
            action,
            trigger,
        }
    }

    pub fn is_matching(&self, data_contract_id: &Identifier, document_type: &str, action: DocumentAction) -> bool {
        self.data_contract_id == *data_contract_id && self.document_type == document_type && self.action == action
    }

    pub fn trigger(&self) -> &dyn DataTrigger {
        self.trigger.as_ref()
    }

    /// Run the trigger, translating a failure into a consensus error
    pub fn execute(
        &self,
        transition: &DocumentTransition,
        context: &DataTriggerExecutionContext<'_>,
    ) -> Result<(), ConsensusError> {
        self.trigger.execute(transition, context).map_err(|e| match e {
            DataTriggerError::Condition { message } => ConsensusError::DataTriggerCondition {
                data_contract_id: self.data_contract_id,
                document_id: transition.id(),
                message,
            },
            DataTriggerError::Execution { message } => ConsensusError::DataTriggerExecution {
                data_contract_id: self.data_contract_id,
                document_id: transition.id(),
                owner_id: context.owner_id(),
                message,
            },
        })
    }
}

impl fmt::Debug for DataTriggerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTriggerBinding")
            .field("data_contract_id", &self.data_contract_id)
            .field("document_type", &self.document_type)
            .field("action", &self.action)
            .field("trigger", &self.trigger.name())
            .finish()
    }
}

/// Outcome of every trigger bound to one transition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTriggerExecutionResult {
    document_id: Option<Identifier>,
    errors: Vec<ConsensusError>,
}

impl DataTriggerExecutionResult {
    pub fn for_document(document_id: Identifier) -> Self {
        Self {
            document_id: Some(document_id),
            errors: Vec::new(),
        }
    }

    pub fn document_id(&self) -> Option<Identifier> {
        self.document_id
    }

    pub fn add_error(&mut self, error: ConsensusError) {
        self.errors.push(error);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ConsensusError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ConsensusError> {
        self.errors
    }
}

/// Registry of trigger bindings, in registration order
#[derive(Debug, Clone, Default)]
pub struct DataTriggerRegistry {
    bindings: Vec<DataTriggerBinding>,
}

impl DataTriggerRegistry {
    pub fn new() -> Self {
        Self { bindings: Vec::new() }
    }

    pub fn register(&mut self, binding: DataTriggerBinding) {
        self.bindings.push(binding);
    }

    /// Bind a trigger to `(contract, type, action)`
    pub fn bind(
        &mut self,
        data_contract_id: Identifier,
        document_type: impl Into<String>,
        action: DocumentAction,
        trigger: Arc<dyn DataTrigger>,
    ) {
        self.register(DataTriggerBinding::new(data_contract_id, document_type, action, trigger));
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get_triggers(
        &self,
        data_contract_id: &Identifier,
        document_type: &str,
        action: DocumentAction,
    ) -> Vec<&DataTriggerBinding> {
        self.bindings
            .iter()
            .filter(|binding| binding.is_matching(data_contract_id, document_type, action))
            .collect()
    }

    /// One result per transition; a failing trigger does not stop the rest
    pub fn execute_data_triggers(
        &self,
        transitions: &[&DocumentTransition],
        context: &DataTriggerExecutionContext<'_>,
    ) -> Vec<DataTriggerExecutionResult> {
        transitions
            .iter()
            .map(|transition| {
                let mut result = DataTriggerExecutionResult::for_document(transition.id());
                let bindings = self.get_triggers(
                    &transition.data_contract_id(),
                    transition.document_type(),
                    transition.action(),
                );
                for binding in bindings {
                    if let Err(error) = binding.execute(transition, context) {
                        debug!(
                            target: "dste::validate",
                            document_id = %transition.id(),
                            trigger = binding.trigger().name(),
                            code = error.code(),
                            "data trigger rejected transition"
                        );
                        result.add_error(error);
                    }
                }
                result
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_contract::DataContract;
    use crate::context::DeterministicTime;
    use crate::state_repository::InMemoryStateRepository;
    use crate::transition::{DeleteTransition, TransitionBase};
    use crate::types::BlockHeader;
    use serde_json::json;

    fn contract() -> DataContract {
        DataContract::from_json(&json!({
            "protocolVersion": 1,
            "$id": "05".repeat(32),
            "ownerId": "06".repeat(32),
            "version": 1,
            "documents": {
                "domain": {
                    "type": "object",
                    "properties": { "label": { "type": "string", "maxLength": 63 } },
                    "additionalProperties": false
                }
            }
        }))
        .unwrap()
    }

    fn delete(document_type: &str) -> DocumentTransition {
        DocumentTransition::Delete(DeleteTransition {
            base: TransitionBase {
                id: Identifier::new([1; 32]),
                document_type: document_type.to_string(),
                data_contract_id: Identifier::new([5; 32]),
            },
        })
    }

    #[test]
    fn test_reject_trigger_and_continuation() {
        let contract = contract();
        let repository = InMemoryStateRepository::new(BlockHeader::from_seconds(1));
        let context = DataTriggerExecutionContext::new(
            &repository,
            Identifier::new([6; 32]),
            &contract,
            DeterministicTime::from_millis(1_000),
        );

        let mut registry = DataTriggerRegistry::new();
        registry.bind(contract.id(), "domain", DocumentAction::Delete, Arc::new(RejectTrigger));
        registry.bind(
            contract.id(),
            "domain",
            DocumentAction::Delete,
            Arc::new(FnDataTrigger::new("broken", |_t: &DocumentTransition, _c: &DataTriggerExecutionContext<'_>| {
                Err(DataTriggerError::Execution {
                    message: "lookup failed".to_string(),
                })
            })),
        );

        let rejected = delete("domain");
        let untouched = delete("other");
        let results = registry.execute_data_triggers(&[&rejected, &untouched], &context);

        assert_eq!(results.len(), 2);
        let codes: Vec<u32> = results[0].errors().iter().map(ConsensusError::code).collect();
        assert_eq!(codes, vec![4001, 4002]);
        assert!(results[1].is_ok());
    }
}
