//! Batch data validation
//!
//! Validation is read-only. Transitions are partitioned by data contract
//! and each group is validated independently, in parallel; results are
//! merged back in first-appearance order so every replica reports the same
//! errors in the same order regardless of scheduling.

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::config::ValidationConfig;
use crate::consensus::ConsensusError;
use crate::context::{DataTriggerExecutionContext, DeterministicTime};
use crate::data_contract::{DataContract, PROPERTY_CREATED_AT, PROPERTY_UPDATED_AT};
use crate::data_trigger::DataTriggerRegistry;
use crate::document::{validate_document_data, Document};
use crate::error::ProcessingError;
use crate::hasher::ContentHasher;
use crate::logging::{ExecutionTraceLog, LogEntry, LogLevel, TraceEventType};
use crate::state_repository::StateRepository;
use crate::transition::{DocumentTransition, DocumentsBatchTransition};
use crate::types::{BlockHeader, Identifier, TimeWindow, TimestampMillis};
use crate::uniqueness::UniqueIndexValidator;
use crate::validation::ValidationResult;

/// Transitions of one data contract with their positions in the batch
pub type ContractGroup<'a> = (Identifier, Vec<(usize, &'a DocumentTransition)>);

/// Outcome of validation, handed to the applier
#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    result: ValidationResult,
    fetched_documents: BTreeMap<Identifier, Document>,
    block_header: BlockHeader,
    trace: ExecutionTraceLog,
}

impl ValidatedBatch {
    pub fn is_valid(&self) -> bool {
        self.result.is_valid()
    }

    pub fn result(&self) -> &ValidationResult {
        &self.result
    }

    pub fn into_result(self) -> ValidationResult {
        self.result
    }

    /// Documents read during validation, keyed by id
    pub fn fetched_documents(&self) -> &BTreeMap<Identifier, Document> {
        &self.fetched_documents
    }

    pub fn fetched_document(&self, id: &Identifier) -> Option<&Document> {
        self.fetched_documents.get(id)
    }

    pub fn block_header(&self) -> BlockHeader {
        self.block_header
    }

    pub fn trace(&self) -> &ExecutionTraceLog {
        &self.trace
    }
}

struct GroupOutcome {
    result: ValidationResult,
    fetched: Vec<Document>,
    trace: ExecutionTraceLog,
}

pub struct DocumentsBatchValidator {
    config: ValidationConfig,
    triggers: DataTriggerRegistry,
    hasher: ContentHasher,
}

impl DocumentsBatchValidator {
    pub fn new(config: ValidationConfig, triggers: DataTriggerRegistry) -> Self {
        Self {
            config,
            triggers,
            hasher: ContentHasher::new(),
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn triggers(&self) -> &DataTriggerRegistry {
        &self.triggers
    }

    /// Validate a batch against committed state
    ///
    /// Business-rule violations are collected in the returned
    /// [`ValidatedBatch`]; only repository failures are returned as errors.
    pub fn validate<R: StateRepository>(
        &self,
        batch: &DocumentsBatchTransition,
        repository: &R,
    ) -> Result<ValidatedBatch, ProcessingError> {
        let groups = group_by_contract(&batch.transitions);
        let block_header = repository.fetch_latest_platform_block_header()?;
        let block_time = block_header.time_millis();
        let window = TimeWindow::around(block_time, self.config.timestamp_window_ms);

        debug!(
            target: "dste::validate",
            owner_id = %batch.owner_id,
            transitions = batch.transitions.len(),
            groups = groups.len(),
            block_time,
            "validating documents batch"
        );

        let mut trace = ExecutionTraceLog::new(block_time);
        trace
            .record(TraceEventType::ValidationStarted)
            .data
            .push(("transitions".to_string(), batch.transitions.len().to_string()));

        let mut result = ValidationResult::new();
        let mut fetched_documents = BTreeMap::new();

        // A repeated target stops the batch before any state is read
        let duplicates = find_duplicate_transitions(&batch.transitions);
        if duplicates.is_empty() {
            let outcomes: Vec<Result<GroupOutcome, ProcessingError>> = groups
                .par_iter()
                .map(|(data_contract_id, transitions)| {
                    self.validate_group(repository, batch.owner_id, data_contract_id, transitions, &block_header, window)
                })
                .collect();

            for outcome in outcomes {
                let outcome = outcome?;
                result.merge(outcome.result);
                fetched_documents.extend(outcome.fetched.into_iter().map(|d| (d.id, d)));
                trace.extend(outcome.trace);
            }
        } else {
            let outcome = self.reject_duplicates(&batch.transitions, &duplicates, block_time);
            result.merge(outcome.result);
            trace.extend(outcome.trace);
        }

        trace
            .record(TraceEventType::ValidationCompleted)
            .data
            .push(("errors".to_string(), result.errors().len().to_string()));

        debug!(
            target: "dste::validate",
            valid = result.is_valid(),
            errors = result.errors().len(),
            "documents batch validated"
        );

        Ok(ValidatedBatch {
            result,
            fetched_documents,
            block_header,
            trace,
        })
    }

    fn validate_group<R: StateRepository>(
        &self,
        repository: &R,
        owner_id: Identifier,
        data_contract_id: &Identifier,
        transitions: &[(usize, &DocumentTransition)],
        block_header: &BlockHeader,
        window: TimeWindow,
    ) -> Result<GroupOutcome, ProcessingError> {
        let mut outcome = GroupOutcome {
            result: ValidationResult::new(),
            fetched: Vec::new(),
            trace: ExecutionTraceLog::new(block_header.time_millis()),
        };

        let contract = match repository.fetch_data_contract(data_contract_id)? {
            Some(contract) => contract,
            None => {
                debug!(target: "dste::validate", data_contract_id = %data_contract_id, "data contract not present");
                outcome.result.add_error(ConsensusError::DataContractNotPresent {
                    data_contract_id: *data_contract_id,
                });
                self.record_group(&mut outcome, data_contract_id);
                return Ok(outcome);
            }
        };

        for (index, transition) in transitions {
            let errors = self.basic_errors(&contract, owner_id, transition);
            self.reject(&mut outcome, *index, transition, errors);
        }
        if !outcome.result.is_valid() {
            self.record_group(&mut outcome, data_contract_id);
            return Ok(outcome);
        }

        let ids: Vec<Identifier> = transitions.iter().map(|(_, t)| t.id()).collect();
        let fetched = repository.fetch_documents(data_contract_id, &ids)?;
        let stored: BTreeMap<Identifier, &Document> = fetched.iter().map(|d| (d.id, d)).collect();

        for (index, transition) in transitions {
            let mut errors = timestamp_errors(transition, window);
            errors.extend(action_errors(transition, stored.get(&transition.id()).copied(), owner_id));
            self.reject(&mut outcome, *index, transition, errors);
        }

        let group: Vec<&DocumentTransition> = transitions.iter().map(|(_, t)| *t).collect();

        if outcome.result.is_valid() {
            let unique = UniqueIndexValidator::new(repository, &contract, owner_id).validate(&group)?;
            outcome.result.merge(unique);
        }

        if outcome.result.is_valid() && !self.triggers.is_empty() {
            let context = DataTriggerExecutionContext::new(
                repository,
                owner_id,
                &contract,
                DeterministicTime::from_block_header(block_header),
            );
            let trigger_results = self.triggers.execute_data_triggers(&group, &context);
            for ((index, transition), trigger_result) in transitions.iter().zip(trigger_results) {
                self.reject(&mut outcome, *index, transition, trigger_result.into_errors());
            }
        }

        outcome.fetched = fetched;
        self.record_group(&mut outcome, data_contract_id);
        Ok(outcome)
    }

    /// Checks that need only the contract: type, derived id and data shape
    fn basic_errors(
        &self,
        contract: &DataContract,
        owner_id: Identifier,
        transition: &DocumentTransition,
    ) -> Vec<ConsensusError> {
        let document_type = match contract.document_type(transition.document_type()) {
            Some(document_type) => document_type,
            None => {
                return vec![ConsensusError::InvalidDocumentType {
                    document_type: transition.document_type().to_string(),
                    data_contract_id: contract.id(),
                }]
            }
        };

        let mut errors = Vec::new();
        if let DocumentTransition::Create(create) = transition {
            let expected_id = self.hasher.derive_document_id(
                &contract.id(),
                &owner_id,
                transition.document_type(),
                &create.entropy,
            );
            if expected_id != create.base.id {
                errors.push(ConsensusError::InvalidDocumentTransitionId {
                    expected_id,
                    actual_id: create.base.id,
                });
            }
        }
        if let Some(data) = transition.data() {
            errors.extend(validate_document_data(document_type, data).into_errors());
        }
        errors
    }

    fn reject(
        &self,
        outcome: &mut GroupOutcome,
        index: usize,
        transition: &DocumentTransition,
        errors: Vec<ConsensusError>,
    ) {
        for error in errors {
            let event = outcome.trace.record(TraceEventType::TransitionRejected);
            event.document_id = Some(transition.id());
            event.transition_index = Some(index);
            event.data.push(("code".to_string(), error.code().to_string()));
            let timestamp = outcome.trace.block_time;
            outcome.trace.add_log(
                LogEntry::new(LogLevel::Warn, timestamp, error.to_string()).with_transition(transition.id(), index),
            );
            outcome.result.add_error(error);
        }
    }

    /// Report every repeated `(type, id)` target once, with one rejection
    /// event per repeated transition
    fn reject_duplicates(
        &self,
        transitions: &[DocumentTransition],
        duplicates: &[usize],
        block_time: TimestampMillis,
    ) -> GroupOutcome {
        debug!(target: "dste::validate", repeated = duplicates.len(), "batch repeats document transitions");

        let mut references: Vec<(String, Identifier)> = Vec::new();
        for index in duplicates {
            let reference = (transitions[*index].document_type().to_string(), transitions[*index].id());
            if !references.contains(&reference) {
                references.push(reference);
            }
        }

        let mut outcome = GroupOutcome {
            result: ValidationResult::new(),
            fetched: Vec::new(),
            trace: ExecutionTraceLog::new(block_time),
        };
        let error = ConsensusError::DuplicateDocumentTransitions { references };
        for index in duplicates {
            let event = outcome.trace.record(TraceEventType::TransitionRejected);
            event.document_id = Some(transitions[*index].id());
            event.transition_index = Some(*index);
            event.data.push(("code".to_string(), error.code().to_string()));
        }
        outcome.trace.add_log(LogEntry::new(LogLevel::Warn, block_time, error.to_string()));
        outcome.result.add_error(error);
        outcome
    }

    fn record_group(&self, outcome: &mut GroupOutcome, data_contract_id: &Identifier) {
        let errors = outcome.result.errors().len();
        let event = outcome.trace.record(TraceEventType::GroupValidated);
        event.data.push(("dataContractId".to_string(), data_contract_id.to_hex()));
        event.data.push(("errors".to_string(), errors.to_string()));
    }
}

/// Partition transitions by contract, keeping first-appearance order
pub fn group_by_contract(transitions: &[DocumentTransition]) -> Vec<ContractGroup<'_>> {
    let mut groups: Vec<ContractGroup<'_>> = Vec::new();
    for (index, transition) in transitions.iter().enumerate() {
        let contract_id = transition.data_contract_id();
        match groups.iter_mut().find(|(id, _)| *id == contract_id) {
            Some((_, members)) => members.push((index, transition)),
            None => groups.push((contract_id, vec![(index, transition)])),
        }
    }
    groups
}

/// Positions of transitions whose `(type, id)` target already appeared
/// earlier in the batch
pub fn find_duplicate_transitions(transitions: &[DocumentTransition]) -> Vec<usize> {
    let mut seen: BTreeSet<(String, Identifier)> = BTreeSet::new();
    transitions
        .iter()
        .enumerate()
        .filter(|(_, transition)| !seen.insert((transition.document_type().to_string(), transition.id())))
        .map(|(index, _)| index)
        .collect()
}

fn timestamp_errors(transition: &DocumentTransition, window: TimeWindow) -> Vec<ConsensusError> {
    let mut errors = Vec::new();
    let document_id = transition.id();

    let violation = |name: &str, timestamp: TimestampMillis| ConsensusError::DocumentTimestampWindowViolation {
        document_id,
        timestamp_name: name.trim_start_matches('$').to_string(),
        timestamp,
        window_start: window.start,
        window_end: window.end,
    };

    match transition {
        DocumentTransition::Create(create) => {
            if let (Some(created_at), Some(updated_at)) = (create.created_at, create.updated_at) {
                if created_at != updated_at {
                    errors.push(ConsensusError::DocumentTimestampsMismatch { document_id });
                }
            }
            if let Some(created_at) = create.created_at.filter(|t| !window.contains(*t)) {
                errors.push(violation(PROPERTY_CREATED_AT, created_at));
            }
            if let Some(updated_at) = create.updated_at.filter(|t| !window.contains(*t)) {
                errors.push(violation(PROPERTY_UPDATED_AT, updated_at));
            }
        }
        DocumentTransition::Replace(replace) => {
            if let Some(updated_at) = replace.updated_at.filter(|t| !window.contains(*t)) {
                errors.push(violation(PROPERTY_UPDATED_AT, updated_at));
            }
        }
        DocumentTransition::Delete(_) => {}
    }
    errors
}

fn action_errors(
    transition: &DocumentTransition,
    stored: Option<&Document>,
    owner_id: Identifier,
) -> Vec<ConsensusError> {
    let document_id = transition.id();
    let owner_mismatch = |stored: &Document| ConsensusError::DocumentOwnerIdMismatch {
        document_id,
        owner_id,
        existing_owner_id: stored.owner_id,
    };

    let error = match (transition, stored) {
        (DocumentTransition::Create(_), Some(_)) => Some(ConsensusError::DocumentAlreadyPresent { document_id }),
        (DocumentTransition::Create(_), None) => None,
        (DocumentTransition::Replace(_), None) | (DocumentTransition::Delete(_), None) => {
            Some(ConsensusError::DocumentNotFound { document_id })
        }
        (DocumentTransition::Replace(replace), Some(stored)) => {
            if stored.revision.checked_add(1) != Some(replace.revision) {
                Some(ConsensusError::InvalidDocumentRevision {
                    document_id,
                    current_revision: stored.revision,
                    provided_revision: replace.revision,
                })
            } else if stored.owner_id != owner_id {
                Some(owner_mismatch(stored))
            } else {
                None
            }
        }
        (DocumentTransition::Delete(_), Some(stored)) => {
            (stored.owner_id != owner_id).then(|| owner_mismatch(stored))
        }
    };
    error.into_iter().collect()
}
