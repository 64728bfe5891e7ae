//! Batch application
//!
//! Application runs only on a batch whose validation came back clean and
//! writes strictly in batch order, one write at a time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::batch_validator::ValidatedBatch;
use crate::data_contract::{DataContract, DocumentType};
use crate::document::{Document, INITIAL_REVISION};
use crate::error::ProcessingError;
use crate::logging::{ExecutionTraceLog, LogEntry, LogLevel, TraceEventType};
use crate::state_repository::StateRepository;
use crate::transition::{DocumentTransition, DocumentsBatchTransition};
use crate::types::{Identifier, TimestampMillis};

/// One write issued to the repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteOperation {
    Store {
        data_contract_id: Identifier,
        document_id: Identifier,
        revision: u64,
    },
    Remove {
        data_contract_id: Identifier,
        document_type: String,
        document_id: Identifier,
    },
}

impl WriteOperation {
    pub fn document_id(&self) -> Identifier {
        match self {
            WriteOperation::Store { document_id, .. } | WriteOperation::Remove { document_id, .. } => *document_id,
        }
    }
}

/// Writes in the order they were issued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyTrace {
    pub writes: Vec<WriteOperation>,
    pub log: ExecutionTraceLog,
}

#[derive(Debug, Clone, Default)]
pub struct BatchApplier;

impl BatchApplier {
    pub fn new() -> Self {
        Self
    }

    /// Apply a validated batch
    ///
    /// Replaces reuse the documents fetched during validation; a replace
    /// whose document was not fetched is an invariant breach and aborts.
    pub fn apply<R: StateRepository>(
        &self,
        batch: &DocumentsBatchTransition,
        validated: &ValidatedBatch,
        repository: &mut R,
    ) -> Result<ApplyTrace, ProcessingError> {
        if !validated.is_valid() {
            return Err(ProcessingError::BatchNotValid {
                error_count: validated.result().errors().len(),
            });
        }

        let block_time = validated.block_header().time_millis();
        let mut log = ExecutionTraceLog::new(block_time);
        log.record(TraceEventType::ApplyStarted)
            .data
            .push(("transitions".to_string(), batch.transitions.len().to_string()));

        let mut contracts: BTreeMap<Identifier, Arc<DataContract>> = BTreeMap::new();
        let mut writes = Vec::with_capacity(batch.transitions.len());

        for (index, transition) in batch.transitions.iter().enumerate() {
            let data_contract_id = transition.data_contract_id();
            let contract = match contracts.get(&data_contract_id) {
                Some(contract) => Arc::clone(contract),
                None => {
                    let contract = repository.fetch_data_contract(&data_contract_id)?.ok_or_else(|| {
                        ProcessingError::MalformedBatch {
                            reason: format!("data contract {} disappeared after validation", data_contract_id),
                        }
                    })?;
                    contracts.insert(data_contract_id, Arc::clone(&contract));
                    contract
                }
            };
            let document_type = contract.require_document_type(transition.document_type())?;

            let write = match transition {
                DocumentTransition::Create(create) => {
                    let document = Document {
                        id: create.base.id,
                        data_contract_id,
                        document_type: create.base.document_type.clone(),
                        owner_id: batch.owner_id,
                        revision: INITIAL_REVISION,
                        created_at: create
                            .created_at
                            .or_else(|| default_timestamp(document_type.requires_created_at(), block_time)),
                        updated_at: create
                            .updated_at
                            .or_else(|| default_timestamp(document_type.requires_updated_at(), block_time)),
                        data: create.data.clone(),
                    };
                    repository.store_document(&document)?;
                    WriteOperation::Store {
                        data_contract_id,
                        document_id: document.id,
                        revision: document.revision,
                    }
                }
                DocumentTransition::Replace(replace) => {
                    let mut document = validated
                        .fetched_document(&replace.base.id)
                        .cloned()
                        .ok_or_else(|| {
                            warn!(target: "dste::apply", document_id = %replace.base.id, "replace without fetched document");
                            ProcessingError::DocumentNotProvided {
                                document_id: replace.base.id,
                            }
                        })?;
                    document.data = replace.data.clone();
                    document.revision = replace.revision;
                    document.updated_at = replaced_updated_at(document_type, replace.updated_at, document.updated_at, block_time);
                    repository.store_document(&document)?;
                    WriteOperation::Store {
                        data_contract_id,
                        document_id: document.id,
                        revision: document.revision,
                    }
                }
                DocumentTransition::Delete(delete) => {
                    repository.remove_document(&data_contract_id, &delete.base.document_type, &delete.base.id)?;
                    WriteOperation::Remove {
                        data_contract_id,
                        document_type: delete.base.document_type.clone(),
                        document_id: delete.base.id,
                    }
                }
            };

            let event_type = match write {
                WriteOperation::Store { .. } => TraceEventType::DocumentStored,
                WriteOperation::Remove { .. } => TraceEventType::DocumentRemoved,
            };
            let event = log.record(event_type);
            event.document_id = Some(transition.id());
            event.transition_index = Some(index);
            event.data.push(("action".to_string(), transition.action().as_str().to_string()));

            let message = format!("{} {}", transition.action().as_str(), transition.id());
            let mut entry =
                LogEntry::new(LogLevel::Info, block_time, message).with_transition(transition.id(), index);
            if let WriteOperation::Store { revision, .. } = &write {
                entry = entry.with_metadata("revision".to_string(), revision.to_string());
            }
            log.add_log(entry);

            debug!(
                target: "dste::apply",
                index,
                document_id = %transition.id(),
                action = transition.action().as_str(),
                "write issued"
            );
            writes.push(write);
        }

        log.record(TraceEventType::ApplyCompleted)
            .data
            .push(("writes".to_string(), writes.len().to_string()));

        Ok(ApplyTrace { writes, log })
    }
}

fn default_timestamp(required: bool, block_time: TimestampMillis) -> Option<TimestampMillis> {
    required.then(|| block_time)
}

fn replaced_updated_at(
    document_type: &DocumentType,
    provided: Option<TimestampMillis>,
    previous: Option<TimestampMillis>,
    block_time: TimestampMillis,
) -> Option<TimestampMillis> {
    match provided {
        Some(updated_at) => Some(updated_at),
        None if document_type.requires_updated_at() => Some(block_time),
        None => previous,
    }
}
