//! Document State Transition Engine (DTSE)
//!
//! Validation and application core for document batches on a replicated
//! ledger: data contracts are checked statically, document batches are
//! validated against committed state and then applied in order. Every step
//! must produce identical results on every replica.

pub mod batch_applier;
pub mod batch_validator;
pub mod config;
pub mod consensus;
pub mod context;
pub mod contract_validator;
pub mod data_contract;
pub mod data_trigger;
pub mod document;
pub mod document_factory;
pub mod error;
pub mod field_accessor;
pub mod hasher;
pub mod logging;
pub mod meta_schema;
pub mod pattern;
pub mod serialization;
pub mod state_repository;
pub mod transition;
pub mod types;
pub mod uniqueness;
pub mod validation;
pub mod value;

// Re-export core types and traits
pub use batch_applier::{ApplyTrace, BatchApplier, WriteOperation};
pub use batch_validator::{DocumentsBatchValidator, ValidatedBatch};
pub use config::ValidationConfig;
pub use consensus::{decode, CodeBand, ConsensusError, DecodedError, ErrorCategory};
pub use context::{DataTriggerExecutionContext, DeterministicTime, SeededRandom};
pub use contract_validator::DataContractValidator;
pub use data_contract::{DataContract, DocumentType, IndexDefinition, IndexProperty, SortDirection};
pub use data_trigger::{
    DataTrigger, DataTriggerBinding, DataTriggerError, DataTriggerExecutionResult, DataTriggerRegistry,
    FnDataTrigger, RejectTrigger,
};
pub use document::Document;
pub use document_factory::DocumentFactory;
pub use error::{DocumentError, ProcessingError, RepositoryError, SerializationError};
pub use field_accessor::{DocumentFieldAccessor, FieldRule};
pub use hasher::ContentHasher;
pub use logging::{ExecutionTraceLog, LogEntry, LogLevel, TraceEvent, TraceEventType};
pub use pattern::{PatternChecker, Re2PatternChecker};
pub use serialization::{BincodeSerializer, JsonSerializer, StorageSerializer};
pub use state_repository::{IndexCondition, InMemoryStateRepository, StateRepository};
pub use transition::{DocumentAction, DocumentTransition, DocumentsBatchTransition};
pub use types::{BlockHeader, Identifier, StateHash, TimeWindow, TimestampMillis};
pub use validation::ValidationResult;
pub use value::{Value, ValueMap};
