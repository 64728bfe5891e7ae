//! Consensus error taxonomy
//!
//! Every rejected contract or batch is reported through [`ConsensusError`].
//! Each variant carries a stable numeric code from a banded code space; the
//! boundary layer only sees `(code, payload)` pairs and maps them to a
//! closed set of [`ErrorCategory`] values with [`decode`]. The mapping is
//! pure so that every replica reports the same category for the same error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_contract::IndexDefinition;
use crate::types::{Identifier, TimestampMillis};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsensusError {
    #[error("JSON schema error at '{instance_path}' ({keyword}): {message}")]
    JsonSchema {
        instance_path: String,
        keyword: String,
        message: String,
    },

    #[error("Duplicate index {index_definition} in document type '{document_type}'")]
    DuplicateIndex {
        document_type: String,
        index_definition: IndexDefinition,
    },

    #[error("Pattern '{pattern}' at '{path}' is not compatible with RE2: {message}")]
    IncompatibleRe2Pattern {
        pattern: String,
        path: String,
        message: String,
    },

    #[error("Unique compound index {index_definition} in '{document_type}' mixes required and optional properties")]
    InvalidCompoundIndex {
        document_type: String,
        index_definition: IndexDefinition,
    },

    #[error("Indexed property '{property_name}' in '{document_type}' has invalid '{constraint_name}': {reason}")]
    InvalidIndexedPropertyConstraint {
        document_type: String,
        index_definition: IndexDefinition,
        property_name: String,
        constraint_name: String,
        reason: String,
    },

    #[error("Property '{property_name}' in '{document_type}' of type {property_type} cannot be indexed")]
    InvalidIndexPropertyType {
        document_type: String,
        index_definition: IndexDefinition,
        property_name: String,
        property_type: String,
    },

    #[error("Invalid JSON Schema $ref: {message}")]
    InvalidJsonSchemaRef { message: String },

    #[error("System property '{property_name}' is already indexed in '{document_type}'")]
    SystemPropertyIndexAlreadyPresent {
        document_type: String,
        index_definition: IndexDefinition,
        property_name: String,
    },

    #[error("Index {index_definition} in '{document_type}' references undefined property '{property_name}'")]
    UndefinedIndexProperty {
        document_type: String,
        index_definition: IndexDefinition,
        property_name: String,
    },

    #[error("Document type '{document_type}' has more than {limit} unique indices")]
    UniqueIndicesLimitReached { document_type: String, limit: usize },

    #[error("Unique index {index_definition} in '{document_type}' must start with $ownerId")]
    UniqueIndexOwnerPrefix {
        document_type: String,
        index_definition: IndexDefinition,
    },

    #[error("Batch has more than one transition for documents {}", format_references(.references))]
    DuplicateDocumentTransitions {
        /// `(document type, document id)` of each repeated transition target
        references: Vec<(String, Identifier)>,
    },

    #[error("Data contract {data_contract_id} is not present")]
    DataContractNotPresent { data_contract_id: Identifier },

    #[error("Invalid document transition id {actual_id}, expected {expected_id}")]
    InvalidDocumentTransitionId {
        expected_id: Identifier,
        actual_id: Identifier,
    },

    #[error("Document type '{document_type}' is not defined in data contract {data_contract_id}")]
    InvalidDocumentType {
        document_type: String,
        data_contract_id: Identifier,
    },

    #[error("Data trigger condition failed for document {document_id}: {message}")]
    DataTriggerCondition {
        data_contract_id: Identifier,
        document_id: Identifier,
        message: String,
    },

    #[error("Data trigger execution failed for document {document_id}: {message}")]
    DataTriggerExecution {
        data_contract_id: Identifier,
        document_id: Identifier,
        owner_id: Identifier,
        message: String,
    },

    #[error("Document {document_id} is already present")]
    DocumentAlreadyPresent { document_id: Identifier },

    #[error("Document {document_id} was not found")]
    DocumentNotFound { document_id: Identifier },

    #[error("Document {document_id} is owned by {existing_owner_id}, not {owner_id}")]
    DocumentOwnerIdMismatch {
        document_id: Identifier,
        owner_id: Identifier,
        existing_owner_id: Identifier,
    },

    #[error("Document {document_id} has mismatching $createdAt and $updatedAt")]
    DocumentTimestampsMismatch { document_id: Identifier },

    #[error("Document {document_id} ${timestamp_name} {timestamp} is outside [{window_start}, {window_end}]")]
    DocumentTimestampWindowViolation {
        document_id: Identifier,
        timestamp_name: String,
        timestamp: TimestampMillis,
        window_start: TimestampMillis,
        window_end: TimestampMillis,
    },

    #[error("Document {document_id} of type '{document_type}' duplicates {conflicting_document_id} on unique index {index_properties:?}")]
    DuplicateUniqueIndex {
        document_id: Identifier,
        document_type: String,
        index_properties: Vec<String>,
        conflicting_document_id: Identifier,
    },

    #[error("Document {document_id} revision {provided_revision} does not follow stored revision {current_revision}")]
    InvalidDocumentRevision {
        document_id: Identifier,
        current_revision: u64,
        provided_revision: u64,
    },
}

impl ConsensusError {
    /// Stable numeric code of this error
    pub fn code(&self) -> u32 {
        match self {
            ConsensusError::JsonSchema { .. } => 1004,
            ConsensusError::DuplicateIndex { .. } => 1008,
            ConsensusError::IncompatibleRe2Pattern { .. } => 1009,
            ConsensusError::InvalidCompoundIndex { .. } => 1010,
            ConsensusError::InvalidIndexedPropertyConstraint { .. } => 1012,
            ConsensusError::InvalidIndexPropertyType { .. } => 1013,
            ConsensusError::InvalidJsonSchemaRef { .. } => 1014,
            ConsensusError::SystemPropertyIndexAlreadyPresent { .. } => 1015,
            ConsensusError::UndefinedIndexProperty { .. } => 1016,
            ConsensusError::UniqueIndicesLimitReached { .. } => 1017,
            ConsensusError::DataContractNotPresent { .. } => 1018,
            ConsensusError::DuplicateDocumentTransitions { .. } => 1019,
            ConsensusError::InvalidDocumentTransitionId { .. } => 1023,
            ConsensusError::InvalidDocumentType { .. } => 1024,
            ConsensusError::UniqueIndexOwnerPrefix { .. } => 1028,
            ConsensusError::DataTriggerCondition { .. } => 4001,
            ConsensusError::DataTriggerExecution { .. } => 4002,
            ConsensusError::DocumentAlreadyPresent { .. } => 4004,
            ConsensusError::DocumentNotFound { .. } => 4005,
            ConsensusError::DocumentOwnerIdMismatch { .. } => 4006,
            ConsensusError::DocumentTimestampsMismatch { .. } => 4007,
            ConsensusError::DocumentTimestampWindowViolation { .. } => 4008,
            ConsensusError::DuplicateUniqueIndex { .. } => 4009,
            ConsensusError::InvalidDocumentRevision { .. } => 4010,
        }
    }

    /// Category reported to callers for this error
    pub fn category(&self) -> ErrorCategory {
        category_for_code(self.code())
    }

    /// Encode as the `(code, payload)` pair crossing the protocol boundary
    pub fn to_wire(&self) -> (u32, Vec<u8>) {
        (self.code(), self.to_string().into_bytes())
    }
}

fn format_references(references: &[(String, Identifier)]) -> String {
    references
        .iter()
        .map(|(document_type, id)| format!("{}:{}", document_type, id))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Closed set of categories the boundary layer reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    InvalidArgument,
    Unauthenticated,
    FailedPrecondition,
    NotFound,
    ResourceExhausted,
    Internal,
}

/// Partition of the numeric code space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeBand {
    /// 0-16: transport status codes surfaced by the store
    Status,
    /// 1000-1999: structure and schema errors
    Basic,
    /// 2000-2999: signature errors
    Signature,
    /// 3000-3999: fee errors
    Fee,
    /// 4000-4999: state errors
    State,
    Unknown,
}

impl CodeBand {
    pub fn of(code: u32) -> Self {
        match code {
            0..=16 => CodeBand::Status,
            1000..=1999 => CodeBand::Basic,
            2000..=2999 => CodeBand::Signature,
            3000..=3999 => CodeBand::Fee,
            4000..=4999 => CodeBand::State,
            _ => CodeBand::Unknown,
        }
    }
}

/// Names of the codes this crate knows about
const KNOWN_CODES: &[(u32, &str)] = &[
    (1004, "JsonSchemaError"),
    (1008, "DuplicateIndexError"),
    (1009, "IncompatibleRe2PatternError"),
    (1010, "InvalidCompoundIndexError"),
    (1012, "InvalidIndexedPropertyConstraintError"),
    (1013, "InvalidIndexPropertyTypeError"),
    (1014, "InvalidJsonSchemaRefError"),
    (1015, "SystemPropertyIndexAlreadyPresentError"),
    (1016, "UndefinedIndexPropertyError"),
    (1017, "UniqueIndicesLimitReachedError"),
    (1018, "DataContractNotPresentError"),
    (1019, "DuplicateDocumentTransitionsWithIdsError"),
    (1023, "InvalidDocumentTransitionIdError"),
    (1024, "InvalidDocumentTypeError"),
    (1028, "UniqueIndexOwnerPrefixError"),
    (3000, "BalanceIsNotEnoughError"),
    (4001, "DataTriggerConditionError"),
    (4002, "DataTriggerExecutionError"),
    (4004, "DocumentAlreadyPresentError"),
    (4005, "DocumentNotFoundError"),
    (4006, "DocumentOwnerIdMismatchError"),
    (4007, "DocumentTimestampsMismatchError"),
    (4008, "DocumentTimestampWindowViolationError"),
    (4009, "DuplicateUniqueIndexError"),
    (4010, "InvalidDocumentRevisionError"),
];

/// Name of a known error code
pub fn code_name(code: u32) -> Option<&'static str> {
    KNOWN_CODES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
}

fn category_for_code(code: u32) -> ErrorCategory {
    match CodeBand::of(code) {
        CodeBand::Status => match code {
            3 => ErrorCategory::InvalidArgument,
            5 => ErrorCategory::NotFound,
            8 => ErrorCategory::ResourceExhausted,
            9 => ErrorCategory::FailedPrecondition,
            16 => ErrorCategory::Unauthenticated,
            _ => ErrorCategory::Internal,
        },
        CodeBand::Basic => ErrorCategory::InvalidArgument,
        CodeBand::Signature => ErrorCategory::Unauthenticated,
        CodeBand::Fee => ErrorCategory::FailedPrecondition,
        CodeBand::State => match code {
            4005 => ErrorCategory::NotFound,
            _ => ErrorCategory::FailedPrecondition,
        },
        CodeBand::Unknown => ErrorCategory::Internal,
    }
}

/// An error code decoded at the protocol boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedError {
    pub code: u32,
    pub band: CodeBand,
    pub category: ErrorCategory,
    pub name: Option<String>,
    /// Payload text, when the opaque payload is valid UTF-8
    pub message: Option<String>,
}

/// Decode a `(code, payload)` pair into its category
///
/// The category depends on the code alone; the payload is carried through
/// as a message and never influences classification.
pub fn decode(code: u32, payload: &[u8]) -> DecodedError {
    let message = if payload.is_empty() {
        None
    } else {
        std::str::from_utf8(payload).ok().map(str::to_string)
    };

    DecodedError {
        code,
        band: CodeBand::of(code),
        category: category_for_code(code),
        name: code_name(code).map(str::to_string),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(CodeBand::of(5), CodeBand::Status);
        assert_eq!(CodeBand::of(1016), CodeBand::Basic);
        assert_eq!(CodeBand::of(2001), CodeBand::Signature);
        assert_eq!(CodeBand::of(3000), CodeBand::Fee);
        assert_eq!(CodeBand::of(4010), CodeBand::State);
        assert_eq!(CodeBand::of(999), CodeBand::Unknown);
    }

    #[test]
    fn test_wire_round_trip_preserves_category() {
        let error = ConsensusError::DocumentNotFound {
            document_id: Identifier::new([1; 32]),
        };
        let (code, payload) = error.to_wire();
        let decoded = decode(code, &payload);

        assert_eq!(decoded.category, ErrorCategory::NotFound);
        assert_eq!(decoded.name.as_deref(), Some("DocumentNotFoundError"));
        assert_eq!(decoded.message, Some(error.to_string()));
    }

    #[test]
    fn test_duplicate_transitions_are_basic_errors() {
        let error = ConsensusError::DuplicateDocumentTransitions {
            references: vec![("note".to_string(), Identifier::new([3; 32]))],
        };
        let (code, payload) = error.to_wire();
        let decoded = decode(code, &payload);

        assert_eq!(code, 1019);
        assert_eq!(decoded.band, CodeBand::Basic);
        assert_eq!(decoded.category, ErrorCategory::InvalidArgument);
        assert_eq!(decoded.name.as_deref(), Some("DuplicateDocumentTransitionsWithIdsError"));
        assert!(error.to_string().contains(&format!("note:{}", Identifier::new([3; 32]))));
    }

    #[test]
    fn test_every_known_code_is_named() {
        for (code, name) in KNOWN_CODES {
            assert_eq!(code_name(*code), Some(*name));
        }
        assert_eq!(code_name(1), None);
    }
}
