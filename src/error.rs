//! Error types for the DTSE
//!
//! Business-rule violations are never raised through these types; they are
//! collected as [`crate::consensus::ConsensusError`] values inside a
//! [`crate::validation::ValidationResult`]. The errors here form the fatal
//! path: malformed boundary input, repository failures and invariant
//! breaches between validation and application.

use thiserror::Error;
use crate::types::Identifier;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Invalid document action: {action} for document {document_id}")]
    InvalidDocumentAction { action: String, document_id: String },

    #[error("Document {document_id} was not provided to the applier after validation")]
    DocumentNotProvided { document_id: Identifier },

    #[error("Batch cannot be applied: validation reported {error_count} error(s)")]
    BatchNotValid { error_count: usize },

    #[error("Malformed batch: {reason}")]
    MalformedBatch { reason: String },

    #[error("State repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepositoryError {
    #[error("Storage failure: {reason}")]
    Storage { reason: String },

    #[error("Stored entry is corrupt: {reason}")]
    Corrupt { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    #[error("Invalid identifier: {reason}")]
    InvalidIdentifier { reason: String },

    #[error("Invalid value at '{path}': {reason}")]
    InvalidFieldValue { path: String, reason: String },

    #[error("Missing field '{field}'")]
    MissingField { field: String },

    #[error("Unknown document type '{document_type}'")]
    UnknownDocumentType { document_type: String },

    #[error("Invalid data contract: {reason}")]
    InvalidDataContract { reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializationError {
    #[error("Serialization failed: {reason}")]
    SerializationFailed { reason: String },

    #[error("Deserialization failed: {reason}")]
    DeserializationFailed { reason: String },
}
