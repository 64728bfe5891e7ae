//! Data contract validation
//!
//! A contract is checked in three stages. The structural meta-schema check
//! is fatal: nothing further runs on a malformed contract. The pattern sweep
//! and the index rules are then collected together so the submitter sees
//! every problem at once.

use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::config::ValidationConfig;
use crate::consensus::ConsensusError;
use crate::data_contract::{
    is_system_property, DataContract, DocumentType, IndexDefinition, PROPERTY_ID, PROPERTY_OWNER_ID,
};
use crate::hasher::ContentHasher;
use crate::meta_schema::MetaSchemaValidator;
use crate::pattern::{PatternChecker, Re2PatternChecker};
use crate::validation::ValidationResult;

pub struct DataContractValidator {
    config: ValidationConfig,
    pattern_checker: Arc<dyn PatternChecker>,
    hasher: ContentHasher,
}

impl DataContractValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self::with_pattern_checker(config, Arc::new(Re2PatternChecker::new()))
    }

    pub fn with_pattern_checker(config: ValidationConfig, pattern_checker: Arc<dyn PatternChecker>) -> Self {
        Self {
            config,
            pattern_checker,
            hasher: ContentHasher::new(),
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a raw contract
    pub fn validate(&self, raw: &JsonValue) -> ValidationResult {
        let structural = MetaSchemaValidator::new(&self.config).validate(raw);
        if !structural.is_valid() {
            debug!(
                target: "dste::contract",
                errors = structural.errors().len(),
                "contract rejected by meta-schema"
            );
            return structural;
        }

        let mut result = self.check_patterns(raw);

        match DataContract::from_json(raw) {
            Ok(contract) => {
                for document_type in contract.document_types() {
                    result.merge(self.check_indices(document_type));
                }
            }
            Err(e) => result.add_error(ConsensusError::JsonSchema {
                instance_path: String::new(),
                keyword: "dataContract".to_string(),
                message: e.to_string(),
            }),
        }

        debug!(
            target: "dste::contract",
            valid = result.is_valid(),
            errors = result.errors().len(),
            "contract validated"
        );
        result
    }

    /// One error per pattern the deterministic engine rejects
    pub fn check_patterns(&self, raw: &JsonValue) -> ValidationResult {
        let mut patterns = Vec::new();
        collect_patterns("", raw, &mut patterns);

        let mut result = ValidationResult::new();
        for (path, pattern) in patterns {
            if let Err(message) = self.pattern_checker.check(&pattern) {
                result.add_error(ConsensusError::IncompatibleRe2Pattern { pattern, path, message });
            }
        }
        result
    }

    /// Index rules for one document type
    pub fn check_indices(&self, document_type: &DocumentType) -> ValidationResult {
        let mut result = ValidationResult::new();
        let type_name = document_type.name().to_string();

        if document_type.unique_indices().count() > self.config.max_unique_indices {
            result.add_error(ConsensusError::UniqueIndicesLimitReached {
                document_type: type_name.clone(),
                limit: self.config.max_unique_indices,
            });
        }

        let mut fingerprints = BTreeSet::new();
        for index in document_type.indices() {
            if !fingerprints.insert(self.hasher.index_fingerprint(&index.properties).0) {
                result.add_error(ConsensusError::DuplicateIndex {
                    document_type: type_name.clone(),
                    index_definition: index.clone(),
                });
            }

            if index.properties.len() == 1 && index.properties[0].name == PROPERTY_ID {
                result.add_error(ConsensusError::SystemPropertyIndexAlreadyPresent {
                    document_type: type_name.clone(),
                    index_definition: index.clone(),
                    property_name: PROPERTY_ID.to_string(),
                });
            }

            for property in &index.properties {
                if is_system_property(&property.name) {
                    continue;
                }
                match lookup_property(document_type, &property.name) {
                    Some(schema) => {
                        self.check_indexed_property(&type_name, index, &property.name, schema, &mut result)
                    }
                    None => result.add_error(ConsensusError::UndefinedIndexProperty {
                        document_type: type_name.clone(),
                        index_definition: index.clone(),
                        property_name: property.name.clone(),
                    }),
                }
            }

            if index.unique {
                self.check_unique_index(document_type, index, &mut result);
            }
        }

        result
    }

    fn check_unique_index(&self, document_type: &DocumentType, index: &IndexDefinition, result: &mut ValidationResult) {
        if self.config.require_owner_prefixed_unique_indices
            && index.properties.first().map(|p| p.name.as_str()) != Some(PROPERTY_OWNER_ID)
        {
            result.add_error(ConsensusError::UniqueIndexOwnerPrefix {
                document_type: document_type.name().to_string(),
                index_definition: index.clone(),
            });
        }

        let required_flags: BTreeSet<bool> = index
            .properties
            .iter()
            .filter(|p| !is_system_property(&p.name))
            .map(|p| document_type.is_required(&p.name))
            .collect();
        if index.properties.len() > 1 && required_flags.len() > 1 {
            result.add_error(ConsensusError::InvalidCompoundIndex {
                document_type: document_type.name().to_string(),
                index_definition: index.clone(),
            });
        }
    }

    fn check_indexed_property(
        &self,
        type_name: &str,
        index: &IndexDefinition,
        property_name: &str,
        schema: &JsonValue,
        result: &mut ValidationResult,
    ) {
        if let Some(property_type) = unindexable_type(schema) {
            result.add_error(ConsensusError::InvalidIndexPropertyType {
                document_type: type_name.to_string(),
                index_definition: index.clone(),
                property_name: property_name.to_string(),
                property_type,
            });
            return;
        }

        if schema.get("type").and_then(JsonValue::as_str) == Some("string") {
            let constraint_error = |reason: String| ConsensusError::InvalidIndexedPropertyConstraint {
                document_type: type_name.to_string(),
                index_definition: index.clone(),
                property_name: property_name.to_string(),
                constraint_name: "maxLength".to_string(),
                reason,
            };
            match schema.get("maxLength").and_then(JsonValue::as_u64) {
                None => result.add_error(constraint_error("should be set".to_string())),
                Some(max) if max > self.config.max_indexed_string_length => result.add_error(constraint_error(
                    format!("should be less or equal {}", self.config.max_indexed_string_length),
                )),
                Some(_) => {}
            }
        }
    }
}

/// Resolve a dotted index property name through nested object schemas
fn lookup_property<'a>(document_type: &'a DocumentType, name: &str) -> Option<&'a JsonValue> {
    let mut segments = name.split('.');
    let mut current = document_type.property(segments.next()?)?;
    for segment in segments {
        current = current.get("properties")?.get(segment)?;
    }
    Some(current)
}

/// Type name of an indexed property that cannot be indexed
fn unindexable_type(schema: &JsonValue) -> Option<String> {
    match schema.get("type").and_then(JsonValue::as_str) {
        Some("object") => Some("object".to_string()),
        Some("array") => {
            if schema.get("byteArray").and_then(JsonValue::as_bool) == Some(true) {
                return None;
            }
            if let Some(prefix_items) = schema.get("prefixItems").and_then(JsonValue::as_array) {
                let item_types: BTreeSet<Option<&str>> = prefix_items
                    .iter()
                    .map(|item| item.get("type").and_then(JsonValue::as_str))
                    .collect();
                let nested = item_types.iter().any(|t| matches!(t, Some("array") | Some("object")));
                if nested || item_types.len() > 1 {
                    return Some("array".to_string());
                }
            }
            match schema.get("items").and_then(|items| items.get("type")).and_then(JsonValue::as_str) {
                Some("array") | Some("object") => Some("array".to_string()),
                _ => None,
            }
        }
        _ => None,
    }
}

fn collect_patterns(path: &str, value: &JsonValue, patterns: &mut Vec<(String, String)>) {
    match value {
        JsonValue::Object(map) => {
            for (key, inner) in map {
                let inner_path = format!("{}/{}", path, key);
                match (key.as_str(), inner) {
                    ("pattern", JsonValue::String(pattern)) => patterns.push((inner_path, pattern.clone())),
                    _ => collect_patterns(&inner_path, inner, patterns),
                }
            }
        }
        JsonValue::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_patterns(&format!("{}/{}", path, i), item, patterns);
            }
        }
        _ => {}
    }
}
