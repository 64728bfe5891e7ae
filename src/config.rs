//! Validation limits and policies
//!
//! Every replica must run with the same configuration; a divergent value
//! is a consensus fault, so the defaults are the protocol constants.

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationConfig {
    /// Half-width of the accepted timestamp window around block time
    pub timestamp_window_ms: u64,
    pub max_unique_indices: usize,
    pub max_indices: usize,
    pub max_index_properties: usize,
    pub max_document_types: usize,
    pub max_defs: usize,
    pub max_schema_properties: usize,
    /// Ceiling for `maxLength` of an indexed string property
    pub max_indexed_string_length: u64,
    /// Ceiling for `maxLength` of any property declaring `pattern` or `format`
    pub max_pattern_string_length: u64,
    pub max_unique_items: u64,
    pub max_schema_depth: usize,
    /// Unique indices must start with `$ownerId`
    pub require_owner_prefixed_unique_indices: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            timestamp_window_ms: 5 * 60 * 1000,
            max_unique_indices: 3,
            max_indices: 10,
            max_index_properties: 10,
            max_document_types: 100,
            max_defs: 100,
            max_schema_properties: 100,
            max_indexed_string_length: 1024,
            max_pattern_string_length: 50_000,
            max_unique_items: 100_000,
            max_schema_depth: 64,
            require_owner_prefixed_unique_indices: true,
        }
    }
}

impl ValidationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from JSON, filling omitted fields with defaults
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(|e| DocumentError::InvalidDataContract {
            reason: format!("invalid validation config: {}", e),
        })
    }

    pub fn with_timestamp_window_ms(mut self, window_ms: u64) -> Self {
        self.timestamp_window_ms = window_ms;
        self
    }

    pub fn with_max_unique_indices(mut self, limit: usize) -> Self {
        self.max_unique_indices = limit;
        self
    }

    pub fn with_max_indexed_string_length(mut self, limit: u64) -> Self {
        self.max_indexed_string_length = limit;
        self
    }

    pub fn with_owner_prefixed_unique_indices(mut self, required: bool) -> Self {
        self.require_owner_prefixed_unique_indices = required;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_protocol_constants() {
        let config = ValidationConfig::default();
        assert_eq!(config.timestamp_window_ms, 300_000);
        assert_eq!(config.max_unique_indices, 3);
        assert!(config.require_owner_prefixed_unique_indices);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ValidationConfig::from_json(r#"{"maxUniqueIndices": 5}"#).unwrap();
        assert_eq!(config.max_unique_indices, 5);
        assert_eq!(config.max_indices, 10);
    }
}
