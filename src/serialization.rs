//! Pluggable storage encodings for documents

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SerializationError;

/// Encoding used when documents cross the storage boundary
pub trait StorageSerializer: Send + Sync {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, SerializationError>;

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, SerializationError>;

    /// Get the name of this serialization method
    fn name(&self) -> &str;
}

/// Bincode serialization backend
#[derive(Debug, Clone, Default)]
pub struct BincodeSerializer;

impl BincodeSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl StorageSerializer for BincodeSerializer {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        bincode::serialize(value).map_err(|e| SerializationError::SerializationFailed {
            reason: format!("Bincode serialization failed: {}", e),
        })
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, SerializationError> {
        bincode::deserialize(bytes).map_err(|e| SerializationError::DeserializationFailed {
            reason: format!("Bincode deserialization failed: {}", e),
        })
    }

    fn name(&self) -> &str {
        "bincode"
    }
}

/// JSON serialization backend, useful for inspecting stored entries
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn new_pretty() -> Self {
        Self { pretty: true }
    }
}

impl StorageSerializer for JsonSerializer {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        let result = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };

        result.map_err(|e| SerializationError::SerializationFailed {
            reason: format!("JSON serialization failed: {}", e),
        })
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, SerializationError> {
        serde_json::from_slice(bytes).map_err(|e| SerializationError::DeserializationFailed {
            reason: format!("JSON deserialization failed: {}", e),
        })
    }

    fn name(&self) -> &str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::types::Identifier;
    use crate::value::{Value, ValueMap};

    fn document() -> Document {
        let mut data = ValueMap::new();
        data.insert("avatar".to_string(), Value::Bytes(vec![0, 1, 2]));
        data.insert("score".to_string(), Value::Float(1.5));
        Document {
            id: Identifier::new([1; 32]),
            data_contract_id: Identifier::new([2; 32]),
            document_type: "profile".to_string(),
            owner_id: Identifier::new([3; 32]),
            revision: 2,
            created_at: Some(10),
            updated_at: Some(20),
            data,
        }
    }

    #[test]
    fn test_bincode_round_trip() {
        let serializer = BincodeSerializer::new();
        let bytes = serializer.serialize(&document()).unwrap();
        let decoded: Document = serializer.deserialize(&bytes).unwrap();
        assert_eq!(decoded, document());
    }

    #[test]
    fn test_bincode_is_deterministic() {
        let serializer = BincodeSerializer::new();
        assert_eq!(
            serializer.serialize(&document()).unwrap(),
            serializer.serialize(&document()).unwrap()
        );
    }

    #[test]
    fn test_truncated_input_fails() {
        let serializer = BincodeSerializer::new();
        let bytes = serializer.serialize(&document()).unwrap();
        let result: Result<Document, _> = serializer.deserialize(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(SerializationError::DeserializationFailed { .. })));
    }

    #[test]
    fn test_json_backend_round_trip() {
        let serializer = JsonSerializer::new_pretty();
        let bytes = serializer.serialize(&document()).unwrap();
        let decoded: Document = serializer.deserialize(&bytes).unwrap();
        assert_eq!(decoded, document());
    }
}
