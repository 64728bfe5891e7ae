//! Content hashing using Blake3
//!
//! Every identifier, index fingerprint and index key produced here must be
//! bit-identical on every replica, so all encodings are explicit and
//! length-prefixed rather than delegated to a serializer's layout.

use blake3::Hasher as Blake3Hasher;
use serde::Serialize;

use crate::data_contract::IndexProperty;
use crate::error::SerializationError;
use crate::types::{Identifier, StateHash};
use crate::value::Value;

/// ContentHasher derives identifiers and fingerprints
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    // Blake3 hasher is stateless, we create new instances for each hash
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {}
    }

    /// Derive a data contract id from its owner and creation entropy
    pub fn derive_contract_id(&self, owner_id: &Identifier, entropy: &[u8; 32]) -> Identifier {
        let mut hasher = Blake3Hasher::new();
        hasher.update(owner_id.as_bytes());
        hasher.update(entropy);
        Identifier(*hasher.finalize().as_bytes())
    }

    /// Derive a document id from `dataContractId + ownerId + documentType + entropy`
    pub fn derive_document_id(
        &self,
        data_contract_id: &Identifier,
        owner_id: &Identifier,
        document_type: &str,
        entropy: &[u8; 32],
    ) -> Identifier {
        let mut hasher = Blake3Hasher::new();
        hasher.update(data_contract_id.as_bytes());
        hasher.update(owner_id.as_bytes());
        hasher.update(&(document_type.len() as u64).to_le_bytes());
        hasher.update(document_type.as_bytes());
        hasher.update(entropy);
        Identifier(*hasher.finalize().as_bytes())
    }

    /// Fingerprint of an index's ordered property list, directions included
    pub fn index_fingerprint(&self, properties: &[IndexProperty]) -> StateHash {
        let mut hasher = Blake3Hasher::new();
        hasher.update(&(properties.len() as u64).to_le_bytes());
        for property in properties {
            hasher.update(&(property.name.len() as u64).to_le_bytes());
            hasher.update(property.name.as_bytes());
            hasher.update(&[property.direction as u8]);
        }
        StateHash(*hasher.finalize().as_bytes())
    }

    /// Key identifying one tuple of indexed values
    pub fn index_key(&self, document_type: &str, index_position: usize, values: &[Value]) -> StateHash {
        let mut hasher = Blake3Hasher::new();
        hasher.update(&(document_type.len() as u64).to_le_bytes());
        hasher.update(document_type.as_bytes());
        hasher.update(&(index_position as u64).to_le_bytes());
        for value in values {
            update_with_value(&mut hasher, value);
        }
        StateHash(*hasher.finalize().as_bytes())
    }

    /// Hash any serializable value through its bincode encoding
    pub fn hash_serializable<T: Serialize>(&self, value: &T) -> Result<StateHash, SerializationError> {
        let serialized = bincode::serialize(value).map_err(|e| SerializationError::SerializationFailed {
            reason: format!("Bincode serialization failed: {}", e),
        })?;

        let mut hasher = Blake3Hasher::new();
        hasher.update(&serialized);
        Ok(StateHash(*hasher.finalize().as_bytes()))
    }

    /// Compute a single hash over an ordered sequence of hashes
    pub fn hash_chain(&self, hashes: &[StateHash]) -> StateHash {
        let mut hasher = Blake3Hasher::new();

        for hash in hashes {
            hasher.update(&hash.0);
        }

        StateHash(*hasher.finalize().as_bytes())
    }
}

fn update_with_value(hasher: &mut Blake3Hasher, value: &Value) {
    match value {
        Value::Null => {
            hasher.update(&[0]);
        }
        Value::Bool(b) => {
            hasher.update(&[1, *b as u8]);
        }
        Value::Integer(i) => {
            hasher.update(&[2]);
            hasher.update(&i.to_le_bytes());
        }
        Value::Unsigned(n) => {
            hasher.update(&[6]);
            hasher.update(&n.to_le_bytes());
        }
        Value::Float(f) => {
            hasher.update(&[3]);
            hasher.update(&f.to_bits().to_le_bytes());
        }
        Value::Text(s) => {
            hasher.update(&[4]);
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        // Identifiers and byte arrays share a tag: the same 32 bytes index identically
        Value::Bytes(bytes) => {
            hasher.update(&[5]);
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        Value::Identifier(id) => {
            hasher.update(&[5]);
            hasher.update(&(id.as_bytes().len() as u64).to_le_bytes());
            hasher.update(id.as_bytes());
        }
        Value::Array(items) => {
            hasher.update(&[6]);
            hasher.update(&(items.len() as u64).to_le_bytes());
            for item in items {
                update_with_value(hasher, item);
            }
        }
        Value::Map(map) => {
            hasher.update(&[7]);
            hasher.update(&(map.len() as u64).to_le_bytes());
            for (key, item) in map {
                hasher.update(&(key.len() as u64).to_le_bytes());
                hasher.update(key.as_bytes());
                update_with_value(hasher, item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_contract::SortDirection;

    fn property(name: &str, direction: SortDirection) -> IndexProperty {
        IndexProperty {
            name: name.to_string(),
            direction,
        }
    }

    #[test]
    fn test_document_id_is_deterministic() {
        let hasher = ContentHasher::new();
        let contract = Identifier::new([1; 32]);
        let owner = Identifier::new([2; 32]);

        let id1 = hasher.derive_document_id(&contract, &owner, "note", &[3; 32]);
        let id2 = hasher.derive_document_id(&contract, &owner, "note", &[3; 32]);
        let id3 = hasher.derive_document_id(&contract, &owner, "notes", &[3; 32]);

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_fingerprint_depends_on_order_and_direction() {
        let hasher = ContentHasher::new();
        let a = [property("a", SortDirection::Asc), property("b", SortDirection::Asc)];
        let b = [property("b", SortDirection::Asc), property("a", SortDirection::Asc)];
        let c = [property("a", SortDirection::Desc), property("b", SortDirection::Asc)];

        assert_eq!(hasher.index_fingerprint(&a), hasher.index_fingerprint(&a.clone()));
        assert_ne!(hasher.index_fingerprint(&a), hasher.index_fingerprint(&b));
        assert_ne!(hasher.index_fingerprint(&a), hasher.index_fingerprint(&c));
    }

    #[test]
    fn test_index_key_treats_identifier_as_bytes() {
        let hasher = ContentHasher::new();
        let id = Identifier::new([9; 32]);
        let as_id = hasher.index_key("note", 0, &[Value::Identifier(id)]);
        let as_bytes = hasher.index_key("note", 0, &[Value::Bytes(vec![9; 32])]);
        assert_eq!(as_id, as_bytes);
    }

    #[test]
    fn test_hash_chain_order_matters() {
        let hasher = ContentHasher::new();
        let h1 = StateHash([1; 32]);
        let h2 = StateHash([2; 32]);
        assert_ne!(hasher.hash_chain(&[h1, h2]), hasher.hash_chain(&[h2, h1]));
    }
}
