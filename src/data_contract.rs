//! Data contract model
//!
//! A [`DataContract`] is parsed from its raw JSON form once the
//! [`crate::contract_validator::DataContractValidator`] has accepted it.
//! Local `$ref`s into `$defs` are resolved while parsing so that every
//! consumer sees fully expanded property schemas.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::DocumentError;
use crate::field_accessor::DocumentFieldAccessor;
use crate::types::Identifier;

pub const PROPERTY_ID: &str = "$id";
pub const PROPERTY_OWNER_ID: &str = "$ownerId";
pub const PROPERTY_CREATED_AT: &str = "$createdAt";
pub const PROPERTY_UPDATED_AT: &str = "$updatedAt";

/// Properties every document carries outside its data payload
pub const SYSTEM_PROPERTIES: [&str; 4] = [
    PROPERTY_ID,
    PROPERTY_OWNER_ID,
    PROPERTY_CREATED_AT,
    PROPERTY_UPDATED_AT,
];

/// Content media type marking a 32-byte identifier field
pub const IDENTIFIER_MEDIA_TYPE: &str = "application/x.dash.dpp.identifier";

/// Prefix of every local schema reference
pub const DEFS_REF_PREFIX: &str = "#/$defs/";

const MAX_REF_DEPTH: usize = 32;

pub fn is_system_property(name: &str) -> bool {
    SYSTEM_PROPERTIES.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Asc = 0,
    Desc = 1,
}

impl SortDirection {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexProperty {
    pub name: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: Option<String>,
    pub properties: Vec<IndexProperty>,
    pub unique: bool,
}

impl IndexDefinition {
    /// Parse `{"name"?, "properties": [{"<prop>": "asc"|"desc"}, ...], "unique"?}`
    pub fn from_json(json: &JsonValue) -> Result<Self, DocumentError> {
        let invalid = |reason: &str| DocumentError::InvalidDataContract {
            reason: format!("invalid index definition: {}", reason),
        };

        let object = json.as_object().ok_or_else(|| invalid("not an object"))?;
        let raw_properties = object
            .get("properties")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| invalid("missing properties"))?;

        let mut properties = Vec::with_capacity(raw_properties.len());
        for raw in raw_properties {
            let pair = raw.as_object().ok_or_else(|| invalid("property is not an object"))?;
            if pair.len() != 1 {
                return Err(invalid("property must have exactly one entry"));
            }
            for (name, direction) in pair {
                let direction = direction
                    .as_str()
                    .and_then(SortDirection::parse)
                    .ok_or_else(|| invalid("direction must be asc or desc"))?;
                properties.push(IndexProperty {
                    name: name.clone(),
                    direction,
                });
            }
        }

        Ok(Self {
            name: object.get("name").and_then(JsonValue::as_str).map(str::to_string),
            properties,
            unique: object.get("unique").and_then(JsonValue::as_bool).unwrap_or(false),
        })
    }

    pub fn property_names(&self) -> Vec<String> {
        self.properties.iter().map(|p| p.name.clone()).collect()
    }
}

impl fmt::Display for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, property) in self.properties.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", property.name, property.direction.as_str())?;
        }
        write!(f, "]")?;
        if self.unique {
            write!(f, " unique")?;
        }
        Ok(())
    }
}

/// One document type of a contract with its resolved schema
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentType {
    name: String,
    properties: BTreeMap<String, JsonValue>,
    required: BTreeSet<String>,
    indices: Vec<IndexDefinition>,
    accessor: DocumentFieldAccessor,
}

impl DocumentType {
    /// Build a document type from its schema, resolving `$ref`s against `defs`
    pub fn from_schema(
        name: &str,
        schema: &JsonValue,
        defs: &Map<String, JsonValue>,
    ) -> Result<Self, DocumentError> {
        let resolved = resolve_refs(schema, defs, 0)?;

        let properties: BTreeMap<String, JsonValue> = resolved
            .get("properties")
            .and_then(JsonValue::as_object)
            .map(|props| props.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let required = resolved
            .get("required")
            .and_then(JsonValue::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let indices = match resolved.get("indices").and_then(JsonValue::as_array) {
            Some(raw_indices) => raw_indices
                .iter()
                .map(IndexDefinition::from_json)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let accessor = DocumentFieldAccessor::compile(&properties);

        Ok(Self {
            name: name.to_string(),
            properties,
            required,
            indices,
            accessor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &BTreeMap<String, JsonValue> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&JsonValue> {
        self.properties.get(name)
    }

    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    pub fn indices(&self) -> &[IndexDefinition] {
        &self.indices
    }

    pub fn unique_indices(&self) -> impl Iterator<Item = (usize, &IndexDefinition)> {
        self.indices.iter().enumerate().filter(|(_, index)| index.unique)
    }

    pub fn field_accessor(&self) -> &DocumentFieldAccessor {
        &self.accessor
    }

    pub fn requires_created_at(&self) -> bool {
        self.is_required(PROPERTY_CREATED_AT)
    }

    pub fn requires_updated_at(&self) -> bool {
        self.is_required(PROPERTY_UPDATED_AT)
    }
}

/// A committed data contract
#[derive(Debug, Clone, PartialEq)]
pub struct DataContract {
    id: Identifier,
    owner_id: Identifier,
    version: u32,
    protocol_version: u32,
    document_types: BTreeMap<String, DocumentType>,
    raw: JsonValue,
}

impl DataContract {
    /// Parse a raw contract that has passed structural validation
    pub fn from_json(raw: &JsonValue) -> Result<Self, DocumentError> {
        let object = raw.as_object().ok_or_else(|| DocumentError::InvalidDataContract {
            reason: "contract is not an object".to_string(),
        })?;

        let id = parse_identifier_field(object, "$id")?;
        let owner_id = parse_identifier_field(object, "ownerId")?;
        let version = parse_u32_field(object, "version")?;
        let protocol_version = parse_u32_field(object, "protocolVersion")?;

        let empty = Map::new();
        let defs = object
            .get("$defs")
            .and_then(JsonValue::as_object)
            .unwrap_or(&empty);

        let documents = object
            .get("documents")
            .and_then(JsonValue::as_object)
            .ok_or_else(|| DocumentError::MissingField {
                field: "documents".to_string(),
            })?;

        let mut document_types = BTreeMap::new();
        for (name, schema) in documents {
            document_types.insert(name.clone(), DocumentType::from_schema(name, schema, defs)?);
        }

        Ok(Self {
            id,
            owner_id,
            version,
            protocol_version,
            document_types,
            raw: raw.clone(),
        })
    }

    pub fn id(&self) -> Identifier {
        self.id
    }

    pub fn owner_id(&self) -> Identifier {
        self.owner_id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    pub fn document_type(&self, name: &str) -> Option<&DocumentType> {
        self.document_types.get(name)
    }

    pub fn document_types(&self) -> impl Iterator<Item = &DocumentType> {
        self.document_types.values()
    }

    /// Look up a document type, failing for unknown names
    pub fn require_document_type(&self, name: &str) -> Result<&DocumentType, DocumentError> {
        self.document_type(name).ok_or_else(|| DocumentError::UnknownDocumentType {
            document_type: name.to_string(),
        })
    }

    pub fn to_json(&self) -> JsonValue {
        self.raw.clone()
    }
}

fn parse_identifier_field(object: &Map<String, JsonValue>, field: &str) -> Result<Identifier, DocumentError> {
    let text = object
        .get(field)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| DocumentError::MissingField {
            field: field.to_string(),
        })?;
    Identifier::from_hex(text)
}

fn parse_u32_field(object: &Map<String, JsonValue>, field: &str) -> Result<u32, DocumentError> {
    object
        .get(field)
        .and_then(JsonValue::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| DocumentError::MissingField {
            field: field.to_string(),
        })
}

/// Name of the `$defs` entry a local reference points to
pub fn def_name_from_ref(reference: &str) -> Option<&str> {
    reference
        .strip_prefix(DEFS_REF_PREFIX)
        .filter(|name| !name.is_empty() && !name.contains('/'))
}

/// Replace every `{"$ref": "#/$defs/<name>"}` with the referenced schema
///
/// `depth` counts reference hops only; nesting inside a schema is free.
pub fn resolve_refs(
    schema: &JsonValue,
    defs: &Map<String, JsonValue>,
    depth: usize,
) -> Result<JsonValue, DocumentError> {
    if depth > MAX_REF_DEPTH {
        return Err(DocumentError::InvalidDataContract {
            reason: "$ref nesting is too deep or circular".to_string(),
        });
    }

    match schema {
        JsonValue::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(JsonValue::as_str) {
                let target = def_name_from_ref(reference)
                    .and_then(|name| defs.get(name))
                    .ok_or_else(|| DocumentError::InvalidDataContract {
                        reason: format!("unresolvable $ref '{}'", reference),
                    })?;
                return resolve_refs(target, defs, depth + 1);
            }

            let mut resolved = Map::new();
            for (key, value) in map {
                resolved.insert(key.clone(), resolve_refs(value, defs, depth)?);
            }
            Ok(JsonValue::Object(resolved))
        }
        JsonValue::Array(items) => items
            .iter()
            .map(|item| resolve_refs(item, defs, depth))
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        other => Ok(other.clone()),
    }
}
