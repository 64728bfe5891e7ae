//! Structural checks for raw data contracts
//!
//! The contract meta-schema is expressed in code: the checks below walk the
//! raw JSON and report every violation as a [`ConsensusError::JsonSchema`]
//! (or [`ConsensusError::InvalidJsonSchemaRef`] for reference problems).

use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::ValidationConfig;
use crate::consensus::ConsensusError;
use crate::data_contract::{def_name_from_ref, IDENTIFIER_MEDIA_TYPE};
use crate::types::IDENTIFIER_LENGTH;
use crate::validation::ValidationResult;

const TOP_LEVEL_KEYS: [&str; 7] = [
    "$schema",
    "protocolVersion",
    "$id",
    "ownerId",
    "version",
    "$defs",
    "documents",
];

const REQUIRED_TOP_LEVEL_KEYS: [&str; 5] = ["protocolVersion", "$id", "ownerId", "version", "documents"];

const INDEX_KEYS: [&str; 3] = ["name", "properties", "unique"];

const FORBIDDEN_SCHEMA_KEYS: [&str; 2] = ["default", "propertyNames"];

/// Document type and `$defs` names: `^[a-zA-Z][a-zA-Z0-9_-]{0,63}$`
pub fn is_valid_type_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Property names: `^[a-zA-Z0-9_-]{1,64}$`
pub fn is_valid_property_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn schema_error(path: &str, keyword: &str, message: impl Into<String>) -> ConsensusError {
    ConsensusError::JsonSchema {
        instance_path: path.to_string(),
        keyword: keyword.to_string(),
        message: message.into(),
    }
}

pub struct MetaSchemaValidator<'a> {
    config: &'a ValidationConfig,
}

impl<'a> MetaSchemaValidator<'a> {
    pub fn new(config: &'a ValidationConfig) -> Self {
        Self { config }
    }

    /// Check the structure of a raw contract
    pub fn validate(&self, raw: &JsonValue) -> ValidationResult {
        let mut result = ValidationResult::new();

        let root = match raw.as_object() {
            Some(root) => root,
            None => {
                result.add_error(schema_error("", "type", "must be object"));
                return result;
            }
        };

        for key in root.keys() {
            if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
                result.add_error(schema_error(
                    "",
                    "additionalProperties",
                    format!("must NOT have additional property '{}'", key),
                ));
            }
        }
        for key in REQUIRED_TOP_LEVEL_KEYS {
            if !root.contains_key(key) {
                result.add_error(schema_error("", "required", format!("must have required property '{}'", key)));
            }
        }

        if let Some(protocol_version) = root.get("protocolVersion") {
            if protocol_version.as_u64().and_then(|v| u32::try_from(v).ok()).is_none() {
                result.add_error(schema_error("/protocolVersion", "type", "must be a 32-bit unsigned integer"));
            }
        }
        for key in ["$id", "ownerId"] {
            if let Some(value) = root.get(key) {
                self.check_identifier(&format!("/{}", key), value, &mut result);
            }
        }
        if let Some(version) = root.get("version") {
            match version.as_u64() {
                Some(v) if v >= 1 && v <= u32::MAX as u64 => {}
                _ => result.add_error(schema_error("/version", "minimum", "must be an integer >= 1")),
            }
        }

        let empty = Map::new();
        let defs = match root.get("$defs") {
            Some(raw_defs) => match self.check_named_map("/$defs", raw_defs, self.config.max_defs, &mut result) {
                Some(defs) => {
                    for (name, schema) in defs {
                        self.check_subschema(&format!("/$defs/{}", name), schema, 0, &mut result);
                    }
                    defs
                }
                None => &empty,
            },
            None => &empty,
        };

        if let Some(raw_documents) = root.get("documents") {
            if let Some(documents) =
                self.check_named_map("/documents", raw_documents, self.config.max_document_types, &mut result)
            {
                for (name, schema) in documents {
                    self.check_document_schema(&format!("/documents/{}", name), schema, &mut result);
                }
            }
        }

        // References are only meaningful once the shape is sound
        if result.is_valid() {
            self.check_refs(root, defs, &mut result);
        }

        result
    }

    fn check_identifier(&self, path: &str, value: &JsonValue, result: &mut ValidationResult) {
        let valid = value
            .as_str()
            .and_then(|text| hex::decode(text).ok())
            .map_or(false, |bytes| bytes.len() == IDENTIFIER_LENGTH);
        if !valid {
            result.add_error(schema_error(
                path,
                "identifier",
                format!("must be a {}-byte hex identifier", IDENTIFIER_LENGTH),
            ));
        }
    }

    fn check_named_map<'v>(
        &self,
        path: &str,
        value: &'v JsonValue,
        limit: usize,
        result: &mut ValidationResult,
    ) -> Option<&'v Map<String, JsonValue>> {
        let map = match value.as_object() {
            Some(map) => map,
            None => {
                result.add_error(schema_error(path, "type", "must be object"));
                return None;
            }
        };
        if map.is_empty() {
            result.add_error(schema_error(path, "minProperties", "must NOT have fewer than 1 properties"));
        }
        if map.len() > limit {
            result.add_error(schema_error(
                path,
                "maxProperties",
                format!("must NOT have more than {} properties", limit),
            ));
        }
        for name in map.keys() {
            if !is_valid_type_name(name) {
                result.add_error(schema_error(
                    &format!("{}/{}", path, name),
                    "propertyNames",
                    format!("invalid name '{}'", name),
                ));
            }
        }
        Some(map)
    }

    fn check_document_schema(&self, path: &str, schema: &JsonValue, result: &mut ValidationResult) {
        let object = match schema.as_object() {
            Some(object) => object,
            None => {
                result.add_error(schema_error(path, "type", "must be object"));
                return;
            }
        };

        if object.get("type").and_then(JsonValue::as_str) != Some("object") {
            result.add_error(schema_error(&format!("{}/type", path), "const", "must be equal to 'object'"));
        }

        match object.get("properties").and_then(JsonValue::as_object) {
            Some(properties) if properties.len() > self.config.max_schema_properties => {
                result.add_error(schema_error(
                    &format!("{}/properties", path),
                    "maxProperties",
                    format!("must NOT have more than {} properties", self.config.max_schema_properties),
                ));
            }
            _ => {}
        }

        if let Some(required) = object.get("required") {
            self.check_required(&format!("{}/required", path), required, result);
        }
        if let Some(indices) = object.get("indices") {
            self.check_indices(&format!("{}/indices", path), indices, result);
        }

        // The remaining rules are shared with every object sub-schema
        let mut body = object.clone();
        body.remove("indices");
        self.check_subschema(path, &JsonValue::Object(body), 0, result);
    }

    fn check_required(&self, path: &str, required: &JsonValue, result: &mut ValidationResult) {
        let items = match required.as_array() {
            Some(items) => items,
            None => {
                result.add_error(schema_error(path, "type", "must be array"));
                return;
            }
        };
        let mut seen = BTreeSet::new();
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(name) if !seen.insert(name) => result.add_error(schema_error(
                    path,
                    "uniqueItems",
                    format!("must NOT have duplicate items (item {} is '{}')", i, name),
                )),
                Some(_) => {}
                None => result.add_error(schema_error(&format!("{}/{}", path, i), "type", "must be string")),
            }
        }
    }

    fn check_indices(&self, path: &str, indices: &JsonValue, result: &mut ValidationResult) {
        let items = match indices.as_array() {
            Some(items) => items,
            None => {
                result.add_error(schema_error(path, "type", "must be array"));
                return;
            }
        };
        if items.len() > self.config.max_indices {
            result.add_error(schema_error(
                path,
                "maxItems",
                format!("must NOT have more than {} items", self.config.max_indices),
            ));
        }

        for (i, index) in items.iter().enumerate() {
            let index_path = format!("{}/{}", path, i);
            let object = match index.as_object() {
                Some(object) => object,
                None => {
                    result.add_error(schema_error(&index_path, "type", "must be object"));
                    continue;
                }
            };
            for key in object.keys() {
                if !INDEX_KEYS.contains(&key.as_str()) {
                    result.add_error(schema_error(
                        &index_path,
                        "additionalProperties",
                        format!("must NOT have additional property '{}'", key),
                    ));
                }
            }
            if let Some(name) = object.get("name") {
                if !name.as_str().map_or(false, is_valid_property_name) {
                    result.add_error(schema_error(&format!("{}/name", index_path), "pattern", "invalid index name"));
                }
            }
            if let Some(unique) = object.get("unique") {
                if !unique.is_boolean() {
                    result.add_error(schema_error(&format!("{}/unique", index_path), "type", "must be boolean"));
                }
            }

            let properties_path = format!("{}/properties", index_path);
            let properties = match object.get("properties").and_then(JsonValue::as_array) {
                Some(properties) => properties,
                None => {
                    result.add_error(schema_error(&index_path, "required", "must have required property 'properties'"));
                    continue;
                }
            };
            if properties.is_empty() {
                result.add_error(schema_error(&properties_path, "minItems", "must NOT have fewer than 1 items"));
            }
            if properties.len() > self.config.max_index_properties {
                result.add_error(schema_error(
                    &properties_path,
                    "maxItems",
                    format!("must NOT have more than {} items", self.config.max_index_properties),
                ));
            }
            for (j, property) in properties.iter().enumerate() {
                let property_path = format!("{}/{}", properties_path, j);
                let pair = match property.as_object() {
                    Some(pair) if pair.len() == 1 => pair,
                    _ => {
                        result.add_error(schema_error(
                            &property_path,
                            "maxProperties",
                            "must be an object with exactly one property",
                        ));
                        continue;
                    }
                };
                for direction in pair.values() {
                    if !matches!(direction.as_str(), Some("asc") | Some("desc")) {
                        result.add_error(schema_error(&property_path, "enum", "must be equal to one of 'asc', 'desc'"));
                    }
                }
            }
        }
    }

    fn check_subschema(&self, path: &str, schema: &JsonValue, depth: usize, result: &mut ValidationResult) {
        if depth > self.config.max_schema_depth {
            result.add_error(schema_error(
                path,
                "maxDepth",
                format!("must NOT be nested deeper than {}", self.config.max_schema_depth),
            ));
            return;
        }

        let object = match schema.as_object() {
            Some(object) => object,
            None => {
                result.add_error(schema_error(path, "type", "must be object"));
                return;
            }
        };

        for key in FORBIDDEN_SCHEMA_KEYS {
            if object.contains_key(key) {
                result.add_error(schema_error(path, key, format!("'{}' is not allowed", key)));
            }
        }

        if object.contains_key("$ref") {
            return;
        }

        let schema_type = object.get("type").and_then(JsonValue::as_str);
        let byte_array = object.get("byteArray");

        if let Some(byte_array) = byte_array {
            if byte_array != &JsonValue::Bool(true) {
                result.add_error(schema_error(path, "byteArray", "must be equal to true"));
            }
            if schema_type != Some("array") {
                result.add_error(schema_error(path, "byteArray", "requires type 'array'"));
            }
            if object.contains_key("items") {
                result.add_error(schema_error(path, "byteArray", "must NOT be used with 'items'"));
            }
        }

        if object.get("contentMediaType").and_then(JsonValue::as_str) == Some(IDENTIFIER_MEDIA_TYPE) {
            let min = object.get("minItems").and_then(JsonValue::as_u64);
            let max = object.get("maxItems").and_then(JsonValue::as_u64);
            let expected = IDENTIFIER_LENGTH as u64;
            if byte_array.is_none() || min != Some(expected) || max != Some(expected) {
                result.add_error(schema_error(
                    path,
                    "contentMediaType",
                    format!("identifier fields must be byte arrays of exactly {} items", expected),
                ));
            }
        }

        if object.get("uniqueItems").and_then(JsonValue::as_bool) == Some(true) {
            match object.get("maxItems").and_then(JsonValue::as_u64) {
                Some(max) if max <= self.config.max_unique_items => {}
                _ => result.add_error(schema_error(
                    path,
                    "maxItems",
                    format!("'uniqueItems' requires 'maxItems' <= {}", self.config.max_unique_items),
                )),
            }
        }

        if object.contains_key("pattern") || object.contains_key("format") {
            match object.get("maxLength").and_then(JsonValue::as_u64) {
                Some(max) if max <= self.config.max_pattern_string_length => {}
                _ => result.add_error(schema_error(
                    path,
                    "maxLength",
                    format!(
                        "'pattern' and 'format' require 'maxLength' <= {}",
                        self.config.max_pattern_string_length
                    ),
                )),
            }
        }

        match schema_type {
            Some("object") => self.check_object_schema(path, object, depth, result),
            Some("array") if byte_array.is_none() => self.check_array_schema(path, object, depth, result),
            _ => {}
        }
    }

    fn check_object_schema(
        &self,
        path: &str,
        object: &Map<String, JsonValue>,
        depth: usize,
        result: &mut ValidationResult,
    ) {
        match object.get("properties").and_then(JsonValue::as_object) {
            Some(properties) if !properties.is_empty() => {
                for (name, inner) in properties {
                    let inner_path = format!("{}/properties/{}", path, name);
                    if !is_valid_property_name(name) {
                        result.add_error(schema_error(
                            &inner_path,
                            "propertyNames",
                            format!("invalid property name '{}'", name),
                        ));
                    }
                    self.check_subschema(&inner_path, inner, depth + 1, result);
                }
            }
            _ => result.add_error(schema_error(
                path,
                "properties",
                "object schemas must define at least one property",
            )),
        }

        if object.get("additionalProperties") != Some(&JsonValue::Bool(false)) {
            result.add_error(schema_error(
                &format!("{}/additionalProperties", path),
                "const",
                "must be equal to false",
            ));
        }
    }

    fn check_array_schema(
        &self,
        path: &str,
        object: &Map<String, JsonValue>,
        depth: usize,
        result: &mut ValidationResult,
    ) {
        if let Some(prefix_items) = object.get("prefixItems") {
            match prefix_items.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.check_subschema(&format!("{}/prefixItems/{}", path, i), item, depth + 1, result);
                    }
                }
                None => result.add_error(schema_error(&format!("{}/prefixItems", path), "type", "must be array")),
            }
            if !object.contains_key("items") {
                result.add_error(schema_error(path, "items", "'prefixItems' requires 'items'"));
            }
        }

        match object.get("items") {
            Some(JsonValue::Bool(false)) if object.contains_key("prefixItems") => {}
            Some(items) => self.check_subschema(&format!("{}/items", path), items, depth + 1, result),
            None if object.contains_key("prefixItems") => {}
            None => result.add_error(schema_error(path, "required", "must have required property 'items'")),
        }
    }

    fn check_refs(&self, root: &Map<String, JsonValue>, defs: &Map<String, JsonValue>, result: &mut ValidationResult) {
        let mut references = Vec::new();
        for (name, schema) in defs {
            collect_refs(&format!("/$defs/{}", name), schema, &mut references);
        }
        if let Some(documents) = root.get("documents") {
            collect_refs("/documents", documents, &mut references);
        }

        let mut unresolved = false;
        for (path, reference) in &references {
            match def_name_from_ref(reference) {
                Some(name) if defs.contains_key(name) => {}
                Some(_) => {
                    unresolved = true;
                    result.add_error(ConsensusError::InvalidJsonSchemaRef {
                        message: format!("Can't resolve reference '{}' from '{}'", reference, path),
                    });
                }
                None => {
                    unresolved = true;
                    result.add_error(ConsensusError::InvalidJsonSchemaRef {
                        message: format!("Only local references to $defs are allowed, got '{}' at '{}'", reference, path),
                    });
                }
            }
        }
        if unresolved {
            return;
        }

        let mut graph: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for (name, schema) in defs {
            let mut own = Vec::new();
            collect_refs("", schema, &mut own);
            let targets = own
                .into_iter()
                .filter_map(|(_, reference)| def_name_from_ref(&reference).map(str::to_string))
                .collect();
            graph.insert(name.as_str(), targets);
        }

        if let Some(name) = find_cycle(&graph) {
            result.add_error(ConsensusError::InvalidJsonSchemaRef {
                message: format!("Circular $ref pointer through '#/$defs/{}'", name),
            });
        }
    }
}

fn collect_refs(path: &str, value: &JsonValue, references: &mut Vec<(String, String)>) {
    match value {
        JsonValue::Object(map) => {
            for (key, inner) in map {
                if key == "$ref" {
                    if let Some(reference) = inner.as_str() {
                        references.push((path.to_string(), reference.to_string()));
                    }
                } else {
                    collect_refs(&format!("{}/{}", path, key), inner, references);
                }
            }
        }
        JsonValue::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_refs(&format!("{}/{}", path, i), item, references);
            }
        }
        _ => {}
    }
}

/// First definition found on a reference cycle, if any
fn find_cycle(graph: &BTreeMap<&str, BTreeSet<String>>) -> Option<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'g>(
        node: &'g str,
        graph: &'g BTreeMap<&str, BTreeSet<String>>,
        marks: &mut BTreeMap<&'g str, Mark>,
    ) -> Option<String> {
        match marks.get(node) {
            Some(Mark::Visiting) => return Some(node.to_string()),
            Some(Mark::Done) => return None,
            None => {}
        }
        marks.insert(node, Mark::Visiting);
        if let Some(targets) = graph.get(node) {
            for target in targets {
                if let Some(cycle) = visit(target.as_str(), graph, marks) {
                    return Some(cycle);
                }
            }
        }
        marks.insert(node, Mark::Done);
        None
    }

    let mut marks = BTreeMap::new();
    for node in graph.keys() {
        if let Some(cycle) = visit(node, graph, &mut marks) {
            return Some(cycle);
        }
    }
    None
}
