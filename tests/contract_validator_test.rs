mod common;

use common::*;
use dste::{ConsensusError, DataContract, DataContractValidator, DocumentFactory, ValidationConfig, ValidationResult};
use proptest::prelude::*;
use serde_json::{json, Value as JsonValue};

fn validate(raw: &JsonValue) -> ValidationResult {
    DataContractValidator::new(ValidationConfig::default()).validate(raw)
}

fn with_indices(indices: JsonValue) -> JsonValue {
    let mut raw = json!({
        "protocolVersion": 1,
        "$id": "0a".repeat(32),
        "ownerId": "0b".repeat(32),
        "version": 1,
        "documents": {
            "item": {
                "type": "object",
                "properties": {
                    "a": { "type": "string", "maxLength": 10 },
                    "b": { "type": "string", "maxLength": 10 },
                    "label": { "type": "string", "maxLength": 32 }
                },
                "required": ["label"],
                "additionalProperties": false
            }
        }
    });
    raw["documents"]["item"]["indices"] = indices;
    raw
}

#[test]
fn test_fixture_contract_is_valid() {
    assert!(validate(&contract_json()).is_valid());
}

#[test]
fn test_factory_contract_is_valid_and_parses() {
    let mut factory = DocumentFactory::with_seed(41);
    let raw = factory.create_data_contract_json(owner(), contract_json()["documents"].clone(), None);

    assert!(validate(&raw).is_valid());
    let contract = DataContract::from_json(&raw).unwrap();
    assert_eq!(contract.owner_id(), owner());
    assert!(contract.document_type("note").is_some());
}

#[test]
fn test_unique_index_owner_prefix_policy() {
    let raw = with_indices(json!([{ "properties": [{ "label": "asc" }], "unique": true }]));
    assert_eq!(validate(&raw).codes(), vec![1028]);

    let relaxed = DataContractValidator::new(ValidationConfig::default().with_owner_prefixed_unique_indices(false));
    assert!(relaxed.validate(&raw).is_valid());
}

#[test]
fn test_compound_unique_index_mixing_required_and_optional() {
    let raw = with_indices(json!([
        { "properties": [{ "$ownerId": "asc" }, { "label": "asc" }, { "a": "asc" }], "unique": true }
    ]));
    assert_eq!(validate(&raw).codes(), vec![1010]);

    let all_optional = with_indices(json!([
        { "properties": [{ "$ownerId": "asc" }, { "a": "asc" }, { "b": "asc" }], "unique": true }
    ]));
    assert!(validate(&all_optional).is_valid());
}

#[test]
fn test_single_id_index_is_redundant() {
    let raw = with_indices(json!([{ "properties": [{ "$id": "asc" }] }]));
    match validate(&raw).first_error() {
        Some(ConsensusError::SystemPropertyIndexAlreadyPresent { property_name, .. }) => {
            assert_eq!(property_name, "$id");
        }
        other => panic!("expected system property error, got {:?}", other),
    }
}

#[test]
fn test_indexed_string_ceiling_is_configurable() {
    let raw = with_indices(json!([{ "properties": [{ "label": "asc" }] }]));
    let strict = DataContractValidator::new(ValidationConfig::default().with_max_indexed_string_length(16));
    match strict.validate(&raw).first_error() {
        Some(ConsensusError::InvalidIndexedPropertyConstraint { reason, .. }) => {
            assert_eq!(reason, "should be less or equal 16");
        }
        other => panic!("expected constraint error, got {:?}", other),
    }
}

#[test]
fn test_meta_schema_failure_stops_validation() {
    let mut raw = with_indices(json!([{ "properties": [{ "missing": "asc" }] }]));
    raw["documents"]["item"]["additionalProperties"] = json!(true);

    let codes = validate(&raw).codes();
    assert!(!codes.is_empty());
    assert!(codes.iter().all(|code| *code == 1004));
}

#[test]
fn test_circular_definitions_are_rejected() {
    let mut raw = with_indices(json!([]));
    raw["$defs"] = json!({
        "left": {
            "type": "object",
            "properties": { "right": { "$ref": "#/$defs/right" } },
            "additionalProperties": false
        },
        "right": {
            "type": "object",
            "properties": { "left": { "$ref": "#/$defs/left" } },
            "additionalProperties": false
        }
    });
    raw["documents"]["item"]["properties"]["tree"] = json!({ "$ref": "#/$defs/left" });

    let result = validate(&raw);
    assert_eq!(result.codes(), vec![1014]);
}

#[test]
fn test_config_loads_from_json() {
    let config = ValidationConfig::from_json(r#"{ "maxUniqueIndices": 1 }"#).unwrap();
    assert_eq!(config.max_unique_indices, 1);
    assert_eq!(config.timestamp_window_ms, ValidationConfig::default().timestamp_window_ms);

    let raw = with_indices(json!([
        { "properties": [{ "$ownerId": "asc" }, { "a": "asc" }], "unique": true },
        { "properties": [{ "$ownerId": "asc" }, { "b": "asc" }], "unique": true }
    ]));
    assert_eq!(DataContractValidator::new(config).validate(&raw).codes(), vec![1017]);
}

fn index_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(
        (prop::sample::select(vec!["a", "b"]), prop::sample::select(vec!["asc", "desc"]))
            .prop_map(|(name, direction)| (name.to_string(), direction.to_string())),
        1..3,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Each repeated property list is reported once per repetition
    #[test]
    fn property_duplicate_indices_are_detected(indices in prop::collection::vec(index_strategy(), 1..6)) {
        let json_indices: Vec<JsonValue> = indices
            .iter()
            .map(|properties| {
                let props: Vec<JsonValue> = properties
                    .iter()
                    .map(|(name, direction)| json!({ name.as_str(): direction }))
                    .collect();
                json!({ "properties": props })
            })
            .collect();
        let raw = with_indices(JsonValue::Array(json_indices));

        let distinct: std::collections::BTreeSet<&Vec<(String, String)>> = indices.iter().collect();
        let duplicates = validate(&raw).codes().into_iter().filter(|code| *code == 1008).count();
        prop_assert_eq!(duplicates, indices.len() - distinct.len());
    }
}
