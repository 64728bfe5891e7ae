mod common;

use common::*;
use dste::document::validate_document_data;
use dste::{BincodeSerializer, Document, Identifier, JsonSerializer, StorageSerializer, Value, ValueMap};
use proptest::prelude::*;
use serde_json::json;

fn profile(name: String, friend: [u8; 32], avatar: Vec<u8>, revision: u64, created_at: u64) -> Document {
    let mut data = ValueMap::new();
    data.insert("displayName".to_string(), Value::Text(name));
    data.insert("friend".to_string(), Value::Identifier(Identifier::new(friend)));
    data.insert("avatar".to_string(), Value::Bytes(avatar));
    Document {
        id: Identifier::new([0x42; 32]),
        data_contract_id: contract_id(),
        document_type: "profile".to_string(),
        owner_id: owner(),
        revision,
        created_at: Some(created_at),
        updated_at: Some(created_at),
        data,
    }
}

#[test]
fn test_json_projection_encodes_binary_fields() {
    let document = profile("alice".to_string(), [0xab; 32], vec![1, 2, 3], 1, BLOCK_MILLIS);
    let json = document.to_json();

    assert_eq!(json["friend"], json!("ab".repeat(32)));
    assert_eq!(json["avatar"], json!("AQID"));
    assert_eq!(json["$ownerId"], json!(owner().to_hex()));
    assert_eq!(json["$revision"], json!(1));
}

#[test]
fn test_json_without_type_info_keeps_text() {
    let document = profile("bob".to_string(), [1; 32], vec![9], 2, BLOCK_MILLIS);
    let json = document.to_json();
    let note_type = contract();
    let note_type = note_type.document_type("note").unwrap();

    let decoded = Document::from_json(&json, note_type).unwrap();
    assert!(matches!(decoded.property("friend"), Some(Value::Text(_))));
}

#[test]
fn test_missing_system_field_is_rejected() {
    let document = profile("carol".to_string(), [1; 32], vec![], 1, BLOCK_MILLIS);
    let mut json = document.to_json();
    json.as_object_mut().unwrap().remove("$revision");

    let contract = contract();
    let err = Document::from_json(&json, contract.document_type("profile").unwrap()).unwrap_err();
    assert_eq!(err, dste::DocumentError::MissingField { field: "$revision".to_string() });
}

#[test]
fn test_profile_data_validation() {
    let contract = contract();
    let profile_type = contract.document_type("profile").unwrap();

    let valid = profile("dave".to_string(), [3; 32], vec![0; 64], 1, BLOCK_MILLIS);
    assert!(validate_document_data(profile_type, &valid.data).is_valid());

    let oversized = profile("erin".to_string(), [3; 32], vec![0; 65], 1, BLOCK_MILLIS);
    assert_eq!(validate_document_data(profile_type, &oversized.data).codes(), vec![1004]);

    let mut missing_name = valid.data.clone();
    missing_name.remove("displayName");
    assert_eq!(validate_document_data(profile_type, &missing_name).codes(), vec![1004]);

    let mut extra = valid.data;
    extra.insert("nickname".to_string(), Value::Text("d".to_string()));
    assert_eq!(validate_document_data(profile_type, &extra).codes(), vec![1004]);
}

#[test]
fn test_revisions_beyond_signed_range_survive_projection() {
    let document = profile("frank".to_string(), [4; 32], vec![], u64::MAX, 1 << 63);
    let contract = contract();

    assert_eq!(document.property("$revision"), Some(Value::Unsigned(u64::MAX)));
    assert_eq!(Document::from_object(document.to_object()).unwrap(), document);
    assert_eq!(
        Document::from_json(&document.to_json(), contract.document_type("profile").unwrap()).unwrap(),
        document
    );
}

#[test]
fn test_system_properties_are_addressable() {
    let document = stored_note(5, owner(), 3, "hello");
    assert_eq!(document.property("$ownerId"), Some(Value::Identifier(owner())));
    assert_eq!(document.property("$revision"), Some(Value::Integer(3)));
    assert_eq!(document.property("$type"), Some(Value::Text("note".to_string())));
    assert_eq!(document.property("message"), Some(Value::Text("hello".to_string())));
    assert_eq!(document.property("$createdAt"), None);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Both projections recover the original document
    #[test]
    fn property_projections_are_lossless(
        name in "[a-zA-Z ]{1,64}",
        friend in any::<[u8; 32]>(),
        avatar in prop::collection::vec(any::<u8>(), 0..64),
        revision in 1u64..=u64::MAX,
        created_at in any::<u64>(),
    ) {
        let document = profile(name, friend, avatar, revision, created_at);
        let contract = contract();
        let profile_type = contract.document_type("profile").unwrap();

        prop_assert_eq!(&Document::from_object(document.to_object()).unwrap(), &document);
        prop_assert_eq!(&Document::from_json(&document.to_json(), profile_type).unwrap(), &document);
    }

    /// Storage encodings agree with each other after decoding
    #[test]
    fn property_storage_serializers_agree(text in "[a-z]{0,32}", revision in 1u64..1000) {
        let document = stored_note(1, owner(), revision, &text);
        let binary = BincodeSerializer::new();
        let text_format = JsonSerializer::new();

        let from_binary: Document = binary.deserialize(&binary.serialize(&document).unwrap()).unwrap();
        let from_text: Document = text_format.deserialize(&text_format.serialize(&document).unwrap()).unwrap();
        prop_assert_eq!(&from_binary, &document);
        prop_assert_eq!(from_binary, from_text);
    }
}
