use dste::{decode, CodeBand, ConsensusError, ErrorCategory, Identifier};
use proptest::prelude::*;

#[test]
fn test_known_codes_decode_to_names() {
    let error = ConsensusError::DocumentNotFound {
        document_id: Identifier::new([7; 32]),
    };
    let (code, payload) = error.to_wire();
    let decoded = decode(code, &payload);

    assert_eq!(decoded.code, 4005);
    assert_eq!(decoded.band, CodeBand::State);
    assert_eq!(decoded.category, ErrorCategory::NotFound);
    assert_eq!(decoded.name.as_deref(), Some("DocumentNotFoundError"));
    assert_eq!(decoded.message, Some(error.to_string()));
}

#[test]
fn test_bands_map_to_categories() {
    assert_eq!(decode(1016, b"").category, ErrorCategory::InvalidArgument);
    assert_eq!(decode(2001, b"").category, ErrorCategory::Unauthenticated);
    assert_eq!(decode(3000, b"").category, ErrorCategory::FailedPrecondition);
    assert_eq!(decode(4009, b"").category, ErrorCategory::FailedPrecondition);
    assert_eq!(decode(16, b"").category, ErrorCategory::Unauthenticated);
    assert_eq!(decode(13, b"").category, ErrorCategory::Internal);
    assert_eq!(decode(777, b"").category, ErrorCategory::Internal);
}

#[test]
fn test_unknown_code_has_no_name() {
    let decoded = decode(4999, &[0xff, 0xfe]);
    assert_eq!(decoded.band, CodeBand::State);
    assert_eq!(decoded.name, None);
    assert_eq!(decoded.message, None);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Decoding depends only on the code, never on the payload
    #[test]
    fn property_decode_ignores_payload(
        code in 0u32..6000,
        a in prop::collection::vec(any::<u8>(), 0..64),
        b in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let first = decode(code, &a);
        let second = decode(code, &b);
        prop_assert_eq!(first.band, second.band);
        prop_assert_eq!(first.category, second.category);
        prop_assert_eq!(first.name, second.name);
    }

    /// Decoding is a pure function of its inputs
    #[test]
    fn property_decode_is_deterministic(code in any::<u32>(), payload in prop::collection::vec(any::<u8>(), 0..64)) {
        prop_assert_eq!(decode(code, &payload), decode(code, &payload));
    }
}
