//! Benchmarks for data contract validation and id derivation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Map, Value as JsonValue};

use dste::{ContentHasher, DataContractValidator, Identifier, ValidationConfig};

fn contract_with_types(count: usize) -> JsonValue {
    let mut documents = Map::new();
    for i in 0..count {
        documents.insert(
            format!("type{}", i),
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "maxLength": 63, "pattern": "^[a-z0-9-]+$" },
                    "score": { "type": "integer", "minimum": 0 },
                    "avatar": { "type": "array", "byteArray": true, "maxItems": 64 }
                },
                "required": ["name"],
                "indices": [
                    { "properties": [{ "$ownerId": "asc" }, { "name": "asc" }], "unique": true },
                    { "properties": [{ "score": "desc" }] }
                ],
                "additionalProperties": false
            }),
        );
    }
    json!({
        "protocolVersion": 1,
        "$id": "01".repeat(32),
        "ownerId": "02".repeat(32),
        "version": 1,
        "documents": documents,
    })
}

fn bench_contract_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("contract_validation");

    for types in [1, 10, 50].iter() {
        group.throughput(Throughput::Elements(*types as u64));
        group.bench_with_input(BenchmarkId::from_parameter(types), types, |b, &types| {
            let raw = contract_with_types(types);
            let validator = DataContractValidator::new(ValidationConfig::default());

            b.iter(|| black_box(validator.validate(&raw)));
        });
    }

    group.finish();
}

fn bench_document_id_derivation(c: &mut Criterion) {
    let hasher = ContentHasher::new();
    let contract_id = Identifier::new([1; 32]);
    let owner_id = Identifier::new([2; 32]);
    let entropy = [3u8; 32];

    c.bench_function("derive_document_id", |b| {
        b.iter(|| black_box(hasher.derive_document_id(&contract_id, &owner_id, "note", &entropy)))
    });
}

criterion_group!(benches, bench_contract_validation, bench_document_id_derivation);
criterion_main!(benches);
