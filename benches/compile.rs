use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use schemaform::FormTree;
use serde_json::{json, Value};

fn wide_schema(fields: usize) -> Value {
    let mut properties = serde_json::Map::new();
    for i in 0..fields {
        properties.insert(
            format!("field_{}", i),
            json!({ "type": "string", "minLength": 1, "maxLength": 64 }),
        );
    }
    json!({ "type": "object", "properties": properties })
}

fn conditional_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "country": { "enum": ["USA", "Canada", "Other"] },
            "payment": {
                "oneOf": [
                    { "properties": { "cardNumber": { "type": "string" }, "cvv": { "type": "string" } } },
                    { "properties": { "iban": { "type": "string" } } }
                ]
            },
            "items": {
                "type": "array",
                "minItems": 3,
                "items": {
                    "type": "object",
                    "properties": { "sku": { "type": "string" }, "qty": { "type": "integer" } }
                }
            }
        },
        "allOf": [
            {
                "if": { "properties": { "country": { "const": "USA" } } },
                "then": { "properties": { "state": { "enum": ["CA", "NY", "TX"] } } }
            },
            {
                "if": { "properties": { "country": { "const": "Canada" } } },
                "then": { "properties": { "province": { "enum": ["ON", "QC"] } } }
            }
        ]
    })
}

fn benchmark_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for fields in [10, 100, 1000] {
        let schema = wide_schema(fields);
        group.bench_with_input(BenchmarkId::new("wide", fields), &schema, |b, schema| {
            b.iter(|| FormTree::compile(black_box(schema.clone())))
        });
    }

    let schema = conditional_schema();
    group.bench_function("conditional", |b| {
        b.iter(|| FormTree::compile(black_box(schema.clone())))
    });
    group.finish();
}

fn benchmark_conditional_toggle(c: &mut Criterion) {
    let mut tree = FormTree::compile(conditional_schema());
    let Some(country) = tree.find("country") else {
        return;
    };

    c.bench_function("toggle_country", |b| {
        b.iter(|| {
            let _ = tree.set_value(country, json!("USA"));
            let _ = tree.set_value(country, json!("Canada"));
            tree.take_events();
        })
    });
}

fn benchmark_patch_and_read(c: &mut Criterion) {
    let value = json!({
        "country": "USA",
        "state": "NY",
        "payment": { "iban": "DE89370400440532013000" },
        "items": [
            { "sku": "A1", "qty": 1 },
            { "sku": "B2", "qty": 2 },
            { "sku": "C3", "qty": 3 }
        ]
    });

    c.bench_function("patch_and_read", |b| {
        b.iter(|| {
            let mut tree = FormTree::compile(conditional_schema());
            tree.patch(black_box(&value));
            black_box(tree.read())
        })
    });
}

criterion_group!(
    benches,
    benchmark_compile,
    benchmark_conditional_toggle,
    benchmark_patch_and_read
);
criterion_main!(benches);
