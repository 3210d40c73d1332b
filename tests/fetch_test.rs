use schemaform::{CompilerSettings, Diagnostic, DisabledFetcher, FormTree, StaticSchemaFetcher};
use serde_json::json;

const ADDRESS_URL: &str = "https://schemas.example.com/address.json";

fn address_document() -> serde_json::Value {
    json!({
        "$defs": {
            "Address": {
                "type": "object",
                "required": ["city"],
                "properties": {
                    "city": { "type": "string" },
                    "country": { "$ref": "#/$defs/Country" }
                }
            },
            "Country": { "enum": ["NL", "BE", "DE"] }
        }
    })
}

#[tokio::test]
async fn test_load_resolves_remote_fragments() {
    let fetcher = StaticSchemaFetcher::new().with_document(ADDRESS_URL, address_document());
    let schema = json!({
        "properties": {
            "home": { "$ref": format!("{}#/$defs/Address", ADDRESS_URL) }
        }
    });

    let tree = FormTree::load(schema, &fetcher, CompilerSettings::default()).await;

    assert!(tree.diagnostics().is_empty());
    let city = tree.find("home.city").unwrap();
    assert!(tree.is_required(city));
    assert!(tree.find("home.country").is_some());
    assert!(tree.resolver().is_cached(ADDRESS_URL));
}

#[tokio::test]
async fn test_load_whole_remote_document() {
    let fetcher = StaticSchemaFetcher::new().with_document(
        "https://schemas.example.com/name.json",
        json!({ "type": "string", "title": "Full name" }),
    );
    let schema = json!({
        "properties": { "name": { "$ref": "https://schemas.example.com/name.json" } }
    });

    let tree = FormTree::load(schema, &fetcher, CompilerSettings::default()).await;

    let name = tree.find("name").unwrap();
    assert_eq!(tree.node(name).unwrap().label, "Full name");
}

#[tokio::test]
async fn test_failed_fetch_skips_subtree() {
    let schema = json!({
        "properties": {
            "local": { "type": "string" },
            "remote": { "$ref": format!("{}#/$defs/Address", ADDRESS_URL) }
        }
    });

    let tree = FormTree::load(schema, &DisabledFetcher, CompilerSettings::default()).await;

    assert!(tree.find("local").is_some());
    assert!(tree.find("remote").is_none());
    assert!(matches!(
        &tree.diagnostics()[0],
        Diagnostic::FetchFailed { url, .. } if url == ADDRESS_URL
    ));
    assert!(tree
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::UnresolvableRef { .. })));
}
