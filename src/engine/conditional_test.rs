use super::FormTree;
use crate::domain::{FieldKind, FormError, TreeEvent};
use serde_json::{json, Value};

fn country_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "country": { "type": "string", "enum": ["USA", "Canada", "Other"] }
        },
        "allOf": [
            {
                "if": { "properties": { "country": { "const": "USA" } } },
                "then": {
                    "properties": { "state": { "enum": ["CA", "NY", "TX"] } },
                    "required": ["state"]
                }
            },
            {
                "if": { "properties": { "country": { "const": "Canada" } } },
                "then": {
                    "properties": { "province": { "enum": ["ON", "QC"] } },
                    "required": ["province"]
                }
            }
        ]
    })
}

fn required(tree: &FormTree) -> Vec<String> {
    tree.node(tree.root())
        .and_then(|n| n.as_group())
        .map(|g| g.required_fields.clone())
        .unwrap_or_default()
}

#[test]
fn test_switching_trigger_swaps_subtrees() {
    let mut tree = FormTree::compile(country_schema());
    let country = tree.find("country").unwrap();
    assert_eq!(tree.observer_count(), 1);

    tree.set_value(country, json!("USA")).unwrap();
    assert_eq!(tree.field_keys(tree.root()), vec!["country", "state"]);
    assert_eq!(required(&tree), vec!["state"]);

    tree.set_value(country, json!("Canada")).unwrap();
    assert_eq!(tree.field_keys(tree.root()), vec!["country", "province"]);
    assert_eq!(required(&tree), vec!["province"]);

    tree.set_value(country, json!("Other")).unwrap();
    assert_eq!(tree.field_keys(tree.root()), vec!["country"]);
    assert!(required(&tree).is_empty());
}

#[test]
fn test_materialize_then_revert_restores_fields() {
    let mut tree = FormTree::compile(country_schema());
    let country = tree.find("country").unwrap();
    let keys_before = tree.field_keys(tree.root());
    let required_before = required(&tree);
    let size_before = tree.len();

    tree.set_value(country, json!("USA")).unwrap();
    tree.set_value(country, json!("Other")).unwrap();

    assert_eq!(tree.field_keys(tree.root()), keys_before);
    assert_eq!(required(&tree), required_before);
    assert_eq!(tree.len(), size_before);
    let node = tree.node(country).unwrap();
    assert!(node.conditional_schemas.iter().all(|d| d.added_keys.is_empty()));
}

#[test]
fn test_same_value_twice_is_stable() {
    let mut tree = FormTree::compile(country_schema());
    let country = tree.find("country").unwrap();

    tree.set_value(country, json!("USA")).unwrap();
    let state = tree.find("state").unwrap();
    tree.set_value(country, json!("USA")).unwrap();

    assert_eq!(tree.find("state"), Some(state));
    assert_eq!(tree.field_keys(tree.root()), vec!["country", "state"]);
}

#[test]
fn test_else_branch() {
    let mut tree = FormTree::compile(json!({
        "properties": { "country": { "type": "string" } },
        "if": { "properties": { "country": { "const": "USA" } } },
        "then": { "properties": { "zip": { "type": "string" } } },
        "else": { "properties": { "postal_code": { "type": "string" } } }
    }));
    let country = tree.find("country").unwrap();
    assert_eq!(tree.field_keys(tree.root()), vec!["country"]);

    tree.set_value(country, json!("France")).unwrap();
    assert_eq!(tree.field_keys(tree.root()), vec!["country", "postal_code"]);

    tree.set_value(country, json!("USA")).unwrap();
    assert_eq!(tree.field_keys(tree.root()), vec!["country", "zip"]);

    tree.set_value(country, Value::Null).unwrap();
    assert_eq!(tree.field_keys(tree.root()), vec!["country"]);
}

#[test]
fn test_default_value_materializes_at_compile() {
    let mut schema = country_schema();
    schema["properties"]["country"]["default"] = json!("Canada");
    let tree = FormTree::compile(schema);

    assert!(tree.find("province").is_some());
    assert!(tree.find("state").is_none());
}

#[test]
fn test_nested_conditionals_are_torn_down_with_their_observers() {
    let mut tree = FormTree::compile(json!({
        "properties": { "employed": { "type": "boolean" } },
        "if": { "properties": { "employed": { "const": true } } },
        "then": {
            "properties": {
                "company": { "type": "string" },
                "remote": { "type": "boolean" }
            },
            "if": { "properties": { "remote": { "const": false } } },
            "then": { "properties": { "office": { "type": "string" } } }
        }
    }));
    let employed = tree.find("employed").unwrap();

    tree.set_value(employed, json!(true)).unwrap();
    let remote = tree.find("remote").unwrap();
    assert_eq!(tree.observer_count(), 2);

    tree.set_value(remote, json!(false)).unwrap();
    assert_eq!(
        tree.field_keys(tree.root()),
        vec!["employed", "company", "remote", "office"]
    );

    tree.set_value(employed, json!(false)).unwrap();
    assert_eq!(tree.field_keys(tree.root()), vec!["employed"]);
    assert_eq!(tree.observer_count(), 1);

    // Removed nodes never react again
    assert!(matches!(
        tree.set_value(remote, json!(false)),
        Err(FormError::NodeNotFound(_))
    ));
    assert_eq!(tree.field_keys(tree.root()), vec!["employed"]);
}

#[test]
fn test_descriptor_on_outer_field_is_detached_with_its_branch() {
    let mut tree = FormTree::compile(json!({
        "properties": { "tier": { "enum": ["basic", "gold"] } },
        "oneOf": [
            {
                "title": "With perks",
                "properties": { "perks": { "type": "boolean" } },
                "if": { "properties": { "tier": { "const": "gold" } } },
                "then": { "properties": { "lounge": { "type": "boolean" } } }
            },
            { "title": "Plain" }
        ]
    }));
    let tier = tree.find("tier").unwrap();
    let radio = tree.find("__oneOf").unwrap();

    tree.set_value(radio, json!(0)).unwrap();
    assert_eq!(tree.node(tier).unwrap().conditional_schemas.len(), 1);
    tree.set_value(tier, json!("gold")).unwrap();
    assert!(tree.find("lounge").is_some());

    tree.set_value(radio, json!(1)).unwrap();
    assert!(tree.find("perks").is_none());
    assert!(tree.find("lounge").is_none());
    assert!(tree.node(tier).unwrap().conditional_schemas.is_empty());
    assert_eq!(tree.observer_count(), 1);
}

#[test]
fn test_one_of_selection_marks_required() {
    let mut tree = FormTree::compile(json!({
        "type": "object",
        "properties": { "expiryDate": { "type": "string" } },
        "oneOf": [
            {
                "properties": {
                    "cardNumber": { "type": "string" },
                    "cvv": { "type": "string" }
                },
                "required": ["cardNumber", "cvv"]
            },
            {
                "properties": { "accountNumber": { "type": "string" } },
                "required": ["accountNumber"]
            }
        ]
    }));
    let radio = tree.find("__oneOf").unwrap();

    tree.set_value(radio, json!(0)).unwrap();
    let card = tree.find("cardNumber").unwrap();
    let cvv = tree.find("cvv").unwrap();
    let expiry = tree.find("expiryDate").unwrap();
    assert!(tree.is_required(card));
    assert!(tree.is_required(cvv));
    assert!(!tree.is_required(expiry));

    tree.set_value(radio, json!(1)).unwrap();
    assert!(tree.find("cardNumber").is_none());
    let account = tree.find("accountNumber").unwrap();
    assert!(tree.is_required(account));
    assert_eq!(required(&tree), vec!["accountNumber"]);
}

#[test]
fn test_keyed_one_of_materializes_into_wrapper() {
    let mut tree = FormTree::compile(json!({
        "properties": {
            "payment": {
                "oneOf": [
                    { "properties": { "cardNumber": { "type": "string" } } },
                    { "properties": { "iban": { "type": "string" } } }
                ]
            }
        }
    }));
    let radio = tree.find("payment.__oneOf").unwrap();

    tree.set_value(radio, json!(1)).unwrap();
    let iban = tree.find("payment.iban").unwrap();
    assert_eq!(tree.node(iban).unwrap().unique_key, "payment.iban");
    assert!(tree.find("iban").is_none());
}

#[test]
fn test_any_of_checkbox_toggles_branch() {
    let mut tree = FormTree::compile(json!({
        "anyOf": [
            { "properties": { "optionA": { "type": "string" } } },
            { "properties": { "optionB": { "type": "string" } } }
        ]
    }));
    let first = tree.find("__anyOf0").unwrap();

    tree.set_value(first, json!(true)).unwrap();
    assert!(tree.find("optionA").is_some());
    assert!(tree.find("optionB").is_none());

    tree.set_value(first, json!(false)).unwrap();
    assert!(tree.find("optionA").is_none());
}

#[test]
fn test_events_describe_structural_changes() {
    let mut tree = FormTree::compile(country_schema());
    let country = tree.find("country").unwrap();
    tree.take_events();

    tree.set_value(country, json!("USA")).unwrap();
    let state = tree.find("state").unwrap();
    let events = tree.take_events();
    assert_eq!(
        events,
        vec![
            TreeEvent::ValueChanged { id: country, value: json!("USA") },
            TreeEvent::NodeAdded { id: state, unique_key: "state".to_string() },
        ]
    );

    tree.set_value(country, json!("Other")).unwrap();
    let events = tree.take_events();
    assert!(events.contains(&TreeEvent::NodeRemoved {
        id: state,
        unique_key: "state".to_string()
    }));
}

#[test]
fn test_reissued_paths_get_new_unique_keys() {
    let mut tree = FormTree::compile(country_schema());
    let country = tree.find("country").unwrap();

    tree.set_value(country, json!("USA")).unwrap();
    let first = tree.find("state").unwrap();
    tree.set_value(country, json!("Other")).unwrap();
    tree.set_value(country, json!("USA")).unwrap();
    let second = tree.find("state").unwrap();

    assert_ne!(first, second);
    assert_eq!(tree.node(second).unwrap().unique_key, "state~1");
}

#[test]
fn test_set_value_on_group_is_rejected() {
    let mut tree = FormTree::compile(json!({
        "properties": { "address": { "type": "object", "properties": {} } }
    }));
    let address = tree.find("address").unwrap();
    assert!(matches!(
        tree.set_value(address, json!("x")),
        Err(FormError::WrongShape { expected: "field", actual: "group", .. })
    ));
}

#[test]
fn test_add_and_remove_of_same_key_cooperate() {
    let mut tree = FormTree::compile(json!({
        "properties": { "kind": { "enum": ["a", "b"] } },
        "allOf": [
            {
                "if": { "properties": { "kind": { "const": "b" } } },
                "then": { "properties": { "region": { "type": "string" } } }
            },
            {
                "if": { "properties": { "kind": { "const": "a" } } },
                "then": { "properties": { "region": { "enum": ["north", "south"] } } }
            }
        ]
    }));
    let kind = tree.find("kind").unwrap();

    tree.set_value(kind, json!("a")).unwrap();
    let region = tree.find("region").unwrap();
    assert_eq!(tree.node(region).unwrap().kind(), Some(FieldKind::Radio));

    tree.set_value(kind, json!("b")).unwrap();
    assert_eq!(tree.field_keys(tree.root()), vec!["kind", "region"]);
    let region = tree.find("region").unwrap();
    assert_eq!(tree.node(region).unwrap().kind(), Some(FieldKind::Text));

    let node = tree.node(kind).unwrap();
    assert_eq!(node.conditional_schemas[0].added_keys, vec!["region"]);
    assert!(node.conditional_schemas[1].added_keys.is_empty());
}

#[test]
fn test_shared_any_of_keys_survive_until_last_option_unchecked() {
    let mut tree = FormTree::compile(json!({
        "anyOf": [
            {
                "properties": { "email": { "type": "string" } },
                "required": ["email"]
            },
            {
                "properties": { "email": { "type": "string" }, "phone": { "type": "string" } },
                "required": ["email"]
            }
        ]
    }));
    let first = tree.find("__anyOf0").unwrap();
    let second = tree.find("__anyOf1").unwrap();

    tree.set_value(first, json!(true)).unwrap();
    tree.set_value(second, json!(true)).unwrap();
    assert_eq!(
        tree.node(second).unwrap().conditional_schemas[0].added_keys,
        vec!["email", "phone"]
    );

    tree.set_value(first, json!(false)).unwrap();
    assert_eq!(
        tree.field_keys(tree.root()),
        vec!["__anyOf0", "__anyOf1", "email", "phone"]
    );
    assert_eq!(required(&tree), vec!["email"]);

    tree.set_value(second, json!(false)).unwrap();
    assert_eq!(tree.field_keys(tree.root()), vec!["__anyOf0", "__anyOf1"]);
    assert!(required(&tree).is_empty());
}
