//! Schema keyword interpretation for leaf fields: widget kind, options,
//! constraints, labels and cosmetic hints.

use serde_json::{json, Value};

use crate::domain::{Constraint, FieldKind, FieldOption, Rule};

/// Declared type of a schema, taking the first non-null entry of a type list
pub fn schema_type(schema: &Value) -> Option<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => Some(t.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    }
}

/// Type used for node-shape dispatch: the declared type, else `object` when
/// `properties` are present, else `array` when `items` are present.
pub fn effective_type(schema: &Value) -> Option<&str> {
    schema_type(schema).or_else(|| {
        if schema.get("properties").is_some() {
            Some("object")
        } else if schema.get("items").is_some() {
            Some("array")
        } else {
            None
        }
    })
}

pub fn format_hint(schema: &Value) -> Option<&str> {
    schema.get("format").and_then(Value::as_str)
}

/// Widget kind of a leaf field
pub fn field_kind(schema: &Value, select_threshold: usize) -> FieldKind {
    let format = format_hint(schema);

    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        return match format {
            Some("radio") => FieldKind::Radio,
            Some("select") => FieldKind::Select,
            _ if values.len() >= select_threshold => FieldKind::Select,
            _ => FieldKind::Radio,
        };
    }

    if schema.get("const").is_some() {
        return FieldKind::Hidden;
    }

    match schema_type(schema) {
        Some("boolean") if format == Some("toggle") => FieldKind::Toggle,
        Some("boolean") => FieldKind::Checkbox,
        Some("number") | Some("integer") => FieldKind::Number,
        _ if format == Some("textarea") => FieldKind::Textarea,
        _ => FieldKind::Text,
    }
}

/// Options of an enum-backed field, labelled by their display string
pub fn enum_options(schema: &Value) -> Vec<FieldOption> {
    schema
        .get("enum")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .map(|value| FieldOption {
                    label: display_value(value),
                    value: value.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Map validation keywords to constraints.
///
/// Exclusive bounds on `integer` fields become inclusive bounds offset by one, so
/// `exclusiveMinimum: 0` reads as `minimum: 1`. Other numbers keep strict bounds.
/// Draft-4 boolean `exclusiveMinimum`/`exclusiveMaximum` modify the matching
/// `minimum`/`maximum`.
pub fn constraints(schema: &Value) -> Vec<Constraint> {
    let mut out = Vec::new();
    let integer = schema_type(schema) == Some("integer");

    if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
        out.push(Constraint::MinLength(min));
    }
    if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
        out.push(Constraint::MaxLength(max));
    }
    if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
        out.push(Constraint::Pattern(pattern.to_string()));
    }

    let exclusive_min_flag = schema.get("exclusiveMinimum").and_then(Value::as_bool) == Some(true);
    let exclusive_max_flag = schema.get("exclusiveMaximum").and_then(Value::as_bool) == Some(true);

    if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
        out.push(if exclusive_min_flag {
            lower_exclusive(min, integer)
        } else {
            Constraint::Minimum(min)
        });
    }
    if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
        out.push(if exclusive_max_flag {
            upper_exclusive(max, integer)
        } else {
            Constraint::Maximum(max)
        });
    }
    if let Some(min) = schema.get("exclusiveMinimum").and_then(Value::as_f64) {
        out.push(lower_exclusive(min, integer));
    }
    if let Some(max) = schema.get("exclusiveMaximum").and_then(Value::as_f64) {
        out.push(upper_exclusive(max, integer));
    }

    out
}

fn lower_exclusive(bound: f64, integer: bool) -> Constraint {
    if integer {
        Constraint::Minimum(bound.floor() + 1.0)
    } else {
        Constraint::ExclusiveMinimum(bound)
    }
}

fn upper_exclusive(bound: f64, integer: bool) -> Constraint {
    if integer {
        Constraint::Maximum(bound.ceil() - 1.0)
    } else {
        Constraint::ExclusiveMaximum(bound)
    }
}

/// Initial control value: the const of a hidden field, else the schema default
pub fn initial_value(schema: &Value) -> Value {
    schema
        .get("const")
        .or_else(|| schema.get("default"))
        .cloned()
        .unwrap_or(Value::Null)
}

pub fn rule(schema: &Value) -> Option<Rule> {
    match format_hint(schema) {
        Some("rule-above") => Some(Rule::Above),
        Some("rule-below") => Some(Rule::Below),
        _ => None,
    }
}

/// Node label: the schema title, else the humanized key
pub fn label(schema: &Value, key: &str) -> String {
    schema
        .get("title")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| humanize(key))
}

/// Label of a `oneOf`/`anyOf` option
pub fn option_label(option: &Value, index: usize) -> String {
    if let Some(title) = option.get("title").and_then(Value::as_str) {
        title.to_string()
    } else if let Some(desc) = option.get("description").and_then(Value::as_str) {
        desc.to_string()
    } else if let Some(value) = option.get("const") {
        display_value(value)
    } else {
        format!("Option {}", index + 1)
    }
}

/// Radio value of a `oneOf` option: its const when it declares one, else its index
pub fn option_value(option: &Value, index: usize) -> Value {
    option.get("const").cloned().unwrap_or_else(|| json!(index))
}

/// `postal_code` / `postalCode` -> `Postal code`
pub fn humanize(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for ch in key.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if ch.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.extend(ch.to_lowercase());
        } else {
            current.extend(ch.to_lowercase());
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    let sentence = words.join(" ");
    let mut chars = sentence.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_kind_threshold() {
        let four = json!({ "enum": ["a", "b", "c", "d"] });
        let five = json!({ "enum": ["a", "b", "c", "d", "e"] });
        assert_eq!(field_kind(&four, 5), FieldKind::Radio);
        assert_eq!(field_kind(&five, 5), FieldKind::Select);

        let forced_radio = json!({ "enum": ["a", "b", "c", "d", "e"], "format": "radio" });
        let forced_select = json!({ "enum": ["a"], "format": "select" });
        assert_eq!(field_kind(&forced_radio, 5), FieldKind::Radio);
        assert_eq!(field_kind(&forced_select, 5), FieldKind::Select);
    }

    #[test]
    fn test_scalar_kinds() {
        assert_eq!(field_kind(&json!({ "const": "x" }), 5), FieldKind::Hidden);
        assert_eq!(field_kind(&json!({ "type": "boolean" }), 5), FieldKind::Checkbox);
        assert_eq!(
            field_kind(&json!({ "type": "boolean", "format": "toggle" }), 5),
            FieldKind::Toggle
        );
        assert_eq!(field_kind(&json!({ "type": "integer" }), 5), FieldKind::Number);
        assert_eq!(field_kind(&json!({ "type": "number" }), 5), FieldKind::Number);
        assert_eq!(
            field_kind(&json!({ "type": "string", "format": "textarea" }), 5),
            FieldKind::Textarea
        );
        assert_eq!(field_kind(&json!({ "type": "string" }), 5), FieldKind::Text);
        assert_eq!(field_kind(&json!({}), 5), FieldKind::Text);
        assert_eq!(
            field_kind(&json!({ "type": ["null", "integer"] }), 5),
            FieldKind::Number
        );
    }

    #[test]
    fn test_integer_exclusive_bounds_become_inclusive() {
        let schema = json!({ "type": "integer", "exclusiveMinimum": 0, "exclusiveMaximum": 10 });
        assert_eq!(
            constraints(&schema),
            vec![Constraint::Minimum(1.0), Constraint::Maximum(9.0)]
        );
    }

    #[test]
    fn test_number_exclusive_bounds_stay_strict() {
        let schema = json!({ "type": "number", "exclusiveMinimum": 0.5 });
        assert_eq!(constraints(&schema), vec![Constraint::ExclusiveMinimum(0.5)]);

        let draft4 = json!({ "type": "integer", "minimum": 3, "exclusiveMinimum": true });
        assert_eq!(constraints(&draft4), vec![Constraint::Minimum(4.0)]);
    }

    #[test]
    fn test_string_constraints() {
        let schema = json!({ "type": "string", "minLength": 2, "maxLength": 5, "pattern": "^[a-z]+$" });
        assert_eq!(
            constraints(&schema),
            vec![
                Constraint::MinLength(2),
                Constraint::MaxLength(5),
                Constraint::Pattern("^[a-z]+$".to_string()),
            ]
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(humanize("postal_code"), "Postal code");
        assert_eq!(humanize("cardNumber"), "Card number");
        assert_eq!(humanize(""), "");
        assert_eq!(label(&json!({ "title": "ZIP" }), "postal_code"), "ZIP");

        assert_eq!(option_label(&json!({ "title": "Card" }), 0), "Card");
        assert_eq!(option_label(&json!({ "const": "bank" }), 1), "bank");
        assert_eq!(option_label(&json!({}), 1), "Option 2");
        assert_eq!(option_value(&json!({ "const": "bank" }), 1), json!("bank"));
        assert_eq!(option_value(&json!({}), 1), json!(1));
    }

    #[test]
    fn test_initial_value_and_rule() {
        assert_eq!(initial_value(&json!({ "const": 3, "default": 4 })), json!(3));
        assert_eq!(initial_value(&json!({ "default": "x" })), json!("x"));
        assert_eq!(initial_value(&json!({})), Value::Null);
        assert_eq!(rule(&json!({ "format": "rule-below" })), Some(Rule::Below));
        assert_eq!(rule(&json!({ "format": "text" })), None);
    }
}
