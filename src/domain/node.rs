//! Form tree node types
//!
//! A compiled form is a tree of [`FormNode`]s. Each node has one of three shapes
//! ([`NodeShape`]): a leaf field, an object-shaped group, or a list-shaped array.
//! Ownership flows downward through `fields`/`items`; `parent` is a plain id and
//! never drives destruction.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::control::Control;
use super::path::PropertyPath;

// ============================================================================
// Identifiers
// ============================================================================

/// Arena id of a node. Ids are never reused within a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Id of a conditional descriptor, unique within a tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorId(pub(crate) u64);

// ============================================================================
// Field kinds and constraints
// ============================================================================

/// Widget kind of a leaf field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Text,
    Number,
    Select,
    Radio,
    Checkbox,
    Toggle,
    Textarea,
    Hidden,
    ParameterAdder,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Select => "select",
            FieldKind::Radio => "radio",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Toggle => "toggle",
            FieldKind::Textarea => "textarea",
            FieldKind::Hidden => "hidden",
            FieldKind::ParameterAdder => "parameter-adder",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label/value pair offered by enum-backed and selector fields
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: Value,
}

/// Validation constraint compiled from a schema keyword.
///
/// Requiredness is not stored here: it is looked up in the enclosing group's
/// live `required_fields`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    MinLength(u64),
    MaxLength(u64),
    Pattern(String),
    Minimum(f64),
    Maximum(f64),
    /// Strict lower bound (non-integer numbers only)
    ExclusiveMinimum(f64),
    /// Strict upper bound (non-integer numbers only)
    ExclusiveMaximum(f64),
}

/// Cosmetic separator requested through `rule-above` / `rule-below`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Above,
    Below,
}

/// Why a node exists
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeRole {
    /// Declared by the schema
    Schema,
    /// Fieldset synthesized around a keyed `oneOf`
    OneOfWrapper,
    /// Fieldset synthesized around a keyed `anyOf`
    AnyOfWrapper,
    /// Radio choosing one `oneOf` branch
    OneOfSelector,
    /// Checkbox toggling one `anyOf` branch
    AnyOfSelector,
    /// "Add custom property" affordance of an open group
    ParameterAdder,
}

impl NodeRole {
    /// Leaves with no schema-visible counterpart in read-back values
    pub fn is_synthetic_leaf(&self) -> bool {
        matches!(
            self,
            NodeRole::OneOfSelector | NodeRole::AnyOfSelector | NodeRole::ParameterAdder
        )
    }

    pub fn is_selector(&self) -> bool {
        matches!(self, NodeRole::OneOfSelector | NodeRole::AnyOfSelector)
    }
}

// ============================================================================
// Conditional descriptors
// ============================================================================

/// Deferred schema fragment bound to one triggering node.
///
/// `added_keys` is the exact set of sibling keys this descriptor materialized into
/// the owning parent group. It is empty whenever the descriptor is dormant.
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionalSchema {
    pub id: DescriptorId,
    pub trigger_value: Option<Value>,
    pub remove_trigger_value: Option<Value>,
    pub schema: Value,
    pub added_keys: Vec<String>,
    /// Names this descriptor merged into the parent's `required_fields`
    pub(crate) added_required: Vec<String>,
    /// Descriptors this descriptor's schema attached to other nodes
    pub(crate) attached: Vec<(NodeId, DescriptorId)>,
}

impl ConditionalSchema {
    pub(crate) fn new(
        id: DescriptorId,
        trigger_value: Option<Value>,
        remove_trigger_value: Option<Value>,
        schema: Value,
    ) -> Self {
        Self {
            id,
            trigger_value,
            remove_trigger_value,
            schema,
            added_keys: Vec::new(),
            added_required: Vec::new(),
            attached: Vec::new(),
        }
    }

    /// Whether `value` asks for this descriptor's schema to be materialized.
    ///
    /// A descriptor with only a remove trigger (an `else` branch) materializes for
    /// any non-null value other than that trigger.
    pub fn should_add(&self, value: &Value) -> bool {
        match (&self.trigger_value, &self.remove_trigger_value) {
            (Some(trigger), _) => value == trigger,
            (None, Some(remove)) => !value.is_null() && value != remove,
            (None, None) => false,
        }
    }

    pub fn should_remove(&self, value: &Value) -> bool {
        self.remove_trigger_value.as_ref() == Some(value)
    }

    pub fn is_materialized(&self) -> bool {
        !self.added_keys.is_empty() || !self.added_required.is_empty() || !self.attached.is_empty()
    }

    /// Whether processing `value` tears this descriptor's subtree down
    pub fn will_tear_down(&self, value: &Value) -> bool {
        self.is_materialized() && (self.should_remove(value) || !self.should_add(value))
    }
}

// ============================================================================
// Node shapes
// ============================================================================

/// Leaf node
#[derive(Debug)]
pub struct FieldConfig {
    pub kind: FieldKind,
    pub options: Vec<FieldOption>,
    pub validations: Vec<Constraint>,
    pub control: Control,
}

/// Object-shaped node
#[derive(Debug, Default)]
pub struct FieldGroup {
    pub fields: IndexMap<String, NodeId>,
    pub required_fields: Vec<String>,
    pub additional_properties: bool,
}

/// List-shaped node
#[derive(Debug, Default)]
pub struct FieldArray {
    pub items: Vec<NodeId>,
    pub item_schema: Option<Value>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    /// Items ever created; suffixes item keys so they stay distinct after removals
    pub(crate) next_item: usize,
}

impl FieldArray {
    pub fn can_add_item(&self) -> bool {
        self.max_items.map_or(true, |max| self.items.len() < max)
    }

    pub fn can_remove_item(&self) -> bool {
        self.items.len() > self.min_items.unwrap_or(0)
    }
}

/// Closed set of node shapes
#[derive(Debug)]
pub enum NodeShape {
    Field(FieldConfig),
    Group(FieldGroup),
    Array(FieldArray),
}

impl NodeShape {
    pub fn name(&self) -> &'static str {
        match self {
            NodeShape::Field(_) => "field",
            NodeShape::Group(_) => "group",
            NodeShape::Array(_) => "array",
        }
    }
}

/// A compiled node
#[derive(Debug)]
pub struct FormNode {
    pub id: NodeId,
    pub key: String,
    pub unique_key: String,
    pub path: PropertyPath,
    pub label: String,
    pub description: Option<String>,
    pub format: Option<String>,
    pub rule: Option<Rule>,
    pub parent: Option<NodeId>,
    pub role: NodeRole,
    pub conditional_schemas: Vec<ConditionalSchema>,
    pub shape: NodeShape,
}

impl FormNode {
    pub fn as_field(&self) -> Option<&FieldConfig> {
        match &self.shape {
            NodeShape::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&FieldGroup> {
        match &self.shape {
            NodeShape::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&FieldArray> {
        match &self.shape {
            NodeShape::Array(array) => Some(array),
            _ => None,
        }
    }

    pub(crate) fn as_field_mut(&mut self) -> Option<&mut FieldConfig> {
        match &mut self.shape {
            NodeShape::Field(field) => Some(field),
            _ => None,
        }
    }

    pub(crate) fn as_group_mut(&mut self) -> Option<&mut FieldGroup> {
        match &mut self.shape {
            NodeShape::Group(group) => Some(group),
            _ => None,
        }
    }

    pub(crate) fn as_array_mut(&mut self) -> Option<&mut FieldArray> {
        match &mut self.shape {
            NodeShape::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Current value of a leaf, `None` for groups and arrays
    pub fn value(&self) -> Option<&Value> {
        self.as_field().map(|field| field.control.value())
    }

    pub fn kind(&self) -> Option<FieldKind> {
        self.as_field().map(|field| field.kind)
    }

    pub fn descriptor(&self, id: DescriptorId) -> Option<&ConditionalSchema> {
        self.conditional_schemas.iter().find(|d| d.id == id)
    }

    pub(crate) fn descriptor_mut(&mut self, id: DescriptorId) -> Option<&mut ConditionalSchema> {
        self.conditional_schemas.iter_mut().find(|d| d.id == id)
    }
}

// ============================================================================
// Tree events
// ============================================================================

/// Change notification for a presentation layer
#[derive(Clone, Debug, PartialEq)]
pub enum TreeEvent {
    NodeAdded { id: NodeId, unique_key: String },
    NodeRemoved { id: NodeId, unique_key: String },
    ValueChanged { id: NodeId, value: Value },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(trigger: Option<Value>, remove: Option<Value>) -> ConditionalSchema {
        ConditionalSchema::new(DescriptorId(1), trigger, remove, json!({}))
    }

    #[test]
    fn test_trigger_descriptor() {
        let d = descriptor(Some(json!(true)), Some(json!(false)));
        assert!(d.should_add(&json!(true)));
        assert!(!d.should_add(&json!(false)));
        assert!(d.should_remove(&json!(false)));
        assert!(!d.should_remove(&Value::Null));
    }

    #[test]
    fn test_else_descriptor() {
        let d = descriptor(None, Some(json!("USA")));
        assert!(d.should_add(&json!("Canada")));
        assert!(!d.should_add(&json!("USA")));
        assert!(!d.should_add(&Value::Null));
        assert!(d.should_remove(&json!("USA")));
    }

    #[test]
    fn test_will_tear_down_requires_materialization() {
        let mut d = descriptor(Some(json!("USA")), None);
        assert!(!d.will_tear_down(&json!("Canada")));

        d.added_keys.push("state".to_string());
        assert!(d.will_tear_down(&json!("Canada")));
        assert!(!d.will_tear_down(&json!("USA")));
    }

    #[test]
    fn test_array_policies() {
        let mut array = FieldArray {
            min_items: Some(1),
            max_items: Some(2),
            ..Default::default()
        };
        assert!(array.can_add_item());
        assert!(!array.can_remove_item());

        array.items.push(NodeId::new(1));
        array.items.push(NodeId::new(2));
        assert!(!array.can_add_item());
        assert!(array.can_remove_item());
    }

    #[test]
    fn test_field_kind_names() {
        assert_eq!(FieldKind::ParameterAdder.to_string(), "parameter-adder");
        assert_eq!(
            serde_json::to_value(FieldKind::Textarea).unwrap(),
            json!("textarea")
        );
    }
}
