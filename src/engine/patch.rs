//! Value patching and read-back
//!
//! Patching runs in two phases. Phase 1 expands structure so every key of the
//! incoming value has a node: custom properties, array items, selected `oneOf`
//! branches, checked `anyOf` branches and `if/then/else` subtrees, repeating until
//! the branches stop adding selectors or triggers. Phase 2 assigns
//! leaf values in one pass without notifying observers.

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;

use super::FormTree;
use crate::domain::{FieldKind, FormError, FormResult, NodeId, NodeRole, NodeShape};

impl FormTree {
    /// Patch the root group. Non-object values are ignored.
    pub fn patch(&mut self, value: &Value) {
        let root = self.root;
        if let Err(e) = self.patch_group(root, value) {
            tracing::warn!("Patch failed: {}", e);
        }
    }

    /// Patch a group with an object value
    pub fn patch_group(&mut self, group: NodeId, value: &Value) -> FormResult<()> {
        let node = self.get(group)?;
        if node.as_group().is_none() {
            return Err(FormError::WrongShape {
                key: node.key.clone(),
                expected: "group",
                actual: node.shape.name(),
            });
        }
        let Value::Object(object) = value else {
            tracing::debug!("Ignoring non-object patch value for '{}'", node.unique_key);
            return Ok(());
        };

        self.prepare_group(group, object);
        self.assign_group(group, object);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Phase 1: structure
    // ------------------------------------------------------------------------

    fn prepare_group(&mut self, group: NodeId, object: &Map<String, Value>) {
        self.add_extra_properties(group, object);
        self.prepare_reactive(group, object);

        for child in self.children(group) {
            let Some(node) = self.nodes.get(&child) else {
                continue;
            };
            let Some(child_value) = object.get(&node.key) else {
                continue;
            };
            match (&node.shape, child_value) {
                (NodeShape::Group(_), Value::Object(child_object)) => {
                    self.prepare_group(child, child_object);
                }
                (NodeShape::Group(_), scalar) if node.role == NodeRole::OneOfWrapper => {
                    let scalar = scalar.clone();
                    self.prepare_selectors(child, &scalar);
                }
                (NodeShape::Array(_), Value::Array(values)) => {
                    self.prepare_array(child, values);
                }
                _ => {}
            }
        }
    }

    /// Drive every selector and `if/then/else` trigger of `group` until no new
    /// work appears. Branches may add further selectors or triggers, and nested
    /// `if` blocks may attach descriptors to a trigger already handled; both are
    /// picked up on a later turn.
    fn prepare_reactive(&mut self, group: NodeId, object: &Map<String, Value>) {
        let whole = Value::Object(object.clone());
        // Node -> descriptor count when it was last handled
        let mut handled: HashMap<NodeId, usize> = HashMap::new();

        loop {
            let next = self.children(group).into_iter().find_map(|child| {
                let node = self.nodes.get(&child)?;
                let count = node.conditional_schemas.len();
                if count == 0 || handled.get(&child) == Some(&count) {
                    return None;
                }
                let eligible = match node.role {
                    NodeRole::OneOfSelector | NodeRole::AnyOfSelector => true,
                    // Null triggers count too, so stale branches are torn down
                    NodeRole::Schema => object.contains_key(&node.key),
                    _ => false,
                };
                eligible.then_some((child, node.role, count))
            });
            let Some((child, role, count)) = next else {
                break;
            };
            handled.insert(child, count);

            match role {
                NodeRole::OneOfSelector | NodeRole::AnyOfSelector => {
                    self.prepare_selector(child, &whole);
                }
                _ => {
                    let Some(value) = self
                        .nodes
                        .get(&child)
                        .and_then(|n| object.get(&n.key))
                        .cloned()
                    else {
                        continue;
                    };
                    self.apply_conditionals(child, &value);
                }
            }
        }
    }

    /// Pick the first matching `oneOf` branch and check every matching `anyOf`
    /// option among `group`'s selectors
    fn prepare_selectors(&mut self, group: NodeId, value: &Value) {
        for child in self.children(group) {
            self.prepare_selector(child, value);
        }
    }

    fn prepare_selector(&mut self, selector: NodeId, value: &Value) {
        let Some(node) = self.nodes.get(&selector) else {
            return;
        };
        match node.role {
            NodeRole::OneOfSelector => {
                let chosen = node
                    .conditional_schemas
                    .iter()
                    .find(|d| self.matches(value, &d.schema))
                    .and_then(|d| d.trigger_value.clone());
                if let Some(choice) = chosen {
                    self.select_silently(selector, choice);
                }
            }
            NodeRole::AnyOfSelector => {
                let checked = node
                    .conditional_schemas
                    .iter()
                    .any(|d| self.matches(value, &d.schema));
                if checked {
                    self.select_silently(selector, Value::Bool(true));
                }
            }
            _ => {}
        }
    }

    /// Materialize for `choice`, then store it without re-notifying
    fn select_silently(&mut self, selector: NodeId, choice: Value) {
        self.apply_conditionals(selector, &choice);
        if let Err(e) = self.write_control(selector, choice) {
            tracing::warn!("Could not set selector {}: {}", selector, e);
        }
    }

    fn prepare_array(&mut self, array: NodeId, values: &[Value]) {
        loop {
            let len = self
                .nodes
                .get(&array)
                .and_then(|n| n.as_array())
                .map_or(0, |a| a.items.len());
            if len >= values.len() || self.add_item(array).is_none() {
                break;
            }
        }

        let items = self.children(array);
        for (item, value) in items.into_iter().zip(values) {
            let shape = self.nodes.get(&item).map(|n| &n.shape);
            match (shape, value) {
                (Some(NodeShape::Group(_)), Value::Object(object)) => self.prepare_group(item, object),
                (Some(NodeShape::Array(_)), Value::Array(nested)) => self.prepare_array(item, nested),
                _ => {}
            }
        }
    }

    /// Heuristic branch match: shared property keys, else `const` equality, else
    /// `enum` membership, else always. The first match wins among `oneOf` branches.
    pub fn matches(&self, value: &Value, schema: &Value) -> bool {
        let schema = match schema.get("$ref").and_then(Value::as_str) {
            Some(reference) => match self.resolver.resolve(reference) {
                Ok(resolved) => Cow::Owned(resolved),
                Err(_) => return false,
            },
            None => Cow::Borrowed(schema),
        };

        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            return value
                .as_object()
                .map_or(false, |object| properties.keys().any(|k| object.contains_key(k)));
        }
        if let Some(expected) = schema.get("const") {
            return value == expected;
        }
        if let Some(options) = schema.get("enum").and_then(Value::as_array) {
            return options.contains(value);
        }
        true
    }

    // ------------------------------------------------------------------------
    // Phase 2: values
    // ------------------------------------------------------------------------

    fn assign_group(&mut self, group: NodeId, object: &Map<String, Value>) {
        for child in self.children(group) {
            let Some(node) = self.nodes.get(&child) else {
                continue;
            };
            if node.role.is_synthetic_leaf() {
                continue;
            }
            if let Some(value) = object.get(&node.key) {
                self.assign(child, value);
            }
        }
    }

    fn assign(&mut self, id: NodeId, value: &Value) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        match (&node.shape, value) {
            (NodeShape::Field(_), value) => {
                if let Err(e) = self.write_control(id, value.clone()) {
                    tracing::warn!("Could not assign {}: {}", id, e);
                }
            }
            (NodeShape::Group(_), Value::Object(object)) => self.assign_group(id, object),
            (NodeShape::Array(_), Value::Array(values)) => {
                for (item, value) in self.children(id).into_iter().zip(values) {
                    self.assign(item, value);
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------------
    // Read-back
    // ------------------------------------------------------------------------

    /// Current value of the whole form
    pub fn read(&self) -> Value {
        self.read_node(self.root)
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Current value below `id`. Synthesized selector and adder leaves, null
    /// leaves and empty groups/arrays are omitted; array items keep their
    /// positions.
    pub fn read_node(&self, id: NodeId) -> Option<Value> {
        let node = self.nodes.get(&id)?;
        match &node.shape {
            NodeShape::Field(field) => {
                if node.role.is_synthetic_leaf() || field.control.value().is_null() {
                    None
                } else {
                    Some(field.control.value().clone())
                }
            }
            NodeShape::Group(group) => {
                let object: Map<String, Value> = group
                    .fields
                    .iter()
                    .filter_map(|(key, child)| self.read_node(*child).map(|v| (key.clone(), v)))
                    .collect();
                if object.is_empty() && node.role == NodeRole::OneOfWrapper {
                    return self.selected_constant(id);
                }
                (!object.is_empty()).then_some(Value::Object(object))
            }
            NodeShape::Array(array) => {
                let items: Vec<Value> = array
                    .items
                    .iter()
                    .map(|item| self.read_node(*item).unwrap_or_else(|| self.placeholder(*item)))
                    .collect();
                (!items.is_empty()).then_some(Value::Array(items))
            }
        }
    }

    /// The `const` of the branch selected in a `oneOf` wrapper whose branches are
    /// plain values rather than objects
    fn selected_constant(&self, wrapper: NodeId) -> Option<Value> {
        let radio = self
            .children(wrapper)
            .into_iter()
            .filter_map(|child| self.nodes.get(&child))
            .find(|n| n.role == NodeRole::OneOfSelector)?;
        let choice = radio.value().filter(|v| !v.is_null())?;
        let branch = radio
            .conditional_schemas
            .iter()
            .find(|d| d.trigger_value.as_ref() == Some(choice))?;
        let schema = match branch.schema.get("$ref").and_then(Value::as_str) {
            Some(reference) => self.resolver.resolve(reference).ok()?,
            None => branch.schema.clone(),
        };
        schema.get("const").cloned()
    }

    fn placeholder(&self, id: NodeId) -> Value {
        match self.nodes.get(&id).map(|n| &n.shape) {
            Some(NodeShape::Group(_)) => Value::Object(Map::new()),
            Some(NodeShape::Array(_)) => Value::Array(Vec::new()),
            _ => Value::Null,
        }
    }
}
