//! Array items and custom group properties

use serde_json::Value;

use super::compiler::CompileScope;
use super::{kinds, leaf, FormTree, NodeSpec};
use crate::domain::{Diagnostic, FieldKind, FormError, FormResult, NodeId, NodeRole};

impl FormTree {
    /// Append a new item compiled from the array's item schema.
    ///
    /// `maxItems` is not enforced here; callers consult [`FormTree::can_add_item`].
    pub fn add_item(&mut self, array: NodeId) -> Option<NodeId> {
        let mut scope = CompileScope::default();
        self.add_item_scoped(array, &mut scope)
    }

    pub(crate) fn add_item_scoped(&mut self, array: NodeId, scope: &mut CompileScope) -> Option<NodeId> {
        let node = self.nodes.get(&array)?;
        let fields = node.as_array()?;
        let Some(item_schema) = fields.item_schema.clone() else {
            let diagnostic = Diagnostic::MissingItemSchema {
                array: node.unique_key.clone(),
            };
            self.diagnose(diagnostic);
            return None;
        };

        let key = format!("{}{}", node.key, fields.next_item);
        if let Some(fields) = self.nodes.get_mut(&array).and_then(|n| n.as_array_mut()) {
            fields.next_item += 1;
        }
        let item = self.compile_schema(&item_schema, array, Some(&key), scope)?;
        tracing::debug!("Added item '{}' to {}", key, array);
        Some(item)
    }

    /// Remove the item at `index` with its whole subtree. Out-of-range indexes are
    /// ignored.
    pub fn remove_item(&mut self, array: NodeId, index: usize) -> bool {
        let Some(item) = self
            .nodes
            .get(&array)
            .and_then(|n| n.as_array())
            .and_then(|a| a.items.get(index).copied())
        else {
            return false;
        };
        self.teardown(item);
        true
    }

    /// Whether another item may be added, from the current item count
    pub fn can_add_item(&self, array: NodeId) -> bool {
        self.nodes
            .get(&array)
            .and_then(|n| n.as_array())
            .map_or(false, |a| a.can_add_item())
    }

    /// Whether an item may be removed, from the current item count
    pub fn can_remove_item(&self, array: NodeId) -> bool {
        self.nodes
            .get(&array)
            .and_then(|n| n.as_array())
            .map_or(false, |a| a.can_remove_item())
    }

    /// Add a custom leaf to a group. Returns `Ok(None)` when the key already
    /// exists or uses the reserved prefix.
    pub fn add_property(
        &mut self,
        group: NodeId,
        key: &str,
        kind: FieldKind,
    ) -> FormResult<Option<NodeId>> {
        self.expect_group(group)?;
        let key = key.trim();
        if key.is_empty() || key.starts_with(&self.settings.reserved_prefix) {
            return Ok(None);
        }

        let spec = NodeSpec {
            key: key.to_string(),
            label: kinds::humanize(key),
            description: None,
            format: None,
            rule: None,
            role: NodeRole::Schema,
            shape: leaf(kind, Value::Null),
        };
        Ok(self.insert_node(group, spec))
    }

    /// Remove a group member with its whole subtree
    pub fn remove_property(&mut self, group: NodeId, key: &str) -> FormResult<bool> {
        self.expect_group(group)?;
        match self.field_by_key(group, key) {
            Some(child) => {
                self.teardown(child);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Parameter adder observer: a submitted string becomes a new text property
    /// of the adder's group, then the adder clears itself
    pub(crate) fn submit_parameter(&mut self, adder: NodeId, value: &Value) {
        let Some(name) = value.as_str() else {
            return;
        };
        let Some(group) = self.nodes.get(&adder).and_then(|n| n.parent) else {
            return;
        };

        match self.add_property(group, name, FieldKind::Text) {
            Ok(Some(id)) => tracing::debug!("Added custom property '{}' as {}", name, id),
            Ok(None) => tracing::debug!("Custom property '{}' not added", name),
            Err(e) => tracing::warn!("Could not add custom property '{}': {}", name, e),
        }
        if let Err(e) = self.write_control(adder, Value::Null) {
            tracing::warn!("Could not reset parameter adder: {}", e);
        }
    }

    fn expect_group(&self, id: NodeId) -> FormResult<()> {
        let node = self.get(id)?;
        match node.as_group() {
            Some(_) => Ok(()),
            None => Err(FormError::WrongShape {
                key: node.key.clone(),
                expected: "group",
                actual: node.shape.name(),
            }),
        }
    }
}
