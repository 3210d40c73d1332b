//! Conditional maintenance and teardown
//!
//! When a node carrying descriptors changes value, each descriptor either
//! materializes its schema into the node's parent group or tears down exactly the
//! keys it added before. Teardown is depth-first: a node's observer is released,
//! then everything its own descriptors materialized is removed, then its children,
//! and only then is it detached from its parent.

use serde_json::Value;
use std::collections::HashSet;

use super::compiler::CompileScope;
use super::FormTree;
use crate::domain::{ConditionalSchema, DescriptorId, Diagnostic, NodeId, NodeShape, TreeEvent};

#[derive(Default)]
struct Declared {
    keys: HashSet<String>,
    required: HashSet<String>,
}

impl FormTree {
    /// Run conditional maintenance for `node` after its value became `value`
    pub(crate) fn apply_conditionals(&mut self, node: NodeId, value: &Value) {
        let Some(current) = self.nodes.get(&node) else {
            return;
        };
        if current.conditional_schemas.is_empty() {
            return;
        }

        let parent = current
            .parent
            .filter(|p| self.nodes.get(p).and_then(|n| n.as_group()).is_some());
        let Some(parent) = parent else {
            let diagnostic = Diagnostic::ConditionalOutsideGroup {
                node: current.unique_key.clone(),
            };
            self.diagnose(diagnostic);
            return;
        };

        // Removals first, so an add and a remove touching the same key cooperate
        let mut order: Vec<(bool, DescriptorId)> = current
            .conditional_schemas
            .iter()
            .map(|d| (d.will_tear_down(value), d.id))
            .collect();
        order.sort_by_key(|(tear_down, _)| !tear_down);

        for (_, id) in order {
            let tear_down = match self.nodes.get(&node).and_then(|n| n.descriptor(id)) {
                Some(descriptor) => descriptor.will_tear_down(value),
                None => continue,
            };
            if tear_down {
                self.dematerialize(node, id);
            }

            let add = match self.nodes.get(&node).and_then(|n| n.descriptor(id)) {
                Some(descriptor) => descriptor.should_add(value) && !descriptor.is_materialized(),
                None => continue,
            };
            if add {
                self.materialize(node, id, parent);
            }
        }
    }

    /// Compile a descriptor's schema into `parent`, recording every key, required
    /// name and descriptor it introduced
    fn materialize(&mut self, node: NodeId, id: DescriptorId, parent: NodeId) {
        let Some(schema) = self
            .nodes
            .get(&node)
            .and_then(|n| n.descriptor(id))
            .map(|d| d.schema.clone())
        else {
            return;
        };

        let keys_before: HashSet<String> = self.field_keys(parent).into_iter().collect();
        let required_before = self.required_fields(parent);

        let mut scope = CompileScope::default();
        self.compile_schema(&schema, parent, None, &mut scope);

        // Keys another live descriptor already added are shared, not skipped
        let mut declared = Declared::default();
        self.collect_declared(&schema, &mut declared, 0);

        let added_keys: Vec<String> = self
            .field_keys(parent)
            .into_iter()
            .filter(|key| {
                !keys_before.contains(key)
                    || (declared.keys.contains(key) && self.key_claimed(parent, key))
            })
            .collect();
        let added_required: Vec<String> = self
            .required_fields(parent)
            .into_iter()
            .filter(|name| {
                !required_before.contains(name)
                    || (declared.required.contains(name) && self.required_claimed(parent, name))
            })
            .collect();

        tracing::debug!(
            "Materialized {:?} into '{}'",
            added_keys,
            self.nodes.get(&parent).map(|n| n.unique_key.as_str()).unwrap_or_default()
        );

        if let Some(descriptor) = self.nodes.get_mut(&node).and_then(|n| n.descriptor_mut(id)) {
            descriptor.added_keys = added_keys;
            descriptor.added_required = added_required;
            descriptor.attached = scope.attached;
        }
    }

    /// Undo everything a descriptor materialized
    pub(crate) fn dematerialize(&mut self, node: NodeId, id: DescriptorId) {
        let Some(current) = self.nodes.get_mut(&node) else {
            return;
        };
        let parent = current.parent;
        let Some(descriptor) = current.descriptor_mut(id) else {
            return;
        };
        let added_keys = std::mem::take(&mut descriptor.added_keys);
        let added_required = std::mem::take(&mut descriptor.added_required);
        let attached = std::mem::take(&mut descriptor.attached);

        for (holder, attached_id) in attached {
            self.detach_descriptor(holder, attached_id);
        }

        let Some(parent) = parent else {
            return;
        };
        // Shared keys and names stay while another live descriptor claims them
        for key in &added_keys {
            if self.key_claimed(parent, key) {
                continue;
            }
            if let Some(child) = self.field_by_key(parent, key) {
                self.teardown(child);
            }
        }
        let released: Vec<String> = added_required
            .into_iter()
            .filter(|name| !self.required_claimed(parent, name))
            .collect();
        if let Some(group) = self.nodes.get_mut(&parent).and_then(|n| n.as_group_mut()) {
            group.required_fields.retain(|name| !released.contains(name));
        }

        tracing::debug!("Dematerialized {:?}", added_keys);
    }

    /// Remove a descriptor from a node that outlives it, releasing the node's
    /// observer when nothing is left to observe
    fn detach_descriptor(&mut self, holder: NodeId, id: DescriptorId) {
        if !self.contains(holder) {
            return;
        }
        self.dematerialize(holder, id);

        let Some(node) = self.nodes.get_mut(&holder) else {
            return;
        };
        node.conditional_schemas.retain(|d| d.id != id);
        if node.conditional_schemas.is_empty() && !node.role.is_selector() {
            self.release_observer(holder);
        }
    }

    /// Remove a node and everything below it.
    ///
    /// Order: release the observer, dematerialize the node's own descriptors, tear
    /// down children (snapshotted), detach from the parent.
    pub(crate) fn teardown(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let descriptors: Vec<DescriptorId> = node.conditional_schemas.iter().map(|d| d.id).collect();

        self.release_observer(id);
        for descriptor in descriptors {
            self.dematerialize(id, descriptor);
        }
        for child in self.children(id) {
            self.teardown(child);
        }

        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let key = node.key.clone();
        if let Some(parent) = node.parent {
            self.detach_child(parent, id, &key);
        }

        if let Some(node) = self.nodes.remove(&id) {
            self.events.push(TreeEvent::NodeRemoved {
                id,
                unique_key: node.unique_key,
            });
        }
    }

    fn detach_child(&mut self, parent: NodeId, child: NodeId, key: &str) {
        let siblings = match self.nodes.get_mut(&parent).map(|n| &mut n.shape) {
            Some(NodeShape::Group(group)) => {
                group.fields.shift_remove(key);
                group.fields.values().copied().collect::<Vec<_>>()
            }
            Some(NodeShape::Array(array)) => {
                array.items.retain(|item| *item != child);
                return;
            }
            _ => return,
        };

        // Keys removed out from under a descriptor stop being its responsibility
        for sibling in siblings {
            if let Some(node) = self.nodes.get_mut(&sibling) {
                for descriptor in &mut node.conditional_schemas {
                    descriptor.added_keys.retain(|k| k != key);
                }
            }
        }
    }

    /// Whether a descriptor held by a child of `group` lists `key` as added
    fn key_claimed(&self, group: NodeId, key: &str) -> bool {
        self.sibling_descriptors(group)
            .any(|d| d.added_keys.iter().any(|k| k == key))
    }

    fn required_claimed(&self, group: NodeId, name: &str) -> bool {
        self.sibling_descriptors(group)
            .any(|d| d.added_required.iter().any(|n| n == name))
    }

    fn sibling_descriptors(&self, group: NodeId) -> impl Iterator<Item = &ConditionalSchema> + '_ {
        self.children(group)
            .into_iter()
            .filter_map(move |child| self.nodes.get(&child))
            .flat_map(|node| node.conditional_schemas.iter())
    }

    /// Property names and required names a schema contributes to the group it is
    /// compiled into, through `allOf` and `$ref`
    fn collect_declared(&self, schema: &Value, declared: &mut Declared, depth: usize) {
        if depth > self.settings.max_depth {
            return;
        }
        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            if let Ok(resolved) = self.resolver.resolve(reference) {
                self.collect_declared(&resolved, declared, depth + 1);
            }
            return;
        }
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            declared.keys.extend(properties.keys().cloned());
        }
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            declared
                .required
                .extend(required.iter().filter_map(Value::as_str).map(str::to_string));
        }
        for sub in schema.get("allOf").and_then(Value::as_array).into_iter().flatten() {
            self.collect_declared(sub, declared, depth + 1);
        }
    }

    fn required_fields(&self, group: NodeId) -> Vec<String> {
        self.nodes
            .get(&group)
            .and_then(|n| n.as_group())
            .map(|g| g.required_fields.clone())
            .unwrap_or_default()
    }
}
