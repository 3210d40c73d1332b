//! The form tree and its engines
//!
//! [`FormTree`] owns every node in an arena keyed by [`NodeId`]. The engines are
//! split across submodules as `impl FormTree` blocks:
//!
//! - [`compiler`] - schema fragment -> nodes
//! - [`conditional`] - descriptor maintenance on value changes, and teardown
//! - [`patch`] - value patching and read-back
//! - [`collection`] - array items and custom properties
//! - [`validation`] - constraint checks over the live tree

pub mod collection;
pub mod compiler;
pub mod conditional;
pub mod kinds;
pub mod patch;
pub mod resolver;
pub mod validation;

#[cfg(test)]
mod conditional_test;

use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::adapters::fetch::SchemaFetcher;
use crate::config::CompilerSettings;
use crate::domain::{
    Control, Diagnostic, FieldConfig, FieldGroup, FormError, FormNode, FormResult, NodeId,
    NodeRole, NodeShape, ObserverKind, ObserverRegistry, PathSegment, PropertyPath, Rule,
    TreeEvent,
};

use compiler::CompileScope;
use resolver::RefResolver;

/// A compiled, live form
#[derive(Debug)]
pub struct FormTree {
    nodes: HashMap<NodeId, FormNode>,
    root: NodeId,
    next_node: u64,
    next_descriptor: u64,
    observers: ObserverRegistry,
    resolver: RefResolver,
    settings: CompilerSettings,
    issued_keys: HashMap<String, u32>,
    diagnostics: Vec<Diagnostic>,
    events: Vec<TreeEvent>,
}

impl FormTree {
    /// Compile a schema with default settings
    pub fn compile(schema: Value) -> Self {
        Self::with_settings(schema, CompilerSettings::default())
    }

    pub fn with_settings(schema: Value, settings: CompilerSettings) -> Self {
        Self::from_resolver(RefResolver::new(schema), settings)
    }

    /// Compile the resolver's root document. Remote references must already be
    /// prefetched; compilation itself never suspends.
    pub fn from_resolver(resolver: RefResolver, settings: CompilerSettings) -> Self {
        let schema = resolver.root().clone();
        let mut tree = Self {
            nodes: HashMap::new(),
            root: NodeId::new(0),
            next_node: 0,
            next_descriptor: 0,
            observers: ObserverRegistry::new(),
            resolver,
            settings,
            issued_keys: HashMap::new(),
            diagnostics: Vec::new(),
            events: Vec::new(),
        };

        let label = kinds::label(&schema, "");
        let root = tree.alloc(FormNode {
            id: NodeId::new(0),
            key: String::new(),
            unique_key: String::new(),
            path: PropertyPath::root(),
            label,
            description: description(&schema),
            format: kinds::format_hint(&schema).map(String::from),
            rule: None,
            parent: None,
            role: NodeRole::Schema,
            conditional_schemas: Vec::new(),
            shape: NodeShape::Group(FieldGroup {
                additional_properties: allows_additional(&schema),
                ..Default::default()
            }),
        });
        tree.root = root;

        let mut scope = CompileScope::default();
        tree.compile_schema(&schema, root, None, &mut scope);
        tree.ensure_parameter_adder(root);
        tracing::debug!("Compiled form with {} nodes", tree.nodes.len());
        tree
    }

    /// Prefetch remote references through `fetcher`, then compile.
    /// Fetch failures are recorded as diagnostics.
    pub async fn load(
        schema: Value,
        fetcher: &dyn SchemaFetcher,
        settings: CompilerSettings,
    ) -> Self {
        let mut resolver = RefResolver::new(schema);
        let failures = resolver.prefetch(fetcher).await;
        let mut tree = Self::from_resolver(resolver, settings);
        let compiled = std::mem::replace(&mut tree.diagnostics, failures);
        tree.diagnostics.extend(compiled);
        tree
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    pub fn resolver(&self) -> &RefResolver {
        &self.resolver
    }

    pub fn node(&self, id: NodeId) -> Option<&FormNode> {
        self.nodes.get(&id)
    }

    pub fn get(&self, id: NodeId) -> FormResult<&FormNode> {
        self.nodes.get(&id).ok_or(FormError::NodeNotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of live value-change observers
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drain the change events accumulated since the last call
    pub fn take_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.events)
    }

    /// Child ids of a group (insertion order) or array (item order)
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.nodes.get(&id).map(|n| &n.shape) {
            Some(NodeShape::Group(group)) => group.fields.values().copied().collect(),
            Some(NodeShape::Array(array)) => array.items.clone(),
            _ => Vec::new(),
        }
    }

    /// Field keys of a group in insertion order
    pub fn field_keys(&self, group: NodeId) -> Vec<String> {
        self.nodes
            .get(&group)
            .and_then(FormNode::as_group)
            .map(|g| g.fields.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn field_by_key(&self, group: NodeId, key: &str) -> Option<NodeId> {
        self.nodes
            .get(&group)
            .and_then(FormNode::as_group)
            .and_then(|g| g.fields.get(key).copied())
    }

    /// Look up a live node by dotted path (`address.city`, `items[1].name`)
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let path = PropertyPath::parse(path);
        let mut current = self.root;
        for segment in path.segments() {
            let node = self.nodes.get(&current)?;
            current = match (segment, &node.shape) {
                (PathSegment::Property(name), NodeShape::Group(group)) => {
                    *group.fields.get(name)?
                }
                (PathSegment::Index(idx), NodeShape::Array(array)) => *array.items.get(*idx)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn value(&self, id: NodeId) -> Option<&Value> {
        self.nodes.get(&id).and_then(FormNode::value)
    }

    /// Closest group at or above `id`'s parent
    pub fn enclosing_group(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.nodes.get(&id)?.parent;
        while let Some(candidate) = current {
            let node = self.nodes.get(&candidate)?;
            if node.as_group().is_some() {
                return Some(candidate);
            }
            current = node.parent;
        }
        None
    }

    // ------------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------------

    /// Set a leaf's value and notify its observer. Any structural change the
    /// observer makes is complete when this returns.
    pub fn set_value(&mut self, id: NodeId, value: Value) -> FormResult<()> {
        let observer = self.write_control(id, value.clone())?;
        match observer {
            Some(ObserverKind::Conditional) => self.apply_conditionals(id, &value),
            Some(ObserverKind::ParameterAdder) => self.submit_parameter(id, &value),
            None => {}
        }
        Ok(())
    }

    /// Store a value without notifying observers. Returns the kind of the node's
    /// live observer, if any.
    pub(crate) fn write_control(
        &mut self,
        id: NodeId,
        value: Value,
    ) -> FormResult<Option<ObserverKind>> {
        let node = self.nodes.get_mut(&id).ok_or(FormError::NodeNotFound(id))?;
        let actual = node.shape.name();
        let key = node.key.clone();
        let field = node.as_field_mut().ok_or(FormError::WrongShape {
            key,
            expected: "field",
            actual,
        })?;

        field.control.set(value.clone());
        let observer = field
            .control
            .subscription()
            .filter(|sub| self.observers.is_live(sub))
            .map(|sub| sub.kind());

        self.events.push(TreeEvent::ValueChanged { id, value });
        Ok(observer)
    }

    // ------------------------------------------------------------------------
    // Arena plumbing shared by the engines
    // ------------------------------------------------------------------------

    fn alloc(&mut self, mut node: FormNode) -> NodeId {
        let id = NodeId::new(self.next_node);
        self.next_node += 1;
        node.id = id;
        self.events.push(TreeEvent::NodeAdded {
            id,
            unique_key: node.unique_key.clone(),
        });
        self.nodes.insert(id, node);
        id
    }

    /// Attach a new node under `parent`: into a group's `fields` by key, or at the
    /// end of an array's `items`. Returns `None` (and allocates nothing) when the
    /// group already has that key or `parent` is not a container.
    pub(crate) fn insert_node(&mut self, parent: NodeId, spec: NodeSpec) -> Option<NodeId> {
        let parent_node = self.nodes.get(&parent)?;
        let path = match &parent_node.shape {
            NodeShape::Group(group) => {
                if group.fields.contains_key(&spec.key) {
                    tracing::debug!(
                        "Key '{}' already exists in '{}', keeping the existing field",
                        spec.key,
                        parent_node.unique_key
                    );
                    return None;
                }
                parent_node.path.push_property(&spec.key)
            }
            NodeShape::Array(array) => parent_node.path.push_index(array.items.len()),
            NodeShape::Field(_) => return None,
        };

        let unique_key = self.issue_unique_key(&path);
        let key = spec.key.clone();
        let id = self.alloc(FormNode {
            id: NodeId::new(0),
            key: spec.key,
            unique_key,
            path,
            label: spec.label,
            description: spec.description,
            format: spec.format,
            rule: spec.rule,
            parent: Some(parent),
            role: spec.role,
            conditional_schemas: Vec::new(),
            shape: spec.shape,
        });

        match self.nodes.get_mut(&parent).map(|n| &mut n.shape) {
            Some(NodeShape::Group(group)) => {
                group.fields.insert(key, id);
            }
            Some(NodeShape::Array(array)) => array.items.push(id),
            _ => {}
        }
        Some(id)
    }

    /// Deterministic path key; a path issued before in this session gets a `~N`
    /// generation suffix so unique keys are never reused.
    fn issue_unique_key(&mut self, path: &PropertyPath) -> String {
        let base = path.to_string();
        let generation = self.issued_keys.entry(base.clone()).or_insert(0);
        let key = if *generation == 0 {
            base
        } else {
            format!("{}~{}", base, generation)
        };
        *generation += 1;
        key
    }

    pub(crate) fn next_descriptor_id(&mut self) -> crate::domain::DescriptorId {
        self.next_descriptor += 1;
        crate::domain::DescriptorId(self.next_descriptor)
    }

    /// Subscribe an observer for `id` unless it already has one
    pub(crate) fn ensure_observer(&mut self, id: NodeId, kind: ObserverKind) {
        let Some(field) = self.nodes.get_mut(&id).and_then(FormNode::as_field_mut) else {
            return;
        };
        if field.control.subscription().is_none() {
            field.control.attach(self.observers.subscribe(id, kind));
        }
    }

    /// Release `id`'s observer, if any
    pub(crate) fn release_observer(&mut self, id: NodeId) {
        let subscription = self
            .nodes
            .get_mut(&id)
            .and_then(FormNode::as_field_mut)
            .and_then(|field| field.control.take_subscription());
        if let Some(subscription) = subscription {
            self.observers.release(subscription);
        }
    }

    /// Log and record a non-fatal problem
    pub(crate) fn diagnose(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    // ------------------------------------------------------------------------
    // Debug rendering
    // ------------------------------------------------------------------------

    /// Indented outline of the live tree, one node per line
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.outline_node(self.root, 0, &mut out);
        out
    }

    fn outline_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let name = if node.key.is_empty() { "<root>" } else { node.key.as_str() };
        let shape = match &node.shape {
            NodeShape::Field(field) => field.kind.as_str(),
            NodeShape::Group(_) => "group",
            NodeShape::Array(_) => "array",
        };
        let _ = write!(out, "{}{} [{}]", indent, name, shape);
        if let Some(value) = node.value().filter(|v| !v.is_null()) {
            let _ = write!(out, " = {}", value);
        }
        if self.is_required(id) {
            out.push_str(" *");
        }
        match node.rule {
            Some(Rule::Above) => out.push_str(" (rule above)"),
            Some(Rule::Below) => out.push_str(" (rule below)"),
            None => {}
        }
        out.push('\n');
        for child in self.children(id) {
            self.outline_node(child, depth + 1, out);
        }
    }
}

/// Everything needed to attach a new node
pub(crate) struct NodeSpec {
    pub key: String,
    pub label: String,
    pub description: Option<String>,
    pub format: Option<String>,
    pub rule: Option<Rule>,
    pub role: NodeRole,
    pub shape: NodeShape,
}

impl NodeSpec {
    /// Spec for a schema-declared node; label, description and hints come from
    /// `schema`
    pub fn from_schema(key: &str, schema: &Value, shape: NodeShape) -> Self {
        Self {
            key: key.to_string(),
            label: kinds::label(schema, key),
            description: description(schema),
            format: kinds::format_hint(schema).map(String::from),
            rule: kinds::rule(schema),
            role: NodeRole::Schema,
            shape,
        }
    }

    pub fn with_role(mut self, role: NodeRole) -> Self {
        self.role = role;
        self
    }
}

pub(crate) fn leaf(kind: crate::domain::FieldKind, initial: Value) -> NodeShape {
    NodeShape::Field(FieldConfig {
        kind,
        options: Vec::new(),
        validations: Vec::new(),
        control: Control::new(initial),
    })
}

pub(crate) fn description(schema: &Value) -> Option<String> {
    schema
        .get("description")
        .and_then(Value::as_str)
        .map(String::from)
}

/// `additionalProperties: true` or a schema object opens a group
pub(crate) fn allows_additional(schema: &Value) -> bool {
    matches!(
        schema.get("additionalProperties"),
        Some(Value::Bool(true)) | Some(Value::Object(_))
    )
}
