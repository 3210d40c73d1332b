//! Node compiler
//!
//! Turns a schema fragment into nodes under an existing parent. Processing order
//! matters because later steps look up fields created by earlier ones:
//!
//! 1. `$ref` is resolved and the target compiled in its place
//! 2. `anyOf` becomes one checkbox per option
//! 3. `oneOf` becomes one radio with an option per branch
//! 4. a keyed `array` becomes a [`FieldArray`]
//! 5. `properties` become fields, groups and arrays
//! 6. `allOf` members are merged into the same parent
//! 7. `if`/`then`/`else` attach descriptors to fields created above

use serde_json::Value;

use super::{kinds, leaf, allows_additional, FormTree, NodeSpec};
use crate::domain::{
    ConditionalSchema, DescriptorId, Diagnostic, FieldArray, FieldConfig, FieldGroup, FieldKind,
    FieldOption, NodeId, NodeRole, NodeShape, ObserverKind,
};

/// State carried through one compile pass
#[derive(Debug, Default)]
pub(crate) struct CompileScope {
    /// `$ref`s currently being expanded, outermost first
    ref_stack: Vec<String>,
    depth: usize,
    /// Descriptors attached during this pass
    pub attached: Vec<(NodeId, DescriptorId)>,
}

impl FormTree {
    /// Compile `schema` under `parent`. With a key, the schema describes a new child
    /// named `key`; without one, its contents are merged into `parent`.
    ///
    /// Returns the created child (or `parent` for unkeyed schemas), `None` when the
    /// subtree was skipped.
    pub(crate) fn compile_schema(
        &mut self,
        schema: &Value,
        parent: NodeId,
        key: Option<&str>,
        scope: &mut CompileScope,
    ) -> Option<NodeId> {
        if scope.depth >= self.settings.max_depth {
            let path = self.child_path(parent, key);
            self.diagnose(Diagnostic::DepthExceeded {
                depth: self.settings.max_depth,
                path,
            });
            return None;
        }

        scope.depth += 1;
        let result = self.compile_resolved(schema, parent, key, scope);
        scope.depth -= 1;
        result
    }

    fn compile_resolved(
        &mut self,
        schema: &Value,
        parent: NodeId,
        key: Option<&str>,
        scope: &mut CompileScope,
    ) -> Option<NodeId> {
        // 1. $ref
        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            if scope.ref_stack.iter().any(|r| r == reference) {
                self.diagnose(Diagnostic::CircularRef {
                    reference: reference.to_string(),
                });
                return None;
            }
            let resolved = match self.resolver.resolve(reference) {
                Ok(resolved) => resolved,
                Err(diagnostic) => {
                    self.diagnose(diagnostic);
                    return None;
                }
            };

            scope.ref_stack.push(reference.to_string());
            let result = self.compile_schema(&resolved, parent, key, scope);
            scope.ref_stack.pop();
            return result;
        }

        let has_any_of = schema.get("anyOf").is_some();
        let has_one_of = schema.get("oneOf").is_some();

        let target = match key {
            None => parent,
            Some(key) if has_any_of || has_one_of => {
                let role = if has_one_of {
                    NodeRole::OneOfWrapper
                } else {
                    NodeRole::AnyOfWrapper
                };
                let shape = NodeShape::Group(FieldGroup {
                    additional_properties: allows_additional(schema),
                    ..Default::default()
                });
                self.insert_node(parent, NodeSpec::from_schema(key, schema, shape).with_role(role))?
            }
            // 4. keyed arrays
            Some(key) if kinds::effective_type(schema) == Some("array") => {
                return self.create_array(parent, key, schema, scope);
            }
            Some(key) => return self.compile_property(parent, key, schema, scope),
        };

        // 2. anyOf
        if let Some(options) = schema.get("anyOf").and_then(Value::as_array) {
            self.create_any_of(target, options);
        }
        // 3. oneOf
        if let Some(options) = schema.get("oneOf").and_then(Value::as_array) {
            self.create_one_of(target, schema, options);
        }

        self.compile_body(target, schema, scope);
        if key.is_some() {
            self.ensure_parameter_adder(target);
        }
        Some(target)
    }

    /// Steps 5-7 into an existing group: `required`, `properties`, `allOf`, `if`
    pub(crate) fn compile_body(&mut self, target: NodeId, schema: &Value, scope: &mut CompileScope) {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            if let Some(group) = self.nodes.get_mut(&target).and_then(|n| n.as_group_mut()) {
                for name in required.iter().filter_map(Value::as_str) {
                    if !group.required_fields.iter().any(|r| r == name) {
                        group.required_fields.push(name.to_string());
                    }
                }
            }
        }

        // 5. properties
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (name, property) in properties {
                self.compile_schema(property, target, Some(name), scope);
            }
        }

        // 6. allOf, merged into the same parent
        if let Some(members) = schema.get("allOf").and_then(Value::as_array) {
            for member in members {
                self.compile_schema(member, target, None, scope);
            }
        }

        // 7. if/then/else
        if schema.get("if").is_some() {
            self.attach_conditionals(target, schema, scope);
        }
    }

    /// Keyed property without selectors: dispatch on its type
    fn compile_property(
        &mut self,
        parent: NodeId,
        key: &str,
        schema: &Value,
        scope: &mut CompileScope,
    ) -> Option<NodeId> {
        match kinds::effective_type(schema) {
            Some("object") => {
                let shape = NodeShape::Group(FieldGroup {
                    additional_properties: allows_additional(schema),
                    ..Default::default()
                });
                let group = self.insert_node(parent, NodeSpec::from_schema(key, schema, shape))?;
                self.compile_body(group, schema, scope);
                self.ensure_parameter_adder(group);
                Some(group)
            }
            Some("array") => self.create_array(parent, key, schema, scope),
            _ => self.create_field(parent, key, schema),
        }
    }

    fn create_field(&mut self, parent: NodeId, key: &str, schema: &Value) -> Option<NodeId> {
        let shape = NodeShape::Field(FieldConfig {
            kind: kinds::field_kind(schema, self.settings.select_threshold),
            options: kinds::enum_options(schema),
            validations: kinds::constraints(schema),
            control: crate::domain::Control::new(kinds::initial_value(schema)),
        });
        self.insert_node(parent, NodeSpec::from_schema(key, schema, shape))
    }

    /// Create an array and pre-populate it up to `minItems`
    fn create_array(
        &mut self,
        parent: NodeId,
        key: &str,
        schema: &Value,
        scope: &mut CompileScope,
    ) -> Option<NodeId> {
        let bound = |name: &str| {
            schema
                .get(name)
                .and_then(Value::as_u64)
                .map(|n| n as usize)
        };
        let shape = NodeShape::Array(FieldArray {
            items: Vec::new(),
            item_schema: schema.get("items").filter(|items| items.is_object()).cloned(),
            min_items: bound("minItems"),
            max_items: bound("maxItems"),
            next_item: 0,
        });
        let array = self.insert_node(parent, NodeSpec::from_schema(key, schema, shape))?;

        for _ in 0..bound("minItems").unwrap_or(0) {
            if self.add_item_scoped(array, scope).is_none() {
                break;
            }
        }
        Some(array)
    }

    // ------------------------------------------------------------------------
    // Selectors
    // ------------------------------------------------------------------------

    /// One checkbox per `anyOf` option, each owning a descriptor that
    /// materializes the option while checked
    fn create_any_of(&mut self, target: NodeId, options: &[Value]) {
        if !self.selector_parent_ok(target, "anyOf") {
            return;
        }

        for (index, option) in options.iter().enumerate() {
            let key = self.selector_key(target, &format!("anyOf{}", index));
            let spec = NodeSpec {
                key,
                label: kinds::option_label(option, index),
                description: super::description(option),
                format: None,
                rule: None,
                role: NodeRole::AnyOfSelector,
                shape: leaf(FieldKind::Checkbox, Value::Bool(false)),
            };
            let Some(checkbox) = self.insert_node(target, spec) else {
                continue;
            };

            let descriptor = ConditionalSchema::new(
                self.next_descriptor_id(),
                Some(Value::Bool(true)),
                Some(Value::Bool(false)),
                option.clone(),
            );
            self.push_descriptor(checkbox, descriptor);
        }
    }

    /// A single radio choosing one `oneOf` branch. Option values are the branch's
    /// `const` when present, else its index.
    fn create_one_of(&mut self, target: NodeId, schema: &Value, options: &[Value]) {
        if !self.selector_parent_ok(target, "oneOf") {
            return;
        }

        let choices: Vec<FieldOption> = options
            .iter()
            .enumerate()
            .map(|(index, option)| FieldOption {
                label: kinds::option_label(option, index),
                value: kinds::option_value(option, index),
            })
            .collect();

        let format = kinds::format_hint(schema).map(String::from);
        let label = if format.as_deref() == Some("options-label") {
            choices
                .iter()
                .map(|choice| choice.label.as_str())
                .collect::<Vec<_>>()
                .join(" / ")
        } else {
            let key = self.nodes.get(&target).map(|n| n.key.clone()).unwrap_or_default();
            kinds::label(schema, &key)
        };

        let spec = NodeSpec {
            key: self.selector_key(target, "oneOf"),
            label,
            description: None,
            format,
            rule: None,
            role: NodeRole::OneOfSelector,
            shape: NodeShape::Field(FieldConfig {
                kind: FieldKind::Radio,
                options: choices.clone(),
                validations: Vec::new(),
                control: crate::domain::Control::new(Value::Null),
            }),
        };
        let Some(radio) = self.insert_node(target, spec) else {
            return;
        };

        for (choice, option) in choices.into_iter().zip(options) {
            let descriptor = ConditionalSchema::new(
                self.next_descriptor_id(),
                Some(choice.value),
                None,
                option.clone(),
            );
            self.push_descriptor(radio, descriptor);
        }
    }

    fn selector_parent_ok(&mut self, target: NodeId, keyword: &'static str) -> bool {
        let Some(node) = self.nodes.get(&target) else {
            return false;
        };
        if node.as_group().is_some() {
            return true;
        }
        let diagnostic = Diagnostic::SelectorOutsideGroup {
            keyword,
            parent: node.shape.name(),
            key: node.unique_key.clone(),
        };
        self.diagnose(diagnostic);
        false
    }

    /// Reserved-prefix key for a synthesized selector, suffixed `_1`, `_2`, ... when
    /// the group already has one
    fn selector_key(&self, group: NodeId, base: &str) -> String {
        let base = format!("{}{}", self.settings.reserved_prefix, base);
        let mut key = base.clone();
        let mut n = 0;
        while self.field_by_key(group, &key).is_some() {
            n += 1;
            key = format!("{}_{}", base, n);
        }
        key
    }

    // ------------------------------------------------------------------------
    // Conditionals
    // ------------------------------------------------------------------------

    /// Bind `if`/`then`/`else` to the fields named in `if.properties`. Each field
    /// gets a descriptor triggered by the `const` it is compared against and, with
    /// an `else`, one removed by that const.
    fn attach_conditionals(&mut self, target: NodeId, schema: &Value, scope: &mut CompileScope) {
        let Some(conditions) = schema
            .get("if")
            .and_then(|s| s.get("properties"))
            .and_then(Value::as_object)
        else {
            return;
        };
        let then_schema = schema.get("then");
        let else_schema = schema.get("else");

        for (property, condition) in conditions {
            let Some(trigger) = self.conditional_target(target, property) else {
                let scope_key = self
                    .nodes
                    .get(&target)
                    .map(|n| n.unique_key.clone())
                    .unwrap_or_default();
                self.diagnose(Diagnostic::ConditionalTargetMissing {
                    property: property.clone(),
                    scope: scope_key,
                });
                continue;
            };
            let Some(value) = condition.get("const") else {
                self.diagnose(Diagnostic::ConditionalWithoutConst {
                    property: property.clone(),
                });
                continue;
            };

            if let Some(then_schema) = then_schema {
                let descriptor = ConditionalSchema::new(
                    self.next_descriptor_id(),
                    Some(value.clone()),
                    None,
                    then_schema.clone(),
                );
                scope.attached.push((trigger, descriptor.id));
                self.push_descriptor(trigger, descriptor);
            }
            if let Some(else_schema) = else_schema {
                let descriptor = ConditionalSchema::new(
                    self.next_descriptor_id(),
                    None,
                    Some(value.clone()),
                    else_schema.clone(),
                );
                scope.attached.push((trigger, descriptor.id));
                self.push_descriptor(trigger, descriptor);
            }

            // A default already selects a branch
            let current = self.value(trigger).cloned().unwrap_or(Value::Null);
            if !current.is_null() {
                self.apply_conditionals(trigger, &current);
            }
        }
    }

    /// Leaf named `property` in `target`, else in `target`'s parent group
    fn conditional_target(&self, target: NodeId, property: &str) -> Option<NodeId> {
        let is_leaf = |id: &NodeId| self.nodes.get(id).and_then(|n| n.as_field()).is_some();

        if let Some(id) = self.field_by_key(target, property).filter(is_leaf) {
            return Some(id);
        }
        let parent = self.nodes.get(&target)?.parent?;
        self.field_by_key(parent, property).filter(is_leaf)
    }

    fn push_descriptor(&mut self, node: NodeId, descriptor: ConditionalSchema) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.conditional_schemas.push(descriptor);
        }
        self.ensure_observer(node, ObserverKind::Conditional);
    }

    // ------------------------------------------------------------------------
    // Parameter adder
    // ------------------------------------------------------------------------

    /// Give an open group its "add custom property" field
    pub(crate) fn ensure_parameter_adder(&mut self, group: NodeId) {
        let open = self
            .nodes
            .get(&group)
            .and_then(|n| n.as_group())
            .map_or(false, |g| g.additional_properties);
        if !open {
            return;
        }

        let key = format!("{}add_property", self.settings.reserved_prefix);
        if self.field_by_key(group, &key).is_some() {
            return;
        }
        let spec = NodeSpec {
            key,
            label: "Add property".to_string(),
            description: None,
            format: None,
            rule: None,
            role: NodeRole::ParameterAdder,
            shape: leaf(FieldKind::ParameterAdder, Value::Null),
        };
        if let Some(adder) = self.insert_node(group, spec) {
            self.ensure_observer(adder, ObserverKind::ParameterAdder);
        }
    }

    fn child_path(&self, parent: NodeId, key: Option<&str>) -> String {
        let base = self
            .nodes
            .get(&parent)
            .map(|n| n.unique_key.clone())
            .unwrap_or_default();
        match key {
            Some(key) if base.is_empty() => key.to_string(),
            Some(key) => format!("{}.{}", base, key),
            None => base,
        }
    }
}
