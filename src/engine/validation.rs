//! Constraint checks over the live tree
//!
//! Only the keyword subset the compiler understands is checked. Requiredness is
//! read from the enclosing group's live `required_fields`, so it follows
//! conditional branches as they come and go.

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use super::FormTree;
use crate::domain::{Constraint, FieldConfig, FormResult, NodeId, NodeShape};

/// A failed constraint on a live node, identified by its unique key
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintViolation {
    #[error("'{key}' is required")]
    Required { key: String },

    #[error("'{key}' must be at least {min} characters, got {actual}")]
    MinLength { key: String, min: u64, actual: usize },

    #[error("'{key}' must be at most {max} characters, got {actual}")]
    MaxLength { key: String, max: u64, actual: usize },

    #[error("'{key}' does not match pattern '{pattern}'")]
    Pattern { key: String, pattern: String },

    #[error("'{key}' has an invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        key: String,
        pattern: String,
        reason: String,
    },

    #[error("'{key}' must be >= {min}, got {actual}")]
    Minimum { key: String, min: f64, actual: f64 },

    #[error("'{key}' must be <= {max}, got {actual}")]
    Maximum { key: String, max: f64, actual: f64 },

    #[error("'{key}' must be > {min}, got {actual}")]
    ExclusiveMinimum { key: String, min: f64, actual: f64 },

    #[error("'{key}' must be < {max}, got {actual}")]
    ExclusiveMaximum { key: String, max: f64, actual: f64 },

    #[error("'{key}' needs at least {min} items, got {actual}")]
    MinItems { key: String, min: usize, actual: usize },

    #[error("'{key}' allows at most {max} items, got {actual}")]
    MaxItems { key: String, max: usize, actual: usize },
}

impl FormTree {
    /// Whether `id`'s key is currently listed in its enclosing group's
    /// `required_fields`
    pub fn is_required(&self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        self.enclosing_group(id)
            .and_then(|group| self.nodes.get(&group))
            .and_then(|group| group.as_group())
            .map_or(false, |group| group.required_fields.iter().any(|r| *r == node.key))
    }

    /// Check every node below (and including) `id`
    pub fn validate(&self, id: NodeId) -> FormResult<Vec<ConstraintViolation>> {
        self.get(id)?;
        let mut violations = Vec::new();
        self.validate_node(id, &mut violations);
        Ok(violations)
    }

    /// Check the whole form
    pub fn validate_all(&self) -> Vec<ConstraintViolation> {
        let mut violations = Vec::new();
        self.validate_node(self.root, &mut violations);
        violations
    }

    fn validate_node(&self, id: NodeId, out: &mut Vec<ConstraintViolation>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let key = node.unique_key.clone();

        match &node.shape {
            NodeShape::Field(field) => {
                if node.role.is_synthetic_leaf() {
                    return;
                }
                let value = field.control.value();
                if is_blank(value) {
                    if self.is_required(id) {
                        out.push(ConstraintViolation::Required { key });
                    }
                    return;
                }
                check_field(&key, field, value, out);
            }
            NodeShape::Group(_) => {
                for child in self.children(id) {
                    self.validate_node(child, out);
                }
            }
            NodeShape::Array(array) => {
                let actual = array.items.len();
                if actual == 0 && self.is_required(id) {
                    out.push(ConstraintViolation::Required { key: key.clone() });
                }
                if let Some(min) = array.min_items.filter(|min| actual < *min) {
                    out.push(ConstraintViolation::MinItems {
                        key: key.clone(),
                        min,
                        actual,
                    });
                }
                if let Some(max) = array.max_items.filter(|max| actual > *max) {
                    out.push(ConstraintViolation::MaxItems { key, max, actual });
                }
                for item in &array.items {
                    self.validate_node(*item, out);
                }
            }
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn check_field(key: &str, field: &FieldConfig, value: &Value, out: &mut Vec<ConstraintViolation>) {
    let key = key.to_string();
    let text = value.as_str();
    let number = value.as_f64();

    for constraint in &field.validations {
        let violation = match (constraint, text, number) {
            (Constraint::MinLength(min), Some(s), _) => {
                let actual = s.chars().count();
                (actual < *min as usize).then(|| ConstraintViolation::MinLength {
                    key: key.clone(),
                    min: *min,
                    actual,
                })
            }
            (Constraint::MaxLength(max), Some(s), _) => {
                let actual = s.chars().count();
                (actual > *max as usize).then(|| ConstraintViolation::MaxLength {
                    key: key.clone(),
                    max: *max,
                    actual,
                })
            }
            (Constraint::Pattern(pattern), Some(s), _) => match Regex::new(pattern) {
                Ok(re) => (!re.is_match(s)).then(|| ConstraintViolation::Pattern {
                    key: key.clone(),
                    pattern: pattern.clone(),
                }),
                Err(e) => Some(ConstraintViolation::InvalidPattern {
                    key: key.clone(),
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                }),
            },
            (Constraint::Minimum(min), _, Some(n)) => {
                (n < *min).then(|| ConstraintViolation::Minimum {
                    key: key.clone(),
                    min: *min,
                    actual: n,
                })
            }
            (Constraint::Maximum(max), _, Some(n)) => {
                (n > *max).then(|| ConstraintViolation::Maximum {
                    key: key.clone(),
                    max: *max,
                    actual: n,
                })
            }
            (Constraint::ExclusiveMinimum(min), _, Some(n)) => {
                (n <= *min).then(|| ConstraintViolation::ExclusiveMinimum {
                    key: key.clone(),
                    min: *min,
                    actual: n,
                })
            }
            (Constraint::ExclusiveMaximum(max), _, Some(n)) => {
                (n >= *max).then(|| ConstraintViolation::ExclusiveMaximum {
                    key: key.clone(),
                    max: *max,
                    actual: n,
                })
            }
            _ => None,
        };
        out.extend(violation);
    }
}
